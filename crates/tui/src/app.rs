//! Application state and core logic.

use crate::decompile::DecompileState;
use hooklens_core::il::MethodId;
use hooklens_core::runtime::{Decompiler, DetourRuntime, Disassembler, PatchHandle};
use hooklens_engine::{HookInventory, MethodDiff};
use ratatui::layout::Rect;
use ratatui::widgets::ListState;
use std::sync::{Arc, Mutex};

/// Application state.
pub struct App {
    /// Inventory over the live runtime.
    pub inventory: HookInventory,
    /// Disassembler boundary.
    pub disasm: Arc<dyn Disassembler>,
    /// Decompiler boundary.
    pub decompiler: Arc<dyn Decompiler>,
    /// Patched methods in display order.
    pub methods: Vec<MethodId>,
    /// Selected index into `methods`.
    pub selected: usize,
    /// List state for navigation.
    pub list_state: ListState,
    /// Diff of the selected method; rebuilt on selection or toggle, never
    /// patched incrementally.
    pub diff: Option<MethodDiff>,
    /// Highlighted patch in the detail pane's patch sub-list.
    pub patch_cursor: usize,
    /// Scroll position within the detail view.
    pub detail_scroll: u16,
    /// Shared decompile slot.
    pub decompile: Arc<Mutex<DecompileState>>,
    /// Whether the detail pane shows decompiled source instead of the diff.
    pub show_decompile: bool,
    /// Area of the list widget (for mouse hit testing).
    pub list_area: Rect,
    /// Area of the detail widget (for mouse scrolling).
    pub detail_area: Rect,
}

impl App {
    /// Creates the app and builds the diff for the first method, if any.
    pub fn new(
        runtime: Arc<dyn DetourRuntime>,
        disasm: Arc<dyn Disassembler>,
        decompiler: Arc<dyn Decompiler>,
    ) -> Self {
        let inventory = HookInventory::new(runtime);
        let methods = inventory.methods();
        let mut list_state = ListState::default();
        if !methods.is_empty() {
            list_state.select(Some(0));
        }
        let mut app = Self {
            inventory,
            disasm,
            decompiler,
            methods,
            selected: 0,
            list_state,
            diff: None,
            patch_cursor: 0,
            detail_scroll: 0,
            decompile: DecompileState::shared(),
            show_decompile: false,
            list_area: Rect::default(),
            detail_area: Rect::default(),
        };
        app.rebuild_diff();
        app
    }

    /// The currently selected method.
    pub fn current_method(&self) -> Option<&MethodId> {
        self.methods.get(self.selected)
    }

    /// Patches of the selected method, in registration order.
    pub fn current_patches(&self) -> Vec<PatchHandle> {
        self.current_method()
            .map(|m| self.inventory.patches(m))
            .unwrap_or_default()
    }

    /// Rebuilds the selected method's diff from scratch.
    pub fn rebuild_diff(&mut self) {
        self.diff = self.current_method().and_then(|method| {
            match MethodDiff::build(
                self.inventory.runtime().as_ref(),
                self.disasm.as_ref(),
                method,
            ) {
                Ok(diff) => Some(diff),
                Err(e) => {
                    tracing::warn!(method = %method, error = %e, "failed to build diff");
                    None
                }
            }
        });
        let patch_count = self.current_patches().len();
        if self.patch_cursor >= patch_count {
            self.patch_cursor = patch_count.saturating_sub(1);
        }
    }

    fn change_selection(&mut self, index: usize) {
        self.selected = index;
        self.list_state.select(Some(index));
        self.detail_scroll = 0;
        self.patch_cursor = 0;
        self.close_decompile();
        self.rebuild_diff();
    }

    /// Select the next method.
    pub fn select_next(&mut self) {
        if self.selected < self.methods.len().saturating_sub(1) {
            self.change_selection(self.selected + 1);
        }
    }

    /// Select the previous method.
    pub fn select_prev(&mut self) {
        if self.selected > 0 {
            self.change_selection(self.selected - 1);
        }
    }

    /// Select a method by index.
    pub fn select_index(&mut self, index: usize) {
        if index < self.methods.len() && index != self.selected {
            self.change_selection(index);
        }
    }

    /// Move the patch cursor down.
    pub fn patch_cursor_next(&mut self) {
        let count = self.current_patches().len();
        if self.patch_cursor + 1 < count {
            self.patch_cursor += 1;
        }
    }

    /// Move the patch cursor up.
    pub fn patch_cursor_prev(&mut self) {
        self.patch_cursor = self.patch_cursor.saturating_sub(1);
    }

    /// Toggles the highlighted patch and rebuilds the diff.
    pub fn toggle_current_patch(&mut self) {
        let Some(method) = self.current_method().cloned() else {
            return;
        };
        let patches = self.current_patches();
        let Some(patch) = patches.get(self.patch_cursor) else {
            return;
        };
        let identity = patch.identity().clone();
        if let Some(applied) = self.inventory.toggle(&method, &identity) {
            tracing::debug!(method = %method, patch = %identity, applied, "toggled patch");
            self.rebuild_diff();
        }
    }

    /// Requests decompilation of the selected method's declaring type and
    /// switches the detail pane to the decompile view.
    pub fn request_decompile(&mut self) {
        let Some(method) = self.current_method().cloned() else {
            return;
        };
        self.show_decompile = true;
        self.detail_scroll = 0;
        crate::decompile::request(&self.decompile, &self.decompiler, &method);
    }

    /// Closes the decompile view, invalidating any in-flight request.
    pub fn close_decompile(&mut self) {
        if self.show_decompile {
            self.show_decompile = false;
            self.decompile.lock().expect("decompile lock").reset();
        }
    }

    /// Re-syncs the inventory and method list against the runtime.
    pub fn refresh(&mut self) {
        self.inventory.refresh();
        let selected_method = self.current_method().cloned();
        self.methods = self.inventory.methods();
        self.selected = selected_method
            .and_then(|m| self.methods.iter().position(|c| *c == m))
            .unwrap_or(0);
        self.list_state.select(if self.methods.is_empty() {
            None
        } else {
            Some(self.selected)
        });
        self.rebuild_diff();
    }

    /// Scroll detail view down by one line.
    pub const fn scroll_down(&mut self) {
        self.detail_scroll = self.detail_scroll.saturating_add(1);
    }

    /// Scroll detail view up by one line.
    pub const fn scroll_up(&mut self) {
        self.detail_scroll = self.detail_scroll.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hooklens_core::asm::{parse_body, parse_instr};
    use hooklens_core::registry::HookRegistry;
    use hooklens_core::runtime::PatchIdentity;
    use hooklens_engine::Change;

    fn fixture() -> App {
        let mut registry = HookRegistry::new();
        let update = MethodId::new("Game.Player", "Update", "()");
        registry.add_method(update.clone(), parse_body("ldc.i4 1\nret").unwrap());
        registry.register_rewrite(
            &update,
            PatchIdentity::new("Mod.Hooks", "Manip"),
            |editor| {
                editor.insert(1, parse_instr("nop").unwrap());
                Ok(())
            },
        );
        let jump = MethodId::new("Game.Player", "Jump", "()");
        registry.add_method(jump.clone(), parse_body("ret").unwrap());
        registry.register_replacement(&jump, PatchIdentity::new("Mod.Hooks", "Wrap"), "e");

        let registry = Arc::new(registry);
        App::new(registry.clone(), registry.clone(), registry)
    }

    #[test]
    fn initial_selection_builds_a_diff() {
        let app = fixture();
        assert_eq!(app.methods.len(), 2);
        let diff = app.diff.as_ref().expect("diff built");
        // BTreeSet order puts Jump first; it has no rewrite layers.
        assert_eq!(diff.method.method_name, "Jump");
        assert!(diff.applied_patches.is_empty());
    }

    #[test]
    fn toggle_rebuilds_from_scratch() {
        let mut app = fixture();
        app.select_next();
        let diff = app.diff.as_ref().expect("diff built");
        assert_eq!(diff.method.method_name, "Update");
        assert!(
            diff.entries
                .iter()
                .any(|e| e.change == Change::Added)
        );

        app.toggle_current_patch();
        let diff = app.diff.as_ref().expect("diff rebuilt");
        assert!(
            diff.entries
                .iter()
                .all(|e| e.change == Change::Unchanged)
        );

        app.toggle_current_patch();
        let diff = app.diff.as_ref().expect("diff rebuilt again");
        assert!(
            diff.entries
                .iter()
                .any(|e| e.change == Change::Added)
        );
    }

    #[test]
    fn selection_change_closes_decompile_view() {
        let mut app = fixture();
        app.show_decompile = true;
        app.select_next();
        assert!(!app.show_decompile);
    }
}
