//! Background decompilation.
//!
//! Requests are spawned onto the ambient tokio runtime and deliver their
//! result into a shared slot read by the render loop. The slot carries a
//! generation counter: closing the view or firing a new request bumps it,
//! and a task whose generation no longer matches drops its result instead of
//! overwriting a newer one. There is no cancellation; a stale task just runs
//! to completion and discards.

use hooklens_core::il::MethodId;
use hooklens_core::runtime::Decompiler;
use std::sync::{Arc, Mutex};

/// What the decompile pane currently shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecompileSlot {
    /// No request outstanding.
    Idle,
    /// A request is running.
    Pending,
    /// Decompiled source, ready to render.
    Ready(String),
    /// The decompiler reported an error; shown in the pane, never propagated.
    Failed(String),
}

/// Shared decompile state, one per app.
#[derive(Debug)]
pub struct DecompileState {
    generation: u64,
    slot: DecompileSlot,
}

impl DecompileState {
    /// Fresh shared state for one app.
    pub fn shared() -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(Self {
            generation: 0,
            slot: DecompileSlot::Idle,
        }))
    }

    /// Current pane content.
    pub fn slot(&self) -> &DecompileSlot {
        &self.slot
    }

    /// Invalidates any in-flight request and clears the pane.
    pub fn reset(&mut self) {
        self.generation += 1;
        self.slot = DecompileSlot::Idle;
    }
}

/// Fires a decompile request for the method's declaring type. The result
/// replaces the slot only if no reset happened in between.
pub fn request(
    state: &Arc<Mutex<DecompileState>>,
    decompiler: &Arc<dyn Decompiler>,
    method: &MethodId,
) {
    let generation = {
        let mut guard = state.lock().expect("decompile lock");
        guard.generation += 1;
        guard.slot = DecompileSlot::Pending;
        guard.generation
    };

    let Ok(handle) = tokio::runtime::Handle::try_current() else {
        let mut guard = state.lock().expect("decompile lock");
        if guard.generation == generation {
            guard.slot = DecompileSlot::Failed("no async runtime available".to_string());
        }
        return;
    };

    let state = Arc::clone(state);
    let decompiler = Arc::clone(decompiler);
    let type_name = method.type_name.clone();
    let method_name = method.method_name.clone();
    handle.spawn(async move {
        let outcome = decompiler
            .decompile(&type_name, Some(method_name.as_str()))
            .await;
        let mut guard = state.lock().expect("decompile lock");
        if guard.generation != generation {
            // The view moved on while we were working.
            return;
        }
        guard.slot = match outcome {
            Ok(text) => DecompileSlot::Ready(text),
            Err(e) => DecompileSlot::Failed(e.to_string()),
        };
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use hooklens_core::registry::HookRegistry;

    #[tokio::test(flavor = "multi_thread")]
    async fn result_lands_in_slot() {
        let mut registry = HookRegistry::new();
        registry.add_decompiled("Game.Player", "class Player { }");
        let decompiler: Arc<dyn Decompiler> = Arc::new(registry);
        let state = DecompileState::shared();
        let method = MethodId::new("Game.Player", "Update", "()");

        request(&state, &decompiler, &method);
        for _ in 0..100 {
            if *state.lock().unwrap().slot() != DecompileSlot::Pending {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        assert_eq!(
            *state.lock().unwrap().slot(),
            DecompileSlot::Ready("class Player { }".to_string())
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn stale_result_is_discarded() {
        let mut registry = HookRegistry::new();
        registry.add_decompiled("Game.Player", "class Player { }");
        let decompiler: Arc<dyn Decompiler> = Arc::new(registry);
        let state = DecompileState::shared();
        let method = MethodId::new("Game.Player", "Update", "()");

        request(&state, &decompiler, &method);
        // Close the view before the task delivers.
        state.lock().unwrap().reset();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(*state.lock().unwrap().slot(), DecompileSlot::Idle);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failure_is_shown_not_propagated() {
        let registry = HookRegistry::new();
        let decompiler: Arc<dyn Decompiler> = Arc::new(registry);
        let state = DecompileState::shared();
        let method = MethodId::new("Game.Missing", "Gone", "()");

        request(&state, &decompiler, &method);
        for _ in 0..100 {
            if *state.lock().unwrap().slot() != DecompileSlot::Pending {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        let guard = state.lock().unwrap();
        let DecompileSlot::Failed(msg) = guard.slot() else {
            panic!("expected failure slot");
        };
        assert!(msg.contains("Game.Missing"));
    }
}
