//! Hook inventory.
//!
//! A cached, ordered view of which patches are attached to which methods,
//! held through weak references so the inventory never keeps a patch alive
//! after its owning mod unloads. Refreshing prunes dead entries and merges
//! newly registered ones while preserving registration order.

use hooklens_core::il::MethodId;
use hooklens_core::runtime::{DetourRuntime, PatchHandle, PatchIdentity, WeakPatch};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

struct TrackedPatch {
    identity: PatchIdentity,
    patch: WeakPatch,
}

/// Ordered per-method patch inventory over a live runtime.
pub struct HookInventory {
    runtime: Arc<dyn DetourRuntime>,
    tracked: Mutex<HashMap<MethodId, Vec<TrackedPatch>>>,
}

impl HookInventory {
    /// Builds an inventory over the runtime and takes an initial snapshot.
    pub fn new(runtime: Arc<dyn DetourRuntime>) -> Self {
        let inventory = Self {
            runtime,
            tracked: Mutex::new(HashMap::new()),
        };
        inventory.refresh();
        inventory
    }

    /// The runtime this inventory observes.
    pub fn runtime(&self) -> &Arc<dyn DetourRuntime> {
        &self.runtime
    }

    /// Re-syncs against the runtime: drops entries whose patch has been
    /// unloaded, merges patches registered since the last refresh, and drops
    /// methods that no longer have any live patch.
    pub fn refresh(&self) {
        let mut tracked = self.tracked.lock().expect("inventory lock");
        let methods = self.runtime.patched_methods();

        tracked.retain(|method, _| methods.contains(method));

        for method in methods {
            let live = self.runtime.patches_for(&method);
            let entry = tracked.entry(method).or_default();
            entry.retain(|t| t.patch.upgrade().is_some());
            for patch in live {
                if !entry.iter().any(|t| &t.identity == patch.identity()) {
                    entry.push(TrackedPatch {
                        identity: patch.identity().clone(),
                        patch: patch.downgrade(),
                    });
                }
            }
        }

        tracked.retain(|_, entry| !entry.is_empty());
    }

    /// Methods with at least one live patch, sorted.
    pub fn methods(&self) -> Vec<MethodId> {
        let tracked = self.tracked.lock().expect("inventory lock");
        let mut methods: Vec<MethodId> = tracked.keys().cloned().collect();
        methods.sort();
        methods
    }

    /// Live patch handles for a method, in registration order.
    pub fn patches(&self, method: &MethodId) -> Vec<PatchHandle> {
        let tracked = self.tracked.lock().expect("inventory lock");
        tracked
            .get(method)
            .map(|entry| entry.iter().filter_map(|t| t.patch.upgrade()).collect())
            .unwrap_or_default()
    }

    /// Flips a patch's applied state. Returns the new state, or `None` when
    /// the patch is unknown or already unloaded.
    pub fn toggle(&self, method: &MethodId, identity: &PatchIdentity) -> Option<bool> {
        let patch = {
            let tracked = self.tracked.lock().expect("inventory lock");
            tracked
                .get(method)?
                .iter()
                .find(|t| &t.identity == identity)?
                .patch
                .upgrade()?
        };
        if patch.is_applied() {
            patch.unapply();
            Some(false)
        } else {
            patch.apply();
            Some(true)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hooklens_core::asm::parse_body;
    use hooklens_core::registry::HookRegistry;

    fn fixture() -> (Arc<HookRegistry>, MethodId) {
        let mut registry = HookRegistry::new();
        let method = MethodId::new("Game.Player", "Update", "()");
        registry.add_method(method.clone(), parse_body("ret").unwrap());
        registry.register_rewrite(&method, PatchIdentity::new("Mod.A", "Manip"), |_| Ok(()));
        registry.register_replacement(
            &method,
            PatchIdentity::new("Mod.B", "Wrap"),
            "Mod.B::Wrap",
        );
        (Arc::new(registry), method)
    }

    #[test]
    fn snapshot_preserves_registration_order() {
        let (registry, method) = fixture();
        let inventory = HookInventory::new(registry);
        assert_eq!(inventory.methods(), vec![method.clone()]);
        let names: Vec<String> = inventory
            .patches(&method)
            .iter()
            .map(|p| p.identity().to_string())
            .collect();
        assert_eq!(names, vec!["Mod.A::Manip", "Mod.B::Wrap"]);
    }

    #[test]
    fn toggle_flips_applied_state() {
        let (registry, method) = fixture();
        let inventory = HookInventory::new(registry);
        let identity = PatchIdentity::new("Mod.A", "Manip");
        assert_eq!(inventory.toggle(&method, &identity), Some(false));
        assert!(!inventory.patches(&method)[0].is_applied());
        assert_eq!(inventory.toggle(&method, &identity), Some(true));
        assert!(inventory.patches(&method)[0].is_applied());

        let unknown = PatchIdentity::new("Mod.Z", "Nope");
        assert_eq!(inventory.toggle(&method, &unknown), None);
    }

    /// Runtime whose patches can be unloaded mid-test.
    struct UnloadableRuntime {
        method: MethodId,
        patches: Mutex<Vec<PatchHandle>>,
    }

    impl DetourRuntime for UnloadableRuntime {
        fn patched_methods(&self) -> std::collections::BTreeSet<MethodId> {
            let patches = self.patches.lock().unwrap();
            if patches.is_empty() {
                Default::default()
            } else {
                [self.method.clone()].into()
            }
        }

        fn patches_for(&self, method: &MethodId) -> Vec<PatchHandle> {
            if method == &self.method {
                self.patches.lock().unwrap().clone()
            } else {
                Vec::new()
            }
        }

        fn is_capture_lookup(&self, _: &hooklens_core::il::MethodRef) -> bool {
            false
        }

        fn resolve_capture(&self, _: hooklens_core::runtime::CaptureKey) -> Option<String> {
            None
        }
    }

    #[test]
    fn refresh_prunes_unloaded_patches() {
        let method = MethodId::new("Game.Player", "Update", "()");
        let runtime = Arc::new(UnloadableRuntime {
            method: method.clone(),
            patches: Mutex::new(vec![
                PatchHandle::rewrite(PatchIdentity::new("Mod.A", "Manip"), |_| Ok(())),
                PatchHandle::rewrite(PatchIdentity::new("Mod.B", "Manip"), |_| Ok(())),
            ]),
        });
        let inventory = HookInventory::new(runtime.clone());
        assert_eq!(inventory.patches(&method).len(), 2);

        // One mod unloads; its weak reference dies and refresh drops it.
        runtime.patches.lock().unwrap().remove(0);
        inventory.refresh();
        let remaining = inventory.patches(&method);
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].identity().declaring, "Mod.B");

        runtime.patches.lock().unwrap().clear();
        inventory.refresh();
        assert!(inventory.methods().is_empty());
        assert!(inventory.patches(&method).is_empty());
    }
}
