//! Boundaries onto the external collaborators: the patching runtime that owns
//! hook registration, the disassembler, and the decompiler.
//!
//! The diff engine only borrows patch handles to enumerate and invoke them;
//! their lifecycle belongs to the patching runtime. [`WeakPatch`] exists so
//! side tables can remember patches without extending that lifetime.

use crate::editor::BodyEditor;
use crate::il::{Instruction, MethodId, MethodRef};
use crate::result::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// Rewrite callback invoked against an editable disassembly context.
pub type RewriteFn = dyn Fn(&mut BodyEditor) -> Result<()> + Send + Sync;

/// Identity of a registered callback: the declaring method/type and name of
/// the callback itself, not of the method it patches.
#[derive(
    Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct PatchIdentity {
    /// Full name of the type declaring the callback.
    pub declaring: String,
    /// Callback method name.
    pub name: String,
}

impl PatchIdentity {
    /// Builds an identity from declaring type and callback name.
    pub fn new(declaring: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            declaring: declaring.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for PatchIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.declaring, self.name)
    }
}

/// What a registered patch does to its target.
#[derive(Clone)]
pub enum PatchKind {
    /// Inline bytecode rewrite; participates in diff layers.
    Rewrite(Arc<RewriteFn>),
    /// Call-boundary replacement; enumerated but contributes no layer.
    Replacement {
        /// Identity of the replacement entry point.
        entry: String,
    },
}

impl fmt::Debug for PatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatchKind::Rewrite(_) => f.write_str("Rewrite(..)"),
            PatchKind::Replacement { entry } => {
                f.debug_struct("Replacement").field("entry", entry).finish()
            }
        }
    }
}

#[derive(Debug)]
struct PatchState {
    identity: PatchIdentity,
    kind: PatchKind,
    applied: AtomicBool,
}

/// Handle to one registered callback bound to a specific method.
///
/// Clones share state; apply/unapply are idempotent (re-applying an applied
/// patch is a no-op).
#[derive(Clone, Debug)]
pub struct PatchHandle {
    state: Arc<PatchState>,
}

impl PatchHandle {
    /// Creates an applied inline-rewrite patch.
    pub fn rewrite(
        identity: PatchIdentity,
        f: impl Fn(&mut BodyEditor) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        Self {
            state: Arc::new(PatchState {
                identity,
                kind: PatchKind::Rewrite(Arc::new(f)),
                applied: AtomicBool::new(true),
            }),
        }
    }

    /// Creates an applied call-boundary replacement patch.
    pub fn replacement(identity: PatchIdentity, entry: impl Into<String>) -> Self {
        Self {
            state: Arc::new(PatchState {
                identity,
                kind: PatchKind::Replacement {
                    entry: entry.into(),
                },
                applied: AtomicBool::new(true),
            }),
        }
    }

    /// The callback's identity.
    pub fn identity(&self) -> &PatchIdentity {
        &self.state.identity
    }

    /// The patch kind.
    pub fn kind(&self) -> &PatchKind {
        &self.state.kind
    }

    /// True for inline rewrite patches.
    pub fn is_rewrite(&self) -> bool {
        matches!(self.state.kind, PatchKind::Rewrite(_))
    }

    /// Replacement entry-point identity, if this is a replacement patch.
    pub fn entry_point(&self) -> Option<&str> {
        match &self.state.kind {
            PatchKind::Replacement { entry } => Some(entry),
            PatchKind::Rewrite(_) => None,
        }
    }

    /// Observable applied flag.
    pub fn is_applied(&self) -> bool {
        self.state.applied.load(Ordering::Acquire)
    }

    /// Applies the patch. Returns false if it was already applied.
    pub fn apply(&self) -> bool {
        !self.state.applied.swap(true, Ordering::AcqRel)
    }

    /// Unapplies the patch. Returns false if it was already unapplied.
    pub fn unapply(&self) -> bool {
        self.state.applied.swap(false, Ordering::AcqRel)
    }

    /// Invokes the rewrite callback against the editor. Replacement patches
    /// leave the body untouched.
    pub fn invoke(&self, editor: &mut BodyEditor) -> Result<()> {
        match &self.state.kind {
            PatchKind::Rewrite(f) => f(editor),
            PatchKind::Replacement { .. } => Ok(()),
        }
    }

    /// Non-owning reference for side tables.
    pub fn downgrade(&self) -> WeakPatch {
        WeakPatch {
            state: Arc::downgrade(&self.state),
        }
    }
}

/// Non-owning patch reference; upgrades fail once the runtime drops the patch.
#[derive(Clone, Debug)]
pub struct WeakPatch {
    state: Weak<PatchState>,
}

impl WeakPatch {
    /// Recovers a full handle if the patch is still alive.
    pub fn upgrade(&self) -> Option<PatchHandle> {
        self.state.upgrade().map(|state| PatchHandle { state })
    }
}

/// Integer key pair identifying a runtime-captured value. The components are
/// process-specific handles with no semantic meaning across runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CaptureKey {
    /// Slot id.
    pub id: i32,
    /// Slot hash.
    pub hash: i32,
}

/// The patching-runtime boundary.
pub trait DetourRuntime: Send + Sync {
    /// Methods in the running process that currently have patches attached.
    fn patched_methods(&self) -> BTreeSet<MethodId>;

    /// Patches registered against a method, in registration order.
    fn patches_for(&self, method: &MethodId) -> Vec<PatchHandle>;

    /// True when the referenced method is the runtime's recover-captured-value
    /// primitive (the integer-pair lookup).
    fn is_capture_lookup(&self, method: &MethodRef) -> bool;

    /// Describes the captured value or delegate behind a key pair.
    fn resolve_capture(&self, key: CaptureKey) -> Option<String>;
}

/// The disassembly boundary. Always yields a fresh, independently editable
/// clone of the method body, never the live version.
pub trait Disassembler: Send + Sync {
    /// Disassembles the method into an instruction stream.
    fn disassemble(&self, method: &MethodId) -> Result<Vec<Instruction>>;
}

/// The decompiler boundary. Failures are converted to displayed messages by
/// callers; they never propagate to the frame loop.
#[async_trait]
pub trait Decompiler: Send + Sync {
    /// Decompiles a type, or a single method of it when `method` is given.
    async fn decompile(&self, type_name: &str, method: Option<&str>) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::il::{Opcode, Operand};

    #[test]
    fn apply_and_unapply_are_idempotent() {
        let patch = PatchHandle::replacement(PatchIdentity::new("Mod.Hooks", "Speedrun"), "entry");
        assert!(patch.is_applied());
        assert!(!patch.apply());
        assert!(patch.unapply());
        assert!(!patch.unapply());
        assert!(!patch.is_applied());
        assert!(patch.apply());
        assert!(patch.is_applied());
    }

    #[test]
    fn weak_patch_does_not_extend_lifetime() {
        let patch = PatchHandle::rewrite(PatchIdentity::new("Mod.Hooks", "Manip"), |editor| {
            editor.push(crate::il::Instruction::new(Opcode::Nop, Operand::None));
            Ok(())
        });
        let weak = patch.downgrade();
        assert!(weak.upgrade().is_some());
        drop(patch);
        assert!(weak.upgrade().is_none());
    }
}
