//! The method-patch diff engine.
//!
//! Given a method's original instruction stream and the ordered rewrite
//! callbacks registered against it, the engine replays each callback in a
//! sandboxed clone, aligns the before/after streams with a fuzzy equivalence
//! oracle, and attributes every inserted or removed instruction to the patch
//! that caused it, layer by layer.

pub mod diff;
pub mod export;
pub mod inventory;
pub mod oracle;
pub mod render;
pub mod sandbox;

pub use diff::{Change, DiffEntry, MethodDiff};
pub use inventory::HookInventory;

use thiserror::Error;

/// Engine error type encompassing all engine module errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Core operation failed.
    #[error("core operation failed: {0}")]
    Core(#[from] hooklens_core::Error),

    /// I/O failure during bulk export.
    #[error("export io error at '{path}': {source}")]
    ExportIo {
        /// The path being written or read.
        path: String,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// A rewrite callback failed or panicked while building a layer.
    #[error("patch {patch} failed on {method}: {reason}")]
    PatchFailed {
        /// Display name of the method being diffed.
        method: String,
        /// Identity of the failing patch.
        patch: String,
        /// Error or panic message.
        reason: String,
    },

    /// JSON serialization error.
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Engine result type
pub type Result<T> = std::result::Result<T, Error>;
