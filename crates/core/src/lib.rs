//! Core building blocks for the hooklens workspace: the managed-IL
//! instruction model, textual IL parsing, editable method bodies handed to
//! rewrite callbacks, and the boundary traits onto the external patching
//! runtime, disassembler, and decompiler.

pub mod asm;
pub mod editor;
pub mod il;
pub mod registry;
pub mod result;
pub mod runtime;
pub mod session;

pub use editor::BodyEditor;
pub use il::{FieldRef, FlowControl, Instruction, MethodId, MethodRef, Opcode, Operand};
pub use result::{Error, Result};
pub use runtime::{
    CaptureKey, Decompiler, DetourRuntime, Disassembler, PatchHandle, PatchIdentity, PatchKind,
    WeakPatch,
};
