//! Recorded hook sessions.
//!
//! A session file captures enough of a live process to replay its hook state
//! detached from the host: method bodies in textual IL, each method's patches
//! as edit scripts, captured-value descriptions, and host metadata for the
//! export index.

use crate::asm;
use crate::editor::BodyEditor;
use crate::il::{Instruction, MethodId};
use crate::registry::HookRegistry;
use crate::result::{Error, Result};
use crate::runtime::{CaptureKey, PatchIdentity};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A loaded session document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Host application version at recording time.
    #[serde(default)]
    pub host_version: String,
    /// Loaded mods at recording time.
    #[serde(default)]
    pub mods: Vec<ModInfo>,
    /// Captured-value descriptions keyed by integer pairs.
    #[serde(default)]
    pub captures: Vec<CaptureEntry>,
    /// Recorded methods with their patches.
    pub methods: Vec<MethodEntry>,
}

/// One loaded mod.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModInfo {
    /// Mod name.
    pub name: String,
    /// Mod version string.
    pub version: String,
}

/// One captured value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureEntry {
    /// Slot id.
    pub id: i32,
    /// Slot hash.
    pub hash: i32,
    /// Human-readable description of the captured value or delegate.
    pub value: String,
}

/// One recorded method.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodEntry {
    /// Full name of the declaring type.
    pub type_name: String,
    /// Method name.
    pub name: String,
    /// Parameter signature.
    #[serde(default)]
    pub signature: String,
    /// Textual IL body, one instruction per line.
    pub body: Vec<String>,
    /// Recorded decompiler output for the declaring type, if captured.
    #[serde(default)]
    pub decompiled: Option<String>,
    /// Patches in registration order.
    #[serde(default)]
    pub patches: Vec<PatchEntry>,
}

impl MethodEntry {
    /// Method identity for this entry.
    pub fn method_id(&self) -> MethodId {
        MethodId::new(
            self.type_name.clone(),
            self.name.clone(),
            self.signature.clone(),
        )
    }
}

/// One recorded patch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchEntry {
    /// Declaring type of the callback.
    pub declaring: String,
    /// Callback name.
    pub name: String,
    /// Rewrite or replacement.
    #[serde(default)]
    pub kind: PatchEntryKind,
    /// Replacement entry-point identity.
    #[serde(default)]
    pub entry_point: Option<String>,
    /// Edit script replayed by the rewrite callback.
    #[serde(default)]
    pub steps: Vec<EditStep>,
}

/// Patch flavor in a session file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatchEntryKind {
    /// Inline bytecode rewrite.
    #[default]
    Rewrite,
    /// Call-boundary replacement.
    Replacement,
}

/// One step of a recorded edit script. Offsets refer to the body as the
/// callback sees it, i.e. after earlier layers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum EditStep {
    /// Insert in front of the instruction at `offset`.
    InsertBefore {
        /// Anchor offset.
        offset: u32,
        /// Textual IL of the inserted instruction.
        instr: String,
    },
    /// Insert right after the instruction at `offset`.
    InsertAfter {
        /// Anchor offset.
        offset: u32,
        /// Textual IL of the inserted instruction.
        instr: String,
    },
    /// Append at the end of the body.
    Append {
        /// Textual IL of the appended instruction.
        instr: String,
    },
    /// Remove the instruction at `offset`.
    Remove {
        /// Target offset.
        offset: u32,
    },
    /// Replace the instruction at `offset`.
    Replace {
        /// Target offset.
        offset: u32,
        /// Textual IL of the replacement instruction.
        instr: String,
    },
}

enum CompiledStep {
    InsertBefore(u32, Instruction),
    InsertAfter(u32, Instruction),
    Append(Instruction),
    Remove(u32),
    Replace(u32, Instruction),
}

impl CompiledStep {
    fn compile(step: &EditStep) -> Result<Self> {
        Ok(match step {
            EditStep::InsertBefore { offset, instr } => {
                Self::InsertBefore(*offset, asm::parse_instr(instr)?)
            }
            EditStep::InsertAfter { offset, instr } => {
                Self::InsertAfter(*offset, asm::parse_instr(instr)?)
            }
            EditStep::Append { instr } => Self::Append(asm::parse_instr(instr)?),
            EditStep::Remove { offset } => Self::Remove(*offset),
            EditStep::Replace { offset, instr } => {
                Self::Replace(*offset, asm::parse_instr(instr)?)
            }
        })
    }

    fn apply(&self, editor: &mut BodyEditor) -> Result<()> {
        match self {
            Self::InsertBefore(offset, instr) => {
                editor.insert_before_offset(*offset, instr.clone())
            }
            Self::InsertAfter(offset, instr) => editor.insert_after_offset(*offset, instr.clone()),
            Self::Append(instr) => {
                editor.push(instr.clone());
                Ok(())
            }
            Self::Remove(offset) => editor.remove_at_offset(*offset).map(|_| ()),
            Self::Replace(offset, instr) => {
                editor.replace_at_offset(*offset, instr.clone()).map(|_| ())
            }
        }
    }
}

impl Session {
    /// Loads a session document from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| Error::FileRead {
            path: path.display().to_string(),
            source,
        })?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Builds a hook registry replaying this session's registrations.
    /// Edit scripts are compiled eagerly so malformed IL fails here, not
    /// inside a layer.
    pub fn registry(&self) -> Result<HookRegistry> {
        let mut registry = HookRegistry::new();
        for capture in &self.captures {
            registry.add_capture(
                CaptureKey {
                    id: capture.id,
                    hash: capture.hash,
                },
                capture.value.clone(),
            );
        }
        for entry in &self.methods {
            let method = entry.method_id();
            registry.add_method(method.clone(), asm::parse_body(&entry.body.join("\n"))?);
            if let Some(text) = &entry.decompiled {
                registry.add_decompiled(entry.type_name.clone(), text.clone());
            }
            for patch in &entry.patches {
                let identity = PatchIdentity::new(patch.declaring.clone(), patch.name.clone());
                match patch.kind {
                    PatchEntryKind::Replacement => {
                        let entry_point = patch
                            .entry_point
                            .clone()
                            .unwrap_or_else(|| identity.to_string());
                        registry.register_replacement(&method, identity, entry_point);
                    }
                    PatchEntryKind::Rewrite => {
                        let steps: Vec<CompiledStep> = patch
                            .steps
                            .iter()
                            .map(CompiledStep::compile)
                            .collect::<Result<_>>()?;
                        registry.register_rewrite(&method, identity, move |editor| {
                            for step in &steps {
                                step.apply(editor)?;
                            }
                            Ok(())
                        });
                    }
                }
            }
        }
        Ok(registry)
    }
}
