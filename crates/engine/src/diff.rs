//! Layered diff builder.
//!
//! A method with N applied rewrite patches is diffed as N sequential layers:
//! layer k's output instruction list is the input to layer k+1. Each layer is
//! a greedy single-pass alignment with bounded lookahead, deliberately not a
//! full LCS; method bodies are hundreds of instructions at most and patches
//! rarely move code far from its original position, so the O(N * window)
//! bound is a better trade than O(N^2) exactness.

use crate::{Result, oracle, sandbox};
use hooklens_core::il::{Instruction, MethodId};
use hooklens_core::runtime::{CaptureKey, DetourRuntime, Disassembler, PatchHandle, PatchIdentity};

/// How far ahead the alignment searches before declaring a deletion.
pub const LOOKAHEAD_WINDOW: usize = 15;

/// Classification of one diff entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Change {
    /// Present in the original method and every layer since.
    Unchanged,
    /// Introduced by the attributed patch.
    Added,
    /// Deleted by the attributed patch.
    Removed,
}

/// One classified instruction in the final diff.
#[derive(Clone, Debug)]
pub struct DiffEntry {
    /// Classification.
    pub change: Change,
    /// The concrete instruction (from the after stream for kept entries).
    pub instruction: Instruction,
    /// Patch responsible for the change; `None` for unchanged entries from
    /// the original method.
    pub source: Option<PatchIdentity>,
    /// Free-form descriptive annotations, e.g. resolved captured values.
    pub notes: Vec<String>,
}

impl DiffEntry {
    /// Wraps an original instruction as unchanged.
    pub fn unchanged(instruction: Instruction) -> Self {
        Self {
            change: Change::Unchanged,
            instruction,
            source: None,
            notes: Vec::new(),
        }
    }
}

/// The layered diff of one method against its applied patches.
///
/// Constructed on demand and immutable afterwards; toggling a patch discards
/// it and a fresh one is built from scratch.
#[derive(Debug)]
pub struct MethodDiff {
    /// The target method.
    pub method: MethodId,
    /// Rewrite patches applied at construction time, in layer order.
    pub applied_patches: Vec<PatchIdentity>,
    /// Classified instruction sequence covering the fully patched body.
    pub entries: Vec<DiffEntry>,
}

impl MethodDiff {
    /// Builds the full layered diff for a method.
    ///
    /// A failing layer is logged with the method and patch identity and
    /// skipped; the next patch applies on top of the prior layer. One broken
    /// patch never prevents inspecting the others.
    pub fn build(
        runtime: &dyn DetourRuntime,
        disasm: &dyn Disassembler,
        method: &MethodId,
    ) -> Result<Self> {
        let body = disasm.disassemble(method)?;
        let mut entries: Vec<DiffEntry> = body.into_iter().map(DiffEntry::unchanged).collect();

        let layers: Vec<PatchHandle> = runtime
            .patches_for(method)
            .into_iter()
            .filter(|p| p.is_rewrite() && p.is_applied())
            .collect();

        for patch in &layers {
            match sandbox::apply_layer(&entries, patch, method) {
                Ok(after) => entries = diff_layer(&entries, &after, patch, runtime),
                Err(e) => {
                    tracing::warn!(
                        method = %method,
                        patch = %patch.identity(),
                        error = %e,
                        "skipping failed patch layer"
                    );
                }
            }
        }

        Ok(Self {
            method: method.clone(),
            applied_patches: layers.iter().map(|p| p.identity().clone()).collect(),
            entries,
        })
    }

    /// Unchanged entries in order; reading their instructions reconstructs
    /// the original method body.
    pub fn unchanged_body(&self) -> impl Iterator<Item = &Instruction> {
        self.entries
            .iter()
            .filter(|e| e.change == Change::Unchanged)
            .map(|e| &e.instruction)
    }

    /// Counts of (unchanged, added, removed) entries.
    pub fn counts(&self) -> (usize, usize, usize) {
        let mut counts = (0, 0, 0);
        for entry in &self.entries {
            match entry.change {
                Change::Unchanged => counts.0 += 1,
                Change::Added => counts.1 += 1,
                Change::Removed => counts.2 += 1,
            }
        }
        counts
    }
}

/// Aligns the previous layer against the freshly patched stream, attributing
/// insertions and deletions to `patch` and carrying earlier provenance
/// forward.
pub fn diff_layer(
    before: &[DiffEntry],
    after: &[Instruction],
    patch: &PatchHandle,
    runtime: &dyn DetourRuntime,
) -> Vec<DiffEntry> {
    let mut out = Vec::with_capacity(after.len().max(before.len()));
    let mut bi = 0usize;
    let mut ai = 0usize;

    while ai < after.len() {
        // Removals recorded by earlier layers pass through untouched so
        // their provenance survives; they no longer exist in the stream.
        if let Some(prev) = before.get(bi)
            && prev.change == Change::Removed
        {
            out.push(prev.clone());
            bi += 1;
            continue;
        }

        let instr = &after[ai];
        let Some(prev) = before.get(bi) else {
            // Previous layer exhausted: everything left is new.
            out.push(added_entry(after, ai, patch, runtime));
            ai += 1;
            continue;
        };

        if oracle::equivalent(&prev.instruction, instr, following(after, ai), runtime) {
            // Keep the after-stream's concrete instruction but preserve the
            // existing classification and lineage.
            out.push(DiffEntry {
                change: prev.change,
                instruction: instr.clone(),
                source: prev.source.clone(),
                notes: prev.notes.clone(),
            });
            bi += 1;
            ai += 1;
            continue;
        }

        // Does the previous instruction still exist a little further on? If
        // so the current after-instruction is an insertion; if not, the
        // previous instruction was deleted by this patch.
        let survives = after
            .iter()
            .enumerate()
            .skip(ai + 1)
            .take(LOOKAHEAD_WINDOW)
            .any(|(idx, candidate)| {
                oracle::equivalent(&prev.instruction, candidate, following(after, idx), runtime)
            });

        if survives {
            out.push(added_entry(after, ai, patch, runtime));
            ai += 1;
        } else {
            out.push(DiffEntry {
                change: Change::Removed,
                instruction: prev.instruction.clone(),
                source: Some(patch.identity().clone()),
                notes: prev.notes.clone(),
            });
            bi += 1;
        }
    }

    // Trailing entries of the previous layer: report them as removed by this
    // patch rather than silently dropping them, keeping the conservation
    // invariant (unchanged entries always reconstruct the original body).
    while let Some(prev) = before.get(bi) {
        if prev.change == Change::Removed {
            out.push(prev.clone());
        } else {
            out.push(DiffEntry {
                change: Change::Removed,
                instruction: prev.instruction.clone(),
                source: Some(patch.identity().clone()),
                notes: prev.notes.clone(),
            });
        }
        bi += 1;
    }

    out
}

fn following(after: &[Instruction], index: usize) -> &[Instruction] {
    after.get(index + 1..).unwrap_or(&[])
}

/// Builds an Added entry, annotating capture-table lookups with the value
/// they recover. The two integer keys sit in the one or two instructions
/// before the call.
fn added_entry(
    after: &[Instruction],
    index: usize,
    patch: &PatchHandle,
    runtime: &dyn DetourRuntime,
) -> DiffEntry {
    let instr = &after[index];
    let mut notes = Vec::new();

    if oracle::is_capture_call(instr, runtime)
        && let Some(hash_idx) = index.checked_sub(1)
        && let Some(id_idx) = index.checked_sub(2)
        && let (Some(hash), Some(id)) = (
            after[hash_idx].ldc_i4_value(),
            after[id_idx].ldc_i4_value(),
        )
    {
        let key = CaptureKey {
            id: id as i32,
            hash: hash as i32,
        };
        match runtime.resolve_capture(key) {
            Some(description) => notes.push(format!("retrieves {description}")),
            None => notes.push("retrieves unresolved captured value".to_string()),
        }
    }

    DiffEntry {
        change: Change::Added,
        instruction: instr.clone(),
        source: Some(patch.identity().clone()),
        notes,
    }
}
