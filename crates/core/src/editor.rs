//! Editable method bodies.
//!
//! A [`BodyEditor`] is the disassembly context handed to rewrite callbacks.
//! It is always seeded from a disposable clone of the instruction stream,
//! never from the live method, and it is consumed by [`BodyEditor::finish`]
//! so teardown is guaranteed by ownership even when a layer is abandoned.

use crate::il::{Instruction, Operand};
use crate::result::{Error, Result};
use std::collections::HashMap;

/// Editable instruction list supporting insert/delete/replace, re-rendered to
/// a canonical instruction sequence by [`BodyEditor::finish`].
#[derive(Debug, Default)]
pub struct BodyEditor {
    instrs: Vec<Instruction>,
}

impl BodyEditor {
    /// Seeds an editor from a clone of the given instruction stream.
    pub fn new(seed: &[Instruction]) -> Self {
        Self {
            instrs: seed.to_vec(),
        }
    }

    /// Current instruction stream.
    pub fn instrs(&self) -> &[Instruction] {
        &self.instrs
    }

    /// Number of instructions.
    pub fn len(&self) -> usize {
        self.instrs.len()
    }

    /// True when the body is empty.
    pub fn is_empty(&self) -> bool {
        self.instrs.is_empty()
    }

    /// Index of the instruction at the given pre-edit offset.
    pub fn index_of_offset(&self, offset: u32) -> Option<usize> {
        self.instrs.iter().position(|i| i.offset == offset)
    }

    /// Inserts at an index, shifting later instructions.
    pub fn insert(&mut self, index: usize, instr: Instruction) {
        let index = index.min(self.instrs.len());
        self.instrs.insert(index, instr);
    }

    /// Inserts in front of the instruction at the given offset.
    pub fn insert_before_offset(&mut self, offset: u32, instr: Instruction) -> Result<()> {
        let index = self
            .index_of_offset(offset)
            .ok_or(Error::UnknownOffset(offset))?;
        self.instrs.insert(index, instr);
        Ok(())
    }

    /// Inserts right after the instruction at the given offset.
    pub fn insert_after_offset(&mut self, offset: u32, instr: Instruction) -> Result<()> {
        let index = self
            .index_of_offset(offset)
            .ok_or(Error::UnknownOffset(offset))?;
        self.instrs.insert(index + 1, instr);
        Ok(())
    }

    /// Appends at the end of the body.
    pub fn push(&mut self, instr: Instruction) {
        self.instrs.push(instr);
    }

    /// Removes by index.
    pub fn remove(&mut self, index: usize) -> Option<Instruction> {
        if index < self.instrs.len() {
            Some(self.instrs.remove(index))
        } else {
            None
        }
    }

    /// Removes the instruction at the given offset.
    pub fn remove_at_offset(&mut self, offset: u32) -> Result<Instruction> {
        let index = self
            .index_of_offset(offset)
            .ok_or(Error::UnknownOffset(offset))?;
        Ok(self.instrs.remove(index))
    }

    /// Replaces the instruction at the given offset.
    pub fn replace_at_offset(&mut self, offset: u32, instr: Instruction) -> Result<Instruction> {
        let index = self
            .index_of_offset(offset)
            .ok_or(Error::UnknownOffset(offset))?;
        Ok(std::mem::replace(&mut self.instrs[index], instr))
    }

    /// Keeps only instructions matching the predicate.
    pub fn retain(&mut self, f: impl FnMut(&Instruction) -> bool) {
        self.instrs.retain(f);
    }

    /// Re-renders the edited body to a canonical instruction sequence:
    /// offsets are reassigned by encoded size and branch targets are remapped
    /// through the old-to-new offset table. Targets pointing at a removed
    /// instruction are left untouched.
    pub fn finish(self) -> Vec<Instruction> {
        let mut renumbered = Vec::with_capacity(self.instrs.len());
        let mut remap: HashMap<u32, u32> = HashMap::new();
        let mut offset: u32 = 0;
        for instr in self.instrs {
            remap.entry(instr.offset).or_insert(offset);
            let instr = Instruction { offset, ..instr };
            offset += instr.byte_size() as u32;
            renumbered.push(instr);
        }

        for instr in &mut renumbered {
            match &mut instr.operand {
                Operand::Target(t) => {
                    if let Some(new) = remap.get(t) {
                        *t = *new;
                    }
                }
                Operand::Switch(targets) => {
                    for t in targets {
                        if let Some(new) = remap.get(t) {
                            *t = *new;
                        }
                    }
                }
                _ => {}
            }
        }
        renumbered
    }
}
