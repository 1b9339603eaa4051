//! Patch application sandbox.
//!
//! Each layer replays one rewrite callback against a disposable editable
//! clone seeded from the previous layer's surviving instructions, never the
//! live method. A callback error or panic aborts only its own layer; the
//! editor is torn down by ownership and the next patch applies on top of the
//! prior layer.

use crate::diff::{Change, DiffEntry};
use crate::{Error, Result};
use hooklens_core::editor::BodyEditor;
use hooklens_core::il::{Instruction, MethodId};
use hooklens_core::runtime::PatchHandle;
use std::panic::{AssertUnwindSafe, catch_unwind};

/// Invokes one patch's rewrite callback against the previous layer and
/// returns the resulting instruction stream.
pub fn apply_layer(
    base: &[DiffEntry],
    patch: &PatchHandle,
    method: &MethodId,
) -> Result<Vec<Instruction>> {
    let seed: Vec<Instruction> = base
        .iter()
        .filter(|entry| entry.change != Change::Removed)
        .map(|entry| entry.instruction.clone())
        .collect();

    let mut editor = BodyEditor::new(&seed);
    let outcome = catch_unwind(AssertUnwindSafe(|| patch.invoke(&mut editor)));
    match outcome {
        Ok(Ok(())) => Ok(editor.finish()),
        Ok(Err(e)) => Err(Error::PatchFailed {
            method: method.display_name(),
            patch: patch.identity().to_string(),
            reason: e.to_string(),
        }),
        Err(panic) => Err(Error::PatchFailed {
            method: method.display_name(),
            patch: patch.identity().to_string(),
            reason: panic_message(panic),
        }),
    }
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        format!("panicked: {msg}")
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        format!("panicked: {msg}")
    } else {
        "panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hooklens_core::asm::{parse_body, parse_instr};
    use hooklens_core::runtime::PatchIdentity;

    fn base() -> Vec<DiffEntry> {
        parse_body("ldc.i4.1\nret")
            .unwrap()
            .into_iter()
            .map(DiffEntry::unchanged)
            .collect()
    }

    fn method() -> MethodId {
        MethodId::new("Game.Player", "Update", "()")
    }

    #[test]
    fn layer_sees_previous_layer_not_the_original() {
        let mut entries = base();
        entries.insert(
            1,
            DiffEntry {
                change: Change::Added,
                instruction: parse_instr("nop").unwrap(),
                source: Some(PatchIdentity::new("Mod.A", "Manip")),
                notes: vec![],
            },
        );
        // Removed entries must not be part of the seed.
        entries.insert(
            0,
            DiffEntry {
                change: Change::Removed,
                instruction: parse_instr("pop").unwrap(),
                source: Some(PatchIdentity::new("Mod.A", "Manip")),
                notes: vec![],
            },
        );

        let patch = PatchHandle::rewrite(PatchIdentity::new("Mod.B", "Manip"), |_| Ok(()));
        let out = apply_layer(&entries, &patch, &method()).unwrap();
        let text: Vec<String> = out.iter().map(|i| i.canonical()).collect();
        assert_eq!(text, vec!["ldc.i4.1", "nop", "ret"]);
    }

    #[test]
    fn failing_callback_reports_and_skips() {
        let patch = PatchHandle::rewrite(PatchIdentity::new("Mod.Broken", "Manip"), |editor| {
            editor.remove_at_offset(0x0999).map(|_| ())
        });
        let err = apply_layer(&base(), &patch, &method()).unwrap_err();
        assert!(matches!(err, Error::PatchFailed { .. }));
        assert!(err.to_string().contains("Mod.Broken::Manip"));
        assert!(err.to_string().contains("Game.Player.Update"));
    }

    #[test]
    fn panicking_callback_is_contained() {
        let patch = PatchHandle::rewrite(PatchIdentity::new("Mod.Panics", "Manip"), |_| {
            panic!("callback exploded")
        });
        let err = apply_layer(&base(), &patch, &method()).unwrap_err();
        let Error::PatchFailed { reason, .. } = &err else {
            panic!("expected PatchFailed");
        };
        assert!(reason.contains("callback exploded"));
    }
}
