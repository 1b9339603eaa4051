//! Instruction equivalence oracle.
//!
//! Binary-patch frameworks re-encode instructions (short/long branch forms)
//! and route captured closures through integer-keyed side tables; a
//! byte-for-byte comparison would flag a diff on every patch even when no
//! real change occurred. The oracle suppresses that encoding noise while
//! still catching genuine logic changes. Rules are ordered; the first match
//! wins.

use hooklens_core::il::{Instruction, Opcode, Operand};
use hooklens_core::runtime::DetourRuntime;

/// How far past an integer load the capture-table lookup call may sit.
pub const CAPTURE_NEIGHBORHOOD: usize = 2;

/// Decides whether `a` (from the before stream) and `b` (from the after
/// stream) represent the same logical step. `following` is the after-stream
/// slice starting right after `b`, consulted only by the capture-noise rule.
pub fn equivalent(
    a: &Instruction,
    b: &Instruction,
    following: &[Instruction],
    runtime: &dyn DetourRuntime,
) -> bool {
    // Rule 1: identical canonical forms (opcode + operand, no position).
    if a.canonical() == b.canonical() {
        return true;
    }

    // Rule 2: encoding-variant immediate-integer loads with equal value.
    if let (Some(av), Some(bv)) = (a.ldc_i4_value(), b.ldc_i4_value())
        && av == bv
    {
        return true;
    }

    // Rule 3: branches of the same canonical kind. Targets are deliberately
    // not compared; offsets shift under instrumentation.
    if a.op.is_branch() && b.op.is_branch() && a.op.long_form() == b.op.long_form() {
        return true;
    }

    // Rules 4 and 5: call vs. callvirt, and differing generic instantiations,
    // to the same generics-erased signature.
    if is_call(&a.op)
        && is_call(&b.op)
        && let (Operand::Method(am), Operand::Method(bm)) = (&a.operand, &b.operand)
        && am.simple_id() == bm.simple_id()
    {
        return true;
    }

    // Rule 6: integer loads feeding the runtime's capture-table lookup are
    // process-specific handles, equivalent to any other such load.
    if a.ldc_i4_value().is_some()
        && b.ldc_i4_value().is_some()
        && feeds_capture_lookup(following, runtime)
    {
        return true;
    }

    false
}

fn is_call(op: &Opcode) -> bool {
    matches!(op, Opcode::Call | Opcode::Callvirt)
}

/// True when a capture-table lookup call sits within the next one or two
/// instructions.
pub fn feeds_capture_lookup(following: &[Instruction], runtime: &dyn DetourRuntime) -> bool {
    following
        .iter()
        .take(CAPTURE_NEIGHBORHOOD)
        .any(|i| is_capture_call(i, runtime))
}

/// True when the instruction is a call into the runtime's
/// recover-captured-value primitive.
pub fn is_capture_call(instr: &Instruction, runtime: &dyn DetourRuntime) -> bool {
    is_call(&instr.op)
        && matches!(&instr.operand, Operand::Method(m) if runtime.is_capture_lookup(m))
}
