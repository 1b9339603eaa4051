//! Managed-IL instruction model.
//!
//! Instructions are immutable once produced by disassembly; the diff engine
//! only classifies and reorders references to them. Offsets exist for display
//! and branch-target identity, never for equality of the operation itself.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Control-flow category of an opcode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlowControl {
    /// Falls through to the next instruction.
    Next,
    /// Unconditional transfer (`br`, `leave`, `switch` fallthrough aside).
    Branch,
    /// Conditional transfer.
    CondBranch,
    /// Method invocation.
    Call,
    /// Returns from the method.
    Return,
    /// Raises or re-raises an exception.
    Throw,
}

/// Opcode of a managed-IL instruction.
///
/// Covers the subset the diff engine must reason about: the compact
/// integer-load family, every branch in short and long encoding, calls, and
/// the common load/store/arithmetic operations. Anything else round-trips
/// through [`Opcode::Unknown`], mirroring how unrecognized operations are
/// preserved rather than rejected.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum Opcode {
    Nop,
    Dup,
    Pop,
    Ret,
    Throw,
    Rethrow,
    Endfinally,

    // Integer loads: macro forms, short form, long form.
    LdcI4M1,
    LdcI40,
    LdcI41,
    LdcI42,
    LdcI43,
    LdcI44,
    LdcI45,
    LdcI46,
    LdcI47,
    LdcI48,
    LdcI4S,
    LdcI4,
    LdcI8,
    LdcR4,
    LdcR8,
    Ldstr,
    Ldnull,

    Ldarg0,
    Ldarg1,
    Ldarg2,
    Ldarg3,
    LdargS,
    Ldloc0,
    Ldloc1,
    Ldloc2,
    Ldloc3,
    LdlocS,
    Stloc0,
    Stloc1,
    Stloc2,
    Stloc3,
    StlocS,

    Ldfld,
    Ldsfld,
    Stfld,
    Stsfld,
    Ldftn,

    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Neg,
    And,
    Or,
    Xor,
    Not,
    Shl,
    Shr,
    Ceq,
    Cgt,
    CgtUn,
    Clt,
    CltUn,
    ConvI4,
    ConvI8,
    ConvR4,
    ConvR8,

    Newobj,
    Newarr,
    Ldlen,
    Ldelem,
    Stelem,
    Box,
    Unbox,
    Castclass,
    Isinst,

    Call,
    Callvirt,

    // Branches: long form first, short form second.
    Br,
    BrS,
    Brfalse,
    BrfalseS,
    Brtrue,
    BrtrueS,
    Beq,
    BeqS,
    Bge,
    BgeS,
    Bgt,
    BgtS,
    Ble,
    BleS,
    Blt,
    BltS,
    BneUn,
    BneUnS,
    BgeUn,
    BgeUnS,
    BgtUn,
    BgtUnS,
    BleUn,
    BleUnS,
    BltUn,
    BltUnS,
    Leave,
    LeaveS,
    Switch,

    /// Unrecognized mnemonic, preserved verbatim.
    Unknown(String),
}

impl Opcode {
    /// Returns the textual mnemonic for this opcode.
    pub fn mnemonic(&self) -> &str {
        match self {
            Opcode::Nop => "nop",
            Opcode::Dup => "dup",
            Opcode::Pop => "pop",
            Opcode::Ret => "ret",
            Opcode::Throw => "throw",
            Opcode::Rethrow => "rethrow",
            Opcode::Endfinally => "endfinally",
            Opcode::LdcI4M1 => "ldc.i4.m1",
            Opcode::LdcI40 => "ldc.i4.0",
            Opcode::LdcI41 => "ldc.i4.1",
            Opcode::LdcI42 => "ldc.i4.2",
            Opcode::LdcI43 => "ldc.i4.3",
            Opcode::LdcI44 => "ldc.i4.4",
            Opcode::LdcI45 => "ldc.i4.5",
            Opcode::LdcI46 => "ldc.i4.6",
            Opcode::LdcI47 => "ldc.i4.7",
            Opcode::LdcI48 => "ldc.i4.8",
            Opcode::LdcI4S => "ldc.i4.s",
            Opcode::LdcI4 => "ldc.i4",
            Opcode::LdcI8 => "ldc.i8",
            Opcode::LdcR4 => "ldc.r4",
            Opcode::LdcR8 => "ldc.r8",
            Opcode::Ldstr => "ldstr",
            Opcode::Ldnull => "ldnull",
            Opcode::Ldarg0 => "ldarg.0",
            Opcode::Ldarg1 => "ldarg.1",
            Opcode::Ldarg2 => "ldarg.2",
            Opcode::Ldarg3 => "ldarg.3",
            Opcode::LdargS => "ldarg.s",
            Opcode::Ldloc0 => "ldloc.0",
            Opcode::Ldloc1 => "ldloc.1",
            Opcode::Ldloc2 => "ldloc.2",
            Opcode::Ldloc3 => "ldloc.3",
            Opcode::LdlocS => "ldloc.s",
            Opcode::Stloc0 => "stloc.0",
            Opcode::Stloc1 => "stloc.1",
            Opcode::Stloc2 => "stloc.2",
            Opcode::Stloc3 => "stloc.3",
            Opcode::StlocS => "stloc.s",
            Opcode::Ldfld => "ldfld",
            Opcode::Ldsfld => "ldsfld",
            Opcode::Stfld => "stfld",
            Opcode::Stsfld => "stsfld",
            Opcode::Ldftn => "ldftn",
            Opcode::Add => "add",
            Opcode::Sub => "sub",
            Opcode::Mul => "mul",
            Opcode::Div => "div",
            Opcode::Rem => "rem",
            Opcode::Neg => "neg",
            Opcode::And => "and",
            Opcode::Or => "or",
            Opcode::Xor => "xor",
            Opcode::Not => "not",
            Opcode::Shl => "shl",
            Opcode::Shr => "shr",
            Opcode::Ceq => "ceq",
            Opcode::Cgt => "cgt",
            Opcode::CgtUn => "cgt.un",
            Opcode::Clt => "clt",
            Opcode::CltUn => "clt.un",
            Opcode::ConvI4 => "conv.i4",
            Opcode::ConvI8 => "conv.i8",
            Opcode::ConvR4 => "conv.r4",
            Opcode::ConvR8 => "conv.r8",
            Opcode::Newobj => "newobj",
            Opcode::Newarr => "newarr",
            Opcode::Ldlen => "ldlen",
            Opcode::Ldelem => "ldelem",
            Opcode::Stelem => "stelem",
            Opcode::Box => "box",
            Opcode::Unbox => "unbox",
            Opcode::Castclass => "castclass",
            Opcode::Isinst => "isinst",
            Opcode::Call => "call",
            Opcode::Callvirt => "callvirt",
            Opcode::Br => "br",
            Opcode::BrS => "br.s",
            Opcode::Brfalse => "brfalse",
            Opcode::BrfalseS => "brfalse.s",
            Opcode::Brtrue => "brtrue",
            Opcode::BrtrueS => "brtrue.s",
            Opcode::Beq => "beq",
            Opcode::BeqS => "beq.s",
            Opcode::Bge => "bge",
            Opcode::BgeS => "bge.s",
            Opcode::Bgt => "bgt",
            Opcode::BgtS => "bgt.s",
            Opcode::Ble => "ble",
            Opcode::BleS => "ble.s",
            Opcode::Blt => "blt",
            Opcode::BltS => "blt.s",
            Opcode::BneUn => "bne.un",
            Opcode::BneUnS => "bne.un.s",
            Opcode::BgeUn => "bge.un",
            Opcode::BgeUnS => "bge.un.s",
            Opcode::BgtUn => "bgt.un",
            Opcode::BgtUnS => "bgt.un.s",
            Opcode::BleUn => "ble.un",
            Opcode::BleUnS => "ble.un.s",
            Opcode::BltUn => "blt.un",
            Opcode::BltUnS => "blt.un.s",
            Opcode::Leave => "leave",
            Opcode::LeaveS => "leave.s",
            Opcode::Switch => "switch",
            Opcode::Unknown(raw) => raw,
        }
    }

    /// Returns the control-flow category of this opcode.
    pub fn flow(&self) -> FlowControl {
        match self {
            Opcode::Br | Opcode::BrS | Opcode::Leave | Opcode::LeaveS => FlowControl::Branch,
            Opcode::Brfalse
            | Opcode::BrfalseS
            | Opcode::Brtrue
            | Opcode::BrtrueS
            | Opcode::Beq
            | Opcode::BeqS
            | Opcode::Bge
            | Opcode::BgeS
            | Opcode::Bgt
            | Opcode::BgtS
            | Opcode::Ble
            | Opcode::BleS
            | Opcode::Blt
            | Opcode::BltS
            | Opcode::BneUn
            | Opcode::BneUnS
            | Opcode::BgeUn
            | Opcode::BgeUnS
            | Opcode::BgtUn
            | Opcode::BgtUnS
            | Opcode::BleUn
            | Opcode::BleUnS
            | Opcode::BltUn
            | Opcode::BltUnS
            | Opcode::Switch => FlowControl::CondBranch,
            Opcode::Call | Opcode::Callvirt | Opcode::Newobj => FlowControl::Call,
            Opcode::Ret => FlowControl::Return,
            Opcode::Throw | Opcode::Rethrow => FlowControl::Throw,
            _ => FlowControl::Next,
        }
    }

    /// Returns true for any conditional or unconditional branch.
    #[inline]
    pub fn is_branch(&self) -> bool {
        matches!(self.flow(), FlowControl::Branch | FlowControl::CondBranch)
    }

    /// Canonicalizes a short encoding to its long form.
    ///
    /// The compact integer-load family collapses to `ldc.i4`, and every `.s`
    /// branch maps to its long counterpart. Long forms map to themselves.
    pub fn long_form(&self) -> Opcode {
        match self {
            Opcode::LdcI4M1
            | Opcode::LdcI40
            | Opcode::LdcI41
            | Opcode::LdcI42
            | Opcode::LdcI43
            | Opcode::LdcI44
            | Opcode::LdcI45
            | Opcode::LdcI46
            | Opcode::LdcI47
            | Opcode::LdcI48
            | Opcode::LdcI4S => Opcode::LdcI4,
            Opcode::BrS => Opcode::Br,
            Opcode::BrfalseS => Opcode::Brfalse,
            Opcode::BrtrueS => Opcode::Brtrue,
            Opcode::BeqS => Opcode::Beq,
            Opcode::BgeS => Opcode::Bge,
            Opcode::BgtS => Opcode::Bgt,
            Opcode::BleS => Opcode::Ble,
            Opcode::BltS => Opcode::Blt,
            Opcode::BneUnS => Opcode::BneUn,
            Opcode::BgeUnS => Opcode::BgeUn,
            Opcode::BgtUnS => Opcode::BgtUn,
            Opcode::BleUnS => Opcode::BleUn,
            Opcode::BltUnS => Opcode::BltUn,
            Opcode::LeaveS => Opcode::Leave,
            other => other.clone(),
        }
    }

    /// The integer value baked into a macro-form integer load, if any.
    pub fn macro_i4_value(&self) -> Option<i64> {
        match self {
            Opcode::LdcI4M1 => Some(-1),
            Opcode::LdcI40 => Some(0),
            Opcode::LdcI41 => Some(1),
            Opcode::LdcI42 => Some(2),
            Opcode::LdcI43 => Some(3),
            Opcode::LdcI44 => Some(4),
            Opcode::LdcI45 => Some(5),
            Opcode::LdcI46 => Some(6),
            Opcode::LdcI47 => Some(7),
            Opcode::LdcI48 => Some(8),
            _ => None,
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

impl FromStr for Opcode {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        ALL_OPCODES
            .iter()
            .find(|op| op.mnemonic() == s)
            .cloned()
            .ok_or(())
    }
}

// Every non-Unknown opcode, used for mnemonic lookup.
const ALL_OPCODES: &[Opcode] = &[
    Opcode::Nop,
    Opcode::Dup,
    Opcode::Pop,
    Opcode::Ret,
    Opcode::Throw,
    Opcode::Rethrow,
    Opcode::Endfinally,
    Opcode::LdcI4M1,
    Opcode::LdcI40,
    Opcode::LdcI41,
    Opcode::LdcI42,
    Opcode::LdcI43,
    Opcode::LdcI44,
    Opcode::LdcI45,
    Opcode::LdcI46,
    Opcode::LdcI47,
    Opcode::LdcI48,
    Opcode::LdcI4S,
    Opcode::LdcI4,
    Opcode::LdcI8,
    Opcode::LdcR4,
    Opcode::LdcR8,
    Opcode::Ldstr,
    Opcode::Ldnull,
    Opcode::Ldarg0,
    Opcode::Ldarg1,
    Opcode::Ldarg2,
    Opcode::Ldarg3,
    Opcode::LdargS,
    Opcode::Ldloc0,
    Opcode::Ldloc1,
    Opcode::Ldloc2,
    Opcode::Ldloc3,
    Opcode::LdlocS,
    Opcode::Stloc0,
    Opcode::Stloc1,
    Opcode::Stloc2,
    Opcode::Stloc3,
    Opcode::StlocS,
    Opcode::Ldfld,
    Opcode::Ldsfld,
    Opcode::Stfld,
    Opcode::Stsfld,
    Opcode::Ldftn,
    Opcode::Add,
    Opcode::Sub,
    Opcode::Mul,
    Opcode::Div,
    Opcode::Rem,
    Opcode::Neg,
    Opcode::And,
    Opcode::Or,
    Opcode::Xor,
    Opcode::Not,
    Opcode::Shl,
    Opcode::Shr,
    Opcode::Ceq,
    Opcode::Cgt,
    Opcode::CgtUn,
    Opcode::Clt,
    Opcode::CltUn,
    Opcode::ConvI4,
    Opcode::ConvI8,
    Opcode::ConvR4,
    Opcode::ConvR8,
    Opcode::Newobj,
    Opcode::Newarr,
    Opcode::Ldlen,
    Opcode::Ldelem,
    Opcode::Stelem,
    Opcode::Box,
    Opcode::Unbox,
    Opcode::Castclass,
    Opcode::Isinst,
    Opcode::Call,
    Opcode::Callvirt,
    Opcode::Br,
    Opcode::BrS,
    Opcode::Brfalse,
    Opcode::BrfalseS,
    Opcode::Brtrue,
    Opcode::BrtrueS,
    Opcode::Beq,
    Opcode::BeqS,
    Opcode::Bge,
    Opcode::BgeS,
    Opcode::Bgt,
    Opcode::BgtS,
    Opcode::Ble,
    Opcode::BleS,
    Opcode::Blt,
    Opcode::BltS,
    Opcode::BneUn,
    Opcode::BneUnS,
    Opcode::BgeUn,
    Opcode::BgeUnS,
    Opcode::BgtUn,
    Opcode::BgtUnS,
    Opcode::BleUn,
    Opcode::BleUnS,
    Opcode::BltUn,
    Opcode::BltUnS,
    Opcode::Leave,
    Opcode::LeaveS,
    Opcode::Switch,
];

/// Reference to a method, carried as the operand of call instructions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MethodRef {
    /// Full name of the declaring type.
    pub declaring: String,
    /// Method name.
    pub name: String,
    /// Parameter type names.
    pub params: Vec<String>,
    /// Return type name.
    pub ret: String,
    /// Generic argument type names for instantiated generic methods.
    pub generics: Vec<String>,
}

impl MethodRef {
    /// Full display id: `ret Declaring::Name<G>(P1, P2)`.
    pub fn id(&self) -> String {
        let generics = if self.generics.is_empty() {
            String::new()
        } else {
            format!("<{}>", self.generics.join(", "))
        };
        format!(
            "{} {}::{}{}({})",
            self.ret,
            self.declaring,
            self.name,
            generics,
            self.params.join(", ")
        )
    }

    /// Simple id with generic instantiations erased to positional
    /// placeholders. Placeholder 0 renders as a bare `T`; placeholder *n*
    /// renders as `T` suffixed with its index. Existing `!n` placeholders in
    /// operand text normalize the same way, so two instantiations of the same
    /// generic method compare equal.
    pub fn simple_id(&self) -> String {
        let erase = |text: &str| -> String {
            let mut out = text.to_string();
            for (idx, generic) in self.generics.iter().enumerate() {
                out = out.replace(generic.as_str(), &placeholder(idx));
            }
            normalize_placeholders(&out)
        };
        let params: Vec<String> = self.params.iter().map(|p| erase(p)).collect();
        format!("{}::{}({})", self.declaring, self.name, params.join(", "))
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id())
    }
}

fn placeholder(index: usize) -> String {
    if index == 0 {
        "T".to_string()
    } else {
        format!("T{index}")
    }
}

/// Rewrites `!n` generic placeholders to the canonical `T`/`Tn` spelling.
fn normalize_placeholders(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '!' && chars.peek().is_some_and(|n| n.is_ascii_digit()) {
            let mut digits = String::new();
            while let Some(d) = chars.peek().copied() {
                if d.is_ascii_digit() {
                    digits.push(d);
                    chars.next();
                } else {
                    break;
                }
            }
            let index: usize = digits.parse().unwrap_or(0);
            out.push_str(&placeholder(index));
        } else {
            out.push(c);
        }
    }
    out
}

/// Reference to a field, carried as the operand of field instructions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldRef {
    /// Full name of the declaring type.
    pub declaring: String,
    /// Field name.
    pub name: String,
    /// Field type name.
    pub ty: String,
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}::{}", self.ty, self.declaring, self.name)
    }
}

/// Instruction operand.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Operand {
    /// No operand.
    None,
    /// 32-bit integer immediate (widened for convenience).
    Int(i64),
    /// 64-bit integer immediate.
    Long(i64),
    /// Floating-point immediate.
    Float(f64),
    /// String literal.
    Str(String),
    /// Branch target offset.
    Target(u32),
    /// Multi-way dispatch targets.
    Switch(Vec<u32>),
    /// Local or argument index.
    Var(u16),
    /// Method reference.
    Method(MethodRef),
    /// Field reference.
    Field(FieldRef),
    /// Type name.
    TypeName(String),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::None => Ok(()),
            Operand::Int(v) | Operand::Long(v) => write!(f, "{v}"),
            Operand::Float(v) => write!(f, "{v}"),
            Operand::Str(s) => write!(f, "\"{s}\""),
            Operand::Target(t) => write!(f, "IL_{t:04x}"),
            Operand::Switch(targets) => {
                let rendered: Vec<String> =
                    targets.iter().map(|t| format!("IL_{t:04x}")).collect();
                write!(f, "({})", rendered.join(", "))
            }
            Operand::Var(v) => write!(f, "{v}"),
            Operand::Method(m) => f.write_str(&m.id()),
            Operand::Field(fr) => write!(f, "{fr}"),
            Operand::TypeName(t) => f.write_str(t),
        }
    }
}

/// Single disassembled instruction with offset, opcode, and operand.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    /// Byte offset within the method body.
    pub offset: u32,
    /// Parsed opcode.
    pub op: Opcode,
    /// Operand, [`Operand::None`] when the opcode takes none.
    pub operand: Operand,
}

impl Instruction {
    /// Constructs an instruction with offset zero; offsets are reassigned by
    /// [`crate::editor::BodyEditor::finish`].
    pub fn new(op: Opcode, operand: Operand) -> Self {
        Self {
            offset: 0,
            op,
            operand,
        }
    }

    /// Canonical form: opcode and operand rendered without position info.
    pub fn canonical(&self) -> String {
        if self.operand == Operand::None {
            self.op.mnemonic().to_string()
        } else {
            format!("{} {}", self.op, self.operand)
        }
    }

    /// Decoded value for any form of immediate-integer load.
    pub fn ldc_i4_value(&self) -> Option<i64> {
        if let Some(v) = self.op.macro_i4_value() {
            return Some(v);
        }
        match (&self.op, &self.operand) {
            (Opcode::LdcI4S | Opcode::LdcI4, Operand::Int(v)) => Some(*v),
            _ => None,
        }
    }

    /// Encoded byte size of this instruction.
    pub fn byte_size(&self) -> usize {
        let operand = match (&self.op, &self.operand) {
            (_, Operand::None) => 0,
            // Short encodings carry a one-byte immediate.
            (
                Opcode::LdcI4S
                | Opcode::BrS
                | Opcode::BrfalseS
                | Opcode::BrtrueS
                | Opcode::BeqS
                | Opcode::BgeS
                | Opcode::BgtS
                | Opcode::BleS
                | Opcode::BltS
                | Opcode::BneUnS
                | Opcode::BgeUnS
                | Opcode::BgtUnS
                | Opcode::BleUnS
                | Opcode::BltUnS
                | Opcode::LeaveS
                | Opcode::LdargS
                | Opcode::LdlocS
                | Opcode::StlocS,
                _,
            ) => 1,
            (_, Operand::Switch(targets)) => 4 + 4 * targets.len(),
            (_, Operand::Long(_)) => 8,
            (Opcode::LdcR8, Operand::Float(_)) => 8,
            (_, Operand::Float(_)) => 4,
            (_, Operand::Var(_)) => 2,
            // Int/Target/token operands all encode as four bytes.
            _ => 4,
        };
        1 + operand
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IL_{:04x}: {}", self.offset, self.canonical())
    }
}

/// Identity of a method in the running process.
#[derive(
    Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct MethodId {
    /// Full name of the declaring type.
    pub type_name: String,
    /// Method name.
    pub method_name: String,
    /// Parameter signature, e.g. `(System.Int32)`.
    #[serde(default)]
    pub signature: String,
}

impl MethodId {
    /// Builds a method id from type, name, and signature parts.
    pub fn new(
        type_name: impl Into<String>,
        method_name: impl Into<String>,
        signature: impl Into<String>,
    ) -> Self {
        Self {
            type_name: type_name.into(),
            method_name: method_name.into(),
            signature: signature.into(),
        }
    }

    /// Display name: `Type.Method` plus the signature when present.
    pub fn display_name(&self) -> String {
        format!("{}.{}{}", self.type_name, self.method_name, self.signature)
    }

    /// Directory-safe name with characters illegal in file paths replaced by
    /// `_`. Also replaces `+` (nested-type separator, breaks URLs) and the
    /// signature punctuation, so the result is usable as a path component.
    pub fn sanitized_dir_name(&self) -> String {
        sanitize_filename(&self.display_name())
    }
}

impl fmt::Display for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name())
    }
}

const INVALID_FILENAME_CHARS: &[char] = &[
    '"', '<', '>', '(', ')', '|', ':', '*', '?', '\\', '/', '+',
];

/// Replaces characters illegal in file paths (and `+`) with `_`.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_control() || INVALID_FILENAME_CHARS.contains(&c) {
                '_'
            } else {
                c
            }
        })
        .collect()
}
