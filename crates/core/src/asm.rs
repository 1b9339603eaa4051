//! Textual IL parsing.
//!
//! This is the disassembly text format used by session files, test fixtures,
//! and patch edit scripts. One instruction per line, an optional `IL_xxxx:`
//! label in front, `//` comments stripped:
//!
//! ```text
//! IL_0000: ldarg.0
//! IL_0001: ldc.i4.s 42
//! IL_0003: call System.Void Game.Player::TakeDamage(System.Int32)
//! IL_0008: br.s IL_0000
//! ```

use crate::il::{FieldRef, Instruction, MethodRef, Opcode, Operand};
use crate::result::{Error, Result};
use std::str::FromStr;

/// Operand shape expected by an opcode, used to drive parsing.
enum OperandKind {
    None,
    Int,
    Long,
    Float,
    Str,
    Target,
    Switch,
    Var,
    Method,
    Field,
    TypeName,
    /// Unknown opcodes keep whatever trails them as an opaque type-name token.
    Raw,
}

fn operand_kind(op: &Opcode) -> OperandKind {
    match op {
        Opcode::LdcI4S | Opcode::LdcI4 => OperandKind::Int,
        Opcode::LdcI8 => OperandKind::Long,
        Opcode::LdcR4 | Opcode::LdcR8 => OperandKind::Float,
        Opcode::Ldstr => OperandKind::Str,
        Opcode::Switch => OperandKind::Switch,
        Opcode::LdargS | Opcode::LdlocS | Opcode::StlocS => OperandKind::Var,
        Opcode::Call | Opcode::Callvirt | Opcode::Newobj | Opcode::Ldftn => OperandKind::Method,
        Opcode::Ldfld | Opcode::Ldsfld | Opcode::Stfld | Opcode::Stsfld => OperandKind::Field,
        Opcode::Newarr
        | Opcode::Box
        | Opcode::Unbox
        | Opcode::Castclass
        | Opcode::Isinst
        | Opcode::Ldelem
        | Opcode::Stelem => OperandKind::TypeName,
        Opcode::Unknown(_) => OperandKind::Raw,
        op if op.is_branch() => OperandKind::Target,
        _ => OperandKind::None,
    }
}

/// Parses a whole method body. Lines with an explicit `IL_xxxx:` label keep
/// that offset; unlabeled lines continue cumulatively by encoded size.
pub fn parse_body(text: &str) -> Result<Vec<Instruction>> {
    let mut instructions = Vec::new();
    let mut next_offset: u32 = 0;
    for (line_no, raw) in text.lines().enumerate() {
        let line = raw.split("//").next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let (explicit, instr) = parse_line(line, line_no, raw)?;
        let offset = explicit.unwrap_or(next_offset);
        let instr = Instruction { offset, ..instr };
        next_offset = offset + instr.byte_size() as u32;
        instructions.push(instr);
    }
    Ok(instructions)
}

/// Parses a single instruction without a label, offset zero. Edit scripts use
/// this form; [`crate::editor::BodyEditor::finish`] assigns the real offset.
pub fn parse_instr(text: &str) -> Result<Instruction> {
    let line = text.split("//").next().unwrap_or("").trim();
    if line.is_empty() {
        return Err(Error::ParseError {
            line: 0,
            msg: "empty instruction".into(),
            raw: text.to_string(),
        });
    }
    let (_, instr) = parse_line(line, 0, text)?;
    Ok(instr)
}

fn parse_line(line: &str, line_no: usize, raw: &str) -> Result<(Option<u32>, Instruction)> {
    let err = |msg: &str| Error::ParseError {
        line: line_no,
        msg: msg.to_string(),
        raw: raw.to_string(),
    };

    // Optional leading label.
    let (explicit, rest) = match line.strip_prefix("IL_") {
        Some(tail) => {
            let (hex, rest) = tail.split_once(':').ok_or_else(|| err("missing ':' after label"))?;
            let offset =
                u32::from_str_radix(hex, 16).map_err(|_| err("invalid label offset"))?;
            (Some(offset), rest.trim_start())
        }
        None => (None, line),
    };

    let (mnemonic, operand_text) = match rest.split_once(char::is_whitespace) {
        Some((m, tail)) => (m, tail.trim()),
        None => (rest, ""),
    };
    if mnemonic.is_empty() {
        return Err(err("missing opcode"));
    }

    let op = Opcode::from_str(mnemonic).unwrap_or_else(|_| {
        tracing::debug!("unrecognized mnemonic '{mnemonic}', preserving verbatim");
        Opcode::Unknown(mnemonic.to_string())
    });

    let operand = match operand_kind(&op) {
        OperandKind::None => {
            if !operand_text.is_empty() {
                return Err(err("unexpected operand"));
            }
            Operand::None
        }
        OperandKind::Int => Operand::Int(parse_int(operand_text).ok_or_else(|| err("invalid integer operand"))?),
        OperandKind::Long => Operand::Long(parse_int(operand_text).ok_or_else(|| err("invalid integer operand"))?),
        OperandKind::Float => Operand::Float(
            operand_text
                .parse::<f64>()
                .map_err(|_| err("invalid float operand"))?,
        ),
        OperandKind::Str => {
            let inner = operand_text
                .strip_prefix('"')
                .and_then(|s| s.strip_suffix('"'))
                .ok_or_else(|| err("string operand must be quoted"))?;
            Operand::Str(inner.to_string())
        }
        OperandKind::Target => {
            Operand::Target(parse_target(operand_text).ok_or_else(|| err("invalid branch target"))?)
        }
        OperandKind::Switch => {
            let inner = operand_text
                .strip_prefix('(')
                .and_then(|s| s.strip_suffix(')'))
                .ok_or_else(|| err("switch targets must be parenthesized"))?;
            let mut targets = Vec::new();
            for part in inner.split(',') {
                let part = part.trim();
                if part.is_empty() {
                    continue;
                }
                targets.push(parse_target(part).ok_or_else(|| err("invalid switch target"))?);
            }
            Operand::Switch(targets)
        }
        OperandKind::Var => Operand::Var(
            operand_text
                .parse::<u16>()
                .map_err(|_| err("invalid variable index"))?,
        ),
        OperandKind::Method => {
            Operand::Method(parse_method_ref(operand_text).ok_or_else(|| err("invalid method reference"))?)
        }
        OperandKind::Field => {
            Operand::Field(parse_field_ref(operand_text).ok_or_else(|| err("invalid field reference"))?)
        }
        OperandKind::TypeName => {
            if operand_text.is_empty() {
                return Err(err("missing type operand"));
            }
            Operand::TypeName(operand_text.to_string())
        }
        OperandKind::Raw => {
            if operand_text.is_empty() {
                Operand::None
            } else {
                Operand::TypeName(operand_text.to_string())
            }
        }
    };

    Ok((explicit, Instruction::new(op, operand)))
}

fn parse_int(text: &str) -> Option<i64> {
    if let Some(hex) = text.strip_prefix("0x") {
        i64::from_str_radix(hex, 16).ok()
    } else {
        text.parse::<i64>().ok()
    }
}

fn parse_target(text: &str) -> Option<u32> {
    u32::from_str_radix(text.strip_prefix("IL_")?, 16).ok()
}

/// Parses `[ret] Declaring::Name[<G1, G2>](P1, P2)`.
fn parse_method_ref(text: &str) -> Option<MethodRef> {
    let open = text.find('(')?;
    if !text.ends_with(')') {
        return None;
    }
    let params_text = &text[open + 1..text.len() - 1];
    let head = &text[..open];
    let sep = head.rfind("::")?;
    let left = &head[..sep];
    let right = &head[sep + 2..];

    let (ret, declaring) = match left.rsplit_once(char::is_whitespace) {
        Some((ret, declaring)) => (ret.trim().to_string(), declaring.to_string()),
        None => ("System.Void".to_string(), left.to_string()),
    };

    let (name, generics) = match right.split_once('<') {
        Some((name, tail)) => {
            let inner = tail.strip_suffix('>')?;
            (name.to_string(), split_top_level(inner))
        }
        None => (right.to_string(), Vec::new()),
    };
    if name.is_empty() || declaring.is_empty() {
        return None;
    }

    Some(MethodRef {
        declaring,
        name,
        params: split_top_level(params_text),
        ret,
        generics,
    })
}

/// Parses `[FieldType] Declaring::Name`.
fn parse_field_ref(text: &str) -> Option<FieldRef> {
    let sep = text.rfind("::")?;
    let left = &text[..sep];
    let name = &text[sep + 2..];
    if name.is_empty() {
        return None;
    }
    let (ty, declaring) = match left.rsplit_once(char::is_whitespace) {
        Some((ty, declaring)) => (ty.trim().to_string(), declaring.to_string()),
        None => (String::new(), left.to_string()),
    };
    Some(FieldRef {
        declaring,
        name: name.to_string(),
        ty,
    })
}

/// Splits on commas at angle-bracket nesting depth zero.
fn split_top_level(text: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();
    for c in text.chars() {
        match c {
            '<' => {
                depth += 1;
                current.push(c);
            }
            '>' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            ',' if depth == 0 => {
                let trimmed = current.trim();
                if !trimmed.is_empty() {
                    parts.push(trimmed.to_string());
                }
                current.clear();
            }
            _ => current.push(c),
        }
    }
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        parts.push(trimmed.to_string());
    }
    parts
}
