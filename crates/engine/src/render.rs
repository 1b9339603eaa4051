//! Diff rendering for streams and consoles.

use crate::diff::{Change, DiffEntry, MethodDiff};
use owo_colors::OwoColorize;
use std::io::{self, Write};

fn prefix(change: Change) -> &'static str {
    match change {
        Change::Unchanged => "  ",
        Change::Added => "+ ",
        Change::Removed => "- ",
    }
}

fn attribution(entry: &DiffEntry) -> String {
    entry
        .source
        .as_ref()
        .map(|source| format!(" @ {source}"))
        .unwrap_or_default()
}

/// Writes the diff in plain text, one instruction per line, annotations
/// indented beneath their instruction.
pub fn write_diff<W: Write>(out: &mut W, diff: &MethodDiff) -> io::Result<()> {
    writeln!(out, "IL Diff: {}", diff.method.display_name())?;
    for entry in &diff.entries {
        writeln!(
            out,
            "{}{}{}",
            prefix(entry.change),
            entry.instruction,
            attribution(entry)
        )?;
        for note in &entry.notes {
            writeln!(out, "  |-> {note}")?;
        }
    }
    Ok(())
}

/// Renders the diff to a string.
pub fn diff_to_string(diff: &MethodDiff) -> String {
    let mut buf = Vec::new();
    write_diff(&mut buf, diff).expect("write to Vec cannot fail");
    String::from_utf8(buf).expect("rendered diff is utf-8")
}

/// Prints the diff to stdout with the usual diff coloring: additions green,
/// removals red, attributions yellow.
pub fn print_diff(diff: &MethodDiff) {
    println!("{}", format!("IL Diff: {}", diff.method.display_name()).bold());
    for entry in &diff.entries {
        let line = format!("{}{}", prefix(entry.change), entry.instruction);
        let attribution = attribution(entry);
        match entry.change {
            Change::Unchanged => println!("{line}"),
            Change::Added => println!("{}{}", line.green(), attribution.yellow()),
            Change::Removed => println!("{}{}", line.red(), attribution.yellow()),
        }
        for note in &entry.notes {
            println!("  |-> {}", note.cyan());
        }
    }
}
