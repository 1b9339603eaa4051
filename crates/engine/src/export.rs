//! Bulk diff export.
//!
//! Dumps the diff of every patched method into a directory tree, one
//! sanitized subdirectory per method, plus a top-level `info.json` index
//! describing the host that produced the dump. Per-method failures are
//! logged and skipped; the index reflects whatever succeeded.

use crate::diff::MethodDiff;
use crate::render;
use crate::{Error, Result};
use hooklens_core::il::MethodId;
use hooklens_core::runtime::{DetourRuntime, Disassembler, PatchKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

const DIFF_FILE: &str = "ildiff.txt";
const HOOKS_FILE: &str = "allhooks.txt";
const FILE_LIST: &str = "files.json";
const INDEX_FILE: &str = "info.json";

/// One mod loaded in the host, for the export index.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModVersion {
    /// Mod name.
    pub name: String,
    /// Mod version string.
    pub version: String,
}

/// Identity of the host process producing a dump.
#[derive(Clone, Debug, Default)]
pub struct HostInfo {
    /// Host/loader version string.
    pub version: String,
    /// Loaded mods.
    pub mods: Vec<ModVersion>,
}

/// Index record for one exported method.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodRecord {
    /// Display name of the method.
    pub name: String,
    /// Sanitized directory the method's files live under.
    pub directory_name: String,
    /// The hook lines also written to the method's hooks file.
    pub hooks: Vec<String>,
}

/// Top-level `info.json` contents.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportIndex {
    /// RFC 3339 timestamp of the dump.
    pub time: String,
    /// Host/loader version string.
    pub host_version: String,
    /// Loaded mods at dump time.
    pub mods: Vec<ModVersion>,
    /// Successfully exported methods.
    pub methods: Vec<MethodRecord>,
}

/// Diffs every patched method and writes the export tree under `out_dir`.
///
/// Returns the written index. A method that fails to diff or write is logged
/// and left out; only failures touching the directory root or the index file
/// itself abort the export.
pub fn dump_all(
    runtime: &dyn DetourRuntime,
    disasm: &dyn Disassembler,
    out_dir: &Path,
    host: &HostInfo,
) -> Result<ExportIndex> {
    fs::create_dir_all(out_dir).map_err(|e| io_err(out_dir, e))?;

    let mut index = ExportIndex {
        time: chrono::Local::now().to_rfc3339(),
        host_version: host.version.clone(),
        mods: host.mods.clone(),
        methods: Vec::new(),
    };

    for method in runtime.patched_methods() {
        match dump_method(runtime, disasm, out_dir, &method) {
            Ok(record) => index.methods.push(record),
            Err(e) => {
                tracing::warn!(method = %method, error = %e, "failed to dump method");
            }
        }
    }

    let index_path = out_dir.join(INDEX_FILE);
    let json = serde_json::to_string_pretty(&index)?;
    fs::write(&index_path, json).map_err(|e| io_err(&index_path, e))?;

    Ok(index)
}

fn dump_method(
    runtime: &dyn DetourRuntime,
    disasm: &dyn Disassembler,
    out_dir: &Path,
    method: &MethodId,
) -> Result<MethodRecord> {
    let directory_name = method.sanitized_dir_name();
    let dir = out_dir.join(&directory_name);
    fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;
    tracing::info!(method = %method, dir = %dir.display(), "dumping method");

    let diff = MethodDiff::build(runtime, disasm, method)?;
    let diff_path = dir.join(DIFF_FILE);
    let mut diff_file = fs::File::create(&diff_path).map_err(|e| io_err(&diff_path, e))?;
    render::write_diff(&mut diff_file, &diff).map_err(|e| io_err(&diff_path, e))?;

    let hooks = hook_lines(runtime, method);
    let hooks_path = dir.join(HOOKS_FILE);
    fs::write(&hooks_path, hooks.join("\n") + "\n").map_err(|e| io_err(&hooks_path, e))?;

    merge_file_list(&dir, [DIFF_FILE, HOOKS_FILE])?;

    Ok(MethodRecord {
        name: method.display_name(),
        directory_name,
        hooks,
    })
}

/// One line per hook: `On:` for call-boundary replacements, `IL:` for inline
/// rewrites.
fn hook_lines(runtime: &dyn DetourRuntime, method: &MethodId) -> Vec<String> {
    runtime
        .patches_for(method)
        .iter()
        .map(|patch| match patch.kind() {
            PatchKind::Replacement { entry } => format!("On: {entry}"),
            PatchKind::Rewrite(_) => format!("IL: {}", patch.identity()),
        })
        .collect()
}

/// Adds file names to the method directory's `files.json`, keeping whatever
/// a previous dump recorded there.
fn merge_file_list<'a>(dir: &Path, names: impl IntoIterator<Item = &'a str>) -> Result<()> {
    let path = dir.join(FILE_LIST);
    let mut list: BTreeSet<String> = match fs::read(&path) {
        Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_default(),
        Err(_) => BTreeSet::new(),
    };
    list.extend(names.into_iter().map(str::to_string));
    let json = serde_json::to_string(&list)?;
    fs::write(&path, json).map_err(|e| io_err(&path, e))
}

fn io_err(path: &Path, source: std::io::Error) -> Error {
    Error::ExportIo {
        path: path.display().to_string(),
        source,
    }
}
