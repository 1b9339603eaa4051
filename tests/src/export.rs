//! Session file in, export tree out.

use hooklens_core::session::Session;
use hooklens_engine::export::{self, ExportIndex, HostInfo, ModVersion};
use std::collections::BTreeSet;
use std::fs;

const SESSION: &str = r#"{
    "hostVersion": "1.4.2",
    "mods": [
        { "name": "SpeedHelper", "version": "0.9.1" },
        { "name": "HookPack", "version": "2.0.0" }
    ],
    "methods": [
        {
            "typeName": "Game.Player",
            "name": "Update",
            "signature": "()",
            "body": ["ldarg.0", "ldc.i4.1", "ret"],
            "patches": [
                {
                    "declaring": "Mod.Hooks",
                    "name": "Manip",
                    "steps": [
                        { "op": "insert_before", "offset": 2, "instr": "call System.Void Mod.Hooks::Tick()" }
                    ]
                },
                {
                    "declaring": "Other.Mod",
                    "name": "Wrap",
                    "kind": "replacement",
                    "entryPoint": "Other.Mod::Wrap"
                }
            ]
        },
        {
            "typeName": "Game.Level`1<Game.Entity>",
            "name": "Render",
            "signature": "(System.Int32)",
            "body": ["ret"],
            "patches": [
                { "declaring": "Mod.Hooks", "name": "NoOp" }
            ]
        }
    ]
}"#;

fn host_info(session: &Session) -> HostInfo {
    HostInfo {
        version: session.host_version.clone(),
        mods: session
            .mods
            .iter()
            .map(|m| ModVersion {
                name: m.name.clone(),
                version: m.version.clone(),
            })
            .collect(),
    }
}

#[test]
fn full_session_dump() {
    let session: Session = serde_json::from_str(SESSION).unwrap();
    let registry = session.registry().unwrap();
    let dir = tempfile::tempdir().unwrap();

    let index = export::dump_all(&registry, &registry, dir.path(), &host_info(&session)).unwrap();
    assert_eq!(index.host_version, "1.4.2");
    assert_eq!(index.mods.len(), 2);
    assert_eq!(index.methods.len(), 2);

    for record in &index.methods {
        let method_dir = dir.path().join(&record.directory_name);
        assert!(method_dir.join("ildiff.txt").exists());
        assert!(method_dir.join("allhooks.txt").exists());
        let files: BTreeSet<String> =
            serde_json::from_str(&fs::read_to_string(method_dir.join("files.json")).unwrap())
                .unwrap();
        assert!(files.contains("ildiff.txt"));
        assert!(files.contains("allhooks.txt"));
    }

    // The generic method's directory name is path-safe.
    let render = index
        .methods
        .iter()
        .find(|m| m.name.contains("Render"))
        .unwrap();
    for c in ['<', '>', '(', ')', ':'] {
        assert!(!render.directory_name.contains(c));
    }

    // The update method's diff shows the inserted call with attribution.
    let update = index
        .methods
        .iter()
        .find(|m| m.name == "Game.Player.Update()")
        .unwrap();
    let diff_text =
        fs::read_to_string(dir.path().join(&update.directory_name).join("ildiff.txt")).unwrap();
    assert!(diff_text.contains("+ IL_0002: call System.Void Mod.Hooks::Tick() @ Mod.Hooks::Manip"));
    assert_eq!(
        update.hooks,
        vec!["IL: Mod.Hooks::Manip", "On: Other.Mod::Wrap"]
    );

    // The index on disk parses back to the same shape.
    let reloaded: ExportIndex =
        serde_json::from_str(&fs::read_to_string(dir.path().join("info.json")).unwrap()).unwrap();
    assert_eq!(reloaded.methods.len(), 2);
    assert_eq!(reloaded.mods[0].name, "SpeedHelper");
}

#[test]
fn repeated_dumps_accumulate_file_lists() {
    let session: Session = serde_json::from_str(SESSION).unwrap();
    let registry = session.registry().unwrap();
    let dir = tempfile::tempdir().unwrap();

    let first = export::dump_all(&registry, &registry, dir.path(), &host_info(&session)).unwrap();
    export::dump_all(&registry, &registry, dir.path(), &host_info(&session)).unwrap();

    let method_dir = dir.path().join(&first.methods[0].directory_name);
    let files: BTreeSet<String> =
        serde_json::from_str(&fs::read_to_string(method_dir.join("files.json")).unwrap()).unwrap();
    assert_eq!(
        files,
        BTreeSet::from(["ildiff.txt".to_string(), "allhooks.txt".to_string()])
    );
}
