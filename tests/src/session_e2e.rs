//! End-to-end: a recorded session with stacked hooks, capture-table noise,
//! and a broken patch, diffed and rendered the way the CLI does it.

use hooklens_core::il::MethodId;
use hooklens_core::registry::HookRegistry;
use hooklens_core::runtime::{Decompiler, DetourRuntime};
use hooklens_core::session::Session;
use hooklens_engine::{Change, MethodDiff, render};

const SESSION: &str = r#"{
    "hostVersion": "1.4.2",
    "captures": [
        { "id": 3, "hash": 77, "value": "System.Action Mod.Hooks::<OnUpdate>b__0" }
    ],
    "methods": [
        {
            "typeName": "Game.Player",
            "name": "Update",
            "signature": "()",
            "body": [
                "IL_0000: ldarg.0",
                "IL_0001: ldc.i4.1",
                "IL_0002: call System.Void Game.Player::TakeDamage(System.Int32)",
                "IL_0007: ret"
            ],
            "decompiled": "public void Update() { TakeDamage(1); }",
            "patches": [
                {
                    "declaring": "Mod.Hooks",
                    "name": "Capture",
                    "steps": [
                        { "op": "insert_before", "offset": 0, "instr": "pop" },
                        { "op": "insert_before", "offset": 0, "instr": "call System.Object Detour.Runtime.CaptureTable::get_value(System.Int32, System.Int32)" },
                        { "op": "insert_before", "offset": 0, "instr": "ldc.i4 77" },
                        { "op": "insert_before", "offset": 0, "instr": "ldc.i4 3" }
                    ]
                },
                {
                    "declaring": "Mod.Broken",
                    "name": "Explodes",
                    "steps": [
                        { "op": "remove", "offset": 9999 }
                    ]
                },
                {
                    "declaring": "Mod.Tweaks",
                    "name": "Double",
                    "steps": [
                        { "op": "replace", "offset": 17, "instr": "ldc.i4.2" }
                    ]
                }
            ]
        }
    ]
}"#;

fn load() -> (HookRegistry, MethodId) {
    let session: Session = serde_json::from_str(SESSION).unwrap();
    let registry = session.registry().unwrap();
    let method = registry.find_method("Game.Player", "Update").unwrap();
    (registry, method)
}

#[test]
fn stacked_hooks_with_a_broken_layer() {
    let (registry, method) = load();
    let diff = MethodDiff::build(&registry, &registry, &method).unwrap();

    // The broken patch's layer is skipped but still listed as applied.
    assert_eq!(diff.applied_patches.len(), 3);

    // First layer: four instructions prepended. Each step inserts before
    // offset 0, so the stream order is the reverse of the script order.
    // Later scripts anchor on the offsets the previous layer produced;
    // Mod.Tweaks targets the constant load at its renumbered offset 17.
    let added: Vec<(String, String)> = diff
        .entries
        .iter()
        .filter(|e| e.change == Change::Added)
        .map(|e| {
            (
                e.instruction.canonical(),
                e.source.as_ref().unwrap().declaring.clone(),
            )
        })
        .collect();
    assert_eq!(added.len(), 5);
    assert!(
        added[..4]
            .iter()
            .all(|(_, source)| source == "Mod.Hooks")
    );

    // The capture lookup resolved its key pair from the session captures.
    let lookup = diff
        .entries
        .iter()
        .find(|e| e.instruction.canonical().contains("get_value"))
        .unwrap();
    assert_eq!(
        lookup.notes,
        vec!["retrieves System.Action Mod.Hooks::<OnUpdate>b__0".to_string()]
    );

    // Third layer replaced the constant load: old value removed, new added.
    let removed: Vec<_> = diff
        .entries
        .iter()
        .filter(|e| e.change == Change::Removed)
        .collect();
    assert_eq!(removed.len(), 1);
    assert_eq!(removed[0].instruction.canonical(), "ldc.i4.1");
    assert_eq!(removed[0].source.as_ref().unwrap().declaring, "Mod.Tweaks");
    assert_eq!(added[4].0, "ldc.i4.2");
    assert_eq!(added[4].1, "Mod.Tweaks");
}

#[test]
fn rendered_diff_matches_console_format() {
    let (registry, method) = load();
    let diff = MethodDiff::build(&registry, &registry, &method).unwrap();
    let text = render::diff_to_string(&diff);

    let mut lines = text.lines();
    assert_eq!(lines.next(), Some("IL Diff: Game.Player.Update()"));
    assert!(text.contains(" @ Mod.Hooks::Capture"));
    assert!(text.contains("  |-> retrieves System.Action Mod.Hooks::<OnUpdate>b__0"));
    assert!(text.contains("- IL_0011: ldc.i4.1 @ Mod.Tweaks::Double"));
    // Unchanged lines carry no attribution.
    let unchanged_ret = text
        .lines()
        .find(|l| l.ends_with("ret") && l.starts_with("  "))
        .unwrap();
    assert!(!unchanged_ret.contains('@'));
}

#[test]
fn session_decompiled_text_feeds_the_decompiler_boundary() {
    let (registry, method) = load();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let text = runtime
        .block_on(registry.decompile(&method.type_name, Some(method.method_name.as_str())))
        .unwrap();
    assert_eq!(text, "public void Update() { TakeDamage(1); }");
}

#[test]
fn capture_lookup_probe() {
    let (registry, _) = load();
    let methods = registry.patched_methods();
    assert_eq!(methods.len(), 1);
    let patches = registry.patches_for(methods.iter().next().unwrap());
    assert_eq!(patches.len(), 3);
    assert!(patches.iter().all(|p| p.is_rewrite()));
}
