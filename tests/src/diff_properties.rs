//! Structural properties of the layered diff, checked end to end through
//! the registry, sandbox, oracle, and diff builder together.

use hooklens_core::asm::{parse_body, parse_instr};
use hooklens_core::il::MethodId;
use hooklens_core::registry::HookRegistry;
use hooklens_core::runtime::PatchIdentity;
use hooklens_engine::{Change, MethodDiff};

fn canonical_entries(diff: &MethodDiff) -> Vec<(Change, String)> {
    diff.entries
        .iter()
        .map(|e| (e.change, e.instruction.canonical()))
        .collect()
}

#[test]
fn zero_patches_yield_identity_in_original_order() {
    let bodies = [
        "ret",
        "ldarg.0\nldc.i4.s 42\ncall System.Void Game.Player::TakeDamage(System.Int32)\nret",
        "ldarg.0\nbrtrue.s IL_0003\nret\nldc.i4.0\nret",
    ];
    for body in bodies {
        let mut registry = HookRegistry::new();
        let method = MethodId::new("Game.Sample", "Run", "()");
        let original = parse_body(body).unwrap();
        registry.add_method(method.clone(), original.clone());

        let diff = MethodDiff::build(&registry, &registry, &method).unwrap();
        assert!(diff.applied_patches.is_empty());
        assert_eq!(diff.entries.len(), original.len());
        for (entry, instr) in diff.entries.iter().zip(&original) {
            assert_eq!(entry.change, Change::Unchanged);
            assert_eq!(entry.instruction.canonical(), instr.canonical());
            assert!(entry.source.is_none());
        }
    }
}

#[test]
fn unchanged_entries_always_reconstruct_the_original_body() {
    // Three patches: one inserts, one removes, one appends. Whatever they
    // do, the Unchanged subsequence must equal the original body minus
    // nothing: removals become Removed entries, not gaps.
    let mut registry = HookRegistry::new();
    let method = MethodId::new("Game.Sample", "Run", "()");
    let original = parse_body("ldarg.0\nldc.i4.1\nldc.i4.2\nadd\nret").unwrap();
    registry.add_method(method.clone(), original.clone());

    registry.register_rewrite(&method, PatchIdentity::new("Mod.A", "Insert"), |editor| {
        editor.insert(0, parse_instr("nop").unwrap());
        Ok(())
    });
    registry.register_rewrite(&method, PatchIdentity::new("Mod.B", "Remove"), |editor| {
        // The add sits at index 4 after Mod.A's nop.
        let _ = editor.remove(4);
        Ok(())
    });
    registry.register_rewrite(&method, PatchIdentity::new("Mod.C", "Append"), |editor| {
        let last = editor.len() - 1;
        editor.insert(last, parse_instr("pop").unwrap());
        Ok(())
    });

    let diff = MethodDiff::build(&registry, &registry, &method).unwrap();
    assert_eq!(diff.applied_patches.len(), 3);

    let reconstructed: Vec<String> = diff
        .entries
        .iter()
        .filter(|e| e.change != Change::Added)
        .map(|e| e.instruction.canonical())
        .collect();
    let expected: Vec<String> = original.iter().map(|i| i.canonical()).collect();
    assert_eq!(reconstructed, expected);

    // The removal is reported and attributed.
    let removed: Vec<_> = diff
        .entries
        .iter()
        .filter(|e| e.change == Change::Removed)
        .collect();
    assert_eq!(removed.len(), 1);
    assert_eq!(removed[0].instruction.canonical(), "add");
    assert_eq!(removed[0].source.as_ref().unwrap().declaring, "Mod.B");
}

#[test]
fn unapplied_layer_leaves_other_attributions_intact() {
    let build = |with_a: bool| -> MethodDiff {
        let mut registry = HookRegistry::new();
        let method = MethodId::new("Game.Sample", "Run", "()");
        registry.add_method(method.clone(), parse_body("ldc.i4.1\nret").unwrap());
        let a = registry.register_rewrite(&method, PatchIdentity::new("Mod.A", "Manip"), |e| {
            e.insert(0, parse_instr("nop").unwrap());
            Ok(())
        });
        registry.register_rewrite(&method, PatchIdentity::new("Mod.B", "Manip"), |e| {
            e.insert(e.len() - 1, parse_instr("pop").unwrap());
            Ok(())
        });
        if !with_a {
            a.unapply();
        }
        MethodDiff::build(&registry, &registry, &method).unwrap()
    };

    let both = build(true);
    assert_eq!(both.applied_patches.len(), 2);
    assert_eq!(
        canonical_entries(&both),
        vec![
            (Change::Added, "nop".to_string()),
            (Change::Unchanged, "ldc.i4.1".to_string()),
            (Change::Added, "pop".to_string()),
            (Change::Unchanged, "ret".to_string()),
        ]
    );

    // Unapplying A removes its layer entirely; B's contribution and
    // attribution are unaffected.
    let only_b = build(false);
    assert_eq!(only_b.applied_patches.len(), 1);
    assert_eq!(
        canonical_entries(&only_b),
        vec![
            (Change::Unchanged, "ldc.i4.1".to_string()),
            (Change::Added, "pop".to_string()),
            (Change::Unchanged, "ret".to_string()),
        ]
    );
    assert_eq!(only_b.entries[1].source.as_ref().unwrap().declaring, "Mod.B");
}

#[test]
fn replacement_patches_contribute_no_layer() {
    let mut registry = HookRegistry::new();
    let method = MethodId::new("Game.Sample", "Run", "()");
    registry.add_method(method.clone(), parse_body("ret").unwrap());
    registry.register_replacement(&method, PatchIdentity::new("Mod.A", "Wrap"), "Mod.A::Wrap");

    let diff = MethodDiff::build(&registry, &registry, &method).unwrap();
    assert!(diff.applied_patches.is_empty());
    assert_eq!(diff.counts(), (1, 0, 0));
}

#[test]
fn branch_reencoding_by_a_patch_framework_is_invisible() {
    // The patch replaces a short branch with its long form (as rewrite
    // frameworks do when a body grows); the oracle must not report a diff
    // for it, only for the instruction that actually got inserted.
    let mut registry = HookRegistry::new();
    let method = MethodId::new("Game.Sample", "Run", "()");
    registry.add_method(
        method.clone(),
        parse_body("ldarg.0\nbrtrue.s IL_0003\nret\nldc.i4.0\nret").unwrap(),
    );
    registry.register_rewrite(&method, PatchIdentity::new("Mod.A", "Manip"), |editor| {
        editor.replace_at_offset(1, parse_instr("brtrue IL_0040").unwrap())?;
        editor.push(parse_instr("nop").unwrap());
        Ok(())
    });

    let diff = MethodDiff::build(&registry, &registry, &method).unwrap();
    let changed: Vec<_> = diff
        .entries
        .iter()
        .filter(|e| e.change != Change::Unchanged)
        .collect();
    assert_eq!(changed.len(), 1);
    assert_eq!(changed[0].instruction.canonical(), "nop");
}

#[test]
fn sanitized_directory_names_are_path_safe() {
    let method = MethodId::new("Game.Level`1<Game.Entity>", "Foo.Bar<T>", "(System.Int32)");
    let dir = method.sanitized_dir_name();
    for c in ['<', '>', '(', ')', ':', '*', '?', '"', '|', '\\', '/', '+'] {
        assert!(!dir.contains(c), "{dir} still contains {c:?}");
    }
    assert!(!dir.is_empty());
}
