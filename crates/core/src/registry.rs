//! In-memory hook registry.
//!
//! A concrete implementation of the runtime boundaries used by tests, the
//! session loader, and hosts that drive registration directly. This is the
//! enumeration capability the patching runtime is expected to expose; nothing
//! here reaches into another component's private state.

use crate::editor::BodyEditor;
use crate::il::{Instruction, MethodId, MethodRef};
use crate::result::{Error, Result};
use crate::runtime::{
    CaptureKey, Decompiler, DetourRuntime, Disassembler, PatchHandle, PatchIdentity,
};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Declaring type of the runtime's recover-captured-value primitive.
pub const CAPTURE_TABLE_TYPE: &str = "Detour.Runtime.CaptureTable";

/// In-memory method, patch, and captured-value store.
#[derive(Default)]
pub struct HookRegistry {
    methods: BTreeMap<MethodId, Vec<Instruction>>,
    patches: HashMap<MethodId, Vec<PatchHandle>>,
    captures: HashMap<CaptureKey, String>,
    decompiled: HashMap<String, String>,
    capture_table_type: Option<String>,
}

impl HookRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the declaring type recognized as the capture-table lookup
    /// primitive (defaults to [`CAPTURE_TABLE_TYPE`]).
    pub fn with_capture_table_type(mut self, type_name: impl Into<String>) -> Self {
        self.capture_table_type = Some(type_name.into());
        self
    }

    /// Registers a method body.
    pub fn add_method(&mut self, method: MethodId, body: Vec<Instruction>) {
        self.methods.insert(method, body);
    }

    /// Registers an inline-rewrite patch. Re-registering an identity already
    /// present on the same method replaces it in place (hot-reload dedup).
    pub fn register_rewrite(
        &mut self,
        method: &MethodId,
        identity: PatchIdentity,
        f: impl Fn(&mut BodyEditor) -> Result<()> + Send + Sync + 'static,
    ) -> PatchHandle {
        self.register(method, PatchHandle::rewrite(identity, f))
    }

    /// Registers a call-boundary replacement patch, same dedup rule.
    pub fn register_replacement(
        &mut self,
        method: &MethodId,
        identity: PatchIdentity,
        entry: impl Into<String>,
    ) -> PatchHandle {
        self.register(method, PatchHandle::replacement(identity, entry))
    }

    fn register(&mut self, method: &MethodId, patch: PatchHandle) -> PatchHandle {
        let list = self.patches.entry(method.clone()).or_default();
        match list
            .iter()
            .position(|p| p.identity() == patch.identity())
        {
            // Last registration wins, keeping the original position.
            Some(index) => list[index] = patch.clone(),
            None => list.push(patch.clone()),
        }
        patch
    }

    /// Stores a captured-value description under its key pair.
    pub fn add_capture(&mut self, key: CaptureKey, description: impl Into<String>) {
        self.captures.insert(key, description.into());
    }

    /// Stores recorded decompiler output for a type.
    pub fn add_decompiled(&mut self, type_name: impl Into<String>, text: impl Into<String>) {
        self.decompiled.insert(type_name.into(), text.into());
    }

    /// Resolves `Type.Method` (or a bare method name) to a known method id.
    /// Ambiguity and misses are reported, never panicked on.
    pub fn find_method(&self, type_name: &str, method_name: &str) -> Result<MethodId> {
        let matches: Vec<&MethodId> = self
            .methods
            .keys()
            .filter(|id| id.type_name == type_name && id.method_name == method_name)
            .collect();
        match matches.as_slice() {
            [] => Err(Error::UnknownMethod(format!("{type_name}.{method_name}"))),
            [only] => Ok((*only).clone()),
            _ => Err(Error::AmbiguousMethod(format!("{type_name}.{method_name}"))),
        }
    }

    fn capture_table_type(&self) -> &str {
        self.capture_table_type
            .as_deref()
            .unwrap_or(CAPTURE_TABLE_TYPE)
    }
}

impl DetourRuntime for HookRegistry {
    fn patched_methods(&self) -> BTreeSet<MethodId> {
        self.patches
            .iter()
            .filter(|(_, patches)| !patches.is_empty())
            .map(|(method, _)| method.clone())
            .collect()
    }

    fn patches_for(&self, method: &MethodId) -> Vec<PatchHandle> {
        self.patches.get(method).cloned().unwrap_or_default()
    }

    fn is_capture_lookup(&self, method: &MethodRef) -> bool {
        method.declaring == self.capture_table_type() && method.name.contains("get_value")
    }

    fn resolve_capture(&self, key: CaptureKey) -> Option<String> {
        self.captures.get(&key).cloned()
    }
}

impl Disassembler for HookRegistry {
    fn disassemble(&self, method: &MethodId) -> Result<Vec<Instruction>> {
        self.methods
            .get(method)
            .cloned()
            .ok_or_else(|| Error::UnknownMethod(method.display_name()))
    }
}

#[async_trait]
impl Decompiler for HookRegistry {
    async fn decompile(&self, type_name: &str, _method: Option<&str>) -> Result<String> {
        self.decompiled
            .get(type_name)
            .cloned()
            .ok_or_else(|| Error::Decompile(format!("no recorded output for {type_name}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::parse_body;
    use crate::il::{Opcode, Operand};

    fn fixture() -> (HookRegistry, MethodId) {
        let mut registry = HookRegistry::new();
        let method = MethodId::new("Game.Player", "Update", "()");
        registry.add_method(
            method.clone(),
            parse_body("ldarg.0\nret").expect("fixture body"),
        );
        (registry, method)
    }

    #[test]
    fn duplicate_identity_replaces_in_place() {
        let (mut registry, method) = fixture();
        let identity = PatchIdentity::new("Mod.Hooks", "Manip");
        registry.register_rewrite(&method, identity.clone(), |_| Ok(()));
        registry.register_replacement(
            &method,
            PatchIdentity::new("Other.Mod", "Wrap"),
            "Other.Mod::Wrap",
        );
        // Hot reload re-registers the first identity.
        registry.register_rewrite(&method, identity.clone(), |editor| {
            editor.push(Instruction::new(Opcode::Nop, Operand::None));
            Ok(())
        });

        let patches = registry.patches_for(&method);
        assert_eq!(patches.len(), 2);
        // Position preserved, callback replaced.
        assert_eq!(patches[0].identity(), &identity);
        let mut editor = BodyEditor::new(&[]);
        patches[0].invoke(&mut editor).unwrap();
        assert_eq!(editor.len(), 1);
    }

    #[test]
    fn unknown_and_unpatched_methods() {
        let (mut registry, method) = fixture();
        assert!(registry.patched_methods().is_empty());
        registry.register_rewrite(&method, PatchIdentity::new("M", "f"), |_| Ok(()));
        assert_eq!(registry.patched_methods().len(), 1);

        assert!(matches!(
            registry.find_method("Game.Player", "Missing"),
            Err(Error::UnknownMethod(_))
        ));
        let missing = MethodId::new("Nope", "Nothing", "()");
        assert!(registry.disassemble(&missing).is_err());
    }

    #[test]
    fn capture_lookup_recognition() {
        let (registry, _) = fixture();
        let lookup = MethodRef {
            declaring: CAPTURE_TABLE_TYPE.into(),
            name: "get_value".into(),
            params: vec!["System.Int32".into(), "System.Int32".into()],
            ret: "System.Object".into(),
            generics: vec![],
        };
        assert!(registry.is_capture_lookup(&lookup));
        let other = MethodRef {
            declaring: "Game.Player".into(),
            name: "get_value".into(),
            params: vec![],
            ret: "System.Int32".into(),
            generics: vec![],
        };
        assert!(!registry.is_capture_lookup(&other));
    }
}
