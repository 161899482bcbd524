use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::foundation::error::PresetResult;
use crate::merge::merger::PresetType;
use crate::preset::sandbox::{CompiledPreset, PresetFunction, compile};

/// A stored preset: metadata, the serialized function and its parameter schema.
///
/// `preset_params` is carried for the host; parameter values are assumed to be validated against it
/// upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresetArtifact {
    pub id: String,
    #[serde(default)]
    pub metadata: Value,
    pub preset_function: String,
    #[serde(default)]
    pub preset_params: Value,
}

impl PresetArtifact {
    pub fn new(id: impl Into<String>, preset_function: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            metadata: Value::Null,
            preset_function: preset_function.into(),
            preset_params: Value::Null,
        }
    }

    pub fn compile(&self) -> PresetResult<CompiledPreset> {
        compile(&self.preset_function)
    }
}

/// One row of the host's ordered preset list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresetEntry {
    pub preset_id: String,
    pub preset_type: PresetType,
    #[serde(default)]
    pub preset_input_data: Value,
    #[serde(default)]
    pub disabled: bool,
}

impl PresetEntry {
    pub fn new(preset_id: impl Into<String>, preset_type: PresetType, input: Value) -> Self {
        Self {
            preset_id: preset_id.into(),
            preset_type,
            preset_input_data: input,
            disabled: false,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }
}

pub(crate) enum PresetSource {
    Serialized(PresetArtifact),
    Native(Box<dyn PresetFunction>),
}

/// Presets available to a generation pass, by id.
///
/// Serialized artifacts are compiled when an entry uses them, so a broken source only affects the
/// entries that name it.
#[derive(Default)]
pub struct PresetRegistry {
    presets: HashMap<String, PresetSource>,
}

impl fmt::Debug for PresetRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<&str> = self.presets.keys().map(String::as_str).collect();
        ids.sort_unstable();
        f.debug_struct("PresetRegistry").field("ids", &ids).finish()
    }
}

impl PresetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a serialized preset; a later artifact with the same id replaces the earlier one.
    pub fn insert(&mut self, artifact: PresetArtifact) {
        self.presets
            .insert(artifact.id.clone(), PresetSource::Serialized(artifact));
    }

    /// Registers a preset implemented in Rust.
    pub fn insert_native(&mut self, id: impl Into<String>, f: impl PresetFunction + 'static) {
        self.presets
            .insert(id.into(), PresetSource::Native(Box::new(f)));
    }

    pub fn contains(&self, id: &str) -> bool {
        self.presets.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.presets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }

    pub(crate) fn get(&self, id: &str) -> Option<&PresetSource> {
        self.presets.get(id)
    }
}

impl FromIterator<PresetArtifact> for PresetRegistry {
    fn from_iter<I: IntoIterator<Item = PresetArtifact>>(iter: I) -> Self {
        let mut reg = Self::new();
        for a in iter {
            reg.insert(a);
        }
        reg
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn artifact_roundtrips_camel_case() {
        let v = json!({
            "id": "title",
            "metadata": { "name": "Title card" },
            "presetFunction": "(input) => null",
            "presetParams": { "type": "object" }
        });
        let a: PresetArtifact = serde_json::from_value(v.clone()).unwrap();
        assert_eq!(a.id, "title");
        assert_eq!(serde_json::to_value(&a).unwrap(), v);
        assert!(a.compile().is_ok());
    }

    #[test]
    fn entry_defaults() {
        let e: PresetEntry =
            serde_json::from_value(json!({ "presetId": "p", "presetType": "children" })).unwrap();
        assert_eq!(e.preset_type, PresetType::Children);
        assert_eq!(e.preset_input_data, Value::Null);
        assert!(!e.disabled);
    }

    #[test]
    fn registry_keeps_last_artifact_per_id() {
        let reg: PresetRegistry = [
            PresetArtifact::new("a", "() => 1"),
            PresetArtifact::new("a", "() => 2"),
            PresetArtifact::new("b", "() => 3"),
        ]
        .into_iter()
        .collect();
        assert_eq!(reg.len(), 2);
        match reg.get("a") {
            Some(PresetSource::Serialized(a)) => assert_eq!(a.preset_function, "() => 2"),
            _ => panic!("expected serialized preset"),
        }
        assert!(!reg.contains("c"));
    }
}
