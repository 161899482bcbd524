use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::foundation::error::{PresetError, PresetResult};

/// Id of the node `children` presets attach to when they name no target.
pub const DEFAULT_ATTACHMENT_ID: &str = "BaseScene";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    Atom,
    Layout,
    Scene,
}

/// The whole composition assembled by one generation pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositionDocument {
    #[serde(default)]
    pub children_data: Vec<Node>,
    #[serde(default)]
    pub config: DocumentConfig,
    #[serde(default)]
    pub style: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DocumentConfig {
    pub duration: f64, // seconds
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            duration: 0.0,
            width: 1920,
            height: 1080,
            fps: 30.0,
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,
    #[serde(default)]
    pub component_id: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    #[serde(default)]
    pub data: Map<String, Value>,
    #[serde(default)]
    pub context: NodeContext,
    #[serde(default, deserialize_with = "one_or_many_effects")]
    pub effects: Vec<Effect>,
    #[serde(default)]
    pub children_data: Vec<Node>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timing: Option<Timing>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boundaries: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timing {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fit_duration_to: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Effect {
    pub id: String,
    pub component_id: String,
    #[serde(default)]
    pub data: Map<String, Value>,
}

impl Effect {
    pub fn new(id: impl Into<String>, component_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            component_id: component_id.into(),
            data: Map::new(),
        }
    }
}

pub(crate) fn one_or_many_effects<'de, D>(deserializer: D) -> Result<Vec<Effect>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Many(Vec<Effect>),
        One(Effect),
        Null(()),
    }

    match Repr::deserialize(deserializer)? {
        Repr::Many(v) => Ok(v),
        Repr::One(e) => Ok(vec![e]),
        Repr::Null(()) => Ok(Vec::new()),
    }
}

impl CompositionDocument {
    pub fn from_value(value: Value) -> PresetResult<Self> {
        let doc: Self = serde_json::from_value(value)?;
        doc.validate()?;
        Ok(doc)
    }

    pub fn validate(&self) -> PresetResult<()> {
        self.config.validate()?;
        for node in &self.children_data {
            node.validate()?;
        }
        Ok(())
    }

    /// Shallow-merges `patch` into the config; patch keys win.
    pub fn merge_config(&mut self, patch: &Map<String, Value>) -> PresetResult<()> {
        if patch.is_empty() {
            return Ok(());
        }
        let Value::Object(mut merged) = serde_json::to_value(&self.config)? else {
            return Err(PresetError::serde("config did not serialize to an object"));
        };
        for (k, v) in patch {
            merged.insert(k.clone(), v.clone());
        }
        let config: DocumentConfig = serde_json::from_value(Value::Object(merged))
            .map_err(|e| PresetError::malformed_output(format!("config patch rejected: {e}")))?;
        config.validate()?;
        self.config = config;
        Ok(())
    }

    pub fn merge_style(&mut self, patch: &Map<String, Value>) {
        for (k, v) in patch {
            self.style.insert(k.clone(), v.clone());
        }
    }
}

impl DocumentConfig {
    pub fn validate(&self) -> PresetResult<()> {
        if !self.duration.is_finite() || self.duration < 0.0 {
            return Err(PresetError::validation(
                "config.duration must be a finite, non-negative number",
            ));
        }
        if self.width == 0 || self.height == 0 {
            return Err(PresetError::validation(
                "config.width/config.height must be > 0",
            ));
        }
        if !self.fps.is_finite() || self.fps <= 0.0 {
            return Err(PresetError::validation("config.fps must be > 0"));
        }
        Ok(())
    }
}

impl Node {
    pub fn validate(&self) -> PresetResult<()> {
        if self.id.trim().is_empty() {
            return Err(PresetError::validation(format!(
                "node with componentId '{}' has an empty id",
                self.component_id
            )));
        }
        for child in &self.children_data {
            child.validate()?;
        }
        Ok(())
    }
}

impl NodeContext {
    /// Shallow merge: every field present in `other` replaces the field here.
    pub fn merge_from(&mut self, other: &NodeContext) {
        if let Some(timing) = &other.timing {
            self.timing = Some(timing.clone());
        }
        if let Some(boundaries) = &other.boundaries {
            self.boundaries = Some(boundaries.clone());
        }
        for (k, v) in &other.extra {
            self.extra.insert(k.clone(), v.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn node_wire_format_is_camel_case() {
        let v = json!({
            "id": "title",
            "componentId": "TextAtom",
            "type": "atom",
            "data": { "text": "hi" },
            "context": { "timing": { "start": 1.0, "fitDurationTo": "BaseScene" } },
            "childrenData": []
        });
        let node: Node = serde_json::from_value(v).unwrap();
        assert_eq!(node.component_id, "TextAtom");
        assert_eq!(node.node_type, NodeType::Atom);
        let timing = node.context.timing.as_ref().unwrap();
        assert_eq!(timing.start, Some(1.0));
        assert_eq!(timing.fit_duration_to.as_deref(), Some("BaseScene"));

        let back = serde_json::to_value(&node).unwrap();
        assert_eq!(back["componentId"], "TextAtom");
        assert_eq!(back["context"]["timing"]["fitDurationTo"], "BaseScene");
    }

    #[test]
    fn single_effect_object_becomes_list() {
        let v = json!({
            "id": "n",
            "componentId": "Box",
            "type": "layout",
            "effects": { "id": "fade", "componentId": "Fade", "data": { "ms": 300 } }
        });
        let node: Node = serde_json::from_value(v).unwrap();
        assert_eq!(node.effects.len(), 1);
        assert_eq!(node.effects[0].id, "fade");
    }

    #[test]
    fn config_keeps_unknown_fields() {
        let v = json!({
            "childrenData": [],
            "config": { "duration": 12.5, "width": 1080, "height": 1920, "fps": 30, "theme": "dark" }
        });
        let doc: CompositionDocument = serde_json::from_value(v).unwrap();
        assert_eq!(doc.config.extra["theme"], "dark");
        let back = serde_json::to_value(&doc).unwrap();
        assert_eq!(back["config"]["theme"], "dark");
    }

    #[test]
    fn merge_config_patch_wins_and_validates() {
        let mut doc = CompositionDocument::default();
        let patch = json!({ "duration": 8.0, "fps": 60 });
        doc.merge_config(patch.as_object().unwrap()).unwrap();
        assert_eq!(doc.config.duration, 8.0);
        assert_eq!(doc.config.fps, 60.0);
        assert_eq!(doc.config.width, 1920);

        let bad = json!({ "duration": -1.0 });
        assert!(doc.merge_config(bad.as_object().unwrap()).is_err());
        assert_eq!(doc.config.duration, 8.0);
    }

    #[test]
    fn validate_rejects_negative_duration() {
        let mut doc = CompositionDocument::default();
        doc.config.duration = -0.5;
        assert!(doc.validate().is_err());
    }

    #[test]
    fn context_merge_is_shallow() {
        let mut base = NodeContext {
            timing: Some(Timing {
                start: Some(0.0),
                duration: Some(4.0),
                ..Timing::default()
            }),
            boundaries: Some(json!({ "left": 10 })),
            extra: Map::new(),
        };
        let patch = NodeContext {
            timing: Some(Timing {
                start: Some(2.0),
                ..Timing::default()
            }),
            boundaries: None,
            extra: Map::new(),
        };
        base.merge_from(&patch);
        let timing = base.timing.unwrap();
        assert_eq!(timing.start, Some(2.0));
        assert_eq!(timing.duration, None);
        assert_eq!(base.boundaries, Some(json!({ "left": 10 })));
    }
}
