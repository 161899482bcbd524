//! Preset function results and their normalization.
//!
//! A preset function may return either the wrapped form `{ output, options }` or a bare partial
//! document. Both normalize to [`PresetOutput`]; falsy or empty results normalize to `None`
//! ("no contribution").

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::foundation::error::{PresetError, PresetResult};
use crate::scene::model::{Effect, Node, NodeContext, NodeType, one_or_many_effects};

/// The subset of a [`CompositionDocument`](crate::scene::model::CompositionDocument) a preset
/// contributes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children_data: Option<Vec<NodeTemplate>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<Map<String, Value>>,
}

/// A top-level node as a preset returns it.
///
/// `data`, `context` and `effects` presets only patch an existing node, so `type` and
/// `componentId` may be left out. `full` and `children` presets insert the node as is and need
/// both; see [`NodeTemplate::into_node`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeTemplate {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_id: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub node_type: Option<NodeType>,
    #[serde(default)]
    pub data: Map<String, Value>,
    #[serde(default)]
    pub context: NodeContext,
    #[serde(default, deserialize_with = "one_or_many_effects")]
    pub effects: Vec<Effect>,
    #[serde(default)]
    pub children_data: Vec<Node>,
}

impl NodeTemplate {
    /// The complete node, or `MalformedOutput` when `id` or `type` is missing.
    pub fn into_node(self) -> PresetResult<Node> {
        if self.id.trim().is_empty() {
            return Err(PresetError::malformed_output("node is missing `id`"));
        }
        let Some(node_type) = self.node_type else {
            return Err(PresetError::malformed_output(format!(
                "node \"{}\" is missing `type`",
                self.id
            )));
        };
        Ok(Node {
            id: self.id,
            component_id: self.component_id.unwrap_or_default(),
            node_type,
            data: self.data,
            context: self.context,
            effects: self.effects,
            children_data: self.children_data,
        })
    }
}

impl From<Node> for NodeTemplate {
    fn from(node: Node) -> Self {
        Self {
            id: node.id,
            component_id: Some(node.component_id),
            node_type: Some(node.node_type),
            data: node.data,
            context: node.context,
            effects: node.effects,
            children_data: node.children_data,
        }
    }
}

/// Converts every template, failing on the first incomplete one.
pub(crate) fn into_nodes(templates: Vec<NodeTemplate>) -> PresetResult<Vec<Node>> {
    templates.into_iter().map(NodeTemplate::into_node).collect()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresetOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attached_to_id: Option<String>,
    /// Passed through untouched for the host's layout layer.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attached_containers: Vec<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresetOutput {
    pub output: PartialDocument,
    #[serde(default)]
    pub options: PresetOptions,
}

impl PartialDocument {
    pub fn children(&self) -> &[NodeTemplate] {
        self.children_data.as_deref().unwrap_or(&[])
    }
}

impl PresetOutput {
    pub fn new(output: PartialDocument) -> Self {
        Self {
            output,
            options: PresetOptions::default(),
        }
    }

    pub fn attached_to(mut self, id: impl Into<String>) -> Self {
        self.options.attached_to_id = Some(id.into());
        self
    }

    /// Normalizes a raw preset return value.
    ///
    /// - falsy or empty values: `Ok(None)`
    /// - objects with an `output` key: the wrapped form
    /// - any other object: a bare partial document with default options
    pub fn from_return(value: Value) -> PresetResult<Option<Self>> {
        if is_empty_result(&value) {
            return Ok(None);
        }
        let Value::Object(obj) = value else {
            return Err(PresetError::malformed_output(format!(
                "expected an object, got {}",
                json_type_name(&value)
            )));
        };

        if obj.contains_key("output") {
            if obj.get("output").is_some_and(is_empty_result) {
                return Ok(None);
            }
            let out: PresetOutput = serde_json::from_value(Value::Object(obj))
                .map_err(|e| PresetError::malformed_output(e.to_string()))?;
            return Ok(Some(out));
        }

        let doc: PartialDocument = serde_json::from_value(Value::Object(obj))
            .map_err(|e| PresetError::malformed_output(e.to_string()))?;
        Ok(Some(Self::new(doc)))
    }
}

/// `null`, `false`, `0`, `NaN`, `""`, `[]` and `{}`.
pub fn is_empty_result(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64().is_none_or(|f| f == 0.0 || f.is_nan()),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node_json(id: &str) -> Value {
        json!({ "id": id, "componentId": "TextAtom", "type": "atom" })
    }

    #[test]
    fn falsy_results_are_no_contribution() {
        for v in [json!(null), json!(false), json!(0), json!(""), json!({}), json!([])] {
            assert!(PresetOutput::from_return(v).unwrap().is_none());
        }
        let wrapped_null = json!({ "output": null, "options": {} });
        assert!(PresetOutput::from_return(wrapped_null).unwrap().is_none());
    }

    #[test]
    fn wrapped_shape_keeps_options() {
        let v = json!({
            "output": { "childrenData": [node_json("a")] },
            "options": { "attachedToId": "Intro" }
        });
        let out = PresetOutput::from_return(v).unwrap().unwrap();
        assert_eq!(out.output.children().len(), 1);
        assert_eq!(out.options.attached_to_id.as_deref(), Some("Intro"));
    }

    #[test]
    fn bare_shape_gets_empty_options() {
        let v = json!({ "childrenData": [node_json("a")], "config": { "duration": 3 } });
        let out = PresetOutput::from_return(v).unwrap().unwrap();
        assert_eq!(out.options, PresetOptions::default());
        assert_eq!(out.output.config.unwrap()["duration"], 3);
    }

    #[test]
    fn patch_nodes_may_omit_type_and_component() {
        let v = json!({ "childrenData": [{ "id": "BaseScene", "data": { "colors": ["#222"] } }] });
        let out = PresetOutput::from_return(v).unwrap().unwrap();
        let template = &out.output.children()[0];
        assert_eq!(template.node_type, None);
        assert_eq!(template.data["colors"], json!(["#222"]));

        let err = template.clone().into_node().unwrap_err();
        assert!(matches!(err, PresetError::MalformedOutput(_)));
        assert!(err.to_string().contains("missing `type`"));
    }

    #[test]
    fn complete_templates_become_nodes() {
        let v = json!({ "childrenData": [node_json("a")] });
        let out = PresetOutput::from_return(v).unwrap().unwrap();
        let nodes = into_nodes(out.output.children_data.unwrap()).unwrap();
        assert_eq!(nodes[0].node_type, NodeType::Atom);
        assert_eq!(nodes[0].component_id, "TextAtom");
    }

    #[test]
    fn non_object_results_are_malformed() {
        let err = PresetOutput::from_return(json!("nodes")).unwrap_err();
        assert!(matches!(err, PresetError::MalformedOutput(_)));
    }
}
