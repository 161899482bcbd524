use serde_json::{Map, Value};

use crate::{
    foundation::error::{PresetError, PresetResult},
    scene::model::{CompositionDocument, DocumentConfig, Effect, Node, NodeContext, NodeType, Timing},
};

pub struct DocumentBuilder {
    config: DocumentConfig,
    style: Map<String, Value>,
    children: Vec<Node>,
}

impl DocumentBuilder {
    pub fn new(width: u32, height: u32, fps: f64, duration: f64) -> Self {
        Self {
            config: DocumentConfig {
                duration,
                width,
                height,
                fps,
                extra: Map::new(),
            },
            style: Map::new(),
            children: Vec::new(),
        }
    }

    pub fn config_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.config.extra.insert(key.into(), value);
        self
    }

    pub fn style(mut self, key: impl Into<String>, value: Value) -> Self {
        self.style.insert(key.into(), value);
        self
    }

    pub fn child(mut self, node: Node) -> Self {
        self.children.push(node);
        self
    }

    pub fn build(self) -> PresetResult<CompositionDocument> {
        let doc = CompositionDocument {
            children_data: self.children,
            config: self.config,
            style: self.style,
        };
        doc.validate()?;
        Ok(doc)
    }
}

pub struct NodeBuilder {
    id: String,
    component_id: String,
    node_type: NodeType,
    data: Map<String, Value>,
    context: NodeContext,
    effects: Vec<Effect>,
    children: Vec<Node>,
}

impl NodeBuilder {
    pub fn new(id: impl Into<String>, component_id: impl Into<String>, node_type: NodeType) -> Self {
        Self {
            id: id.into(),
            component_id: component_id.into(),
            node_type,
            data: Map::new(),
            context: NodeContext::default(),
            effects: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn atom(id: impl Into<String>, component_id: impl Into<String>) -> Self {
        Self::new(id, component_id, NodeType::Atom)
    }

    pub fn layout(id: impl Into<String>, component_id: impl Into<String>) -> Self {
        Self::new(id, component_id, NodeType::Layout)
    }

    pub fn scene(id: impl Into<String>, component_id: impl Into<String>) -> Self {
        Self::new(id, component_id, NodeType::Scene)
    }

    pub fn data(mut self, key: impl Into<String>, value: Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    pub fn timing(mut self, start: f64, duration: f64) -> Self {
        let timing = self.context.timing.get_or_insert_with(Timing::default);
        timing.start = Some(start);
        timing.duration = Some(duration);
        self
    }

    pub fn fit_duration_to(mut self, id: impl Into<String>) -> Self {
        let timing = self.context.timing.get_or_insert_with(Timing::default);
        timing.fit_duration_to = Some(id.into());
        self
    }

    pub fn effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn child(mut self, node: Node) -> Self {
        self.children.push(node);
        self
    }

    pub fn build(self) -> PresetResult<Node> {
        if self.component_id.trim().is_empty() {
            return Err(PresetError::validation(format!(
                "node '{}' needs a componentId",
                self.id
            )));
        }
        let node = Node {
            id: self.id,
            component_id: self.component_id,
            node_type: self.node_type,
            data: self.data,
            context: self.context,
            effects: self.effects,
            children_data: self.children,
        };
        node.validate()?;
        Ok(node)
    }
}
