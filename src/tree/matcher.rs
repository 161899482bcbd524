//! Node lookup over a composition forest.
//!
//! Both lookups walk the whole forest depth-first in pre-order and never stop early: a node's
//! children are visited whether or not the node itself matched.

use std::collections::HashSet;

use crate::scene::model::{Node, NodeType};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComponentQuery {
    pub node_type: Option<NodeType>,
    pub component_id: Option<String>,
}

impl ComponentQuery {
    pub fn by_type(node_type: NodeType) -> Self {
        Self {
            node_type: Some(node_type),
            component_id: None,
        }
    }

    pub fn by_component(component_id: impl Into<String>) -> Self {
        Self {
            node_type: None,
            component_id: Some(component_id.into()),
        }
    }

    pub fn both(node_type: NodeType, component_id: impl Into<String>) -> Self {
        Self {
            node_type: Some(node_type),
            component_id: Some(component_id.into()),
        }
    }

    /// A single supplied field matches on its own; when both are supplied both must match.
    pub fn matches(&self, node: &Node) -> bool {
        let type_eq = self.node_type.map(|t| t == node.node_type);
        let component_eq = self
            .component_id
            .as_deref()
            .map(|c| c == node.component_id);
        match (type_eq, component_eq) {
            (Some(t), Some(c)) => t && c,
            (Some(t), None) => t,
            (None, Some(c)) => c,
            (None, None) => false,
        }
    }
}

pub fn find_by_id<'a>(tree: &'a [Node], target_ids: &HashSet<&str>) -> Vec<&'a Node> {
    let mut out = Vec::new();
    walk(tree, &mut |node| {
        if target_ids.contains(node.id.as_str()) {
            out.push(node);
        }
    });
    out
}

pub fn find_by_query<'a>(tree: &'a [Node], query: &ComponentQuery) -> Vec<&'a Node> {
    let mut out = Vec::new();
    walk(tree, &mut |node| {
        if query.matches(node) {
            out.push(node);
        }
    });
    out
}

fn walk<'a>(nodes: &'a [Node], visit: &mut impl FnMut(&'a Node)) {
    for node in nodes {
        visit(node);
        walk(&node.children_data, visit);
    }
}
