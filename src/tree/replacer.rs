use std::collections::HashSet;

use crate::scene::model::Node;

/// Returns a new forest where every node whose id is in `target_ids` is swapped for a clone of
/// `replacement`, at the same position in its parent's `childrenData`.
///
/// Each matched site gets its own clone. The replacement's children are inserted as-is; the walk
/// only descends into nodes that were not replaced.
pub fn replace_by_id(tree: &[Node], target_ids: &HashSet<&str>, replacement: &Node) -> Vec<Node> {
    tree.iter()
        .map(|node| {
            if target_ids.contains(node.id.as_str()) {
                replacement.clone()
            } else {
                let mut copy = node.clone();
                copy.children_data = replace_by_id(&node.children_data, target_ids, replacement);
                copy
            }
        })
        .collect()
}

/// Single-id convenience used by the merger.
pub fn replace_node(tree: &[Node], target_id: &str, replacement: &Node) -> Vec<Node> {
    let targets: HashSet<&str> = [target_id].into_iter().collect();
    replace_by_id(tree, &targets, replacement)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::dsl::NodeBuilder;
    use serde_json::json;

    fn tree() -> Vec<Node> {
        vec![
            NodeBuilder::scene("BaseScene", "Scene")
                .child(NodeBuilder::atom("a", "TextAtom").build().unwrap())
                .child(
                    NodeBuilder::layout("row", "Row")
                        .child(NodeBuilder::atom("a", "TextAtom").build().unwrap())
                        .child(NodeBuilder::atom("b", "TextAtom").build().unwrap())
                        .build()
                        .unwrap(),
                )
                .build()
                .unwrap(),
        ]
    }

    #[test]
    fn replaces_every_match_in_place() {
        let replacement = NodeBuilder::atom("a", "TextAtom")
            .data("text", json!("new"))
            .build()
            .unwrap();
        let out = replace_by_id(&tree(), &["a"].into_iter().collect(), &replacement);

        let scene = &out[0];
        assert_eq!(scene.children_data[0].data["text"], "new");
        let row = &scene.children_data[1];
        assert_eq!(row.children_data[0].data["text"], "new");
        assert_eq!(row.children_data[1].id, "b");
        assert!(row.children_data[1].data.is_empty());
    }

    #[test]
    fn does_not_descend_into_replacement() {
        let replacement = NodeBuilder::layout("row", "Row")
            .child(NodeBuilder::atom("b", "TextAtom").build().unwrap())
            .build()
            .unwrap();
        let targets = ["row", "b"].into_iter().collect();
        let out = replace_by_id(&tree(), &targets, &replacement);
        let row = &out[0].children_data[1];
        assert_eq!(row.children_data.len(), 1);
        assert_eq!(row.children_data[0].id, "b");
    }

    #[test]
    fn input_tree_is_untouched() {
        let original = tree();
        let replacement = NodeBuilder::atom("zz", "X").build().unwrap();
        let _ = replace_node(&original, "b", &replacement);
        assert_eq!(original, tree());
    }
}
