//! Folding one preset's output into the shared composition document.
//!
//! Policies are evaluated top to bottom and the first applicable one wins:
//!
//! 1. empty base + `full`: adopt the preset's children, shallow-merge config/style
//! 2. empty base + anything else: no-op, there is nothing to attach to
//! 3. `full`: replace the base children, shallow-merge config/style
//! 4. `children`: append onto the attachment target (default `BaseScene`, else first root)
//! 5. `data` / `context` / `effects`: patch the node whose id matches the preset's first node
//!    (else the first root) and swap it in through the replacer

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::foundation::diagnostics::{Diagnostic, DiagnosticKind};
use crate::foundation::error::PresetResult;
use crate::scene::model::{CompositionDocument, DEFAULT_ATTACHMENT_ID, Node};
use crate::scene::output::{PresetOutput, into_nodes};
use crate::tree::matcher::find_by_id;
use crate::tree::replacer::replace_node;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresetType {
    Full,
    Children,
    Data,
    Context,
    Effects,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MergeOutcome {
    /// The document changed.
    Applied {
        /// Id of the node that was patched or appended to, when the policy targets a node.
        target_id: Option<String>,
    },
    /// Nothing to merge into or nothing to merge; the document is unchanged.
    Skipped { reason: &'static str },
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergeReport {
    pub outcome: MergeOutcome,
    pub diagnostics: Vec<Diagnostic>,
}

impl MergeReport {
    fn applied(target_id: Option<String>) -> Self {
        Self {
            outcome: MergeOutcome::Applied { target_id },
            diagnostics: Vec::new(),
        }
    }

    fn skipped(reason: &'static str) -> Self {
        Self {
            outcome: MergeOutcome::Skipped { reason },
            diagnostics: Vec::new(),
        }
    }
}

pub fn merge_preset(
    base: &mut CompositionDocument,
    output: PresetOutput,
    preset_type: PresetType,
) -> PresetResult<MergeReport> {
    if base.children_data.is_empty() {
        if preset_type != PresetType::Full {
            tracing::debug!(?preset_type, "base document is empty, nothing to attach to");
            return Ok(MergeReport::skipped("base document has no children"));
        }
        return merge_full(base, output);
    }

    match preset_type {
        PresetType::Full => merge_full(base, output),
        PresetType::Children => merge_children(base, output),
        PresetType::Data => merge_into_node(base, output, NodePatch::Data),
        PresetType::Context => merge_into_node(base, output, NodePatch::Context),
        PresetType::Effects => merge_into_node(base, output, NodePatch::Effects),
    }
}

/// Which part of the target node a node-level preset rewrites.
#[derive(Debug, Clone, Copy)]
enum NodePatch {
    Data,
    Context,
    Effects,
}

fn merge_full(base: &mut CompositionDocument, output: PresetOutput) -> PresetResult<MergeReport> {
    let partial = output.output;
    // Children and config are checked before anything is written, so a rejected output leaves
    // the document untouched.
    let children = partial.children_data.map(into_nodes).transpose()?;
    if let Some(config) = &partial.config {
        base.merge_config(config)?;
    }
    if let Some(style) = &partial.style {
        base.merge_style(style);
    }
    if let Some(children) = children {
        tracing::debug!(count = children.len(), "replacing document children");
        base.children_data = children;
    }
    Ok(MergeReport::applied(None))
}

fn merge_children(
    base: &mut CompositionDocument,
    output: PresetOutput,
) -> PresetResult<MergeReport> {
    let wanted = output
        .options
        .attached_to_id
        .clone()
        .unwrap_or_else(|| DEFAULT_ATTACHMENT_ID.to_owned());

    let mut diagnostics = Vec::new();
    let targets: HashSet<&str> = [wanted.as_str()].into_iter().collect();
    let target_id = match find_by_id(&base.children_data, &targets).first() {
        Some(node) => node.id.clone(),
        None => {
            // Non-empty base was checked by the caller.
            let fallback = base.children_data[0].id.clone();
            diagnostics.push(Diagnostic::new(
                DiagnosticKind::AttachmentTargetNotFound,
                format!("no node with id \"{wanted}\", attaching to first root \"{fallback}\""),
            ));
            fallback
        }
    };

    let appended = into_nodes(output.output.children_data.unwrap_or_default())?;
    if appended.is_empty() {
        return Ok(MergeReport {
            outcome: MergeOutcome::Skipped {
                reason: "preset produced no children",
            },
            diagnostics,
        });
    }

    let Some(target) = find_first_mut(&mut base.children_data, &target_id) else {
        return Ok(MergeReport {
            outcome: MergeOutcome::Skipped {
                reason: "attachment target disappeared",
            },
            diagnostics,
        });
    };
    tracing::debug!(target = %target_id, count = appended.len(), "appending children");
    target.children_data.extend(appended);

    Ok(MergeReport {
        outcome: MergeOutcome::Applied {
            target_id: Some(target_id),
        },
        diagnostics,
    })
}

fn merge_into_node(
    base: &mut CompositionDocument,
    output: PresetOutput,
    patch: NodePatch,
) -> PresetResult<MergeReport> {
    let Some(template) = output
        .output
        .children_data
        .and_then(|children| children.into_iter().next())
    else {
        return Ok(MergeReport::skipped("preset produced no template node"));
    };

    let targets: HashSet<&str> = [template.id.as_str()].into_iter().collect();
    let mut target = match find_by_id(&base.children_data, &targets).first() {
        Some(node) => (*node).clone(),
        None => base.children_data[0].clone(),
    };
    let target_id = target.id.clone();

    match patch {
        NodePatch::Data => merge_data(&mut target.data, &template.data),
        NodePatch::Context => target.context.merge_from(&template.context),
        NodePatch::Effects => target.effects = template.effects,
    }
    tracing::debug!(target = %target_id, ?patch, "patched node");

    base.children_data = replace_node(&base.children_data, &target_id, &target);
    Ok(MergeReport::applied(Some(target_id)))
}

/// Arrays concatenate, objects shallow-merge, everything else overwrites.
pub fn merge_data(target: &mut Map<String, Value>, patch: &Map<String, Value>) {
    for (key, incoming) in patch {
        let merged = match (target.get_mut(key), incoming) {
            (Some(Value::Array(existing)), Value::Array(extra)) => {
                existing.extend(extra.iter().cloned());
                true
            }
            (Some(Value::Object(existing)), Value::Object(extra)) => {
                for (k, v) in extra {
                    existing.insert(k.clone(), v.clone());
                }
                true
            }
            _ => false,
        };
        if !merged {
            target.insert(key.clone(), incoming.clone());
        }
    }
}

fn find_first_mut<'a>(nodes: &'a mut [Node], id: &str) -> Option<&'a mut Node> {
    for node in nodes {
        if node.id == id {
            return Some(node);
        }
        if let Some(found) = find_first_mut(&mut node.children_data, id) {
            return Some(found);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::dsl::NodeBuilder;
    use crate::scene::model::Effect;
    use crate::scene::output::{NodeTemplate, PartialDocument};
    use serde_json::json;

    fn base_doc() -> CompositionDocument {
        let scene = NodeBuilder::scene("BaseScene", "Scene")
            .child(
                NodeBuilder::atom("title", "TextAtom")
                    .data("text", json!("Hi"))
                    .data("words", json!(["a"]))
                    .data("font", json!({ "family": "Inter", "size": 40 }))
                    .timing(0.0, 5.0)
                    .effect(Effect::new("e0", "Fade"))
                    .build()
                    .unwrap(),
            )
            .build()
            .unwrap();
        CompositionDocument {
            children_data: vec![scene],
            ..CompositionDocument::default()
        }
    }

    fn output_with(children: Vec<Node>) -> PresetOutput {
        PresetOutput::new(PartialDocument {
            children_data: Some(children.into_iter().map(NodeTemplate::from).collect()),
            ..PartialDocument::default()
        })
    }

    fn node(id: &str) -> Node {
        NodeBuilder::atom(id, "TextAtom").build().unwrap()
    }

    #[test]
    fn empty_base_adopts_full_preset() {
        let mut doc = CompositionDocument::default();
        let mut out = output_with(vec![node("root")]);
        out.output.config = Some(json!({ "duration": 9 }).as_object().unwrap().clone());
        out.output.style = Some(json!({ "bg": "#fff" }).as_object().unwrap().clone());
        let report = merge_preset(&mut doc, out, PresetType::Full).unwrap();
        assert!(matches!(report.outcome, MergeOutcome::Applied { .. }));
        assert_eq!(doc.children_data[0].id, "root");
        assert_eq!(doc.config.duration, 9.0);
        assert_eq!(doc.style["bg"], "#fff");
    }

    #[test]
    fn empty_base_ignores_other_types() {
        for t in [
            PresetType::Children,
            PresetType::Data,
            PresetType::Context,
            PresetType::Effects,
        ] {
            let mut doc = CompositionDocument::default();
            let report = merge_preset(&mut doc, output_with(vec![node("x")]), t).unwrap();
            assert!(matches!(report.outcome, MergeOutcome::Skipped { .. }));
            assert!(doc.children_data.is_empty());
        }
    }

    #[test]
    fn full_replaces_children_and_merges_config() {
        let mut doc = base_doc();
        doc.config.extra.insert("theme".into(), json!("dark"));
        let mut out = output_with(vec![node("other")]);
        out.output.config = Some(json!({ "fps": 24 }).as_object().unwrap().clone());
        merge_preset(&mut doc, out, PresetType::Full).unwrap();
        assert_eq!(doc.children_data.len(), 1);
        assert_eq!(doc.children_data[0].id, "other");
        assert_eq!(doc.config.fps, 24.0);
        assert_eq!(doc.config.extra["theme"], "dark");
    }

    #[test]
    fn rejected_config_leaves_document_untouched() {
        let mut doc = base_doc();
        let before = doc.clone();
        let mut out = output_with(vec![node("other")]);
        out.output.config = Some(json!({ "duration": "long" }).as_object().unwrap().clone());
        assert!(merge_preset(&mut doc, out, PresetType::Full).is_err());
        assert_eq!(doc, before);
    }

    #[test]
    fn children_append_in_call_order() {
        let mut doc = base_doc();
        merge_preset(&mut doc, output_with(vec![node("a1"), node("a2")]), PresetType::Children)
            .unwrap();
        merge_preset(&mut doc, output_with(vec![node("b1")]), PresetType::Children).unwrap();
        let ids: Vec<&str> = doc.children_data[0]
            .children_data
            .iter()
            .map(|n| n.id.as_str())
            .collect();
        assert_eq!(ids, ["title", "a1", "a2", "b1"]);
    }

    #[test]
    fn children_attach_to_named_target() {
        let mut doc = base_doc();
        let out = output_with(vec![node("word")]).attached_to("title");
        let report = merge_preset(&mut doc, out, PresetType::Children).unwrap();
        assert_eq!(
            report.outcome,
            MergeOutcome::Applied {
                target_id: Some("title".into())
            }
        );
        assert_eq!(doc.children_data[0].children_data[0].children_data[0].id, "word");
    }

    #[test]
    fn children_fall_back_to_first_root() {
        let mut doc = CompositionDocument {
            children_data: vec![node("root0"), node("root1")],
            ..CompositionDocument::default()
        };
        let out = output_with(vec![node("c")]).attached_to("missing");
        let report = merge_preset(&mut doc, out, PresetType::Children).unwrap();
        assert_eq!(
            report.diagnostics[0].kind,
            DiagnosticKind::AttachmentTargetNotFound
        );
        assert_eq!(doc.children_data[0].children_data[0].id, "c");
        assert!(doc.children_data[1].children_data.is_empty());
    }

    #[test]
    fn data_merge_concatenates_merges_and_overwrites() {
        let mut doc = base_doc();
        let patch = NodeBuilder::atom("title", "TextAtom")
            .data("text", json!("Bye"))
            .data("words", json!(["b", "c"]))
            .data("font", json!({ "size": 64 }))
            .build()
            .unwrap();
        merge_preset(&mut doc, output_with(vec![patch.clone()]), PresetType::Data).unwrap();
        merge_preset(&mut doc, output_with(vec![patch]), PresetType::Data).unwrap();

        let title = &doc.children_data[0].children_data[0];
        assert_eq!(title.data["text"], "Bye");
        assert_eq!(title.data["words"], json!(["a", "b", "c", "b", "c"]));
        assert_eq!(title.data["font"], json!({ "family": "Inter", "size": 64 }));
        // Untouched parts of the node survive.
        assert_eq!(title.effects.len(), 1);
    }

    #[test]
    fn data_merge_without_match_targets_first_root() {
        let mut doc = base_doc();
        let patch = NodeBuilder::atom("nope", "TextAtom")
            .data("bg", json!("red"))
            .build()
            .unwrap();
        let report = merge_preset(&mut doc, output_with(vec![patch]), PresetType::Data).unwrap();
        assert_eq!(
            report.outcome,
            MergeOutcome::Applied {
                target_id: Some("BaseScene".into())
            }
        );
        assert_eq!(doc.children_data[0].data["bg"], "red");
        assert_eq!(doc.children_data[0].children_data.len(), 1);
    }

    #[test]
    fn data_patch_needs_only_an_id() {
        let mut doc = base_doc();
        let patch = NodeTemplate {
            id: "title".into(),
            data: json!({ "words": ["z"] }).as_object().unwrap().clone(),
            ..NodeTemplate::default()
        };
        let out = PresetOutput::new(PartialDocument {
            children_data: Some(vec![patch]),
            ..PartialDocument::default()
        });
        let report = merge_preset(&mut doc, out, PresetType::Data).unwrap();
        assert_eq!(
            report.outcome,
            MergeOutcome::Applied {
                target_id: Some("title".into())
            }
        );
        let title = &doc.children_data[0].children_data[0];
        assert_eq!(title.data["words"], json!(["a", "z"]));
        assert_eq!(title.component_id, "TextAtom");
    }

    #[test]
    fn incomplete_nodes_are_rejected_for_full_and_children() {
        for t in [PresetType::Full, PresetType::Children] {
            let mut doc = base_doc();
            let before = doc.clone();
            let mut out = PresetOutput::new(PartialDocument {
                children_data: Some(vec![NodeTemplate {
                    id: "loose".into(),
                    ..NodeTemplate::default()
                }]),
                ..PartialDocument::default()
            });
            out.output.config = Some(json!({ "fps": 60 }).as_object().unwrap().clone());
            assert!(merge_preset(&mut doc, out, t).is_err());
            assert_eq!(doc, before);
        }
    }

    #[test]
    fn context_merge_is_shallow() {
        let mut doc = base_doc();
        let patch = NodeBuilder::atom("title", "TextAtom")
            .fit_duration_to("BaseScene")
            .build()
            .unwrap();
        merge_preset(&mut doc, output_with(vec![patch]), PresetType::Context).unwrap();
        let timing = doc.children_data[0].children_data[0]
            .context
            .timing
            .clone()
            .unwrap();
        assert_eq!(timing.fit_duration_to.as_deref(), Some("BaseScene"));
        assert_eq!(timing.start, None);
        assert_eq!(doc.children_data[0].children_data[0].data["text"], "Hi");
    }

    #[test]
    fn effects_are_replaced_not_merged() {
        let mut doc = base_doc();
        let patch = NodeBuilder::atom("title", "TextAtom")
            .effect(Effect::new("e1", "Zoom"))
            .effect(Effect::new("e2", "Blur"))
            .build()
            .unwrap();
        merge_preset(&mut doc, output_with(vec![patch]), PresetType::Effects).unwrap();
        let effects: Vec<&str> = doc.children_data[0].children_data[0]
            .effects
            .iter()
            .map(|e| e.id.as_str())
            .collect();
        assert_eq!(effects, ["e1", "e2"]);
    }

    #[test]
    fn preset_type_wire_names() {
        let t: PresetType = serde_json::from_value(json!("effects")).unwrap();
        assert_eq!(t, PresetType::Effects);
    }
}
