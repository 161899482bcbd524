use serde_json::{Map, Value};

use crate::foundation::diagnostics::{Diagnostic, DiagnosticKind};
use crate::foundation::error::{PresetError, PresetResult};
use crate::merge::merger::{MergeOutcome, merge_preset};
use crate::preset::artifact::{PresetEntry, PresetRegistry, PresetSource};
use crate::preset::fetch::Fetcher;
use crate::preset::sandbox::{CompiledPreset, PresetFunction};
use crate::reference::base_data::BaseData;
use crate::reference::resolver::resolve_all;
use crate::scene::model::CompositionDocument;

/// Options for [`generate`].
#[derive(Clone, Debug)]
pub struct GenerateOpts {
    /// Host props passed to every preset as its second argument. The current document config is
    /// added under `config`; keys the host already set there win.
    pub props: Value,
    /// Fail the pass on the first per-preset problem instead of recording a diagnostic.
    pub stop_on_error: bool,
}

impl Default for GenerateOpts {
    fn default() -> Self {
        Self {
            props: Value::Object(Map::new()),
            stop_on_error: false,
        }
    }
}

/// Result of one generation pass.
#[derive(Clone, Debug)]
pub struct GenerationReport {
    pub document: CompositionDocument,
    pub diagnostics: Vec<Diagnostic>,
    /// Entries whose output changed the document.
    pub applied: usize,
}

impl GenerationReport {
    pub fn has_diagnostics(&self) -> bool {
        !self.diagnostics.is_empty()
    }
}

/// Runs every enabled entry in order against `base`.
///
/// Each entry's input is resolved against `base_data`, its preset is compiled and invoked with
/// `(resolvedInput, props)`, and the result is merged before the next entry runs, so later presets
/// observe earlier merges. A preset that cannot be found, compiled, run or merged contributes
/// nothing and leaves a diagnostic; the pass carries on unless `opts.stop_on_error` is set.
#[tracing::instrument(skip_all, fields(entries = entries.len()))]
pub fn generate(
    base: CompositionDocument,
    entries: &[PresetEntry],
    registry: &PresetRegistry,
    base_data: &BaseData,
    fetcher: &dyn Fetcher,
    opts: &GenerateOpts,
) -> PresetResult<GenerationReport> {
    let mut pass = Pass {
        document: base,
        diagnostics: Vec::new(),
        applied: 0,
        stop_on_error: opts.stop_on_error,
    };

    for entry in entries {
        if entry.disabled {
            tracing::debug!(preset = %entry.preset_id, "skipping disabled entry");
            continue;
        }
        pass.run_entry(entry, registry, base_data, fetcher, &opts.props)?;
    }

    Ok(GenerationReport {
        document: pass.document,
        diagnostics: pass.diagnostics,
        applied: pass.applied,
    })
}

struct Pass {
    document: CompositionDocument,
    diagnostics: Vec<Diagnostic>,
    applied: usize,
    stop_on_error: bool,
}

impl Pass {
    fn run_entry(
        &mut self,
        entry: &PresetEntry,
        registry: &PresetRegistry,
        base_data: &BaseData,
        fetcher: &dyn Fetcher,
        host_props: &Value,
    ) -> PresetResult<()> {
        let id = entry.preset_id.as_str();

        let Some(source) = registry.get(id) else {
            let err = PresetError::validation(format!("preset \"{id}\" is not registered"));
            return self.fail(id, DiagnosticKind::PresetNotFound, err);
        };

        let resolved = resolve_all(&entry.preset_input_data, base_data);
        for d in resolved.diagnostics {
            self.record(d.with_preset(id));
        }

        let compiled: CompiledPreset;
        let func: &dyn PresetFunction = match source {
            PresetSource::Native(f) => f.as_ref(),
            PresetSource::Serialized(artifact) => match artifact.compile() {
                Ok(c) => {
                    compiled = c;
                    &compiled
                }
                Err(e) => return self.fail(id, DiagnosticKind::PresetCompileError, e),
            },
        };

        let props = props_for(host_props, &self.document);
        let output = match func.invoke(&resolved.value, &props, fetcher) {
            Ok(Some(out)) => out,
            Ok(None) => {
                tracing::debug!(preset = id, "preset returned no contribution");
                return Ok(());
            }
            Err(e) => {
                let kind = invoke_error_kind(&e);
                return self.fail(id, kind, e);
            }
        };

        match merge_preset(&mut self.document, output, entry.preset_type) {
            Ok(report) => {
                for d in report.diagnostics {
                    self.record(d.with_preset(id));
                }
                match report.outcome {
                    MergeOutcome::Applied { target_id } => {
                        tracing::debug!(preset = id, preset_type = ?entry.preset_type, ?target_id, "merged");
                        self.applied += 1;
                    }
                    MergeOutcome::Skipped { reason } => {
                        tracing::debug!(preset = id, reason, "merge skipped");
                    }
                }
                Ok(())
            }
            Err(e) => self.fail(id, DiagnosticKind::MalformedPresetOutput, e),
        }
    }

    fn record(&mut self, d: Diagnostic) {
        tracing::warn!(kind = d.kind.as_str(), preset = d.preset_id.as_deref(), "{}", d.message);
        self.diagnostics.push(d);
    }

    fn fail(&mut self, preset_id: &str, kind: DiagnosticKind, err: PresetError) -> PresetResult<()> {
        if self.stop_on_error {
            return Err(err);
        }
        self.record(Diagnostic::new(kind, err.to_string()).with_preset(preset_id));
        Ok(())
    }
}

fn invoke_error_kind(e: &PresetError) -> DiagnosticKind {
    match e {
        PresetError::Compile(_) => DiagnosticKind::PresetCompileError,
        PresetError::MalformedOutput(_) | PresetError::Serde(_) => {
            DiagnosticKind::MalformedPresetOutput
        }
        _ => DiagnosticKind::PresetExecutionError,
    }
}

/// Host props with the document config layered under `props.config`.
fn props_for(host: &Value, document: &CompositionDocument) -> Value {
    let mut props = match host {
        Value::Object(m) => m.clone(),
        _ => Map::new(),
    };
    let mut config = match serde_json::to_value(&document.config) {
        Ok(Value::Object(m)) => m,
        _ => Map::new(),
    };
    if let Some(Value::Object(host_config)) = props.get("config") {
        for (k, v) in host_config {
            config.insert(k.clone(), v.clone());
        }
    }
    props.insert("config".to_owned(), Value::Object(config));
    Value::Object(props)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::merger::PresetType;
    use crate::preset::artifact::PresetArtifact;
    use crate::preset::fetch::NoFetcher;
    use crate::scene::dsl::{DocumentBuilder, NodeBuilder};
    use serde_json::json;

    fn base_doc() -> CompositionDocument {
        DocumentBuilder::new(1280, 720, 30.0, 10.0)
            .child(NodeBuilder::scene("BaseScene", "SceneFrame").build().unwrap())
            .build()
            .unwrap()
    }

    fn registry(presets: &[(&str, &str)]) -> PresetRegistry {
        presets
            .iter()
            .map(|(id, src)| PresetArtifact::new(*id, *src))
            .collect()
    }

    fn run(reg: &PresetRegistry, entries: &[PresetEntry], base_data: &BaseData) -> GenerationReport {
        generate(base_doc(), entries, reg, base_data, &NoFetcher, &GenerateOpts::default()).unwrap()
    }

    const TITLE: &str = r#"(input) => ({
        childrenData: [{ id: "title-" + input.n, componentId: "TextAtom", type: "atom", data: { text: input.text } }]
    })"#;

    #[test]
    fn entries_run_in_order_and_resolve_references() {
        let reg = registry(&[("title", TITLE)]);
        let data: BaseData = [("headline", json!("Hello"))].into_iter().collect();
        let entries = [
            PresetEntry::new("title", PresetType::Children, json!({ "n": 1, "text": "data:[headline]" })),
            PresetEntry::new("title", PresetType::Children, json!({ "n": 2, "text": "data:[headline] again" })),
        ];
        let report = run(&reg, &entries, &data);
        assert!(!report.has_diagnostics(), "{:?}", report.diagnostics);
        assert_eq!(report.applied, 2);

        let scene = &report.document.children_data[0];
        let ids: Vec<&str> = scene.children_data.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, ["title-1", "title-2"]);
        assert_eq!(scene.children_data[1].data["text"], json!("Hello again"));
    }

    #[test]
    fn disabled_entries_are_skipped() {
        let reg = registry(&[("title", TITLE)]);
        let entries = [PresetEntry::new("title", PresetType::Children, json!({ "n": 1, "text": "x" })).disabled()];
        let report = run(&reg, &entries, &BaseData::new());
        assert_eq!(report.applied, 0);
        assert!(report.document.children_data[0].children_data.is_empty());
    }

    #[test]
    fn failures_become_diagnostics_and_the_pass_continues() {
        let reg = registry(&[
            ("title", TITLE),
            ("broken", "(input) => nope"),
            ("throws", "(input) => input.a.b"),
            ("weird", "() => 42"),
        ]);
        let entries = [
            PresetEntry::new("missing", PresetType::Full, json!({})),
            PresetEntry::new("broken", PresetType::Full, json!({})),
            PresetEntry::new("throws", PresetType::Full, json!({})),
            PresetEntry::new("weird", PresetType::Full, json!({})),
            PresetEntry::new("title", PresetType::Children, json!({ "n": 1, "text": "data:[gone]" })),
        ];
        let report = run(&reg, &entries, &BaseData::new());
        let kinds: Vec<DiagnosticKind> = report.diagnostics.iter().map(|d| d.kind).collect();
        assert_eq!(
            kinds,
            [
                DiagnosticKind::PresetNotFound,
                DiagnosticKind::PresetCompileError,
                DiagnosticKind::PresetExecutionError,
                DiagnosticKind::MalformedPresetOutput,
                DiagnosticKind::ReferenceNotFound,
            ]
        );
        assert_eq!(report.diagnostics[1].preset_id.as_deref(), Some("broken"));
        assert_eq!(report.applied, 1);
        assert_eq!(
            report.document.children_data[0].children_data[0].data["text"],
            json!("data:[gone]")
        );
    }

    #[test]
    fn strict_mode_stops_at_the_first_failure() {
        let reg = registry(&[("broken", "(input) => nope")]);
        let entries = [PresetEntry::new("broken", PresetType::Full, json!({}))];
        let opts = GenerateOpts {
            stop_on_error: true,
            ..GenerateOpts::default()
        };
        let err = generate(base_doc(), &entries, &reg, &BaseData::new(), &NoFetcher, &opts).unwrap_err();
        assert!(matches!(err, PresetError::Compile(_)));
    }

    #[test]
    fn props_carry_document_config_under_host_values() {
        let reg = registry(&[(
            "sized",
            "(input, props) => ({ config: { duration: props.config.duration + 5, label: props.config.width + 'x' + props.config.height } })",
        )]);
        let entries = [PresetEntry::new("sized", PresetType::Full, Value::Null)];
        let opts = GenerateOpts {
            props: json!({ "config": { "height": 1 } }),
            stop_on_error: false,
        };
        let report = generate(base_doc(), &entries, &reg, &BaseData::new(), &NoFetcher, &opts).unwrap();
        assert_eq!(report.document.config.duration, 15.0);
        assert_eq!(report.document.config.extra["label"], json!("1280x1"));
    }

    #[test]
    fn later_presets_see_earlier_merges() {
        let reg = registry(&[
            ("longer", "(i, props) => ({ config: { duration: props.config.duration * 2 } })"),
        ]);
        let entries = [
            PresetEntry::new("longer", PresetType::Full, Value::Null),
            PresetEntry::new("longer", PresetType::Full, Value::Null),
        ];
        let report = run(&reg, &entries, &BaseData::new());
        assert_eq!(report.document.config.duration, 40.0);
    }

    #[test]
    fn native_presets_run_alongside_serialized_ones() {
        let mut reg = registry(&[("title", TITLE)]);
        reg.insert_native("dim", |_: &Value, _: &Value| -> PresetResult<Value> {
            Ok(json!({ "childrenData": [{ "id": "BaseScene", "type": "scene", "data": { "dim": true } }] }))
        });
        let entries = [PresetEntry::new("dim", PresetType::Data, Value::Null)];
        let report = run(&reg, &entries, &BaseData::new());
        assert_eq!(report.document.children_data[0].data["dim"], json!(true));
    }

    #[test]
    fn data_preset_patches_by_id_alone() {
        let reg = registry(&[(
            "palette",
            "() => ({ childrenData: [{ id: 'BaseScene', data: { colors: ['#222'] } }] })",
        )]);
        let mut base = base_doc();
        base.children_data[0].data.insert("colors".into(), json!(["#111"]));
        let entries = [PresetEntry::new("palette", PresetType::Data, Value::Null)];
        let report = generate(base, &entries, &reg, &BaseData::new(), &NoFetcher, &GenerateOpts::default())
            .unwrap();
        assert!(!report.has_diagnostics(), "{:?}", report.diagnostics);
        assert_eq!(report.applied, 1);
        let scene = &report.document.children_data[0];
        assert_eq!(scene.data["colors"], json!(["#111", "#222"]));
        assert_eq!(scene.component_id, "SceneFrame");
    }

    #[test]
    fn invalid_config_patch_is_reported_and_ignored() {
        let reg = registry(&[("bad", "() => ({ config: { duration: 'long' } })")]);
        let entries = [PresetEntry::new("bad", PresetType::Full, Value::Null)];
        let report = run(&reg, &entries, &BaseData::new());
        assert_eq!(report.diagnostics[0].kind, DiagnosticKind::MalformedPresetOutput);
        assert_eq!(report.document.config.duration, 10.0);
    }
}
