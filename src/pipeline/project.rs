use std::collections::{HashMap, HashSet};
use std::io::Read;
use std::path::Path;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::foundation::error::{PresetError, PresetResult};
use crate::pipeline::generate::{GenerateOpts, GenerationReport, generate};
use crate::preset::artifact::{PresetArtifact, PresetEntry, PresetRegistry};
use crate::preset::fetch::StaticFetcher;
use crate::reference::base_data::{BaseData, ReferenceItem};
use crate::reference::resolver::validate_references;
use crate::scene::model::CompositionDocument;

/// Everything one generation pass needs, as a single JSON file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProjectFile {
    pub base_document: CompositionDocument,
    pub references: Vec<ReferenceItem>,
    pub presets: Vec<PresetArtifact>,
    pub entries: Vec<PresetEntry>,
    pub props: Map<String, Value>,
    /// Canned `fetch(url)` responses, keyed by url.
    pub fetch_fixtures: HashMap<String, Value>,
}

/// Missing reference keys of one entry, as reported by [`ProjectFile::missing_references`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingReferences {
    pub index: usize,
    pub preset_id: String,
    pub keys: Vec<String>,
}

impl ProjectFile {
    pub fn from_path(path: impl AsRef<Path>) -> PresetResult<Self> {
        let path = path.as_ref();
        let f = std::fs::File::open(path)
            .with_context(|| format!("open project '{}'", path.display()))
            .map_err(PresetError::from)?;
        Self::from_reader(std::io::BufReader::new(f))
    }

    pub fn from_reader(r: impl Read) -> PresetResult<Self> {
        let project: Self = serde_json::from_reader(r)?;
        Ok(project)
    }

    /// Checks the base document and that every entry names a known preset.
    pub fn validate(&self) -> PresetResult<()> {
        self.base_document.validate()?;

        let ids: HashSet<&str> = self.presets.iter().map(|p| p.id.as_str()).collect();
        for (i, e) in self.entries.iter().enumerate() {
            if !ids.contains(e.preset_id.as_str()) {
                return Err(PresetError::validation(format!(
                    "entries[{i}] names unknown preset \"{}\"",
                    e.preset_id
                )));
            }
        }
        Ok(())
    }

    pub fn base_data(&self) -> BaseData {
        BaseData::from_items(self.references.iter().cloned())
    }

    pub fn registry(&self) -> PresetRegistry {
        self.presets.iter().cloned().collect()
    }

    pub fn fetcher(&self) -> StaticFetcher {
        self.fetch_fixtures
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Reference keys each enabled entry uses but the project does not define.
    pub fn missing_references(&self) -> Vec<MissingReferences> {
        let base = self.base_data();
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| !e.disabled)
            .filter_map(|(index, e)| {
                let keys = validate_references(&e.preset_input_data, &base);
                (!keys.is_empty()).then(|| MissingReferences {
                    index,
                    preset_id: e.preset_id.clone(),
                    keys,
                })
            })
            .collect()
    }

    /// Runs one generation pass over a copy of the base document.
    pub fn generate(&self, stop_on_error: bool) -> PresetResult<GenerationReport> {
        let opts = GenerateOpts {
            props: Value::Object(self.props.clone()),
            stop_on_error,
        };
        generate(
            self.base_document.clone(),
            &self.entries,
            &self.registry(),
            &self.base_data(),
            &self.fetcher(),
            &opts,
        )
    }
}
