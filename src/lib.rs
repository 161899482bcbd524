#![forbid(unsafe_code)]

//! Preset merging and `data:[key][range]` reference templating for composition documents.
//!
//! A generation pass takes a base [`CompositionDocument`], an ordered list of [`PresetEntry`]s and
//! a [`BaseData`] pool. For every enabled entry it resolves references in the entry's input,
//! runs the preset function and folds the result into the document with [`merge_preset`].

pub(crate) mod expression;
pub mod foundation;
pub mod merge;
pub mod pipeline;
pub mod preset;
pub mod reference;
pub mod scene;
pub mod tree;

pub use foundation::diagnostics::{Diagnostic, DiagnosticKind};
pub use foundation::error::{PresetError, PresetResult};
pub use merge::merger::{MergeOutcome, MergeReport, PresetType, merge_data, merge_preset};
pub use pipeline::generate::{GenerateOpts, GenerationReport, generate};
pub use pipeline::project::{MissingReferences, ProjectFile};
pub use preset::artifact::{PresetArtifact, PresetEntry, PresetRegistry};
pub use preset::fetch::{Fetcher, NoFetcher, StaticFetcher};
pub use preset::sandbox::{CompiledPreset, PresetFunction, compile};
pub use reference::base_data::{BaseData, ReferenceItem, ReferenceType};
pub use reference::range::{RangeError, RangeKind, apply_index_range, apply_time_range, classify};
pub use reference::resolver::{
    OVERRIDE_KEY, Resolved, resolve_all, resolve_flexible, validate_references,
};
pub use scene::dsl::{DocumentBuilder, NodeBuilder};
pub use scene::model::{
    CompositionDocument, DEFAULT_ATTACHMENT_ID, DocumentConfig, Effect, Node, NodeContext,
    NodeType, Timing,
};
pub use scene::output::{
    NodeTemplate, PartialDocument, PresetOptions, PresetOutput, is_empty_result,
};
pub use tree::matcher::{ComponentQuery, find_by_id, find_by_query};
pub use tree::replacer::{replace_by_id, replace_node};
