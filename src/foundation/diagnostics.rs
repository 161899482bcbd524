//! Non-fatal diagnostics collected while resolving references and merging presets.
//!
//! The core never prints or notifies on its own. Every workaround it applies (a missing
//! reference left in place, a range that could not be applied, an attachment fallback, a preset
//! that failed and was skipped) is recorded as a [`Diagnostic`] and handed back to the host.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DiagnosticKind {
    ReferenceNotFound,
    RangeInvalid,
    AttachmentTargetNotFound,
    PresetNotFound,
    PresetCompileError,
    PresetExecutionError,
    MalformedPresetOutput,
}

impl DiagnosticKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ReferenceNotFound => "reference not found",
            Self::RangeInvalid => "invalid range",
            Self::AttachmentTargetNotFound => "attachment target not found",
            Self::PresetNotFound => "preset not found",
            Self::PresetCompileError => "preset compile error",
            Self::PresetExecutionError => "preset execution error",
            Self::MalformedPresetOutput => "malformed preset output",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    /// Preset id the diagnostic was raised for, when raised inside a generation pass.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset_id: Option<String>,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            preset_id: None,
        }
    }

    pub fn reference_not_found(key: &str) -> Self {
        Self::new(
            DiagnosticKind::ReferenceNotFound,
            format!("reference \"{key}\" is not defined"),
        )
    }

    pub fn range_invalid(range: &str, reason: impl fmt::Display) -> Self {
        Self::new(
            DiagnosticKind::RangeInvalid,
            format!("range \"{range}\" ignored: {reason}"),
        )
    }

    pub fn with_preset(mut self, preset_id: impl Into<String>) -> Self {
        self.preset_id = Some(preset_id.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.preset_id {
            Some(id) => write!(f, "[{id}] {}: {}", self.kind.as_str(), self.message),
            None => write!(f, "{}: {}", self.kind.as_str(), self.message),
        }
    }
}
