//! Error types for the encoding and inference pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// An artifact that could not be found at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingArtifact {
    pub name: String,
    pub path: PathBuf,
}

impl std::fmt::Display for MissingArtifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.path.display())
    }
}

/// Errors raised while loading artifacts or running inference
#[derive(Error, Debug)]
pub enum PipelineError {
    /// One or more required input keys are absent
    #[error("Missing fields: {0:?}")]
    MissingField(Vec<String>),

    /// A field is present but cannot be converted to its declared type
    #[error("Invalid value for '{field}': {raw}")]
    InvalidValue { field: String, raw: String },

    /// A categorical value outside the label set seen at training time
    #[error("Unknown category for '{field}': '{value}'")]
    UnknownCategory { field: String, value: String },

    /// Required artifact files are absent
    #[error("Artifact files not found: {}", format_missing(.0))]
    ArtifactMissing(Vec<MissingArtifact>),

    /// An artifact exists but could not be parsed or is inconsistent
    #[error("Invalid artifact '{name}': {reason}")]
    ArtifactInvalid { name: String, reason: String },

    /// A model artifact does not accept the feature vector arity
    #[error("Model '{name}' expects {actual} features, pipeline produces {expected}")]
    ShapeMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    /// A label table disagrees with the artifact it decodes
    #[error("Label table '{table}' mismatch: {reason}")]
    LabelTableMismatch { table: String, reason: String },

    /// A loaded model failed while running
    #[error("Inference failed in '{name}': {reason}")]
    Inference { name: String, reason: String },

    /// A model was requested before the registry held it
    #[error("Model '{0}' not loaded")]
    NotLoaded(String),

    /// CSV input that does not parse (ragged rows, bad encoding)
    #[error("Malformed CSV: {0}")]
    MalformedCsv(String),

    /// Reference dataset could not be read
    #[error("Dataset error: {0}")]
    Dataset(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Errors caused by bad request input rather than server state
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            PipelineError::MissingField(_)
                | PipelineError::InvalidValue { .. }
                | PipelineError::UnknownCategory { .. }
                | PipelineError::MalformedCsv(_)
        )
    }
}

impl From<csv::Error> for PipelineError {
    fn from(err: csv::Error) -> Self {
        PipelineError::MalformedCsv(err.to_string())
    }
}

fn format_missing(missing: &[MissingArtifact]) -> String {
    missing
        .iter()
        .map(|m| m.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
