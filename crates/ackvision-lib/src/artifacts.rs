//! Locating and reading the artifacts produced by offline training

use crate::error::{MissingArtifact, PipelineError, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const SCALER: (&str, &str) = ("scaler", "scaler.json");
pub const PARTICIPATION_ENCODER: (&str, &str) =
    ("participation_encoder", "participation_encoder.json");
pub const EXTRA_ENCODER: (&str, &str) = ("extra_encoder", "extra_encoder.json");
pub const PASS_ENCODER: (&str, &str) = ("pass_encoder", "pass_encoder.json");
pub const PERFORMANCE_ENCODER: (&str, &str) = ("performance_encoder", "performance_encoder.json");
pub const RISK_MAP: (&str, &str) = ("risk_map", "risk_map.json");

/// Directory holding every artifact of one training run
#[derive(Debug, Clone)]
pub struct ArtifactDir {
    root: PathBuf,
}

impl ArtifactDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_of(&self, file: &str) -> PathBuf {
        self.root.join(file)
    }

    /// Check that every `(name, file)` exists, reporting all absent files at once
    pub fn require_all(&self, artifacts: &[(&str, &str)]) -> Result<()> {
        let missing: Vec<MissingArtifact> = artifacts
            .iter()
            .map(|(name, file)| (name, self.path_of(file)))
            .filter(|(_, path)| !path.is_file())
            .map(|(name, path)| MissingArtifact {
                name: name.to_string(),
                path,
            })
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(PipelineError::ArtifactMissing(missing))
        }
    }

    /// Read and deserialize one artifact
    pub fn read_json<T: DeserializeOwned>(&self, name: &str, file: &str) -> Result<T> {
        let path = self.path_of(file);
        let content = std::fs::read_to_string(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PipelineError::ArtifactMissing(vec![MissingArtifact {
                    name: name.to_string(),
                    path: path.clone(),
                }])
            } else {
                PipelineError::Io(e)
            }
        })?;

        debug!(artifact = %name, path = %path.display(), "Read artifact");

        serde_json::from_str(&content).map_err(|e| PipelineError::ArtifactInvalid {
            name: name.to_string(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_require_all_aggregates_missing() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("scaler.json"), "{}").unwrap();

        let artifacts = ArtifactDir::new(dir.path());
        let err = artifacts
            .require_all(&[SCALER, PARTICIPATION_ENCODER, EXTRA_ENCODER])
            .unwrap_err();

        match err {
            PipelineError::ArtifactMissing(missing) => {
                let names: Vec<_> = missing.iter().map(|m| m.name.as_str()).collect();
                assert_eq!(names, vec!["participation_encoder", "extra_encoder"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_read_json_reports_malformed_artifact() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("risk_map.json"), "not json").unwrap();

        let artifacts = ArtifactDir::new(dir.path());
        let result: Result<serde_json::Value> = artifacts.read_json(RISK_MAP.0, RISK_MAP.1);
        assert!(matches!(
            result,
            Err(PipelineError::ArtifactInvalid { ref name, .. }) if name == "risk_map"
        ));
    }
}
