//! Model registry: the four trained models, loaded once at startup

use crate::artifacts::ArtifactDir;
use crate::error::{PipelineError, Result};
use crate::models::NUM_FEATURES;
use std::collections::HashMap;
use std::fmt;
use tracing::info;

use super::model::{ModelHandle, ModelKind, OnnxModel};

/// Fixed logical names of the four models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelName {
    Linear,
    DecisionTree,
    Knn,
    KMeans,
}

impl ModelName {
    pub const ALL: [ModelName; 4] = [
        ModelName::Linear,
        ModelName::DecisionTree,
        ModelName::Knn,
        ModelName::KMeans,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelName::Linear => "linear",
            ModelName::DecisionTree => "decision_tree",
            ModelName::Knn => "knn",
            ModelName::KMeans => "kmeans",
        }
    }

    pub fn file_name(&self) -> &'static str {
        match self {
            ModelName::Linear => "linear.onnx",
            ModelName::DecisionTree => "decision_tree.onnx",
            ModelName::Knn => "knn.onnx",
            ModelName::KMeans => "kmeans.onnx",
        }
    }

    pub fn kind(&self) -> ModelKind {
        match self {
            ModelName::Linear => ModelKind::Regression,
            ModelName::DecisionTree | ModelName::Knn => ModelKind::Classification,
            ModelName::KMeans => ModelKind::Clustering,
        }
    }
}

impl fmt::Display for ModelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only set of loaded model handles
pub struct ModelRegistry {
    models: HashMap<ModelName, Box<dyn ModelHandle>>,
}

impl fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.models.keys().map(ModelName::as_str).collect();
        names.sort_unstable();
        f.debug_struct("ModelRegistry").field("models", &names).finish()
    }
}

impl ModelRegistry {
    /// Load all four models. Every missing file is reported in one error.
    pub fn load_all(dir: &ArtifactDir) -> Result<Self> {
        let expected: Vec<(&str, &str)> = ModelName::ALL
            .iter()
            .map(|m| (m.as_str(), m.file_name()))
            .collect();
        dir.require_all(&expected)?;

        let mut handles: Vec<(ModelName, Box<dyn ModelHandle>)> = Vec::new();
        for name in ModelName::ALL {
            let path = dir.path_of(name.file_name());
            let model = OnnxModel::load(name.as_str(), &path, name.kind())?;
            handles.push((name, Box::new(model)));
        }

        Self::from_handles(handles)
    }

    /// Build a registry from in-memory handles, checking each one
    pub fn from_handles(
        handles: impl IntoIterator<Item = (ModelName, Box<dyn ModelHandle>)>,
    ) -> Result<Self> {
        let mut models = HashMap::new();
        for (name, handle) in handles {
            if handle.n_features() != NUM_FEATURES {
                return Err(PipelineError::ShapeMismatch {
                    name: name.to_string(),
                    expected: NUM_FEATURES,
                    actual: handle.n_features(),
                });
            }
            info!(model = %name, outputs = ?handle.n_outputs(), "Model loaded");
            models.insert(name, handle);
        }
        Ok(Self { models })
    }

    pub fn get(&self, name: ModelName) -> Result<&dyn ModelHandle> {
        self.models
            .get(&name)
            .map(|m| &**m)
            .ok_or_else(|| PipelineError::NotLoaded(name.to_string()))
    }

    pub fn is_complete(&self) -> bool {
        ModelName::ALL.iter().all(|n| self.models.contains_key(n))
    }
}
