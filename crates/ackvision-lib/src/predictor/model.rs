//! Trained model handles backed by ONNX graphs run through tract
//!
//! Every model is an ONNX export taking `float32 [N, 9]` scaled features.
//! The first float output is read: one value for the regressor, class
//! probabilities for classifiers, centroid distances for the clusterer.

use crate::error::{PipelineError, Result};
use crate::models::{EncodedFeatureVector, NUM_FEATURES};
use std::path::Path;
use tract_onnx::pb::{tensor_shape_proto, type_proto, ModelProto};
use tract_onnx::prelude::*;

/// Metadata key holding the clusterer's training inertia
pub const INERTIA_METADATA_KEY: &str = "inertia";

type TractModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Raw output of a model before label decoding
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ModelOutput {
    /// Continuous value from a regressor
    Value(f64),
    /// Class or cluster index
    Class(usize),
}

/// An opaque trained predictor
pub trait ModelHandle: Send + Sync {
    /// Run the model on one encoded feature vector
    fn predict(&self, features: &EncodedFeatureVector) -> Result<ModelOutput>;

    /// Input arity the model was trained with
    fn n_features(&self) -> usize;

    /// Number of distinct output codes; `None` for regressors
    fn n_outputs(&self) -> Option<usize>;

    /// Within-cluster sum of squares recorded at training time, for clusterers
    fn training_inertia(&self) -> Option<f64> {
        None
    }
}

/// How the output row of a graph is turned into a `ModelOutput`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    /// First value is the prediction
    Regression,
    /// Highest probability wins; ties go to the smallest class index
    Classification,
    /// Smallest distance wins
    Clustering,
}

/// A model loaded from an ONNX file and optimized into a runnable plan
pub struct OnnxModel {
    name: String,
    kind: ModelKind,
    plan: TractModel,
    output_slot: usize,
    n_features: usize,
    n_outputs: Option<usize>,
    inertia: Option<f64>,
}

impl std::fmt::Debug for OnnxModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxModel")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("n_features", &self.n_features)
            .field("n_outputs", &self.n_outputs)
            .finish()
    }
}

impl OnnxModel {
    /// Parse, check and optimize an ONNX model file
    pub fn load(name: &str, path: &Path, kind: ModelKind) -> Result<Self> {
        let invalid = |reason: String| PipelineError::ArtifactInvalid {
            name: name.to_string(),
            reason,
        };

        let proto = tract_onnx::onnx()
            .proto_model_for_path(path)
            .map_err(|e| invalid(format!("failed to parse ONNX model: {e}")))?;

        let n_features = declared_input_width(&proto).unwrap_or(NUM_FEATURES);
        if n_features != NUM_FEATURES {
            return Err(PipelineError::ShapeMismatch {
                name: name.to_string(),
                expected: NUM_FEATURES,
                actual: n_features,
            });
        }

        let inertia = match metadata(&proto, INERTIA_METADATA_KEY) {
            Some(raw) => Some(
                raw.trim()
                    .parse::<f64>()
                    .map_err(|_| invalid(format!("non-numeric inertia '{raw}'")))?,
            ),
            None => None,
        };

        let typed = tract_onnx::onnx()
            .model_for_proto_model(&proto)
            .and_then(|model| model.with_input_fact(0, f32::fact([1, NUM_FEATURES]).into()))
            .and_then(|model| model.into_optimized())
            .map_err(|e| invalid(format!("failed to build model: {e}")))?;

        let mut output = None;
        for slot in 0..typed.outputs.len() {
            let fact = typed
                .output_fact(slot)
                .map_err(|e| invalid(e.to_string()))?;
            if fact.datum_type == f32::datum_type() {
                output = Some((slot, fact.shape.as_concrete().map(|dims| dims.to_vec())));
                break;
            }
        }
        let (output_slot, dims) =
            output.ok_or_else(|| invalid("no float32 output".to_string()))?;
        let width = dims
            .and_then(|dims| dims.last().copied())
            .ok_or_else(|| invalid("output shape is not fixed".to_string()))?;

        let n_outputs = match kind {
            ModelKind::Regression => None,
            ModelKind::Classification | ModelKind::Clustering if width == 0 => {
                return Err(invalid("empty output row".to_string()));
            }
            ModelKind::Classification | ModelKind::Clustering => Some(width),
        };

        let plan = typed
            .into_runnable()
            .map_err(|e| invalid(format!("failed to create runnable model: {e}")))?;

        Ok(Self {
            name: name.to_string(),
            kind,
            plan,
            output_slot,
            n_features,
            n_outputs,
            inertia,
        })
    }

    fn failure(&self, reason: impl std::fmt::Display) -> PipelineError {
        PipelineError::Inference {
            name: self.name.clone(),
            reason: reason.to_string(),
        }
    }
}

impl ModelHandle for OnnxModel {
    fn predict(&self, features: &EncodedFeatureVector) -> Result<ModelOutput> {
        let data: Vec<f32> = features.as_slice().iter().map(|&v| v as f32).collect();
        let input = Tensor::from_shape(&[1, NUM_FEATURES], &data).map_err(|e| self.failure(e))?;

        let outputs = self
            .plan
            .run(tvec!(input.into()))
            .map_err(|e| self.failure(e))?;
        let output = outputs
            .get(self.output_slot)
            .ok_or_else(|| self.failure("missing output"))?;
        let row: Vec<f64> = output
            .to_array_view::<f32>()
            .map_err(|e| self.failure(e))?
            .iter()
            .map(|&v| v as f64)
            .collect();

        let picked = match self.kind {
            ModelKind::Regression => row.first().map(|&v| ModelOutput::Value(v)),
            ModelKind::Classification => best_index(&row, |a, b| a > b).map(ModelOutput::Class),
            ModelKind::Clustering => best_index(&row, |a, b| a < b).map(ModelOutput::Class),
        };
        picked.ok_or_else(|| self.failure("empty output"))
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn n_outputs(&self) -> Option<usize> {
        self.n_outputs
    }

    fn training_inertia(&self) -> Option<f64> {
        self.inertia
    }
}

/// Index of the first value that beats every other; NaN never wins
fn best_index(values: &[f64], better: impl Fn(f64, f64) -> bool) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (idx, &value) in values.iter().enumerate() {
        if value.is_nan() {
            continue;
        }
        match best {
            Some(b) if !better(value, values[b]) => {}
            _ => best = Some(idx),
        }
    }
    best
}

/// Fixed width of the first graph input, if declared
fn declared_input_width(proto: &ModelProto) -> Option<usize> {
    let input = proto.graph.as_ref()?.input.first()?;
    let type_proto::Value::TensorType(tensor) = input.r#type.as_ref()?.value.as_ref()? else {
        return None;
    };
    match tensor.shape.as_ref()?.dim.last()?.value.as_ref()? {
        tensor_shape_proto::dimension::Value::DimValue(width) => usize::try_from(*width).ok(),
        _ => None,
    }
}

fn metadata<'a>(proto: &'a ModelProto, key: &str) -> Option<&'a str> {
    proto
        .metadata_props
        .iter()
        .find(|entry| entry.key == key)
        .map(|entry| entry.value.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn fixture(file: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(file)
    }

    fn model(file: &str, kind: ModelKind) -> OnnxModel {
        OnnxModel::load(file, &fixture(&format!("models/{file}.onnx")), kind).unwrap()
    }

    fn vector(first: f64, gpa: f64) -> EncodedFeatureVector {
        let mut values = [0.0; NUM_FEATURES];
        values[0] = first;
        values[3] = gpa;
        EncodedFeatureVector::new(values)
    }

    #[test]
    fn test_linear_regressor() {
        let linear = model("linear", ModelKind::Regression);
        assert_eq!(linear.n_features(), NUM_FEATURES);
        assert_eq!(linear.n_outputs(), None);
        assert_eq!(linear.predict(&vector(0.0, 0.0)).unwrap(), ModelOutput::Value(60.0));
        assert_eq!(linear.predict(&vector(1.0, 0.0)).unwrap(), ModelOutput::Value(68.0));
    }

    #[test]
    fn test_decision_tree_goes_left_on_equal() {
        let tree = model("decision_tree", ModelKind::Classification);
        assert_eq!(tree.n_outputs(), Some(2));
        // gpa exactly at the root threshold goes left
        assert_eq!(tree.predict(&vector(1.0, -0.75)).unwrap(), ModelOutput::Class(0));
        assert_eq!(tree.predict(&vector(-1.0, 0.0)).unwrap(), ModelOutput::Class(0));
        assert_eq!(tree.predict(&vector(-0.5, 0.0)).unwrap(), ModelOutput::Class(1));
    }

    #[test]
    fn test_knn_majority_vote() {
        let knn = model("knn", ModelKind::Classification);
        assert_eq!(knn.n_outputs(), Some(3));
        let high = EncodedFeatureVector::new([1.0, 1.0, 1.0, 1.0, -1.25, -1.0, 1.0, 1.0, 1.0]);
        let low = EncodedFeatureVector::new([-1.0, -1.0, -1.0, -1.0, 0.0, 1.0, -1.0, -1.0, -1.0]);
        assert_eq!(knn.predict(&high).unwrap(), ModelOutput::Class(0));
        assert_eq!(knn.predict(&low).unwrap(), ModelOutput::Class(1));
        assert_eq!(
            knn.predict(&EncodedFeatureVector::new([0.05; NUM_FEATURES])).unwrap(),
            ModelOutput::Class(2)
        );
    }

    #[test]
    fn test_kmeans_nearest_centroid_and_inertia() {
        let kmeans = model("kmeans", ModelKind::Clustering);
        assert_eq!(kmeans.n_outputs(), Some(3));
        assert_eq!(kmeans.training_inertia(), Some(412.5731));
        let high = EncodedFeatureVector::new([0.9, 1.0, 1.0, 1.0, -1.25, -1.0, 1.0, 1.0, 1.0]);
        assert_eq!(kmeans.predict(&high).unwrap(), ModelOutput::Class(2));
    }

    #[test]
    fn test_input_width_mismatch_rejected() {
        let err = OnnxModel::load(
            "linear",
            &fixture("linear_4_features.onnx"),
            ModelKind::Regression,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::ShapeMismatch { expected: 9, actual: 4, .. }
        ));
    }

    #[test]
    fn test_unparsable_file_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("knn.onnx");
        std::fs::write(&path, b"not a protobuf").unwrap();
        assert!(matches!(
            OnnxModel::load("knn", &path, ModelKind::Classification),
            Err(PipelineError::ArtifactInvalid { ref name, .. }) if name == "knn"
        ));
    }

    #[test]
    fn test_best_index_ties_and_nan() {
        let max = |a: f64, b: f64| a > b;
        assert_eq!(best_index(&[0.5, 0.5], max), Some(0));
        assert_eq!(best_index(&[f64::NAN, 0.2, 0.7], max), Some(2));
        assert_eq!(best_index(&[3.0, 1.0, 2.0], |a, b| a < b), Some(1));
        assert_eq!(best_index(&[], max), None);
        assert_eq!(best_index(&[f64::NAN], max), None);
    }
}
