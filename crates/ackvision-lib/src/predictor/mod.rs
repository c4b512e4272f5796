//! Feature encoding, model registry and inference

pub mod encoding;
pub mod features;
pub mod inference;
pub mod model;
pub mod output;
pub mod registry;

pub use encoding::{CategoricalEncoder, EncodingRegistry, StandardScaler};
pub use features::{canonical_key, FeatureColumn, FeatureKind, FeatureVectorBuilder, FEATURE_COLUMNS};
pub use inference::InferenceEngine;
pub use model::{ModelHandle, ModelKind, ModelOutput, OnnxModel};
pub use output::{clamp_score, LabelTable, LabelTables, UNKNOWN_LABEL};
pub use registry::{ModelName, ModelRegistry};
