//! Inference facade over the model registry
//!
//! One operation per model. Each is a pure function of the encoded vector
//! and the loaded model; nothing is cached between calls.

use super::model::ModelOutput;
use super::output::{clamp_score, LabelTable, LabelTables, UNKNOWN_LABEL};
use super::registry::{ModelName, ModelRegistry};
use crate::error::Result;
use crate::models::{EncodedFeatureVector, Prediction};
use crate::observability::ServiceMetrics;
use std::time::Instant;
use tracing::{debug, warn};

/// Inference latency above which a warning is logged
const SLOW_INFERENCE_MS: u128 = 5;

/// Runs the four models and decodes their outputs
pub struct InferenceEngine {
    models: ModelRegistry,
    labels: LabelTables,
    metrics: Option<ServiceMetrics>,
}

impl std::fmt::Debug for InferenceEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceEngine")
            .field("models", &self.models)
            .field("labels", &self.labels)
            .finish()
    }
}

impl InferenceEngine {
    /// Pair models with their label tables; each table must match its
    /// model's output cardinality.
    pub fn new(models: ModelRegistry, labels: LabelTables) -> Result<Self> {
        labels
            .pass_fail
            .verify_cardinality(models.get(ModelName::DecisionTree)?.n_outputs())?;
        labels
            .performance
            .verify_cardinality(models.get(ModelName::Knn)?.n_outputs())?;
        labels
            .risk
            .verify_cardinality(models.get(ModelName::KMeans)?.n_outputs())?;
        models.get(ModelName::Linear)?;

        Ok(Self {
            models,
            labels,
            metrics: None,
        })
    }

    /// Record latency and unmapped codes into the service metrics
    pub fn with_metrics(mut self, metrics: ServiceMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn models(&self) -> &ModelRegistry {
        &self.models
    }

    pub fn labels(&self) -> &LabelTables {
        &self.labels
    }

    /// Unclamped regressor output, as scored during evaluation
    pub fn raw_score(&self, features: &EncodedFeatureVector) -> Result<f64> {
        let raw = match self.models.get(ModelName::Linear)?.predict(features)? {
            ModelOutput::Value(v) => v,
            ModelOutput::Class(c) => c as f64,
        };
        Ok(raw)
    }

    /// Exam score from the regressor, clamped to [0, 100] and rounded
    pub fn predict_score(&self, features: &EncodedFeatureVector) -> Result<f64> {
        Ok(clamp_score(self.raw_score(features)?))
    }

    pub fn predict_pass_fail(&self, features: &EncodedFeatureVector) -> Result<String> {
        let code = self.code_of(ModelName::DecisionTree, features)?;
        Ok(self.decode(&self.labels.pass_fail, code))
    }

    pub fn predict_performance(&self, features: &EncodedFeatureVector) -> Result<String> {
        let code = self.code_of(ModelName::Knn, features)?;
        Ok(self.decode(&self.labels.performance, code))
    }

    pub fn assign_risk_cluster(&self, features: &EncodedFeatureVector) -> Result<String> {
        let code = self.cluster_of(features)?;
        Ok(self.decode(&self.labels.risk, code))
    }

    /// Raw cluster index from the clusterer, before relabeling
    pub fn cluster_of(&self, features: &EncodedFeatureVector) -> Result<usize> {
        self.code_of(ModelName::KMeans, features)
    }

    /// Run all four models on one vector
    pub fn predict(&self, features: &EncodedFeatureVector) -> Result<Prediction> {
        let start = Instant::now();

        let prediction = Prediction {
            exam_score: self.predict_score(features)?,
            pass_fail: self.predict_pass_fail(features)?,
            performance: self.predict_performance(features)?,
            risk_cluster: self.assign_risk_cluster(features)?,
        };

        let elapsed = start.elapsed();
        if let Some(metrics) = &self.metrics {
            metrics.observe_inference_latency(elapsed.as_secs_f64());
        }
        if elapsed.as_millis() > SLOW_INFERENCE_MS {
            warn!(
                elapsed_ms = elapsed.as_millis() as u64,
                "Inference exceeded {}ms target", SLOW_INFERENCE_MS
            );
        } else {
            debug!(elapsed_us = elapsed.as_micros() as u64, "Inference completed");
        }

        Ok(prediction)
    }

    /// Predict every vector in order; the first failure aborts the batch
    pub fn predict_batch(&self, batch: &[EncodedFeatureVector]) -> Result<Vec<Prediction>> {
        batch.iter().map(|v| self.predict(v)).collect()
    }

    fn code_of(&self, name: ModelName, features: &EncodedFeatureVector) -> Result<usize> {
        let code = match self.models.get(name)?.predict(features)? {
            ModelOutput::Class(c) => c,
            // a classifier emitting a non-integral value cannot be decoded
            ModelOutput::Value(v) if v >= 0.0 && v.fract() == 0.0 => v as usize,
            ModelOutput::Value(_) => usize::MAX,
        };
        Ok(code)
    }

    fn decode(&self, table: &LabelTable, code: usize) -> String {
        match table.decode(code) {
            Some(label) => label.to_string(),
            None => {
                warn!(
                    event = "unmapped_code",
                    table = table.name(),
                    code = code,
                    table_size = table.len(),
                    "Model produced a code outside its label table"
                );
                if let Some(metrics) = &self.metrics {
                    metrics.inc_unmapped_codes(table.name());
                }
                UNKNOWN_LABEL.to_string()
            }
        }
    }
}
