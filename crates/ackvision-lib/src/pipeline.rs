//! End-to-end prediction pipeline
//!
//! `Pipeline::initialize` is the only way to obtain a pipeline, so a value of
//! this type always holds a complete, validated set of artifacts. After
//! construction it is immutable and meant to be shared behind an `Arc`.

use crate::advisory::{self, AdvisoryInputs};
use crate::artifacts::{self, ArtifactDir};
use crate::error::Result;
use crate::evaluation::ReferenceDataset;
use crate::models::{EncodedFeatureVector, FeatureRecord, Prediction, PredictionResponse};
use crate::observability::ServiceMetrics;
use crate::predictor::features::{canonicalize_headers, FeatureVectorBuilder};
use crate::predictor::output::RISK_RANKING;
use crate::predictor::{EncodingRegistry, InferenceEngine, LabelTables, ModelName, ModelRegistry};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Where to find the training artifacts
#[derive(Debug, Clone)]
pub struct ArtifactConfig {
    pub models_dir: PathBuf,
}

impl ArtifactConfig {
    pub fn new(models_dir: impl Into<PathBuf>) -> Self {
        Self {
            models_dir: models_dir.into(),
        }
    }
}

/// Outcome of comparing the stored cluster → risk map with the ranking
/// recomputed from reference scores
#[derive(Debug, Clone, PartialEq)]
pub enum RiskMappingCheck {
    Consistent,
    /// `expected[i]` is the label cluster `i` should carry
    Disagrees {
        expected: Vec<String>,
        stored: Vec<String>,
    },
    /// The check could not run, e.g. no score column
    Unavailable(String),
}

#[derive(Debug)]
pub struct Pipeline {
    artifacts: ArtifactDir,
    encoding: EncodingRegistry,
    engine: InferenceEngine,
}

impl Pipeline {
    /// Load and cross-check every artifact. All absent files are reported in
    /// a single error before anything is parsed.
    pub fn initialize(config: &ArtifactConfig) -> Result<Self> {
        let dir = ArtifactDir::new(&config.models_dir);

        let mut required = vec![
            artifacts::SCALER,
            artifacts::PARTICIPATION_ENCODER,
            artifacts::EXTRA_ENCODER,
            artifacts::PASS_ENCODER,
            artifacts::PERFORMANCE_ENCODER,
            artifacts::RISK_MAP,
        ];
        required.extend(ModelName::ALL.iter().map(|m| (m.as_str(), m.file_name())));
        dir.require_all(&required)?;

        let encoding = EncodingRegistry::load(&dir)?;
        let models = ModelRegistry::load_all(&dir)?;
        let labels = LabelTables::load(&dir)?;
        let engine = InferenceEngine::new(models, labels)?;

        info!(
            models_dir = %dir.root().display(),
            risk_labels = ?engine.labels().risk.labels(),
            "Pipeline initialized"
        );

        Ok(Self {
            artifacts: dir,
            encoding,
            engine,
        })
    }

    pub fn with_metrics(mut self, metrics: ServiceMetrics) -> Self {
        self.engine = self.engine.with_metrics(metrics);
        self
    }

    pub fn models_dir(&self) -> &Path {
        self.artifacts.root()
    }

    pub fn encoding(&self) -> &EncodingRegistry {
        &self.encoding
    }

    pub fn engine(&self) -> &InferenceEngine {
        &self.engine
    }

    pub fn encode(&self, record: &FeatureRecord) -> Result<EncodedFeatureVector> {
        FeatureVectorBuilder::new(&self.encoding).build(record)
    }

    pub fn predict_record(&self, record: &FeatureRecord) -> Result<PredictionResponse> {
        let prediction = self.engine.predict(&self.encode(record)?)?;
        Ok(respond(prediction, &AdvisoryInputs::from(record)))
    }

    /// Predict from an untyped record keyed by canonical names or dataset headers
    pub fn predict_map(&self, map: &Map<String, Value>) -> Result<PredictionResponse> {
        let map = canonicalize_headers(map.clone());
        self.predict_record(&FeatureRecord::from_map(&map)?)
    }

    /// Batch prediction. Output order matches input order; any failing row
    /// fails the whole batch.
    pub fn predict_records(&self, records: &[FeatureRecord]) -> Result<Vec<PredictionResponse>> {
        let vectors = records
            .iter()
            .map(|r| self.encode(r))
            .collect::<Result<Vec<_>>>()?;
        let predictions = self.engine.predict_batch(&vectors)?;

        Ok(predictions
            .into_iter()
            .zip(records)
            .map(|(p, r)| respond(p, &AdvisoryInputs::from(r)))
            .collect())
    }

    /// Rank clusters by their mean reference exam score and compare the
    /// implied labels with the stored risk map. Never modifies the map.
    pub fn verify_risk_mapping(&self, dataset: &ReferenceDataset) -> RiskMappingCheck {
        let scores = match dataset.exam_scores() {
            Ok(Some(scores)) => scores,
            Ok(None) => {
                return RiskMappingCheck::Unavailable(
                    "reference dataset has no exam score column".to_string(),
                )
            }
            Err(e) => return RiskMappingCheck::Unavailable(e.to_string()),
        };

        let stored = self.engine.labels().risk.labels().to_vec();
        if stored.len() != RISK_RANKING.len() {
            return RiskMappingCheck::Unavailable(format!(
                "{} clusters cannot be ranked into {} risk levels",
                stored.len(),
                RISK_RANKING.len()
            ));
        }

        let mut totals = vec![(0.0, 0usize); stored.len()];
        for (row, score) in dataset.rows().iter().zip(&scores) {
            let cluster = match self
                .encode(&row.record)
                .and_then(|v| self.engine.cluster_of(&v))
            {
                Ok(cluster) => cluster,
                Err(e) => return RiskMappingCheck::Unavailable(e.to_string()),
            };
            match totals.get_mut(cluster) {
                Some((sum, count)) => {
                    *sum += score;
                    *count += 1;
                }
                None => {
                    return RiskMappingCheck::Unavailable(format!(
                        "cluster {} is outside the risk map",
                        cluster
                    ))
                }
            }
        }
        if let Some(empty) = totals.iter().position(|(_, count)| *count == 0) {
            return RiskMappingCheck::Unavailable(format!(
                "cluster {} has no reference rows",
                empty
            ));
        }

        let means: Vec<f64> = totals
            .iter()
            .map(|(sum, count)| sum / *count as f64)
            .collect();
        debug!(cluster_means = ?means, "Recomputed cluster score means");

        let mut order: Vec<usize> = (0..means.len()).collect();
        order.sort_by(|a, b| means[*a].total_cmp(&means[*b]));
        let mut expected = vec![String::new(); means.len()];
        for (rank, cluster) in order.into_iter().enumerate() {
            expected[cluster] = RISK_RANKING[rank].to_string();
        }

        if expected == stored {
            RiskMappingCheck::Consistent
        } else {
            RiskMappingCheck::Disagrees { expected, stored }
        }
    }
}

fn respond(prediction: Prediction, inputs: &AdvisoryInputs) -> PredictionResponse {
    let advisory = advisory::advise(
        prediction.exam_score,
        &prediction.pass_fail,
        &prediction.performance,
        &prediction.risk_cluster,
        Some(inputs),
    );
    let badge = advisory::badge(&prediction.pass_fail, &prediction.risk_cluster);
    PredictionResponse {
        prediction,
        advisory,
        badge,
    }
}
