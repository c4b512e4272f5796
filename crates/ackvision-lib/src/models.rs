//! Core data models for the prediction pipeline

use serde::{Deserialize, Serialize};

/// Number of columns in an encoded feature vector
pub const NUM_FEATURES: usize = 9;

/// One student's inputs, validated and typed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub attendance: f64,
    pub study_hours: f64,
    pub assignment_score: f64,
    pub previous_gpa: f64,
    pub participation_level: String,
    pub internet_usage: f64,
    pub sleep_hours: f64,
    pub family_support: f64,
    pub extra_curricular: String,
}

/// Scaled, fixed-order numeric representation of a [`FeatureRecord`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncodedFeatureVector([f64; NUM_FEATURES]);

impl EncodedFeatureVector {
    pub fn new(values: [f64; NUM_FEATURES]) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn values(&self) -> [f64; NUM_FEATURES] {
        self.0
    }
}

/// Decoded outputs of the four models for one record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub exam_score: f64,
    pub pass_fail: String,
    pub performance: String,
    pub risk_cluster: String,
}

/// Severity of a result card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Danger,
    Warning,
    Success,
}

impl Severity {
    pub fn emoji(&self) -> &'static str {
        match self {
            Severity::Danger => "🔴",
            Severity::Warning => "🟡",
            Severity::Success => "🟢",
        }
    }
}

/// Summary badge shown next to a prediction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Badge {
    pub color: Severity,
    pub emoji: String,
}

impl From<Severity> for Badge {
    fn from(color: Severity) -> Self {
        Self {
            color,
            emoji: color.emoji().to_string(),
        }
    }
}

/// Full single-record response: predictions, advisory and badge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    #[serde(flatten)]
    pub prediction: Prediction,
    pub advisory: Vec<String>,
    pub badge: Badge,
}
