//! Encoding registry: fitted categorical encoders and the feature scaler
//!
//! Both are frozen at training time. The registry maps the human-entered
//! categorical values to the exact codes the models were trained on, and
//! normalizes every column with the training mean and standard deviation.

use crate::artifacts::{self, ArtifactDir};
use crate::error::{PipelineError, Result};
use crate::models::NUM_FEATURES;
use serde::Deserialize;
use tracing::info;

use super::features::{EXTRA_CURRICULAR, PARTICIPATION_LEVEL};

/// Frozen label ↔ code bijection, codes assigned in alphabetical order
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "EncoderArtifact")]
pub struct CategoricalEncoder {
    classes: Vec<String>,
}

#[derive(Deserialize)]
struct EncoderArtifact {
    classes: Vec<String>,
}

impl TryFrom<EncoderArtifact> for CategoricalEncoder {
    type Error = String;

    fn try_from(artifact: EncoderArtifact) -> std::result::Result<Self, Self::Error> {
        Self::from_classes(artifact.classes)
    }
}

impl CategoricalEncoder {
    /// Build from the class list; it must be non-empty, unique and sorted
    pub fn from_classes<S: Into<String>>(
        classes: impl IntoIterator<Item = S>,
    ) -> std::result::Result<Self, String> {
        let classes: Vec<String> = classes.into_iter().map(Into::into).collect();
        if classes.is_empty() {
            return Err("encoder has no classes".to_string());
        }
        if classes.windows(2).any(|w| w[0] >= w[1]) {
            return Err(format!(
                "encoder classes must be unique and alphabetically ordered, got {:?}",
                classes
            ));
        }
        Ok(Self { classes })
    }

    pub fn encode(&self, label: &str) -> Option<usize> {
        self.classes.binary_search_by(|c| c.as_str().cmp(label)).ok()
    }

    pub fn decode(&self, code: usize) -> Option<&str> {
        self.classes.get(code).map(String::as_str)
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }
}

/// Per-column standardization learned at training time
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "ScalerArtifact")]
pub struct StandardScaler {
    mean: [f64; NUM_FEATURES],
    scale: [f64; NUM_FEATURES],
}

#[derive(Deserialize)]
struct ScalerArtifact {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl TryFrom<ScalerArtifact> for StandardScaler {
    type Error = String;

    fn try_from(artifact: ScalerArtifact) -> std::result::Result<Self, Self::Error> {
        let mean: [f64; NUM_FEATURES] = artifact.mean.try_into().map_err(|v: Vec<f64>| {
            format!("scaler mean has {} columns, expected {}", v.len(), NUM_FEATURES)
        })?;
        let scale: [f64; NUM_FEATURES] = artifact.scale.try_into().map_err(|v: Vec<f64>| {
            format!("scaler scale has {} columns, expected {}", v.len(), NUM_FEATURES)
        })?;
        Ok(Self::new(mean, scale))
    }
}

impl StandardScaler {
    /// Zero or non-finite scales are treated as 1 (constant column)
    pub fn new(mean: [f64; NUM_FEATURES], scale: [f64; NUM_FEATURES]) -> Self {
        let scale = scale.map(|s| if s == 0.0 || !s.is_finite() { 1.0 } else { s });
        Self { mean, scale }
    }

    pub fn transform(&self, row: &[f64; NUM_FEATURES]) -> [f64; NUM_FEATURES] {
        let mut out = [0.0; NUM_FEATURES];
        for (i, value) in row.iter().enumerate() {
            out[i] = (value - self.mean[i]) / self.scale[i];
        }
        out
    }

    pub fn mean(&self) -> &[f64; NUM_FEATURES] {
        &self.mean
    }

    pub fn scale(&self) -> &[f64; NUM_FEATURES] {
        &self.scale
    }
}

/// Immutable holder of the scaler and the two input encoders
#[derive(Debug, Clone)]
pub struct EncodingRegistry {
    scaler: StandardScaler,
    participation: CategoricalEncoder,
    extra_curricular: CategoricalEncoder,
}

impl EncodingRegistry {
    /// Load scaler and encoders; any absent file is startup-fatal
    pub fn load(dir: &ArtifactDir) -> Result<Self> {
        dir.require_all(&[
            artifacts::SCALER,
            artifacts::PARTICIPATION_ENCODER,
            artifacts::EXTRA_ENCODER,
        ])?;

        let scaler: StandardScaler = dir.read_json(artifacts::SCALER.0, artifacts::SCALER.1)?;
        let participation: CategoricalEncoder = dir.read_json(
            artifacts::PARTICIPATION_ENCODER.0,
            artifacts::PARTICIPATION_ENCODER.1,
        )?;
        let extra_curricular: CategoricalEncoder =
            dir.read_json(artifacts::EXTRA_ENCODER.0, artifacts::EXTRA_ENCODER.1)?;

        info!(
            participation_classes = ?participation.classes(),
            extra_curricular_classes = ?extra_curricular.classes(),
            "Encoding registry loaded"
        );

        Ok(Self::from_parts(scaler, participation, extra_curricular))
    }

    pub fn from_parts(
        scaler: StandardScaler,
        participation: CategoricalEncoder,
        extra_curricular: CategoricalEncoder,
    ) -> Self {
        Self {
            scaler,
            participation,
            extra_curricular,
        }
    }

    fn encoder(&self, field: &str) -> Option<&CategoricalEncoder> {
        match field {
            PARTICIPATION_LEVEL => Some(&self.participation),
            EXTRA_CURRICULAR => Some(&self.extra_curricular),
            _ => None,
        }
    }

    /// Encode a categorical value into the code used at training time
    pub fn encode(&self, field: &str, raw: &str) -> Result<f64> {
        let encoder = self.encoder(field).ok_or_else(|| PipelineError::InvalidValue {
            field: field.to_string(),
            raw: format!("'{}' is not a categorical field", field),
        })?;

        encoder
            .encode(raw)
            .map(|code| code as f64)
            .ok_or_else(|| PipelineError::UnknownCategory {
                field: field.to_string(),
                value: raw.to_string(),
            })
    }

    pub fn decode(&self, field: &str, code: usize) -> Option<&str> {
        self.encoder(field).and_then(|e| e.decode(code))
    }

    pub fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn registry() -> EncodingRegistry {
        EncodingRegistry::from_parts(
            StandardScaler::new([0.0; NUM_FEATURES], [1.0; NUM_FEATURES]),
            CategoricalEncoder::from_classes(["High", "Low", "Medium"]).unwrap(),
            CategoricalEncoder::from_classes(["No", "Yes"]).unwrap(),
        )
    }

    #[test]
    fn test_alphabetical_codes() {
        let registry = registry();
        assert_eq!(registry.encode(PARTICIPATION_LEVEL, "High").unwrap(), 0.0);
        assert_eq!(registry.encode(PARTICIPATION_LEVEL, "Low").unwrap(), 1.0);
        assert_eq!(registry.encode(PARTICIPATION_LEVEL, "Medium").unwrap(), 2.0);
        assert_eq!(registry.encode(EXTRA_CURRICULAR, "No").unwrap(), 0.0);
        assert_eq!(registry.encode(EXTRA_CURRICULAR, "Yes").unwrap(), 1.0);
    }

    #[test]
    fn test_round_trip_every_label() {
        let registry = registry();
        for field in [PARTICIPATION_LEVEL, EXTRA_CURRICULAR] {
            let classes = registry.encoder(field).unwrap().classes().to_vec();
            for label in classes {
                let code = registry.encode(field, &label).unwrap() as usize;
                assert_eq!(registry.decode(field, code), Some(label.as_str()));
            }
        }
    }

    #[test]
    fn test_unknown_category_names_field_and_value() {
        let err = registry()
            .encode(PARTICIPATION_LEVEL, "VeryHigh")
            .unwrap_err();
        match err {
            PipelineError::UnknownCategory { field, value } => {
                assert_eq!(field, "participation_level");
                assert_eq!(value, "VeryHigh");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_encoder_rejects_unsorted_classes() {
        assert!(CategoricalEncoder::from_classes(["Low", "High"]).is_err());
        assert!(CategoricalEncoder::from_classes(["No", "No"]).is_err());
        assert!(CategoricalEncoder::from_classes(Vec::<String>::new()).is_err());
    }

    #[test]
    fn test_scaler_standardizes_and_guards_zero_scale() {
        let mut mean = [0.0; NUM_FEATURES];
        let mut scale = [1.0; NUM_FEATURES];
        mean[0] = 70.0;
        scale[0] = 20.0;
        scale[1] = 0.0;
        let scaler = StandardScaler::new(mean, scale);

        let mut row = [0.0; NUM_FEATURES];
        row[0] = 90.0;
        row[1] = 3.0;
        let out = scaler.transform(&row);
        assert!((out[0] - 1.0).abs() < 1e-12);
        assert!((out[1] - 3.0).abs() < 1e-12);
        assert_eq!(scaler.scale()[1], 1.0);
        assert_eq!(scaler.mean()[0], 70.0);
    }

    #[test]
    fn test_scaler_artifact_wrong_arity() {
        let result: std::result::Result<StandardScaler, _> =
            serde_json::from_str(r#"{"mean": [1.0, 2.0], "scale": [1.0, 1.0]}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_load_reports_all_missing_files() {
        let dir = TempDir::new().unwrap();
        let err = EncodingRegistry::load(&ArtifactDir::new(dir.path())).unwrap_err();
        match err {
            PipelineError::ArtifactMissing(missing) => assert_eq!(missing.len(), 3),
            other => panic!("unexpected error: {other}"),
        }
    }
}
