//! Decoding of raw model outputs into response values
//!
//! Classifier and cluster codes are turned into human labels through explicit
//! tables, checked at startup against the training artifacts. Regression
//! output is clamped into the valid score range.

use crate::artifacts::{self, ArtifactDir};
use crate::error::{PipelineError, Result};
use std::collections::BTreeMap;

use super::encoding::CategoricalEncoder;

/// Rendered in place of a code the table does not cover
pub const UNKNOWN_LABEL: &str = "Unknown";

/// Pass/fail classes in target-encoder order
pub const PASS_FAIL_LABELS: [&str; 2] = ["Fail", "Pass"];

/// Performance classes in target-encoder order
pub const PERFORMANCE_LABELS: [&str; 3] = ["High", "Low", "Medium"];

pub const HIGH_RISK: &str = "High Risk";
pub const MEDIUM_RISK: &str = "Medium Risk";
pub const LOW_RISK: &str = "Low Risk";

/// Risk labels from lowest to highest mean training score of their cluster
pub const RISK_RANKING: [&str; 3] = [HIGH_RISK, MEDIUM_RISK, LOW_RISK];

pub const MIN_SCORE: f64 = 0.0;
pub const MAX_SCORE: f64 = 100.0;

/// Clamp a raw regression output to [0, 100] and round to 2 decimals
pub fn clamp_score(raw: f64) -> f64 {
    if raw.is_nan() {
        return MIN_SCORE;
    }
    round_to(raw.clamp(MIN_SCORE, MAX_SCORE), 2)
}

/// Round to `places` decimals, exact halves to the even neighbour
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round_ties_even() / factor
}

/// Fixed code → label mapping for one model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelTable {
    name: &'static str,
    labels: Vec<String>,
}

impl LabelTable {
    pub fn new<S: Into<String>>(name: &'static str, labels: impl IntoIterator<Item = S>) -> Self {
        Self {
            name,
            labels: labels.into_iter().map(Into::into).collect(),
        }
    }

    pub fn pass_fail() -> Self {
        Self::new("pass_fail", PASS_FAIL_LABELS)
    }

    pub fn performance() -> Self {
        Self::new("performance", PERFORMANCE_LABELS)
    }

    /// Load the cluster → risk label map, e.g. `{"0": "High Risk", ...}`.
    ///
    /// Keys must be the consecutive codes `0..n` and every label one of the
    /// known risk labels, used once.
    pub fn load_risk(dir: &ArtifactDir) -> Result<Self> {
        let raw: BTreeMap<String, String> =
            dir.read_json(artifacts::RISK_MAP.0, artifacts::RISK_MAP.1)?;
        Self::risk_from_map(raw)
    }

    pub fn risk_from_map(raw: BTreeMap<String, String>) -> Result<Self> {
        let invalid = |reason: String| PipelineError::ArtifactInvalid {
            name: artifacts::RISK_MAP.0.to_string(),
            reason,
        };

        let mut by_code = BTreeMap::new();
        for (key, label) in raw {
            let code: usize = key
                .trim()
                .parse()
                .map_err(|_| invalid(format!("cluster key '{}' is not an index", key)))?;
            if !RISK_RANKING.contains(&label.as_str()) {
                return Err(invalid(format!("unknown risk label '{}'", label)));
            }
            by_code.insert(code, label);
        }

        if by_code.keys().copied().ne(0..by_code.len()) {
            return Err(invalid(format!(
                "cluster keys must be 0..{}, got {:?}",
                by_code.len(),
                by_code.keys().collect::<Vec<_>>()
            )));
        }

        let labels: Vec<String> = by_code.into_values().collect();
        let mut unique = labels.clone();
        unique.sort();
        unique.dedup();
        if unique.len() != labels.len() {
            return Err(invalid("risk labels must be distinct".to_string()));
        }

        Ok(Self::new("risk_cluster", labels))
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn decode(&self, code: usize) -> Option<&str> {
        self.labels.get(code).map(String::as_str)
    }

    /// Inverse lookup, used when scoring against ground-truth labels
    pub fn code_of(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }

    /// The table must list exactly the target encoder's classes, in order
    pub fn verify_against(&self, encoder: &CategoricalEncoder) -> Result<()> {
        if self.labels.as_slice() != encoder.classes() {
            return Err(PipelineError::LabelTableMismatch {
                table: self.name.to_string(),
                reason: format!(
                    "table {:?} does not match encoder classes {:?}",
                    self.labels,
                    encoder.classes()
                ),
            });
        }
        Ok(())
    }

    /// The table must cover exactly the model's output cardinality
    pub fn verify_cardinality(&self, n_outputs: Option<usize>) -> Result<()> {
        match n_outputs {
            Some(n) if n == self.len() => Ok(()),
            other => Err(PipelineError::LabelTableMismatch {
                table: self.name.to_string(),
                reason: format!(
                    "table has {} entries, model produces {:?} codes",
                    self.len(),
                    other
                ),
            }),
        }
    }
}

/// The three decoding tables used by inference
#[derive(Debug, Clone)]
pub struct LabelTables {
    pub pass_fail: LabelTable,
    pub performance: LabelTable,
    pub risk: LabelTable,
}

impl LabelTables {
    /// Load the risk map and verify the fixed tables against the target encoders
    pub fn load(dir: &ArtifactDir) -> Result<Self> {
        dir.require_all(&[
            artifacts::PASS_ENCODER,
            artifacts::PERFORMANCE_ENCODER,
            artifacts::RISK_MAP,
        ])?;

        let pass_encoder: CategoricalEncoder =
            dir.read_json(artifacts::PASS_ENCODER.0, artifacts::PASS_ENCODER.1)?;
        let performance_encoder: CategoricalEncoder = dir.read_json(
            artifacts::PERFORMANCE_ENCODER.0,
            artifacts::PERFORMANCE_ENCODER.1,
        )?;

        let tables = Self {
            pass_fail: LabelTable::pass_fail(),
            performance: LabelTable::performance(),
            risk: LabelTable::load_risk(dir)?,
        };
        tables.pass_fail.verify_against(&pass_encoder)?;
        tables.performance.verify_against(&performance_encoder)?;

        Ok(tables)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn risk_map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_clamp_score() {
        assert_eq!(clamp_score(-12.0), 0.0);
        assert_eq!(clamp_score(250.0), 100.0);
        assert_eq!(clamp_score(72.3456), 72.35);
        assert_eq!(clamp_score(f64::NAN), 0.0);
        assert_eq!(clamp_score(f64::INFINITY), 100.0);
    }

    #[test]
    fn test_exact_halves_round_to_even() {
        assert_eq!(clamp_score(72.125), 72.12);
        assert_eq!(clamp_score(72.375), 72.38);
        assert_eq!(round_to(0.03125, 4), 0.0312);
        assert_eq!(round_to(2.5, 0), 2.0);
    }

    #[test]
    fn test_unmapped_code_decodes_to_none() {
        let table = LabelTable::pass_fail();
        assert_eq!(table.decode(1), Some("Pass"));
        assert_eq!(table.decode(2), None);
    }

    #[test]
    fn test_verify_against_encoder_order() {
        let encoder = CategoricalEncoder::from_classes(["Fail", "Pass"]).unwrap();
        assert!(LabelTable::pass_fail().verify_against(&encoder).is_ok());

        let other = CategoricalEncoder::from_classes(["High", "Low", "Medium"]).unwrap();
        assert!(matches!(
            LabelTable::pass_fail().verify_against(&other),
            Err(PipelineError::LabelTableMismatch { .. })
        ));
    }

    #[test]
    fn test_verify_cardinality() {
        let table = LabelTable::performance();
        assert!(table.verify_cardinality(Some(3)).is_ok());
        assert!(table.verify_cardinality(Some(2)).is_err());
        assert!(table.verify_cardinality(None).is_err());
    }

    #[test]
    fn test_risk_map_parsing() {
        let table = LabelTable::risk_from_map(risk_map(&[
            ("2", "Low Risk"),
            ("0", "High Risk"),
            ("1", "Medium Risk"),
        ]))
        .unwrap();
        assert_eq!(table.labels(), &["High Risk", "Medium Risk", "Low Risk"]);
        assert_eq!(table.code_of("Low Risk"), Some(2));
    }

    #[test]
    fn test_risk_map_rejects_gaps_and_duplicates() {
        assert!(LabelTable::risk_from_map(risk_map(&[
            ("0", "High Risk"),
            ("2", "Low Risk"),
        ]))
        .is_err());
        assert!(LabelTable::risk_from_map(risk_map(&[
            ("0", "High Risk"),
            ("1", "High Risk"),
        ]))
        .is_err());
        assert!(LabelTable::risk_from_map(risk_map(&[("0", "Severe")])).is_err());
    }
}
