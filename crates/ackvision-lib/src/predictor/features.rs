//! Feature vector construction for ML inference
//!
//! Turns loosely-typed input (JSON bodies, CSV rows) into a validated
//! [`FeatureRecord`], then into the scaled nine-column vector the models were
//! trained on. The column order below is the one frozen at training time;
//! every caller goes through [`FEATURE_COLUMNS`].

use crate::error::{PipelineError, Result};
use crate::models::{EncodedFeatureVector, FeatureRecord, NUM_FEATURES};
use serde_json::{Map, Value};

use super::encoding::EncodingRegistry;

pub const ATTENDANCE: &str = "attendance";
pub const STUDY_HOURS: &str = "study_hours";
pub const ASSIGNMENT_SCORE: &str = "assignment_score";
pub const PREVIOUS_GPA: &str = "previous_gpa";
pub const PARTICIPATION_LEVEL: &str = "participation_level";
pub const INTERNET_USAGE: &str = "internet_usage";
pub const SLEEP_HOURS: &str = "sleep_hours";
pub const FAMILY_SUPPORT: &str = "family_support";
pub const EXTRA_CURRICULAR: &str = "extra_curricular";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureKind {
    Numeric,
    Categorical,
}

/// One input column: canonical key, dataset header and type
#[derive(Debug, Clone, Copy)]
pub struct FeatureColumn {
    pub key: &'static str,
    pub header: &'static str,
    pub kind: FeatureKind,
}

const fn numeric(key: &'static str, header: &'static str) -> FeatureColumn {
    FeatureColumn {
        key,
        header,
        kind: FeatureKind::Numeric,
    }
}

const fn categorical(key: &'static str, header: &'static str) -> FeatureColumn {
    FeatureColumn {
        key,
        header,
        kind: FeatureKind::Categorical,
    }
}

/// Model input columns, in training order
pub const FEATURE_COLUMNS: [FeatureColumn; NUM_FEATURES] = [
    numeric(ATTENDANCE, "Attendance (%)"),
    numeric(STUDY_HOURS, "Study Hours (per day)"),
    numeric(ASSIGNMENT_SCORE, "Assignment Score"),
    numeric(PREVIOUS_GPA, "Previous GPA"),
    categorical(PARTICIPATION_LEVEL, "Participation Level"),
    numeric(INTERNET_USAGE, "Internet Usage (hrs/day)"),
    numeric(SLEEP_HOURS, "Sleep Hours"),
    numeric(FAMILY_SUPPORT, "Family Support Index"),
    categorical(EXTRA_CURRICULAR, "Extra Curricular"),
];

/// Map a dataset header such as `Attendance (%)` to its canonical key.
/// Unknown headers are returned unchanged.
pub fn canonical_key(header: &str) -> &str {
    let trimmed = header.trim();
    FEATURE_COLUMNS
        .iter()
        .find(|c| c.header == trimmed)
        .map(|c| c.key)
        .unwrap_or(trimmed)
}

/// Rename dataset headers to canonical keys, keeping other keys as they are
pub fn canonicalize_headers(map: Map<String, Value>) -> Map<String, Value> {
    map.into_iter()
        .map(|(k, v)| (canonical_key(&k).to_string(), v))
        .collect()
}

fn is_present(map: &Map<String, Value>, key: &str) -> bool {
    map.get(key).map(|v| !v.is_null()).unwrap_or(false)
}

/// Coerce a JSON value (number or numeric string) to a finite float
pub fn coerce_numeric(field: &str, value: &Value) -> Result<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    parsed
        .filter(|v| v.is_finite())
        .ok_or_else(|| PipelineError::InvalidValue {
            field: field.to_string(),
            raw: raw_text(value),
        })
}

fn coerce_label(field: &str, value: &Value) -> Result<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        other => Err(PipelineError::InvalidValue {
            field: field.to_string(),
            raw: raw_text(other),
        }),
    }
}

fn raw_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl FeatureRecord {
    /// Validate and type a raw key/value record.
    ///
    /// Every absent key is reported in a single [`PipelineError::MissingField`];
    /// a `null` value counts as absent.
    pub fn from_map(map: &Map<String, Value>) -> Result<Self> {
        let missing: Vec<String> = FEATURE_COLUMNS
            .iter()
            .filter(|c| !is_present(map, c.key))
            .map(|c| c.key.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(PipelineError::MissingField(missing));
        }

        let num = |key: &str| coerce_numeric(key, &map[key]);
        let label = |key: &str| coerce_label(key, &map[key]);

        Ok(Self {
            attendance: num(ATTENDANCE)?,
            study_hours: num(STUDY_HOURS)?,
            assignment_score: num(ASSIGNMENT_SCORE)?,
            previous_gpa: num(PREVIOUS_GPA)?,
            participation_level: label(PARTICIPATION_LEVEL)?,
            internet_usage: num(INTERNET_USAGE)?,
            sleep_hours: num(SLEEP_HOURS)?,
            family_support: num(FAMILY_SUPPORT)?,
            extra_curricular: label(EXTRA_CURRICULAR)?,
        })
    }
}

/// Builds encoded feature vectors against a fixed encoding registry
pub struct FeatureVectorBuilder<'a> {
    registry: &'a EncodingRegistry,
}

impl<'a> FeatureVectorBuilder<'a> {
    pub fn new(registry: &'a EncodingRegistry) -> Self {
        Self { registry }
    }

    /// Encode categoricals, assemble in training column order, then scale
    pub fn build(&self, record: &FeatureRecord) -> Result<EncodedFeatureVector> {
        let mut raw = [0.0; NUM_FEATURES];
        for (slot, column) in raw.iter_mut().zip(FEATURE_COLUMNS.iter()) {
            *slot = match column.key {
                ATTENDANCE => record.attendance,
                STUDY_HOURS => record.study_hours,
                ASSIGNMENT_SCORE => record.assignment_score,
                PREVIOUS_GPA => record.previous_gpa,
                PARTICIPATION_LEVEL => self
                    .registry
                    .encode(column.key, &record.participation_level)?,
                INTERNET_USAGE => record.internet_usage,
                SLEEP_HOURS => record.sleep_hours,
                FAMILY_SUPPORT => record.family_support,
                EXTRA_CURRICULAR => self.registry.encode(column.key, &record.extra_curricular)?,
                other => {
                    return Err(PipelineError::InvalidValue {
                        field: other.to_string(),
                        raw: "unmapped feature column".to_string(),
                    })
                }
            };
        }

        Ok(EncodedFeatureVector::new(
            self.registry.scaler().transform(&raw),
        ))
    }

    pub fn build_from_map(&self, map: &Map<String, Value>) -> Result<EncodedFeatureVector> {
        self.build(&FeatureRecord::from_map(map)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predictor::encoding::{CategoricalEncoder, StandardScaler};
    use serde_json::json;

    fn registry() -> EncodingRegistry {
        EncodingRegistry::from_parts(
            StandardScaler::new(
                [70.0, 5.0, 60.0, 6.0, 1.0, 6.0, 6.5, 5.5, 0.5],
                [20.0, 3.0, 20.0, 2.0, 0.8, 3.5, 2.0, 2.8, 0.5],
            ),
            CategoricalEncoder::from_classes(["High", "Low", "Medium"]).unwrap(),
            CategoricalEncoder::from_classes(["No", "Yes"]).unwrap(),
        )
    }

    fn sample() -> Map<String, Value> {
        json!({
            "attendance": 95,
            "study_hours": 6,
            "assignment_score": 88,
            "previous_gpa": 8.5,
            "participation_level": "High",
            "internet_usage": 3,
            "sleep_hours": 7.5,
            "family_support": 9,
            "extra_curricular": "Yes"
        })
        .as_object()
        .cloned()
        .unwrap()
    }

    #[test]
    fn test_column_order_is_frozen() {
        let keys: Vec<_> = FEATURE_COLUMNS.iter().map(|c| c.key).collect();
        assert_eq!(
            keys,
            vec![
                "attendance",
                "study_hours",
                "assignment_score",
                "previous_gpa",
                "participation_level",
                "internet_usage",
                "sleep_hours",
                "family_support",
                "extra_curricular",
            ]
        );
    }

    #[test]
    fn test_missing_fields_reported_together() {
        let mut map = sample();
        map.remove("attendance");
        map.remove("sleep_hours");
        map.insert("extra_curricular".into(), Value::Null);

        match FeatureRecord::from_map(&map).unwrap_err() {
            PipelineError::MissingField(missing) => assert_eq!(
                missing,
                vec!["attendance", "sleep_hours", "extra_curricular"]
            ),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_numeric_strings_are_accepted() {
        let mut map = sample();
        map.insert("attendance".into(), json!(" 82.5 "));
        let record = FeatureRecord::from_map(&map).unwrap();
        assert_eq!(record.attendance, 82.5);
    }

    #[test]
    fn test_invalid_numeric_value() {
        let mut map = sample();
        map.insert("study_hours".into(), json!("lots"));
        match FeatureRecord::from_map(&map).unwrap_err() {
            PipelineError::InvalidValue { field, raw } => {
                assert_eq!(field, "study_hours");
                assert_eq!(raw, "lots");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_canonical_headers() {
        assert_eq!(canonical_key("Attendance (%)"), "attendance");
        assert_eq!(canonical_key("Internet Usage (hrs/day)"), "internet_usage");
        assert_eq!(canonical_key("attendance"), "attendance");
        assert_eq!(canonical_key("Student Name"), "Student Name");

        let mut map = Map::new();
        map.insert("Family Support Index".into(), json!(4));
        let renamed = canonicalize_headers(map);
        assert_eq!(renamed["family_support"], json!(4));
    }

    #[test]
    fn test_build_scales_in_column_order() {
        let registry = registry();
        let builder = FeatureVectorBuilder::new(&registry);
        let vector = builder.build_from_map(&sample()).unwrap();
        let v = vector.values();

        assert!((v[0] - 1.25).abs() < 1e-9);
        assert!((v[3] - 1.25).abs() < 1e-9);
        // "High" encodes to 0
        assert!((v[4] - (-1.25)).abs() < 1e-9);
        // "Yes" encodes to 1
        assert!((v[8] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_build_places_each_field_under_its_column() {
        let registry = EncodingRegistry::from_parts(
            StandardScaler::new([0.0; NUM_FEATURES], [1.0; NUM_FEATURES]),
            CategoricalEncoder::from_classes(["High", "Low", "Medium"]).unwrap(),
            CategoricalEncoder::from_classes(["No", "Yes"]).unwrap(),
        );
        let record = FeatureRecord {
            attendance: 91.0,
            study_hours: 2.0,
            assignment_score: 73.0,
            previous_gpa: 6.4,
            participation_level: "Medium".to_string(),
            internet_usage: 5.5,
            sleep_hours: 8.0,
            family_support: 3.0,
            extra_curricular: "Yes".to_string(),
        };
        let values = FeatureVectorBuilder::new(&registry)
            .build(&record)
            .unwrap()
            .values();

        for (column, value) in FEATURE_COLUMNS.iter().zip(values) {
            let expected = match column.key {
                ATTENDANCE => 91.0,
                STUDY_HOURS => 2.0,
                ASSIGNMENT_SCORE => 73.0,
                PREVIOUS_GPA => 6.4,
                PARTICIPATION_LEVEL => 2.0,
                INTERNET_USAGE => 5.5,
                SLEEP_HOURS => 8.0,
                FAMILY_SUPPORT => 3.0,
                EXTRA_CURRICULAR => 1.0,
                other => panic!("unexpected column {other}"),
            };
            assert_eq!(value, expected, "column {}", column.key);
        }
    }

    #[test]
    fn test_build_is_deterministic() {
        let registry = registry();
        let builder = FeatureVectorBuilder::new(&registry);
        let a = builder.build_from_map(&sample()).unwrap();
        let b = builder.build_from_map(&sample()).unwrap();
        let bits = |v: &EncodedFeatureVector| v.values().map(f64::to_bits);
        assert_eq!(bits(&a), bits(&b));
    }

    #[test]
    fn test_unknown_participation_level() {
        let registry = registry();
        let builder = FeatureVectorBuilder::new(&registry);
        let mut map = sample();
        map.insert("participation_level".into(), json!("VeryHigh"));

        match builder.build_from_map(&map).unwrap_err() {
            PipelineError::UnknownCategory { field, value } => {
                assert_eq!(field, "participation_level");
                assert_eq!(value, "VeryHigh");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
