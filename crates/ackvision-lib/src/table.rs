//! Tabular (CSV) input: batch uploads and the reference dataset
//!
//! Headers are renamed to canonical keys through the static header table
//! before any row is looked at.

use crate::error::{PipelineError, Result};
use crate::predictor::features::{canonical_key, FEATURE_COLUMNS};
use serde_json::{Map, Number, Value};
use std::io::Read;

/// Rows of a CSV table, keyed by canonical column name
#[derive(Debug, Clone, Default)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Map<String, Value>>,
}

impl Table {
    /// Parse CSV from any reader. Feature columns missing from the header
    /// row are reported together; unparsable input is `MalformedCsv`.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let columns: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| canonical_key(h).to_string())
            .collect();

        let missing: Vec<String> = FEATURE_COLUMNS
            .iter()
            .filter(|c| !columns.iter().any(|h| h == c.key))
            .map(|c| c.key.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(PipelineError::MissingField(missing));
        }

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let row: Map<String, Value> = columns
                .iter()
                .cloned()
                .zip(record.iter().map(cell_value))
                .collect();
            rows.push(row);
        }

        Ok(Self { columns, rows })
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Empty cells become `null`, numbers become JSON numbers, the rest strings
fn cell_value(cell: &str) -> Value {
    if cell.is_empty() {
        return Value::Null;
    }
    if let Ok(i) = cell.parse::<i64>() {
        return Value::Number(i.into());
    }
    if let Some(n) = cell.parse::<f64>().ok().and_then(Number::from_f64) {
        return Value::Number(n);
    }
    Value::String(cell.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_dataset_headers_are_renamed() {
        let csv = "\
Attendance (%),Study Hours (per day),Assignment Score,Previous GPA,Participation Level,Internet Usage (hrs/day),Sleep Hours,Family Support Index,Extra Curricular,Final Exam Score
95,6,88,8.5,High,3,7.5,9,Yes,91.2
";
        let table = Table::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(table.len(), 1);
        assert!(table.has_column("Final Exam Score"));
        let row = &table.rows[0];
        assert_eq!(row["attendance"], json!(95));
        assert_eq!(row["previous_gpa"], json!(8.5));
        assert_eq!(row["participation_level"], json!("High"));
        assert_eq!(row["Final Exam Score"], json!(91.2));
    }

    #[test]
    fn test_missing_columns_reported_together() {
        let csv = "attendance,study_hours,assignment_score,previous_gpa,participation_level,family_support\n";
        match Table::from_reader(csv.as_bytes()).unwrap_err() {
            PipelineError::MissingField(missing) => assert_eq!(
                missing,
                vec!["internet_usage", "sleep_hours", "extra_curricular"]
            ),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_ragged_row_is_malformed() {
        let csv = "\
attendance,study_hours,assignment_score,previous_gpa,participation_level,internet_usage,sleep_hours,family_support,extra_curricular
95,6,88,8.5,High,3,7.5,9,Yes
80,4
";
        let err = Table::from_reader(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, PipelineError::MalformedCsv(_)));
        assert!(err.is_client_error());
    }

    #[test]
    fn test_invalid_utf8_is_malformed() {
        let mut csv = b"attendance,study_hours,assignment_score,previous_gpa,participation_level,internet_usage,sleep_hours,family_support,extra_curricular\n95,6,88,8.5,".to_vec();
        csv.extend_from_slice(&[0xff, 0xfe]);
        csv.extend_from_slice(b",3,7.5,9,Yes\n");
        assert!(matches!(
            Table::from_reader(&csv[..]),
            Err(PipelineError::MalformedCsv(_))
        ));
    }

    #[test]
    fn test_empty_cell_is_null() {
        assert_eq!(cell_value(""), Value::Null);
        assert_eq!(cell_value("7"), json!(7));
        assert_eq!(cell_value("No"), json!("No"));
    }
}
