//! Reference dataset with optional ground-truth columns

use crate::error::{PipelineError, Result};
use crate::models::FeatureRecord;
use crate::predictor::features::coerce_numeric;
use crate::table::Table;
use serde_json::{Map, Value};
use std::fs::File;
use std::path::Path;
use tracing::debug;

pub const EXAM_SCORE_COLUMN: &str = "Final Exam Score";
pub const PASS_FAIL_COLUMN: &str = "Pass/Fail";
pub const PERFORMANCE_COLUMN: &str = "Performance Category";

/// One reference row: the student's inputs and whatever targets the file has
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceRow {
    pub record: FeatureRecord,
    pub exam_score: Option<f64>,
    pub pass_fail: Option<String>,
    pub performance: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ReferenceDataset {
    rows: Vec<ReferenceRow>,
    has_exam_score: bool,
    has_pass_fail: bool,
    has_performance: bool,
}

impl ReferenceDataset {
    /// Read the CSV at `path`; read again on every call, never cached
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            PipelineError::Dataset(format!("cannot open {}: {}", path.display(), e))
        })?;
        let table = Table::from_reader(file).map_err(|e| match e {
            PipelineError::MalformedCsv(reason) => {
                PipelineError::Dataset(format!("{}: {}", path.display(), reason))
            }
            other => other,
        })?;
        let dataset = Self::from_table(table)?;
        debug!(path = %path.display(), rows = dataset.len(), "Reference dataset loaded");
        Ok(dataset)
    }

    pub fn from_table(table: Table) -> Result<Self> {
        let has_exam_score = table.has_column(EXAM_SCORE_COLUMN);
        let has_pass_fail = table.has_column(PASS_FAIL_COLUMN);
        let has_performance = table.has_column(PERFORMANCE_COLUMN);

        let rows = table
            .rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                reference_row(row)
                    .map_err(|e| PipelineError::Dataset(format!("row {}: {}", i + 1, e)))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            rows,
            has_exam_score,
            has_pass_fail,
            has_performance,
        })
    }

    pub fn rows(&self) -> &[ReferenceRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Scores for every row, or `None` when the column is absent
    pub fn exam_scores(&self) -> Result<Option<Vec<f64>>> {
        self.target(self.has_exam_score, EXAM_SCORE_COLUMN, |r| r.exam_score)
    }

    pub fn pass_fail(&self) -> Result<Option<Vec<String>>> {
        self.target(self.has_pass_fail, PASS_FAIL_COLUMN, |r| r.pass_fail.clone())
    }

    pub fn performance(&self) -> Result<Option<Vec<String>>> {
        self.target(self.has_performance, PERFORMANCE_COLUMN, |r| {
            r.performance.clone()
        })
    }

    fn target<T>(
        &self,
        present: bool,
        column: &str,
        get: impl Fn(&ReferenceRow) -> Option<T>,
    ) -> Result<Option<Vec<T>>> {
        if !present {
            return Ok(None);
        }
        self.rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                get(row).ok_or_else(|| {
                    PipelineError::Dataset(format!("row {}: empty '{}'", i + 1, column))
                })
            })
            .collect::<Result<Vec<T>>>()
            .map(Some)
    }
}

fn reference_row(row: &Map<String, Value>) -> Result<ReferenceRow> {
    let exam_score = match row.get(EXAM_SCORE_COLUMN) {
        None | Some(Value::Null) => None,
        Some(v) => Some(coerce_numeric(EXAM_SCORE_COLUMN, v)?),
    };
    Ok(ReferenceRow {
        record: FeatureRecord::from_map(row)?,
        exam_score,
        pass_fail: label(row, PASS_FAIL_COLUMN),
        performance: label(row, PERFORMANCE_COLUMN),
    })
}

fn label(row: &Map<String, Value>, column: &str) -> Option<String> {
    match row.get(column)? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}
