//! Model evaluation over the reference dataset
//!
//! Everything here is recomputed from the CSV on each call.

mod dataset;
pub mod metrics;

pub use dataset::{
    ReferenceDataset, ReferenceRow, EXAM_SCORE_COLUMN, PASS_FAIL_COLUMN, PERFORMANCE_COLUMN,
};

use crate::error::{PipelineError, Result};
use crate::models::EncodedFeatureVector;
use crate::pipeline::Pipeline;
use crate::predictor::output::{LabelTable, UNKNOWN_LABEL};
use crate::predictor::ModelName;
use metrics::{
    accuracy, mean_absolute_error, r2_score, root_mean_squared_error, round4, silhouette_score,
    weighted_scores,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub name: String,
    pub task: String,
    pub mae: f64,
    pub rmse: f64,
    pub r2: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    pub name: String,
    pub task: String,
    pub accuracy: f64,
    pub f1: f64,
    pub precision: f64,
    pub recall: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusteringMetrics {
    pub name: String,
    pub task: String,
    pub silhouette_score: f64,
    pub inertia: f64,
    pub n_clusters: usize,
}

/// Metrics for every model whose target is present in the dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linear_regression: Option<RegressionMetrics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision_tree: Option<ClassificationMetrics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub knn: Option<ClassificationMetrics>,
    pub kmeans: ClusteringMetrics,
}

/// Score all four models against the reference dataset
pub fn evaluate(pipeline: &Pipeline, dataset: &ReferenceDataset) -> Result<EvaluationReport> {
    let vectors = encode_all(pipeline, dataset)?;
    let engine = pipeline.engine();

    let linear_regression = match dataset.exam_scores()? {
        Some(y_true) => {
            let y_pred = vectors
                .iter()
                .map(|v| engine.raw_score(v))
                .collect::<Result<Vec<_>>>()?;
            Some(RegressionMetrics {
                name: "Linear Regression".to_string(),
                task: "Regression (Final Exam Score)".to_string(),
                mae: round4(mean_absolute_error(&y_true, &y_pred)),
                rmse: round4(root_mean_squared_error(&y_true, &y_pred)),
                r2: round4(r2_score(&y_true, &y_pred)),
            })
        }
        None => None,
    };

    let decision_tree = match dataset.pass_fail()? {
        Some(y_true) => {
            check_targets(&engine.labels().pass_fail, PASS_FAIL_COLUMN, &y_true)?;
            let y_pred = vectors
                .iter()
                .map(|v| engine.predict_pass_fail(v))
                .collect::<Result<Vec<_>>>()?;
            Some(classification(
                "Decision Tree",
                "Classification (Pass/Fail)",
                &y_true,
                &y_pred,
            ))
        }
        None => None,
    };

    let knn = match dataset.performance()? {
        Some(y_true) => {
            check_targets(&engine.labels().performance, PERFORMANCE_COLUMN, &y_true)?;
            let y_pred = vectors
                .iter()
                .map(|v| engine.predict_performance(v))
                .collect::<Result<Vec<_>>>()?;
            Some(classification(
                "K-Nearest Neighbours",
                "Classification (Performance Category)",
                &y_true,
                &y_pred,
            ))
        }
        None => None,
    };

    let cluster_ids = vectors
        .iter()
        .map(|v| engine.cluster_of(v))
        .collect::<Result<Vec<_>>>()?;
    let points: Vec<&[f64]> = vectors.iter().map(EncodedFeatureVector::as_slice).collect();
    let clusterer = engine.models().get(ModelName::KMeans)?;
    let kmeans = ClusteringMetrics {
        name: "K-Means Clustering".to_string(),
        task: "Clustering (Academic Risk Groups)".to_string(),
        silhouette_score: round4(silhouette_score(&points, &cluster_ids)),
        inertia: round4(clusterer.training_inertia().unwrap_or(0.0)),
        n_clusters: clusterer.n_outputs().unwrap_or(0),
    };

    Ok(EvaluationReport {
        linear_regression,
        decision_tree,
        knn,
        kmeans,
    })
}

fn encode_all(pipeline: &Pipeline, dataset: &ReferenceDataset) -> Result<Vec<EncodedFeatureVector>> {
    if dataset.is_empty() {
        return Err(PipelineError::Dataset(
            "reference dataset has no rows".to_string(),
        ));
    }
    dataset
        .rows()
        .iter()
        .map(|row| pipeline.encode(&row.record))
        .collect()
}

/// Ground-truth labels must come from the model's label table
fn check_targets(table: &LabelTable, column: &str, y_true: &[String]) -> Result<()> {
    match y_true.iter().find(|label| table.code_of(label).is_none()) {
        Some(label) => Err(PipelineError::UnknownCategory {
            field: column.to_string(),
            value: label.clone(),
        }),
        None => Ok(()),
    }
}

fn classification(name: &str, task: &str, y_true: &[String], y_pred: &[String]) -> ClassificationMetrics {
    let scores = weighted_scores(y_true, y_pred);
    ClassificationMetrics {
        name: name.to_string(),
        task: task.to_string(),
        accuracy: round4(accuracy(y_true, y_pred)),
        f1: round4(scores.f1),
        precision: round4(scores.precision),
        recall: round4(scores.recall),
    }
}

/// Per-row cluster assignment for the scatter plot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterPoints {
    pub cluster_ids: Vec<usize>,
    pub labels: Vec<String>,
    pub attendance: Vec<f64>,
    pub study_hours: Vec<f64>,
}

/// Chart data: cluster scatter plus target value counts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VisualizationData {
    pub clusters: ClusterPoints,
    pub performance: BTreeMap<String, usize>,
    pub pass_fail: BTreeMap<String, usize>,
}

pub fn cluster_overview(pipeline: &Pipeline, dataset: &ReferenceDataset) -> Result<VisualizationData> {
    let engine = pipeline.engine();
    let mut clusters = ClusterPoints::default();

    for row in dataset.rows() {
        let cluster = engine.cluster_of(&pipeline.encode(&row.record)?)?;
        let label = engine
            .labels()
            .risk
            .decode(cluster)
            .unwrap_or(UNKNOWN_LABEL);
        clusters.cluster_ids.push(cluster);
        clusters.labels.push(label.to_string());
        clusters.attendance.push(row.record.attendance);
        clusters.study_hours.push(row.record.study_hours);
    }

    Ok(VisualizationData {
        clusters,
        performance: value_counts(dataset.performance()?),
        pass_fail: value_counts(dataset.pass_fail()?),
    })
}

fn value_counts(values: Option<Vec<String>>) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for value in values.into_iter().flatten() {
        *counts.entry(value).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::ArtifactConfig;
    use std::path::{Path, PathBuf};

    fn fixtures() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
    }

    fn setup() -> (Pipeline, ReferenceDataset) {
        let pipeline =
            Pipeline::initialize(&ArtifactConfig::new(fixtures().join("models"))).unwrap();
        let dataset = ReferenceDataset::load(fixtures().join("reference.csv")).unwrap();
        (pipeline, dataset)
    }

    #[test]
    fn test_evaluate_reference_dataset() {
        let (pipeline, dataset) = setup();
        let report = evaluate(&pipeline, &dataset).unwrap();

        let linear = report.linear_regression.unwrap();
        assert!(linear.r2 > 0.9, "r2 = {}", linear.r2);
        assert!(linear.mae < 5.0);

        let tree = report.decision_tree.unwrap();
        assert_eq!(tree.accuracy, 1.0);
        assert_eq!(tree.f1, 1.0);

        let knn = report.knn.unwrap();
        assert_eq!(knn.accuracy, 1.0);

        assert_eq!(report.kmeans.n_clusters, 3);
        assert_eq!(report.kmeans.inertia, 412.5731);
        assert!(report.kmeans.silhouette_score > 0.0);
    }

    #[test]
    fn test_report_serializes_with_model_keys() {
        let (pipeline, dataset) = setup();
        let json = serde_json::to_value(evaluate(&pipeline, &dataset).unwrap()).unwrap();
        assert_eq!(json["linear_regression"]["name"], "Linear Regression");
        assert_eq!(json["knn"]["task"], "Classification (Performance Category)");
        assert_eq!(json["kmeans"]["n_clusters"], 3);
    }

    #[test]
    fn test_report_omits_models_without_targets() {
        let (pipeline, dataset) = setup();
        let rows: Vec<String> = dataset
            .rows()
            .iter()
            .map(|r| {
                let f = &r.record;
                format!(
                    "{},{},{},{},{},{},{},{},{}",
                    f.attendance,
                    f.study_hours,
                    f.assignment_score,
                    f.previous_gpa,
                    f.participation_level,
                    f.internet_usage,
                    f.sleep_hours,
                    f.family_support,
                    f.extra_curricular
                )
            })
            .collect();
        let csv = format!(
            "attendance,study_hours,assignment_score,previous_gpa,participation_level,internet_usage,sleep_hours,family_support,extra_curricular\n{}\n",
            rows.join("\n")
        );
        let table = crate::table::Table::from_reader(csv.as_bytes()).unwrap();
        let bare = ReferenceDataset::from_table(table).unwrap();

        let report = evaluate(&pipeline, &bare).unwrap();
        assert!(report.linear_regression.is_none());
        assert!(report.decision_tree.is_none());
        assert!(report.knn.is_none());
        assert_eq!(report.kmeans.n_clusters, 3);
    }

    #[test]
    fn test_unknown_target_label_rejected() {
        let (pipeline, dataset) = setup();
        let mut table = crate::table::Table::from_reader(
            std::fs::File::open(fixtures().join("reference.csv")).unwrap(),
        )
        .unwrap();
        table.rows[0].insert(PASS_FAIL_COLUMN.to_string(), "Maybe".into());
        let dataset_bad = ReferenceDataset::from_table(table).unwrap();

        assert!(evaluate(&pipeline, &dataset).is_ok());
        assert!(matches!(
            evaluate(&pipeline, &dataset_bad),
            Err(PipelineError::UnknownCategory { .. })
        ));
    }

    #[test]
    fn test_cluster_overview() {
        let (pipeline, dataset) = setup();
        let overview = cluster_overview(&pipeline, &dataset).unwrap();

        assert_eq!(overview.clusters.cluster_ids, [0, 1, 2, 0, 1, 2]);
        assert_eq!(overview.clusters.labels[0], "High Risk");
        assert_eq!(overview.clusters.labels[2], "Low Risk");
        assert_eq!(overview.clusters.attendance[2], 90.0);
        assert_eq!(overview.pass_fail["Pass"], 4);
        assert_eq!(overview.performance["Low"], 2);
    }
}
