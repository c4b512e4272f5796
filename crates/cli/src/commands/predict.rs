//! Single and batch prediction commands

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::Path;
use tabled::Tabled;

use crate::client::{ApiClient, BatchResponse, PredictionResponse, StudentRecord};
use crate::output::{color_label, color_severity, format_score, print_json, print_table, OutputFormat};

/// Row for the batch results table
#[derive(Tabled)]
struct BatchRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Exam Score")]
    exam_score: String,
    #[tabled(rename = "Pass/Fail")]
    pass_fail: String,
    #[tabled(rename = "Performance")]
    performance: String,
    #[tabled(rename = "Risk")]
    risk_cluster: String,
}

/// Predict one student's outcomes
pub async fn predict(client: &ApiClient, student: &StudentRecord, format: OutputFormat) -> Result<()> {
    let result: PredictionResponse = client.post("predict", student).await?;

    match format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Table => print_prediction(&result),
    }

    Ok(())
}

fn print_prediction(result: &PredictionResponse) {
    println!("{}", "Prediction".bold());
    println!("{}", "=".repeat(50));
    println!(
        "Exam Score:      {} {}",
        color_severity(&result.badge.color, &format_score(result.exam_score)),
        result.badge.emoji
    );
    println!("Pass/Fail:       {}", color_label(&result.pass_fail));
    println!("Performance:     {}", color_label(&result.performance));
    println!("Risk Cluster:    {}", color_label(&result.risk_cluster));

    if !result.advisory.is_empty() {
        println!();
        println!("{}", "Advisory".bold());
        println!("{}", "-".repeat(50));
        for tip in &result.advisory {
            println!("  {}", tip);
        }
    }
}

/// Upload a CSV of students for batch prediction
pub async fn batch(client: &ApiClient, file: &Path, format: OutputFormat) -> Result<()> {
    let content = std::fs::read(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let file_name = file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload.csv".to_string());

    let result: BatchResponse = client.upload_csv("upload", &file_name, content).await?;

    match format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Table => {
            println!("{} {}", "Predicted rows:".bold(), result.count);
            print_table(batch_rows(&result));
        }
    }

    Ok(())
}

fn batch_rows(result: &BatchResponse) -> Vec<BatchRow> {
    let text = |row: &serde_json::Map<String, serde_json::Value>, key: &str| {
        row.get(key)
            .and_then(|v| v.as_str())
            .unwrap_or("-")
            .to_string()
    };

    result
        .results
        .iter()
        .enumerate()
        .map(|(i, row)| BatchRow {
            index: i + 1,
            exam_score: row
                .get("exam_score")
                .and_then(|v| v.as_f64())
                .map(|s| format!("{:.2}", s))
                .unwrap_or_else(|| "-".to_string()),
            pass_fail: text(row, "pass_fail"),
            performance: text(row, "performance"),
            risk_cluster: text(row, "risk_cluster"),
        })
        .collect()
}
