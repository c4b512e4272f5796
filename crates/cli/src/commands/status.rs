//! Model metrics and service health commands

use anyhow::Result;
use colored::Colorize;
use tabled::Tabled;

use crate::client::{ApiClient, HealthResponse, MetricsResponse, ModelMetrics, ReadinessResponse};
use crate::output::{
    color_status, format_timestamp, print_error, print_json, print_success, print_table,
    print_warning, OutputFormat,
};

/// Row for the model metrics table
#[derive(Tabled)]
struct MetricRow {
    #[tabled(rename = "Model")]
    name: String,
    #[tabled(rename = "Task")]
    task: String,
    #[tabled(rename = "Metrics")]
    values: String,
}

/// Row for the component health table
#[derive(Tabled)]
struct ComponentRow {
    #[tabled(rename = "Component")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Message")]
    message: String,
    #[tabled(rename = "Last Check")]
    last_check: String,
}

/// Show the evaluation report for all models
pub async fn show_metrics(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let result: MetricsResponse = client.get("api/metrics").await?;

    if let OutputFormat::Json = format {
        return print_json(&result);
    }

    match result.metrics {
        Some(metrics) if result.status == "ok" => {
            println!("{}", "Model Evaluation".bold());
            print_table(metrics.values().map(metric_row).collect());
        }
        _ => print_error(&format!(
            "Evaluation failed: {}",
            result.message.as_deref().unwrap_or("unknown error")
        )),
    }

    Ok(())
}

fn metric_row(model: &ModelMetrics) -> MetricRow {
    let values = model
        .values
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join(", ");
    MetricRow {
        name: model.name.clone(),
        task: model.task.clone(),
        values,
    }
}

/// Show service health and readiness
pub async fn show_health(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let health: HealthResponse = client.get_health("healthz").await?;
    let readiness: ReadinessResponse = client.get_health("readyz").await?;

    if let OutputFormat::Json = format {
        return print_json(&serde_json::json!({
            "health": health,
            "readiness": readiness,
        }));
    }

    println!("{} {}", "Overall:".bold(), color_status(&health.status));
    let rows = health
        .components
        .iter()
        .map(|(name, component)| ComponentRow {
            name: name.clone(),
            status: color_status(&component.status),
            message: component.message.clone().unwrap_or_else(|| "-".to_string()),
            last_check: format_timestamp(component.last_check_timestamp),
        })
        .collect();
    print_table(rows);

    if readiness.ready {
        print_success("Ready to serve predictions");
    } else {
        print_warning(&format!(
            "Not ready: {}",
            readiness.reason.as_deref().unwrap_or("unknown")
        ));
    }

    Ok(())
}
