//! HTTP API: prediction, batch upload, advisory, evaluation, health and
//! Prometheus metrics

use ackvision_lib::{
    advisory::{self, AdvisoryInputs},
    evaluation::{self, ReferenceDataset},
    health::{components, ComponentStatus, HealthRegistry},
    observability::{ServiceMetrics, StructuredLogger},
    predictor::features::{canonicalize_headers, coerce_numeric},
    table::Table,
    FeatureRecord, Pipeline, PipelineError, PredictionResponse, RiskMappingCheck,
};
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub health_registry: HealthRegistry,
    pub metrics: ServiceMetrics,
    pub logger: StructuredLogger,
    /// Reference dataset, re-read on every evaluation request
    pub data_path: PathBuf,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(
        pipeline: Arc<Pipeline>,
        health_registry: HealthRegistry,
        metrics: ServiceMetrics,
        logger: StructuredLogger,
        data_path: PathBuf,
        max_upload_bytes: usize,
    ) -> Self {
        Self {
            pipeline,
            health_registry,
            metrics,
            logger,
            data_path,
            max_upload_bytes,
        }
    }

    /// Count and log a failed request
    fn reject(&self, err: impl Into<ApiError>) -> ApiError {
        let err = err.into();
        self.metrics.inc_request_errors(err.kind());
        warn!(kind = err.kind(), error = %err.message(), "Request failed");
        err
    }

    /// Compare the stored risk map with the reference data and record the
    /// outcome on the `reference_data` health component. A disagreement only
    /// degrades health; the stored map keeps being used.
    pub async fn check_reference_data(&self) {
        let dataset = match ReferenceDataset::load(&self.data_path) {
            Ok(dataset) => dataset,
            Err(e) => {
                warn!(path = %self.data_path.display(), error = %e, "Reference dataset unavailable");
                self.health_registry
                    .set_degraded(components::REFERENCE_DATA, e.to_string())
                    .await;
                return;
            }
        };

        match self.pipeline.verify_risk_mapping(&dataset) {
            RiskMappingCheck::Consistent => {
                info!(rows = dataset.len(), "Risk mapping matches reference data");
                self.health_registry
                    .set_healthy(components::REFERENCE_DATA)
                    .await;
            }
            RiskMappingCheck::Disagrees { expected, stored } => {
                self.logger.log_risk_mapping_disagreement(&stored, &expected);
                self.health_registry
                    .set_degraded(
                        components::REFERENCE_DATA,
                        format!(
                            "stored risk mapping {:?} disagrees with recomputed {:?}",
                            stored, expected
                        ),
                    )
                    .await;
            }
            RiskMappingCheck::Unavailable(reason) => {
                warn!(reason = %reason, "Risk mapping check skipped");
                self.health_registry
                    .set_degraded(components::REFERENCE_DATA, reason)
                    .await;
            }
        }
    }
}

/// Request failure rendered as `{"error": ...}`
#[derive(Debug)]
pub enum ApiError {
    Pipeline(PipelineError),
    BadRequest(String),
    Status(StatusCode, String),
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        ApiError::Pipeline(err)
    }
}

impl ApiError {
    fn kind(&self) -> &'static str {
        match self {
            ApiError::Pipeline(PipelineError::MissingField(_)) => "missing_field",
            ApiError::Pipeline(PipelineError::InvalidValue { .. }) => "invalid_value",
            ApiError::Pipeline(PipelineError::UnknownCategory { .. }) => "unknown_category",
            ApiError::Pipeline(PipelineError::MalformedCsv(_)) => "malformed_csv",
            ApiError::Pipeline(_) => "internal",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Status(status, _) if status.is_client_error() => "bad_request",
            ApiError::Status(..) => "internal",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::Pipeline(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            ApiError::Pipeline(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Status(status, _) => *status,
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::Pipeline(e) => e.to_string(),
            ApiError::BadRequest(m) | ApiError::Status(_, m) => m.clone(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = json!({ "error": self.message() });
        if let ApiError::Pipeline(PipelineError::MissingField(missing)) = &self {
            body["missing"] = json!(missing);
        }
        (self.status(), Json(body)).into_response()
    }
}

/// Parse a request body as a non-empty JSON object
fn parse_object(body: &[u8]) -> Result<Map<String, Value>, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(ApiError::BadRequest("No input data received.".to_string()));
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) if !map.is_empty() => Ok(map),
        Ok(_) => Err(ApiError::BadRequest(
            "Expected a non-empty JSON object.".to_string(),
        )),
        Err(e) => Err(ApiError::BadRequest(format!("Invalid JSON: {}", e))),
    }
}

/// Single-record prediction
async fn predict(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<PredictionResponse>, ApiError> {
    let record = parse_object(&body).map_err(|e| state.reject(e))?;
    let response = state
        .pipeline
        .predict_map(&record)
        .map_err(|e| state.reject(e))?;

    state.metrics.inc_predictions_served();
    let p = &response.prediction;
    state.logger.log_prediction(
        p.exam_score,
        &p.pass_fail,
        &p.performance,
        &p.risk_cluster,
        response.advisory.len(),
    );

    Ok(Json(response))
}

/// Batch prediction over an uploaded CSV. One bad row fails the upload.
async fn upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let start = Instant::now();

    let mut file = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| state.reject(ApiError::Status(e.status(), e.body_text())))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let name = field.file_name().unwrap_or_default().to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| state.reject(ApiError::Status(e.status(), e.body_text())))?;
        file = Some((name, data));
        break;
    }

    let (name, data) =
        file.ok_or_else(|| state.reject(ApiError::BadRequest("No file provided.".to_string())))?;
    if !name.to_ascii_lowercase().ends_with(".csv") {
        return Err(state.reject(ApiError::BadRequest(
            "Please upload a valid .csv file.".to_string(),
        )));
    }

    let table = Table::from_reader(data.as_ref()).map_err(|e| state.reject(e))?;
    let records = table
        .rows
        .iter()
        .map(FeatureRecord::from_map)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| state.reject(e))?;
    let predictions = state
        .pipeline
        .predict_records(&records)
        .map_err(|e| state.reject(e))?;

    let results: Vec<Map<String, Value>> = table
        .rows
        .into_iter()
        .zip(predictions)
        .map(|(mut row, response)| {
            let p = response.prediction;
            row.insert("exam_score".to_string(), json!(p.exam_score));
            row.insert("pass_fail".to_string(), json!(p.pass_fail));
            row.insert("performance".to_string(), json!(p.performance));
            row.insert("risk_cluster".to_string(), json!(p.risk_cluster));
            row.insert("advisory".to_string(), json!(response.advisory));
            row
        })
        .collect();

    state.metrics.inc_batch_rows(results.len() as u64);
    state
        .logger
        .log_batch(results.len(), start.elapsed().as_millis() as u64);

    Ok(Json(json!({ "count": results.len(), "results": results })))
}

/// Advisory for predictions computed elsewhere
async fn advisory(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let data = canonicalize_headers(parse_object(&body).map_err(|e| state.reject(e))?);

    let exam_score = match data.get("exam_score") {
        None | Some(Value::Null) => 0.0,
        Some(v) => coerce_numeric("exam_score", v).map_err(|e| state.reject(e))?,
    };
    let text = |key: &str| data.get(key).and_then(Value::as_str).unwrap_or("");

    let tips = advisory::advise(
        exam_score,
        text("pass_fail"),
        text("performance"),
        text("risk_cluster"),
        Some(&AdvisoryInputs::from_map(&data)),
    );
    Ok(Json(json!({ "advisory": tips })))
}

/// Evaluation report; failures are reported in the body with status 200
async fn api_metrics(State(state): State<Arc<AppState>>) -> Json<Value> {
    let pipeline = state.pipeline.clone();
    let path = state.data_path.clone();

    let result = tokio::task::spawn_blocking(move || {
        let dataset = ReferenceDataset::load(&path)?;
        evaluation::evaluate(&pipeline, &dataset)
    })
    .await;

    match result {
        Ok(Ok(report)) => Json(json!({ "status": "ok", "metrics": report })),
        Ok(Err(e)) => {
            let message = e.to_string();
            state.reject(ApiError::Status(StatusCode::INTERNAL_SERVER_ERROR, message.clone()));
            Json(json!({ "status": "error", "message": message }))
        }
        Err(e) => {
            let message = e.to_string();
            state.reject(ApiError::Status(StatusCode::INTERNAL_SERVER_ERROR, message.clone()));
            Json(json!({ "status": "error", "message": message }))
        }
    }
}

/// Chart data for the cluster scatter plot and target distributions
async fn api_visualize(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let pipeline = state.pipeline.clone();
    let path = state.data_path.clone();

    let data = tokio::task::spawn_blocking(move || {
        let dataset = ReferenceDataset::load(&path)?;
        evaluation::cluster_overview(&pipeline, &dataset)
    })
    .await
    .map_err(|e| {
        state.reject(ApiError::Status(
            StatusCode::INTERNAL_SERVER_ERROR,
            e.to_string(),
        ))
    })?
    .map_err(|e| {
        state.reject(ApiError::Status(
            StatusCode::INTERNAL_SERVER_ERROR,
            e.to_string(),
        ))
    })?;

    Ok(Json(json!(data)))
}

/// Health check response - returns 200 if healthy or degraded, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 if ready, 503 if not ready
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    let upload_limit = state.max_upload_bytes;
    Router::new()
        .route("/predict", post(predict))
        .route(
            "/upload",
            post(upload).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/advisory", post(advisory))
        .route("/api/metrics", get(api_metrics))
        .route("/api/visualize", get(api_visualize))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Start the API server
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
