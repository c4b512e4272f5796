//! API client for the AckVision service

use anyhow::{Context, Result};
use reqwest::{multipart, Client, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;

/// API client for the prediction service
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid API URL")?;

        Ok(Self { client, base_url })
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send request")?;

        parse(response).await
    }

    /// GET a health endpoint whose body is meaningful even on 503
    pub async fn get_health<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send request")?;

        if response.status() == reqwest::StatusCode::SERVICE_UNAVAILABLE {
            return response.json().await.context("Failed to parse response");
        }
        parse(response).await
    }

    /// Make a POST request with JSON body
    pub async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .context("Failed to send request")?;

        parse(response).await
    }

    /// Upload a CSV file as the multipart field `file`
    pub async fn upload_csv<T: DeserializeOwned>(
        &self,
        path: &str,
        file_name: &str,
        content: Vec<u8>,
    ) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let part = multipart::Part::bytes(content)
            .file_name(file_name.to_string())
            .mime_str("text/csv")
            .context("Invalid content type")?;
        let form = multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await
            .context("Failed to send request")?;

        parse(response).await
    }
}

async fn parse<T: DeserializeOwned>(response: Response) -> Result<T> {
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<ErrorResponse>(&body) {
            Ok(err) => err.to_string(),
            Err(_) => body,
        };
        anyhow::bail!("API error ({}): {}", status, message);
    }

    response.json().await.context("Failed to parse response")
}

// API request and response types

/// The nine student inputs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentRecord {
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

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Badge {
    pub color: String,
    pub emoji: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub exam_score: f64,
    pub pass_fail: String,
    pub performance: String,
    pub risk_cluster: String,
    pub advisory: Vec<String>,
    pub badge: Badge,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResponse {
    pub count: usize,
    pub results: Vec<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvisoryRequest {
    pub exam_score: f64,
    pub pass_fail: String,
    pub performance: String,
    pub risk_cluster: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attendance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub study_hours: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sleep_hours: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub internet_usage: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvisoryResponse {
    pub advisory: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<BTreeMap<String, ModelMetrics>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// One model's entry of the evaluation report; fields depend on the task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub name: String,
    pub task: String,
    #[serde(flatten)]
    pub values: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_check_timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub components: BTreeMap<String, ComponentHealth>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing: Option<Vec<String>>,
}

impl std::fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.missing {
            Some(missing) if !missing.is_empty() => {
                write!(f, "{} (missing: {})", self.error, missing.join(", "))
            }
            _ => write!(f, "{}", self.error),
        }
    }
}
