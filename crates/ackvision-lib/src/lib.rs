//! Core library for the AckVision student performance service
//!
//! This crate provides:
//! - Loading and cross-checking the offline training artifacts
//! - Feature validation, encoding and scaling
//! - Inference over the four trained models
//! - Rule-based advisory messages
//! - Evaluation metrics over the reference dataset
//! - Health checks and observability

pub mod advisory;
pub mod artifacts;
pub mod error;
pub mod evaluation;
pub mod health;
pub mod models;
pub mod observability;
pub mod pipeline;
pub mod predictor;
pub mod table;

pub use error::{PipelineError, Result};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{ServiceMetrics, StructuredLogger};
pub use pipeline::{ArtifactConfig, Pipeline, RiskMappingCheck};
