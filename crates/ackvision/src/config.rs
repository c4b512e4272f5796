//! Service configuration

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable naming an optional configuration file
pub const CONFIG_FILE_ENV: &str = "ACKVISION_CONFIG";

/// Service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// HTTP listen port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory holding the training artifacts
    #[serde(default = "default_models_dir")]
    pub models_dir: PathBuf,

    /// Reference dataset used by the metrics and visualization routes
    #[serde(default = "default_data_path")]
    pub data_path: PathBuf,

    /// Largest accepted request body for batch uploads
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    #[serde(default = "default_service_name")]
    pub service_name: String,
}

fn default_port() -> u16 {
    5000
}

fn default_models_dir() -> PathBuf {
    PathBuf::from("models")
}

fn default_data_path() -> PathBuf {
    PathBuf::from("data/student_synthetic_data.csv")
}

fn default_max_upload_bytes() -> usize {
    5 * 1024 * 1024
}

fn default_service_name() -> String {
    "ackvision".to_string()
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            models_dir: default_models_dir(),
            data_path: default_data_path(),
            max_upload_bytes: default_max_upload_bytes(),
            service_name: default_service_name(),
        }
    }
}

impl ServiceConfig {
    /// Load from the file named by `ACKVISION_CONFIG` (if set), overridden by
    /// `ACKVISION_*` environment variables
    pub fn load() -> Result<Self> {
        let file = std::env::var_os(CONFIG_FILE_ENV).map(PathBuf::from);
        Self::load_from(file.as_deref())
    }

    pub fn load_from(file: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let config = builder
            .add_source(config::Environment::with_prefix("ACKVISION").try_parsing(true))
            .build()
            .context("Failed to read configuration")?;

        config
            .try_deserialize()
            .context("Invalid configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.port, 5000);
        assert_eq!(config.models_dir, PathBuf::from("models"));
        assert_eq!(config.max_upload_bytes, 5 * 1024 * 1024);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "port = 8081").unwrap();
        writeln!(file, "models_dir = \"/srv/ackvision/models\"").unwrap();

        let config = ServiceConfig::load_from(Some(file.path())).unwrap();
        assert_eq!(config.port, 8081);
        assert_eq!(config.models_dir, PathBuf::from("/srv/ackvision/models"));
        assert_eq!(config.data_path, default_data_path());
    }

    #[test]
    fn test_missing_file_is_error() {
        assert!(ServiceConfig::load_from(Some(Path::new("/nonexistent/ackvision.toml"))).is_err());
    }
}
