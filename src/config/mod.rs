//! Configuration module for DevSync Uploadr
//!
//! Handles loading and parsing of YAML configuration files with support for
//! environment variable expansion and validation.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

mod loader;

pub use loader::ConfigLoader;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub upload: UploadConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Config {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        ConfigLoader::load(path)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.server.upload_path.starts_with('/') {
            return Err(ConfigError::ValidationError(format!(
                "Upload path '{}' must start with '/'",
                self.server.upload_path
            )));
        }

        self.upload.validate()
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub address: String,
    /// Route that accepts multipart uploads. Default: "/upload"
    #[serde(default = "default_upload_path")]
    pub upload_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            upload_path: default_upload_path(),
        }
    }
}

fn default_address() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_upload_path() -> String {
    "/upload".to_string()
}

/// Upload configuration
///
/// Passed by value into [`crate::upload::UploadHandler::new`], so every handler
/// instance carries its own limits and storage root.
///
/// # Example
///
/// ```yaml
/// upload:
///   directory: "${UPLOAD_DIR:-/var/lib/devsync/uploads}"
///   max_file_size: 1073741824
///   allowed_types: ["image/jpeg", "video/mp4"]
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Root directory; each device gets a subdirectory below it.
    pub directory: PathBuf,

    /// Largest accepted file in bytes. Default: 1GB
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    /// Bytes of multipart framing (boundaries, part headers) tolerated on top
    /// of `max_file_size` before the request body ceiling trips. Default: 16KB
    #[serde(default = "default_form_overhead")]
    pub form_overhead: u64,

    /// MIME types accepted after content sniffing.
    #[serde(default = "default_allowed_types")]
    pub allowed_types: Vec<String>,
}

impl UploadConfig {
    /// Create an upload configuration with default limits and allow-list
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            max_file_size: default_max_file_size(),
            form_overhead: default_form_overhead(),
            allowed_types: default_allowed_types(),
        }
    }

    /// Hard ceiling on raw request body bytes.
    ///
    /// One byte of slack above `max_file_size` lets the copy distinguish
    /// "exactly at the limit" from "over the limit".
    pub fn body_ceiling(&self) -> u64 {
        self.max_file_size
            .saturating_add(1)
            .saturating_add(self.form_overhead)
    }

    /// Validate the upload section
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.directory.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(
                "Upload directory cannot be empty".into(),
            ));
        }

        if self.max_file_size == 0 {
            return Err(ConfigError::ValidationError(
                "max_file_size must be greater than zero".into(),
            ));
        }

        if self.allowed_types.is_empty() {
            return Err(ConfigError::ValidationError(
                "At least one allowed content type must be configured".into(),
            ));
        }

        if let Some(bad) = self
            .allowed_types
            .iter()
            .find(|t| t.trim().is_empty() || !t.contains('/'))
        {
            return Err(ConfigError::ValidationError(format!(
                "Invalid allowed content type '{}': expected 'type/subtype'",
                bad
            )));
        }

        Ok(())
    }
}

fn default_max_file_size() -> u64 {
    1073741824 // 1GB
}

fn default_form_overhead() -> u64 {
    16384 // 16KB
}

fn default_allowed_types() -> Vec<String> {
    [
        "image/jpeg",
        "image/png",
        "image/gif",
        "image/webp",
        "image/heif",
        "image/heic",
        "video/mp4",
        "video/quicktime",
        "video/x-matroska",
        "application/pdf",
        "text/plain",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            port: default_metrics_port(),
        }
    }
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_metrics_port() -> u16 {
    9090
}
