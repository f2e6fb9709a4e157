//! Configuration management for survey-export
//!
//! This module handles loading, parsing, and managing configuration from various sources:
//! - Configuration files (TOML format)
//! - Environment variables
//! - Command-line arguments
//!
//! Configuration precedence (highest to lowest):
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. Configuration file
//! 4. Default values

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, Result};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Document store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Blob storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Export pipeline configuration
    #[serde(default)]
    pub export: ExportConfig,

    /// Geometry conversion tool configuration
    #[serde(default)]
    pub converter: ConverterConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Document store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// MongoDB connection URI
    #[serde(default = "default_uri")]
    pub uri: String,

    /// Database used when the URI names none
    #[serde(default)]
    pub database: Option<String>,

    /// Collection holding feature documents
    #[serde(default = "default_collection")]
    pub collection: String,

    /// Connection timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Documents fetched per cursor batch
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
}

/// Blob storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Storage region
    #[serde(default = "default_region")]
    pub region: String,

    /// Custom endpoint for S3-compatible providers
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Access key id; falls back to the provider's credential chain
    #[serde(default)]
    pub access_key_id: Option<String>,

    /// Secret access key
    #[serde(default)]
    pub secret_access_key: Option<String>,

    /// Allow plain HTTP endpoints
    #[serde(default)]
    pub allow_http: bool,
}

/// Export pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Directory for intermediates and artifacts
    #[serde(default = "default_tmp_dir")]
    pub tmp_dir: PathBuf,

    /// Entries buffered between the cursor and the encoder
    #[serde(default = "default_watermark")]
    pub watermark: usize,

    /// Seconds between progress log lines
    #[serde(default = "default_progress_interval")]
    pub progress_interval: u64,
}

/// Geometry conversion tool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConverterConfig {
    /// Program to run
    #[serde(default = "default_program")]
    pub program: String,

    /// Argument template; `{input}`, `{output}` and `{layer}` are substituted
    #[serde(default = "default_args")]
    pub args: Vec<String>,

    /// Maximum number of conversions running at once
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: LogLevel,

    /// Enable timestamps in logs
    #[serde(default = "default_log_timestamps")]
    pub timestamps: bool,
}

/// Log level options
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

// Default value functions
fn default_uri() -> String {
    "mongodb://localhost:27017/survey".to_string()
}

fn default_collection() -> String {
    "features".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_batch_size() -> u32 {
    100
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_tmp_dir() -> PathBuf {
    std::env::temp_dir()
}

fn default_watermark() -> usize {
    5
}

fn default_progress_interval() -> u64 {
    5
}

fn default_program() -> String {
    "ogr2ogr".to_string()
}

fn default_args() -> Vec<String> {
    [
        "-s_srs",
        "EPSG:4326",
        "-t_srs",
        "EPSG:4326",
        "-f",
        "ESRI Shapefile",
        "{output}/{layer}.shp",
        "{input}",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_concurrency() -> usize {
    2
}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}

fn default_log_timestamps() -> bool {
    true
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            uri: default_uri(),
            database: None,
            collection: default_collection(),
            timeout: default_timeout(),
            batch_size: default_batch_size(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            endpoint: None,
            access_key_id: None,
            secret_access_key: None,
            allow_http: false,
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            tmp_dir: default_tmp_dir(),
            watermark: default_watermark(),
            progress_interval: default_progress_interval(),
        }
    }
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: default_args(),
            concurrency: default_concurrency(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            timestamps: default_log_timestamps(),
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from file and environment
    ///
    /// An explicit path must exist. Without one, the default location is
    /// used when present and defaults otherwise.
    ///
    /// # Arguments
    /// * `path` - Optional configuration file path
    ///
    /// # Returns
    /// * `Result<Config>` - Loaded configuration or error
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };

        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    ///
    /// # Arguments
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    /// * `Result<Config>` - Parsed configuration or error
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound(path.display().to_string()))?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| ConfigError::InvalidFormat(e.to_string()).into())
    }

    /// Default configuration file location
    ///
    /// # Returns
    /// * `Option<PathBuf>` - `<config dir>/survey-export/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("survey-export").join("config.toml"))
    }

    /// Apply environment overrides
    ///
    /// Recognized variables: `MONGO`, `S3_KEY`, `S3_SECRET`, `S3_REGION`,
    /// `S3_ENDPOINT`, `EXPORT_TMPDIR`. Empty values are ignored.
    ///
    /// # Arguments
    /// * `lookup` - Variable lookup, `std::env::var` outside of tests
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(uri) = get("MONGO") {
            self.store.uri = uri;
        }
        if let Some(key) = get("S3_KEY") {
            self.storage.access_key_id = Some(key);
        }
        if let Some(secret) = get("S3_SECRET") {
            self.storage.secret_access_key = Some(secret);
        }
        if let Some(region) = get("S3_REGION") {
            self.storage.region = region;
        }
        if let Some(endpoint) = get("S3_ENDPOINT") {
            self.storage.endpoint = Some(endpoint);
        }
        if let Some(dir) = get("EXPORT_TMPDIR") {
            self.export.tmp_dir = PathBuf::from(dir);
        }
    }

    /// Validate the configuration
    ///
    /// # Returns
    /// * `Result<()>` - Ok if valid, error otherwise
    pub fn validate(&self) -> Result<()> {
        let invalid = |field: &str, value: String| -> Result<()> {
            Err(ConfigError::InvalidValue {
                field: field.to_string(),
                value,
            }
            .into())
        };

        if self.store.batch_size == 0 {
            return invalid("store.batch_size", "0".to_string());
        }
        if self.export.watermark == 0 {
            return invalid("export.watermark", "0".to_string());
        }
        if self.converter.concurrency == 0 {
            return invalid("converter.concurrency", "0".to_string());
        }
        if self.converter.program.trim().is_empty() {
            return invalid("converter.program", self.converter.program.clone());
        }
        Ok(())
    }

    /// Get progress interval as Duration
    pub fn progress_interval(&self) -> Duration {
        Duration::from_secs(self.export.progress_interval)
    }
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}
