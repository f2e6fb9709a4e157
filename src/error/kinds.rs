use std::path::PathBuf;
use std::{fmt, io};

use crate::error::mongo::ErrorInfo;
use crate::error::storage::UploadError;

/// Crate-wide `Result` type using [`ExportError`] as the error.
pub type Result<T> = std::result::Result<T, ExportError>;

/// Top-level error type for an export run.
///
/// Each variant corresponds to one failure class of the pipeline. Only
/// [`ExportError::TempFile`] is non-fatal: the orchestrator logs it and keeps
/// the outcome it had already decided.
#[derive(Debug)]
pub enum ExportError {
    /// Document store connectivity, query or cursor failure.
    DataAccess(DataAccessError),

    /// The schema discovery scan failed structurally.
    SchemaDiscovery(String),

    /// An entry could not be decoded or serialized.
    Encoding(EncodingError),

    /// The external geometry conversion tool failed.
    ExternalTool(ToolError),

    /// The blob store rejected the artifact.
    StorageUpload(UploadError),

    /// A temporary file or directory could not be removed.
    TempFile { path: PathBuf, source: io::Error },

    /// The job descriptor is unusable.
    InvalidJob(JobError),

    /// Configuration errors.
    Config(ConfigError),

    /// I/O errors outside of cleanup.
    Io(io::Error),
}

/// Document store errors.
#[derive(Debug)]
pub enum DataAccessError {
    /// Failed to establish a connection.
    ConnectionFailed(String),

    /// No database could be resolved from the URI or the configuration.
    NoDatabase,

    /// A query or aggregation could not be started.
    QueryFailed(String),

    /// The cursor failed while iterating.
    CursorError(String),
}

/// Errors raised while turning documents into output rows.
#[derive(Debug)]
pub enum EncodingError {
    /// A feature document did not match the expected layout.
    MalformedDocument { object_id: String, reason: String },

    /// JSON serialization failed.
    Json(String),

    /// The SQLite intermediate could not be written.
    Sqlite(String),

    /// The output archive could not be written.
    Archive(String),
}

/// Geometry conversion tool failures.
#[derive(Debug)]
pub enum ToolError {
    /// The tool could not be started.
    SpawnFailed { layer: String, message: String },

    /// The tool exited unsuccessfully.
    Failed {
        layer: String,
        status: Option<i32>,
        diagnostics: String,
    },

    /// The tool exited cleanly but left no readable output for the layer.
    MissingOutput { layer: String, diagnostics: String },
}

/// Job descriptor errors.
#[derive(Debug)]
pub enum JobError {
    /// The descriptor is not valid JSON or misses required fields.
    InvalidDescriptor(String),

    /// Neither the descriptor nor the command line names an export mode.
    MissingMode,

    /// Unknown export mode.
    UnknownMode(String),

    /// Unknown IANA timezone name.
    UnknownTimezone(String),
}

/// Configuration-specific errors.
#[derive(Debug)]
pub enum ConfigError {
    /// Config file not found.
    FileNotFound(String),

    /// Invalid config format.
    InvalidFormat(String),

    /// Invalid field value.
    InvalidValue { field: String, value: String },
}

impl ExportError {
    /// Stable name of the failure class, used in result logging.
    pub fn kind(&self) -> &'static str {
        match self {
            ExportError::DataAccess(_) => "DataAccessError",
            ExportError::SchemaDiscovery(_) => "SchemaDiscoveryError",
            ExportError::Encoding(_) => "EncodingError",
            ExportError::ExternalTool(_) => "ExternalToolError",
            ExportError::StorageUpload(_) => "StorageUploadError",
            ExportError::TempFile { .. } => "TempFileError",
            ExportError::InvalidJob(_) => "InvalidJobError",
            ExportError::Config(_) => "ConfigError",
            ExportError::Io(_) => "IoError",
        }
    }

    /// Wrap a MongoDB failure raised while a query was being opened.
    pub fn query(err: mongodb::error::Error) -> Self {
        ExportError::DataAccess(DataAccessError::QueryFailed(summarize(&err)))
    }

    /// Wrap a MongoDB failure raised while a cursor was advancing.
    pub fn cursor(err: mongodb::error::Error) -> Self {
        ExportError::DataAccess(DataAccessError::CursorError(summarize(&err)))
    }
}

fn summarize(err: &mongodb::error::Error) -> String {
    ErrorInfo::from_driver(err)
        .to_json_compact()
        .unwrap_or_else(|_| err.to_string())
}

/* ========================= Display & Error impls ========================= */

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportError::DataAccess(e) => write!(f, "Data access error: {e}"),
            ExportError::SchemaDiscovery(msg) => write!(f, "Schema discovery error: {msg}"),
            ExportError::Encoding(e) => write!(f, "Encoding error: {e}"),
            ExportError::ExternalTool(e) => write!(f, "External tool error: {e}"),
            ExportError::StorageUpload(e) => write!(f, "Storage upload error: {e}"),
            ExportError::TempFile { path, source } => {
                write!(f, "Failed to remove {}: {source}", path.display())
            }
            ExportError::InvalidJob(e) => write!(f, "Invalid job: {e}"),
            ExportError::Config(e) => write!(f, "Configuration error: {e}"),
            ExportError::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl fmt::Display for DataAccessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataAccessError::ConnectionFailed(msg) => write!(f, "Failed to connect: {msg}"),
            DataAccessError::NoDatabase => {
                write!(f, "No database named in the connection URI or configuration")
            }
            DataAccessError::QueryFailed(msg) => write!(f, "Query failed: {msg}"),
            DataAccessError::CursorError(msg) => write!(f, "Cursor error: {msg}"),
        }
    }
}

impl fmt::Display for EncodingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodingError::MalformedDocument { object_id, reason } => {
                write!(f, "Malformed feature '{object_id}': {reason}")
            }
            EncodingError::Json(msg) => write!(f, "JSON serialization failed: {msg}"),
            EncodingError::Sqlite(msg) => write!(f, "SQLite write failed: {msg}"),
            EncodingError::Archive(msg) => write!(f, "Archive write failed: {msg}"),
        }
    }
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolError::SpawnFailed { layer, message } => {
                write!(f, "Could not start conversion for layer '{layer}': {message}")
            }
            ToolError::Failed {
                layer,
                status,
                diagnostics,
            } => {
                let code = status.map_or_else(|| "signal".to_string(), |c| c.to_string());
                write!(
                    f,
                    "Conversion of layer '{layer}' exited with {code}: {diagnostics}"
                )
            }
            ToolError::MissingOutput { layer, diagnostics } => {
                write!(f, "Conversion of layer '{layer}' produced no output: {diagnostics}")
            }
        }
    }
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobError::InvalidDescriptor(msg) => write!(f, "Invalid job descriptor: {msg}"),
            JobError::MissingMode => write!(f, "No export mode given"),
            JobError::UnknownMode(mode) => write!(f, "Unknown export mode: {mode}"),
            JobError::UnknownTimezone(tz) => write!(f, "Unknown timezone: {tz}"),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => write!(f, "Config file not found: {path}"),
            ConfigError::InvalidFormat(msg) => write!(f, "Invalid config format: {msg}"),
            ConfigError::InvalidValue { field, value } => {
                write!(f, "Invalid value '{value}' for field '{field}'")
            }
        }
    }
}

impl std::error::Error for ExportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExportError::TempFile { source, .. } | ExportError::Io(source) => Some(source),
            _ => None,
        }
    }
}
impl std::error::Error for DataAccessError {}
impl std::error::Error for EncodingError {}
impl std::error::Error for ToolError {}
impl std::error::Error for JobError {}
impl std::error::Error for ConfigError {}

/* ========================= Conversions to ExportError ========================= */

impl From<io::Error> for ExportError {
    fn from(err: io::Error) -> Self {
        ExportError::Io(err)
    }
}

impl From<DataAccessError> for ExportError {
    fn from(err: DataAccessError) -> Self {
        ExportError::DataAccess(err)
    }
}

impl From<EncodingError> for ExportError {
    fn from(err: EncodingError) -> Self {
        ExportError::Encoding(err)
    }
}

impl From<ToolError> for ExportError {
    fn from(err: ToolError) -> Self {
        ExportError::ExternalTool(err)
    }
}

impl From<UploadError> for ExportError {
    fn from(err: UploadError) -> Self {
        ExportError::StorageUpload(err)
    }
}

impl From<JobError> for ExportError {
    fn from(err: JobError) -> Self {
        ExportError::InvalidJob(err)
    }
}

impl From<ConfigError> for ExportError {
    fn from(err: ConfigError) -> Self {
        ExportError::Config(err)
    }
}

impl From<rusqlite::Error> for ExportError {
    fn from(err: rusqlite::Error) -> Self {
        ExportError::Encoding(EncodingError::Sqlite(err.to_string()))
    }
}

impl From<serde_json::Error> for ExportError {
    fn from(err: serde_json::Error) -> Self {
        ExportError::Encoding(EncodingError::Json(err.to_string()))
    }
}

impl From<zip::result::ZipError> for ExportError {
    fn from(err: zip::result::ZipError) -> Self {
        ExportError::Encoding(EncodingError::Archive(err.to_string()))
    }
}
