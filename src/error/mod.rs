//! Error handling for the export pipeline.
//!
//! Every stage surfaces its first failure as an [`ExportError`]. The variants
//! mirror the pipeline's failure taxonomy:
//! - data access (document store connectivity, queries, cursors)
//! - schema discovery (the aggregation scan)
//! - encoding (malformed entries, serializer and SQLite failures)
//! - external tool (geometry conversion)
//! - storage upload (blob store rejections, with the provider's error body)
//! - temporary files (cleanup; logged, never escalated)
//!
//! MongoDB driver errors are summarized into a structured [`ErrorInfo`] and
//! provider upload errors are parsed into [`ProviderError`].

pub mod kinds;
pub mod mongo;
pub mod storage;

// Re-export commonly used types
pub use kinds::{
    ConfigError, DataAccessError, EncodingError, ExportError, JobError, Result, ToolError,
};
pub use mongo::ErrorInfo;
pub use storage::{ProviderError, UploadError};
