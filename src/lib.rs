//! Survey Export Library
//!
//! Exports the responses of one survey out of MongoDB into a downloadable
//! artifact: CSV, KML, or a zip of Shapefile layers. The artifact is uploaded
//! to blob storage and every local temporary is removed afterwards.
//!
//! # Modules
//!
//! - `cli`: Command-line interface and argument parsing
//! - `config`: Configuration management
//! - `error`: Error types and handling
//! - `export`: Schema discovery, encoders, shapefile assembly, upload and the
//!   pipeline tying them together
//! - `model`: Survey features, entries, geometries and the job descriptor
//! - `store`: Document store access
//! - `values`: BSON value rendering for output cells
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use survey_export::config::Config;
//! use survey_export::export::{CommandTool, ExportPipeline, ObjectStoreBlobStore, PipelineSettings};
//! use survey_export::model::ExportJob;
//! use survey_export::store::MongoSurveyStore;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let job = ExportJob::from_json(
//!         r#"{"survey":"abc","bucket":"exports","s3Object":"abc/out.csv"}"#,
//!         Some("csv"),
//!     )?;
//!
//!     let mut pipeline = ExportPipeline::new(
//!         Arc::new(MongoSurveyStore::connect(&config.store).await?),
//!         Arc::new(ObjectStoreBlobStore::from_config(config.storage.clone())),
//!         Arc::new(CommandTool::from_config(&config.converter)),
//!         PipelineSettings::from_config(&config),
//!     );
//!     let report = pipeline.run(&job).await?;
//!     println!("Exported {} entries", report.entries);
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod model;
pub mod store;
pub mod values;

// Re-export commonly used types
pub use config::Config;
pub use error::{ExportError, Result};
pub use export::{ExportPipeline, ExportReport};
pub use model::ExportJob;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library version string
///
/// # Returns
/// * `&str` - Version string
pub fn version() -> &'static str {
    VERSION
}
