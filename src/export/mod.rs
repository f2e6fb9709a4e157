//! Export pipeline for survey responses
//!
//! # Architecture
//!
//! An export run is built from a handful of components:
//!
//! 1. **Schema discovery** scans every entry of the survey once and fixes the
//!    column layout before any row is written
//! 2. **EntrySource** streams entries off the feature cursor through a
//!    bounded channel
//! 3. **Writers** encode entries as CSV, KML, GeoJSON or SQLite
//! 4. **ShapefileAssembler** converts per-geometry intermediates into layers
//!    and zips them
//! 5. **BlobStore** uploads the finished artifact
//!
//! These components are orchestrated by the **ExportPipeline**, which also
//! owns the registry of temporary files.

pub mod coordinator;
pub mod naming;
pub mod progress;
pub mod schema;
pub mod shapefile;
pub mod source;
pub mod temp;
pub mod upload;
pub mod writers;

pub use coordinator::{ExportPipeline, ExportReport, PipelineSettings, PipelineState};
pub use progress::ProgressTracker;
pub use schema::{SchemaDescriptor, discover};
pub use shapefile::{CommandTool, ConversionTool, ShapefileAssembler};
pub use source::{EntrySource, EntryStream};
pub use temp::TempRegistry;
pub use upload::{BlobStore, ObjectStoreBlobStore};
pub use writers::FormatWriter;
