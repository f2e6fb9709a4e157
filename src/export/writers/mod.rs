//! Format writers for export operations
//!
//! Text formats (CSV, KML, GeoJSON) are produced by a [`TextEncoder`] that
//! turns entries into chunks of text, wrapped in a [`TextFormatWriter`] that
//! owns the buffered output file. The SQLite intermediate writes rows
//! directly and implements [`FormatWriter`] itself.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::debug;

use crate::error::{ExportError, Result};
use crate::model::Entry;
use crate::values::{MULTI_VALUE_SEPARATOR, format_double};

pub mod csv;
pub mod geojson;
pub mod kml;
pub mod sqlite;

pub use csv::CsvEncoder;
pub use geojson::GeoJsonEncoder;
pub use kml::KmlEncoder;
pub use sqlite::SqliteTableWriter;

/// Columns every format starts with, in order.
pub const CORE_COLUMNS: [&str; 9] = [
    "object_id",
    "address",
    "collector",
    "timestamp",
    "source",
    "entry_id",
    "lat",
    "long",
    "photos",
];

/// Trait for writing entries to an output file
#[async_trait]
pub trait FormatWriter: Send + Sync {
    /// Write one entry
    ///
    /// # Arguments
    /// * `entry` - Entry to write
    ///
    /// # Returns
    /// * `Result<()>` - Success or error
    async fn write_entry(&mut self, entry: &Entry) -> Result<()>;

    /// Finalize the output (write trailers, flush buffers)
    ///
    /// # Returns
    /// * `Result<()>` - Success or error
    async fn finalize(&mut self) -> Result<()>;

    /// Get the current file size in bytes
    ///
    /// # Returns
    /// * `Result<u64>` - File size in bytes
    async fn file_size(&self) -> Result<u64>;
}

/// Entry-to-text encoder
///
/// `begin` is emitted once before any entry and `finish` once after the
/// last, so an export with no entries is still a well-formed document.
pub trait TextEncoder: Send + Sync {
    /// Opening chunk
    fn begin(&mut self) -> String;

    /// Chunk for one entry
    fn encode(&mut self, entry: &Entry) -> Result<String>;

    /// Trailing chunk
    fn finish(&mut self) -> String;
}

/// Options shared by all encoders.
#[derive(Debug, Clone, Copy, Default)]
pub struct EncoderOptions {
    /// Zone timestamps are rendered in; UTC when absent
    pub timezone: Option<Tz>,
}

/// Renders entry creation times.
#[derive(Debug, Clone, Copy)]
pub struct TimeRenderer {
    timezone: Option<Tz>,
}

impl TimeRenderer {
    pub fn new(options: &EncoderOptions) -> Self {
        Self {
            timezone: options.timezone,
        }
    }

    /// `YYYY-MM-DDTHH:MM:SS±HH:MM` in the configured zone, otherwise UTC
    /// with milliseconds and a `Z` suffix.
    pub fn render(&self, at: &DateTime<Utc>) -> String {
        match self.timezone {
            Some(tz) => at
                .with_timezone(&tz)
                .format("%Y-%m-%dT%H:%M:%S%:z")
                .to_string(),
            None => at.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
        }
    }
}

/// Core column values of an entry as cell text, in [`CORE_COLUMNS`] order.
///
/// Attachments are joined into the single `photos` cell.
pub fn core_cells(entry: &Entry, time: &TimeRenderer) -> [String; 9] {
    [
        entry.object_id.clone(),
        entry.address.clone().unwrap_or_default(),
        entry.source.collector.clone().unwrap_or_default(),
        time.render(&entry.created),
        entry.source.kind.clone(),
        entry.id.clone(),
        format_double(entry.centroid.lat),
        format_double(entry.centroid.lon),
        entry.files.join(MULTI_VALUE_SEPARATOR),
    ]
}

/// Helper function to create a buffered file writer
///
/// # Arguments
/// * `path` - File path to create
///
/// # Returns
/// * `Result<BufWriter<File>>` - Buffered writer or error
pub(crate) async fn create_writer(path: &Path) -> Result<BufWriter<File>> {
    let file = File::create(path).await.map_err(ExportError::Io)?;
    Ok(BufWriter::with_capacity(8 * 1024 * 1024, file)) // 8MB buffer
}

/// File writer driven by a [`TextEncoder`]
pub struct TextFormatWriter<E: TextEncoder> {
    encoder: E,
    writer: BufWriter<File>,
    path: PathBuf,
    written: u64,
}

impl<E: TextEncoder> TextFormatWriter<E> {
    /// Create the output file and write the encoder's opening chunk
    ///
    /// # Arguments
    /// * `path` - Output file path
    /// * `encoder` - Encoder producing the content
    ///
    /// # Returns
    /// * `Result<Self>` - New writer instance or error
    pub async fn create(path: &Path, mut encoder: E) -> Result<Self> {
        let mut writer = create_writer(path).await?;
        writer.write_all(encoder.begin().as_bytes()).await?;

        debug!("Created text writer for: {}", path.display());

        Ok(Self {
            encoder,
            writer,
            path: path.to_path_buf(),
            written: 0,
        })
    }
}

#[async_trait]
impl<E: TextEncoder> FormatWriter for TextFormatWriter<E> {
    async fn write_entry(&mut self, entry: &Entry) -> Result<()> {
        let chunk = self.encoder.encode(entry)?;
        self.writer.write_all(chunk.as_bytes()).await?;
        self.written += 1;
        Ok(())
    }

    async fn finalize(&mut self) -> Result<()> {
        let trailer = self.encoder.finish();
        self.writer.write_all(trailer.as_bytes()).await?;
        self.writer.flush().await?;

        debug!(
            "Finalized {} ({} entries)",
            self.path.display(),
            self.written
        );
        Ok(())
    }

    async fn file_size(&self) -> Result<u64> {
        let metadata = tokio::fs::metadata(&self.path).await?;
        Ok(metadata.len())
    }
}
