//! Export pipeline
//!
//! Runs one export job from start to finish:
//!
//! ```text
//! Idle -> SchemaDiscovered -> Streaming -> Encoded -> (ShapefileAssembled)
//!      -> Uploaded -> Done
//! ```
//!
//! Any stage error moves the pipeline to `Failed`. Stages run strictly one
//! after the other and each returns its first error. Temporary resources are
//! released at the end of every run; cleanup failures are logged and never
//! replace the run's outcome.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::model::{ExportJob, ExportMode};
use crate::store::SurveyStore;

use super::progress::ProgressTracker;
use super::schema::{self, SchemaDescriptor};
use super::shapefile::{ConversionTool, IntermediateFormat, LayerPartitioner, ShapefileAssembler};
use super::source::{EntrySource, EntryStream};
use super::temp::TempRegistry;
use super::upload::BlobStore;
use super::writers::{
    CsvEncoder, EncoderOptions, FormatWriter, KmlEncoder, TextEncoder, TextFormatWriter,
};

/// Stage of an export run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    SchemaDiscovered,
    Streaming,
    Encoded,
    ShapefileAssembled,
    Uploaded,
    Done,
    Failed,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Tunables of the pipeline
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Root for intermediates and the local artifact
    pub tmp_dir: PathBuf,
    /// Entries buffered between cursor and encoder
    pub watermark: usize,
    pub progress_interval: Duration,
    /// Layer conversions running at once
    pub concurrency: usize,
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            tmp_dir: config.export.tmp_dir.clone(),
            watermark: config.export.watermark,
            progress_interval: config.progress_interval(),
            concurrency: config.converter.concurrency,
        }
    }
}

/// Result of a successful export run
#[derive(Debug)]
pub struct ExportReport {
    /// Number of entries exported
    pub entries: u64,
    /// Size of the uploaded artifact in bytes
    pub artifact_bytes: u64,
    /// Time taken for the run
    pub elapsed_ms: u64,
}

/// Orchestrates discovery, streaming, encoding, assembly and upload
pub struct ExportPipeline {
    store: Arc<dyn SurveyStore>,
    blobs: Arc<dyn BlobStore>,
    tool: Arc<dyn ConversionTool>,
    settings: PipelineSettings,
    state: PipelineState,
}

impl ExportPipeline {
    /// Create a new pipeline
    ///
    /// # Arguments
    /// * `store` - Source of survey features
    /// * `blobs` - Destination of finished artifacts
    /// * `tool` - Geometry conversion tool for shapefile modes
    /// * `settings` - Pipeline tunables
    pub fn new(
        store: Arc<dyn SurveyStore>,
        blobs: Arc<dyn BlobStore>,
        tool: Arc<dyn ConversionTool>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            store,
            blobs,
            tool,
            settings,
            state: PipelineState::Idle,
        }
    }

    /// Current stage
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Run one export job
    ///
    /// # Arguments
    /// * `job` - Job to run
    ///
    /// # Returns
    /// * `Result<ExportReport>` - Run statistics, or the first stage error
    pub async fn run(&mut self, job: &ExportJob) -> Result<ExportReport> {
        let start_time = Instant::now();
        info!(
            "Starting {} export of survey {}",
            job.mode, job.survey_id
        );

        let mut temps = TempRegistry::new(&self.settings.tmp_dir);
        let outcome = self.execute(job, &mut temps).await;

        let cleanup_errors = temps.release().await;
        if !cleanup_errors.is_empty() {
            warn!(
                "{} temporary resources could not be removed",
                cleanup_errors.len()
            );
        }

        match outcome {
            Ok((entries, artifact_bytes)) => {
                self.transition(PipelineState::Done);
                let elapsed_ms = start_time.elapsed().as_millis() as u64;
                info!(
                    "Export completed: {} entries, {} bytes, {} ms",
                    entries, artifact_bytes, elapsed_ms
                );
                Ok(ExportReport {
                    entries,
                    artifact_bytes,
                    elapsed_ms,
                })
            }
            Err(e) => {
                error!("Export failed during {}: [{}] {}", self.state, e.kind(), e);
                self.transition(PipelineState::Failed);
                Err(e)
            }
        }
    }

    async fn execute(&mut self, job: &ExportJob, temps: &mut TempRegistry) -> Result<(u64, u64)> {
        tokio::fs::create_dir_all(&self.settings.tmp_dir).await?;

        let schema = schema::discover(self.store.as_ref(), &job.survey_id).await?;
        self.transition(PipelineState::SchemaDiscovered);

        let stream = EntrySource::open(
            self.store.as_ref(),
            &job.survey_id,
            job.filter,
            job.open,
            self.settings.watermark,
        )
        .await?
        .spawn();
        self.transition(PipelineState::Streaming);

        let options = EncoderOptions {
            timezone: job.timezone,
        };
        let artifact = temps.file(job.mode.extension());

        let entries = match job.mode {
            ExportMode::Csv => {
                let encoder = CsvEncoder::new(&schema, &options);
                self.export_text(job, stream, &artifact, encoder).await?
            }
            ExportMode::Kml => {
                let encoder = KmlEncoder::new(&schema, &options);
                self.export_text(job, stream, &artifact, encoder).await?
            }
            ExportMode::Shapefile => {
                self.export_layers(job, stream, schema, options, IntermediateFormat::GeoJson, &artifact, temps)
                    .await?
            }
            ExportMode::Sqlite => {
                self.export_layers(job, stream, schema, options, IntermediateFormat::Sqlite, &artifact, temps)
                    .await?
            }
        };

        let artifact_bytes = tokio::fs::metadata(&artifact).await?.len();
        info!(
            "Uploading {} ({} bytes) to {}/{}",
            artifact.display(),
            artifact_bytes,
            job.destination.bucket,
            job.destination.key
        );
        self.blobs.put(&artifact, &job.destination).await?;
        self.transition(PipelineState::Uploaded);

        Ok((entries, artifact_bytes))
    }

    async fn export_text<E>(
        &mut self,
        job: &ExportJob,
        stream: EntryStream,
        artifact: &Path,
        encoder: E,
    ) -> Result<u64>
    where
        E: TextEncoder + 'static,
    {
        let mut writer = TextFormatWriter::create(artifact, encoder).await?;
        let entries = self.encode(job, stream, &mut writer).await?;
        self.transition(PipelineState::Encoded);
        Ok(entries)
    }

    #[allow(clippy::too_many_arguments)]
    async fn export_layers(
        &mut self,
        job: &ExportJob,
        stream: EntryStream,
        schema: SchemaDescriptor,
        options: EncoderOptions,
        format: IntermediateFormat,
        artifact: &Path,
        temps: &mut TempRegistry,
    ) -> Result<u64> {
        let work_dir = temps.dir().await?;
        let output_dir = temps.dir().await?;

        let mut partitioner = LayerPartitioner::new(format, &work_dir, schema, options);
        let entries = self.encode(job, stream, &mut partitioner).await?;
        self.transition(PipelineState::Encoded);

        let assembler = ShapefileAssembler::new(Arc::clone(&self.tool), self.settings.concurrency);
        assembler
            .assemble(partitioner.into_layers(), &output_dir, &job.layer_name, artifact)
            .await?;
        self.transition(PipelineState::ShapefileAssembled);
        Ok(entries)
    }

    /// Drain the entry stream into a writer and finalize it
    async fn encode(
        &self,
        job: &ExportJob,
        mut stream: EntryStream,
        writer: &mut dyn FormatWriter,
    ) -> Result<u64> {
        let tracker = ProgressTracker::new(
            format!("survey {}", job.survey_id),
            self.settings.progress_interval,
        );

        let outcome = Self::drain(&mut stream, writer, &tracker).await;
        stream.close().await;
        outcome?;

        writer.finalize().await?;
        tracker.finish();
        debug!("Encoded {} bytes", writer.file_size().await?);
        Ok(tracker.processed())
    }

    async fn drain(
        stream: &mut EntryStream,
        writer: &mut dyn FormatWriter,
        tracker: &ProgressTracker,
    ) -> Result<()> {
        let mut count = 0u64;
        while let Some(entry) = stream.next().await {
            writer.write_entry(&entry?).await?;
            count += 1;
            tracker.update(count);
        }
        Ok(())
    }

    fn transition(&mut self, next: PipelineState) {
        debug!("Pipeline state: {} -> {}", self.state, next);
        self.state = next;
    }
}
