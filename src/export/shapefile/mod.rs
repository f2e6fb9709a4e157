//! Shapefile assembly
//!
//! Shapefile exports are built in three steps:
//! 1. [`LayerPartitioner`] writes one intermediate per geometry kind
//! 2. [`ShapefileAssembler`] converts each non-empty intermediate into a
//!    layer named `<name>_points`, `<name>_lines` or `<name>_polygons`,
//!    running a bounded number of conversions at once
//! 3. once every conversion has succeeded, the layer files are zipped into
//!    the artifact
//!
//! The first failing conversion aborts assembly; no archive is written.

pub mod partition;
pub mod tool;

pub use partition::{IntermediateFormat, LayerInput, LayerPartitioner};
pub use tool::{CommandTool, ConversionTool};

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{debug, info};
use zip::CompressionMethod;
use zip::write::SimpleFileOptions;

use crate::error::{ExportError, Result};
use crate::export::naming::safe;

/// Converts partitioned intermediates and packs the layers into a zip
pub struct ShapefileAssembler {
    tool: Arc<dyn ConversionTool>,
    concurrency: usize,
}

impl ShapefileAssembler {
    /// Create an assembler
    ///
    /// # Arguments
    /// * `tool` - Conversion tool run once per layer
    /// * `concurrency` - Maximum conversions running at once
    pub fn new(tool: Arc<dyn ConversionTool>, concurrency: usize) -> Self {
        Self {
            tool,
            concurrency: concurrency.max(1),
        }
    }

    /// Layer name for one geometry kind of the export
    pub fn layer_name(base: &str, input: &LayerInput) -> String {
        format!("{}_{}", safe(base), input.kind.layer_suffix())
    }

    /// Convert every non-empty layer and zip the results
    ///
    /// # Arguments
    /// * `layers` - Intermediates from the partitioner
    /// * `output_dir` - Empty directory receiving the converted layers
    /// * `base_name` - Export layer name
    /// * `archive` - Path of the zip to write
    ///
    /// # Returns
    /// * `Result<usize>` - Number of files packed into the archive
    pub async fn assemble(
        &self,
        layers: Vec<LayerInput>,
        output_dir: &Path,
        base_name: &str,
        archive: &Path,
    ) -> Result<usize> {
        let tool = self.tool.as_ref();
        let conversions = layers
            .into_iter()
            .filter(|layer| layer.count > 0)
            .map(|layer| {
                let name = Self::layer_name(base_name, &layer);
                async move {
                    info!("Converting {} ({} entries)", name, layer.count);
                    tool.convert(&layer.path, output_dir, &name).await?;
                    Ok::<_, ExportError>(name)
                }
            });

        let converted: Vec<String> = stream::iter(conversions)
            .buffer_unordered(self.concurrency)
            .try_collect()
            .await?;
        debug!("Converted layers: {}", converted.join(", "));

        let files = layer_files(output_dir).await?;
        let archive = archive.to_path_buf();
        let count = files.len();
        tokio::task::spawn_blocking(move || write_archive(&archive, &files))
            .await
            .map_err(|e| ExportError::Io(io::Error::other(e)))??;

        info!("Packed {} layer files", count);
        Ok(count)
    }
}

/// Regular files of the output directory, sorted by name
async fn layer_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

fn write_archive(archive: &Path, files: &[PathBuf]) -> Result<()> {
    let mut zip = zip::ZipWriter::new(File::create(archive)?);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for path in files {
        let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        zip.start_file(name, options)?;
        let mut file = File::open(path)?;
        io::copy(&mut file, &mut zip)?;
    }

    zip.finish()?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::ConversionTool;
    use crate::error::{Result, ToolError};

    /// Conversion tool double writing `.shp`/`.dbf` stand-ins
    #[derive(Default)]
    pub struct ScriptedTool {
        /// Layer that fails with a non-zero exit
        pub fail_layer: Option<String>,
        pub calls: Mutex<Vec<(PathBuf, String)>>,
    }

    #[async_trait]
    impl ConversionTool for ScriptedTool {
        async fn convert(&self, input: &Path, output_dir: &Path, layer: &str) -> Result<()> {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push((input.to_path_buf(), layer.to_string()));
            }
            if self.fail_layer.as_deref() == Some(layer) {
                return Err(ToolError::Failed {
                    layer: layer.to_string(),
                    status: Some(1),
                    diagnostics: "ERROR 1: scripted failure".to_string(),
                }
                .into());
            }

            let features = tokio::fs::read_to_string(input).await.unwrap_or_default();
            tokio::fs::write(output_dir.join(format!("{layer}.shp")), features).await?;
            tokio::fs::write(output_dir.join(format!("{layer}.dbf")), b"dbf").await?;
            Ok(())
        }
    }
}
