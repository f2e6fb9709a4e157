//! Geometry partitioning
//!
//! A Shapefile holds a single geometry type, so entries are split into one
//! intermediate per [`GeometryKind`] before conversion. Intermediates are
//! created lazily: a kind with no entries leaves no file behind and gets no
//! layer.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::error::Result;
use crate::export::schema::SchemaDescriptor;
use crate::export::writers::{
    EncoderOptions, FormatWriter, GeoJsonEncoder, SqliteTableWriter, TextFormatWriter,
};
use crate::model::{Entry, GeometryKind};

/// File format handed to the conversion tool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntermediateFormat {
    GeoJson,
    Sqlite,
}

impl IntermediateFormat {
    pub fn extension(self) -> &'static str {
        match self {
            IntermediateFormat::GeoJson => "geojson",
            IntermediateFormat::Sqlite => "sqlite",
        }
    }
}

/// A finished intermediate, ready for conversion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerInput {
    pub kind: GeometryKind,
    pub path: PathBuf,
    pub count: u64,
}

struct OpenLayer {
    writer: Box<dyn FormatWriter>,
    path: PathBuf,
    count: u64,
}

/// [`FormatWriter`] fanning entries out to per-geometry intermediates
pub struct LayerPartitioner {
    format: IntermediateFormat,
    work_dir: PathBuf,
    schema: SchemaDescriptor,
    options: EncoderOptions,
    layers: BTreeMap<GeometryKind, OpenLayer>,
}

impl LayerPartitioner {
    /// Create a partitioner writing into `work_dir`
    ///
    /// # Arguments
    /// * `format` - Intermediate format for every layer
    /// * `work_dir` - Existing directory owned by the run
    /// * `schema` - Discovered schema
    /// * `options` - Encoder options
    pub fn new(
        format: IntermediateFormat,
        work_dir: &Path,
        schema: SchemaDescriptor,
        options: EncoderOptions,
    ) -> Self {
        Self {
            format,
            work_dir: work_dir.to_path_buf(),
            schema,
            options,
            layers: BTreeMap::new(),
        }
    }

    async fn open(&self, kind: GeometryKind) -> Result<OpenLayer> {
        let path = self
            .work_dir
            .join(format!("{}.{}", kind.layer_suffix(), self.format.extension()));

        let writer: Box<dyn FormatWriter> = match self.format {
            IntermediateFormat::GeoJson => {
                let encoder = GeoJsonEncoder::new(&self.schema, &self.options);
                Box::new(TextFormatWriter::create(&path, encoder).await?)
            }
            IntermediateFormat::Sqlite => Box::new(SqliteTableWriter::create(
                &path,
                &self.schema,
                &self.options,
            )?),
        };

        debug!("Opened {} intermediate {}", kind.layer_suffix(), path.display());
        Ok(OpenLayer {
            writer,
            path,
            count: 0,
        })
    }

    /// Finished intermediates in geometry order
    ///
    /// Call after [`FormatWriter::finalize`].
    pub fn into_layers(self) -> Vec<LayerInput> {
        self.layers
            .into_iter()
            .map(|(kind, layer)| LayerInput {
                kind,
                path: layer.path,
                count: layer.count,
            })
            .collect()
    }
}

#[async_trait]
impl FormatWriter for LayerPartitioner {
    async fn write_entry(&mut self, entry: &Entry) -> Result<()> {
        let kind = entry.geometry.kind();
        if !self.layers.contains_key(&kind) {
            let layer = self.open(kind).await?;
            self.layers.insert(kind, layer);
        }

        if let Some(layer) = self.layers.get_mut(&kind) {
            layer.writer.write_entry(entry).await?;
            layer.count += 1;
        }
        Ok(())
    }

    async fn finalize(&mut self) -> Result<()> {
        for layer in self.layers.values_mut() {
            layer.writer.finalize().await?;
        }
        Ok(())
    }

    async fn file_size(&self) -> Result<u64> {
        let mut total = 0;
        for layer in self.layers.values() {
            total += layer.writer.file_size().await?;
        }
        Ok(total)
    }
}
