//! Schema discovery
//!
//! Entries carry arbitrary info and response keys, so the column layout of
//! an export is only known after every entry of the survey has been looked
//! at. Discovery runs once, before the first row is encoded, over all
//! entries (not only the latest ones) so `latest` and `all` exports of the
//! same survey share a layout.

use std::collections::{HashMap, HashSet};

use bson::{Bson, Document};
use tracing::{debug, info};

use crate::error::{ExportError, Result};
use crate::model::Entry;
use crate::store::SurveyStore;

/// Fields present in one entry, with the length of each response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryShape {
    pub info: Vec<String>,
    pub responses: Vec<(String, usize)>,
    pub files: usize,
}

impl EntryShape {
    /// Shape of an already decoded entry.
    #[cfg(test)]
    pub(crate) fn from_entry(entry: &Entry) -> Self {
        Self {
            info: entry.info.keys().cloned().collect(),
            responses: entry
                .responses
                .iter()
                .map(|(name, value)| (name.clone(), value_arity(value)))
                .collect(),
            files: entry.files.len(),
        }
    }

    /// Decode a shape document returned by [`SurveyStore::shape_query`].
    ///
    /// # Arguments
    /// * `doc` - `{ info: [..], responses: [{ name, arity }], files }`
    ///
    /// # Returns
    /// * `Result<Self>` - Decoded shape or a schema discovery error
    pub fn from_document(doc: &Document) -> Result<Self> {
        let bad = |what: &str| ExportError::SchemaDiscovery(format!("malformed shape: {what}"));

        let info = match doc.get("info") {
            Some(Bson::Array(names)) => names
                .iter()
                .map(|n| n.as_str().map(str::to_string).ok_or_else(|| bad("info name")))
                .collect::<Result<Vec<_>>>()?,
            None | Some(Bson::Null) => Vec::new(),
            Some(_) => return Err(bad("info")),
        };

        let responses = match doc.get("responses") {
            Some(Bson::Array(items)) => items
                .iter()
                .map(|item| {
                    let item = item.as_document().ok_or_else(|| bad("response"))?;
                    let name = item.get_str("name").map_err(|_| bad("response name"))?;
                    let arity = item.get("arity").and_then(as_count).unwrap_or(1);
                    Ok((name.to_string(), arity))
                })
                .collect::<Result<Vec<_>>>()?,
            None | Some(Bson::Null) => Vec::new(),
            Some(_) => return Err(bad("responses")),
        };

        let files = doc.get("files").and_then(as_count).unwrap_or(0);

        Ok(Self {
            info,
            responses,
            files,
        })
    }
}

fn value_arity(value: &Bson) -> usize {
    match value {
        Bson::Array(values) => values.len(),
        _ => 1,
    }
}

fn as_count(value: &Bson) -> Option<usize> {
    match value {
        Bson::Int32(n) => usize::try_from(*n).ok(),
        Bson::Int64(n) => usize::try_from(*n).ok(),
        Bson::Double(f) if *f >= 0.0 => Some(*f as usize),
        _ => None,
    }
}

/// Immutable column layout of one export.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaDescriptor {
    info_fields: Vec<String>,
    response_fields: Vec<String>,
    response_arity: HashMap<String, usize>,
    file_count: usize,
}

impl SchemaDescriptor {
    /// Info field names, in first-seen order.
    pub fn info_fields(&self) -> &[String] {
        &self.info_fields
    }

    /// Response field names, in first-seen order.
    pub fn response_fields(&self) -> &[String] {
        &self.response_fields
    }

    /// Largest number of values observed for a response field; at least 1.
    pub fn arity(&self, field: &str) -> usize {
        self.response_arity.get(field).copied().unwrap_or(1)
    }

    /// Largest number of attachments on any entry.
    pub fn file_count(&self) -> usize {
        self.file_count
    }
}

/// Builds a [`SchemaDescriptor`] one entry shape at a time.
#[derive(Debug, Default)]
pub struct SchemaAccumulator {
    info_fields: Vec<String>,
    info_seen: HashSet<String>,
    response_fields: Vec<String>,
    response_arity: HashMap<String, usize>,
    file_count: usize,
    observed: u64,
}

impl SchemaAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one entry shape into the schema.
    pub fn observe(&mut self, shape: &EntryShape) {
        for name in &shape.info {
            if self.info_seen.insert(name.clone()) {
                self.info_fields.push(name.clone());
            }
        }

        for (name, arity) in &shape.responses {
            let arity = (*arity).max(1);
            match self.response_arity.get_mut(name) {
                Some(current) => *current = (*current).max(arity),
                None => {
                    self.response_fields.push(name.clone());
                    self.response_arity.insert(name.clone(), arity);
                }
            }
        }

        self.file_count = self.file_count.max(shape.files);
        self.observed += 1;
    }

    /// Number of entries observed so far.
    pub fn observed(&self) -> u64 {
        self.observed
    }

    pub fn finish(self) -> SchemaDescriptor {
        SchemaDescriptor {
            info_fields: self.info_fields,
            response_fields: self.response_fields,
            response_arity: self.response_arity,
            file_count: self.file_count,
        }
    }
}

/// Scan every entry of a survey and build its schema.
///
/// Any failure during the scan discards the partial result and surfaces as
/// [`ExportError::SchemaDiscovery`]. A survey without entries yields an
/// empty descriptor.
///
/// # Arguments
/// * `store` - Survey store
/// * `survey_id` - Survey to scan
///
/// # Returns
/// * `Result<SchemaDescriptor>` - Discovered schema
pub async fn discover(store: &dyn SurveyStore, survey_id: &str) -> Result<SchemaDescriptor> {
    let mut query = store.shape_query(survey_id).await.map_err(into_discovery)?;
    let mut accumulator = SchemaAccumulator::new();

    let scanned = async {
        while let Some(batch) = query.next_batch().await? {
            for doc in &batch {
                accumulator.observe(&EntryShape::from_document(doc)?);
            }
        }
        Ok::<_, ExportError>(())
    }
    .await;
    query.close().await.ok();
    scanned.map_err(into_discovery)?;

    info!(
        "Discovered schema from {} entries: {} info fields, {} response fields, {} files",
        accumulator.observed(),
        accumulator.info_fields.len(),
        accumulator.response_fields.len(),
        accumulator.file_count
    );
    let schema = accumulator.finish();
    debug!("Response fields: {:?}", schema.response_fields());
    Ok(schema)
}

fn into_discovery(err: ExportError) -> ExportError {
    match err {
        ExportError::SchemaDiscovery(_) => err,
        other => ExportError::SchemaDiscovery(other.to_string()),
    }
}
