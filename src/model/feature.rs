//! Survey features and their entries.
//!
//! A feature document holds one physical location and the full history of
//! submissions made against it:
//!
//! ```text
//! { properties: { survey, object_id, humanReadableName?, centroid: [lon, lat] },
//!   geometry?,
//!   entries: [ { id | _id, created, source: { type, collector? },
//!                info?, responses?, files? } ] }
//! ```
//!
//! Entry rows read by the exporter use the same layout with a single element
//! in `entries`. [`SurveyFeature::from_document`] decodes either form and
//! [`SurveyFeature::into_entries`] flattens it into self-contained [`Entry`]
//! rows.

use bson::{Bson, Document};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::{EncodingError, ExportError, Result};
use crate::model::geometry::Geometry;
use crate::values::{BsonConverter, CellConverter};

/// Point used for the `lat`/`long` columns and KML placemarks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Centroid {
    pub lon: f64,
    pub lat: f64,
}

/// Who submitted an entry, and through which channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Source {
    /// Channel the entry came from (e.g. `mobile`, `paper`).
    pub kind: String,
    /// Collector name; `None` when absent or redacted.
    pub collector: Option<String>,
}

/// One exported row: a submission snapshot together with the feature fields
/// every output format needs.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub id: String,
    pub object_id: String,
    pub address: Option<String>,
    pub centroid: Centroid,
    pub created: DateTime<Utc>,
    pub source: Source,
    pub info: Document,
    pub responses: Document,
    pub files: Vec<String>,
    pub geometry: Geometry,
}

impl Entry {
    /// Drop the collector's identity. Applied once, by the entry source.
    pub fn redact_collector(&mut self) {
        self.source.collector = None;
    }
}

/// Stored submission, before it is joined with its feature.
#[derive(Debug, Clone, PartialEq)]
struct Submission {
    id: String,
    created: DateTime<Utc>,
    source: Source,
    info: Document,
    responses: Document,
    files: Vec<String>,
}

/// A surveyed location with its submission history, oldest first.
#[derive(Debug, Clone, PartialEq)]
pub struct SurveyFeature {
    pub object_id: String,
    pub address: Option<String>,
    pub centroid: Centroid,
    pub geometry: Geometry,
    submissions: Vec<Submission>,
}

#[derive(Debug, Deserialize)]
struct FeatureDocument {
    properties: PropertiesDocument,
    #[serde(default)]
    geometry: Option<Geometry>,
    #[serde(default)]
    entries: Vec<EntryDocument>,
}

#[derive(Debug, Deserialize)]
struct PropertiesDocument {
    object_id: String,
    #[serde(rename = "humanReadableName", default)]
    human_readable_name: Option<String>,
    centroid: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct EntryDocument {
    #[serde(default)]
    id: Option<Bson>,
    #[serde(rename = "_id", default)]
    oid: Option<Bson>,
    created: bson::DateTime,
    source: SourceDocument,
    #[serde(default)]
    info: Option<Document>,
    #[serde(default)]
    responses: Option<Document>,
    #[serde(default)]
    files: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct SourceDocument {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    collector: Option<String>,
}

impl SurveyFeature {
    /// Decode a raw feature document.
    ///
    /// # Arguments
    /// * `doc` - Feature document as returned by the store
    ///
    /// # Returns
    /// * `Result<Self>` - Decoded feature, or an encoding error naming the
    ///   feature when the layout does not match
    pub fn from_document(doc: Document) -> Result<Self> {
        let object_id = doc
            .get_document("properties")
            .ok()
            .and_then(|p| p.get_str("object_id").ok())
            .unwrap_or("<unknown>")
            .to_string();

        let malformed = |reason: String| -> ExportError {
            EncodingError::MalformedDocument {
                object_id: object_id.clone(),
                reason,
            }
            .into()
        };

        let raw: FeatureDocument =
            bson::from_document(doc).map_err(|e| malformed(e.to_string()))?;

        let centroid = match raw.properties.centroid.as_slice() {
            [lon, lat, ..] => Centroid {
                lon: *lon,
                lat: *lat,
            },
            _ => return Err(malformed("centroid needs two coordinates".to_string())),
        };

        let converter = CellConverter::new();
        let mut submissions = Vec::with_capacity(raw.entries.len());
        for entry in raw.entries {
            let created = DateTime::<Utc>::from_timestamp_millis(entry.created.timestamp_millis())
                .ok_or_else(|| malformed("entry creation time out of range".to_string()))?;
            let id = entry
                .id
                .or(entry.oid)
                .map(|id| converter.convert(&id))
                .unwrap_or_default();

            submissions.push(Submission {
                id,
                created,
                source: Source {
                    kind: entry.source.kind,
                    collector: entry.source.collector,
                },
                info: entry.info.unwrap_or_default(),
                responses: entry.responses.unwrap_or_default(),
                files: entry.files.unwrap_or_default(),
            });
        }
        // Stable: entries created at the same instant keep their stored order.
        submissions.sort_by_key(|s| s.created);

        Ok(Self {
            geometry: raw
                .geometry
                .unwrap_or_else(|| Geometry::Point(vec![centroid.lon, centroid.lat])),
            object_id: raw.properties.object_id,
            address: raw.properties.human_readable_name,
            centroid,
            submissions,
        })
    }

    /// Every entry, oldest first.
    pub fn into_entries(self) -> Vec<Entry> {
        let Self {
            object_id,
            address,
            centroid,
            geometry,
            submissions,
        } = self;

        submissions
            .into_iter()
            .map(|s| Entry {
                id: s.id,
                object_id: object_id.clone(),
                address: address.clone(),
                centroid,
                created: s.created,
                source: s.source,
                info: s.info,
                responses: s.responses,
                files: s.files,
                geometry: geometry.clone(),
            })
            .collect()
    }
}
