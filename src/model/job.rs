//! Export job descriptor.
//!
//! The job runner starts the exporter with a JSON payload such as
//!
//! ```json
//! { "survey": "abc", "latest": true, "timezone": "America/Detroit",
//!   "bucket": "exports", "s3Object": "abc/123.csv", "name": "parcels" }
//! ```
//!
//! The mode usually arrives separately on the command line and overrides any
//! `mode` field in the payload.

use std::fmt;
use std::str::FromStr;

use chrono_tz::Tz;
use serde::Deserialize;

use crate::error::{JobError, Result};

/// Output format requested by the job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportMode {
    /// Comma-separated values.
    Csv,
    /// KML 2.2 placemarks.
    Kml,
    /// Zipped Shapefile layers, converted from GeoJSON intermediates.
    Shapefile,
    /// Zipped Shapefile layers, converted from SQLite intermediates.
    Sqlite,
}

impl ExportMode {
    /// File extension of the final artifact.
    pub fn extension(self) -> &'static str {
        match self {
            ExportMode::Csv => "csv",
            ExportMode::Kml => "kml",
            ExportMode::Shapefile | ExportMode::Sqlite => "zip",
        }
    }
}

impl FromStr for ExportMode {
    type Err = JobError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportMode::Csv),
            "kml" => Ok(ExportMode::Kml),
            "shapefile" | "shp" => Ok(ExportMode::Shapefile),
            "sqlite" => Ok(ExportMode::Sqlite),
            _ => Err(JobError::UnknownMode(s.to_string())),
        }
    }
}

impl fmt::Display for ExportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExportMode::Csv => "csv",
            ExportMode::Kml => "kml",
            ExportMode::Shapefile => "shapefile",
            ExportMode::Sqlite => "sqlite",
        };
        f.write_str(name)
    }
}

/// Which entries of each feature become rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    /// Only the newest entry of each feature.
    Latest,
    /// Every historical entry, one row each.
    All,
}

/// Where the finished artifact is uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub bucket: String,
    pub key: String,
}

/// Immutable description of one export run.
#[derive(Debug, Clone)]
pub struct ExportJob {
    pub survey_id: String,
    pub mode: ExportMode,
    pub filter: FilterKind,
    pub timezone: Option<Tz>,
    pub destination: Destination,
    pub layer_name: String,
    /// Open surveys never reveal collector identities.
    pub open: bool,
}

#[derive(Debug, Deserialize)]
struct JobDescriptor {
    survey: String,
    #[serde(default)]
    mode: Option<String>,
    #[serde(default)]
    latest: Option<bool>,
    #[serde(default)]
    filter: Option<String>,
    #[serde(default)]
    timezone: Option<String>,
    bucket: String,
    #[serde(rename = "s3Object")]
    s3_object: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    open: bool,
}

impl ExportJob {
    /// Build a job from the invocation payload.
    ///
    /// # Arguments
    /// * `payload` - JSON job descriptor
    /// * `mode_override` - Mode given on the command line, if any
    ///
    /// # Returns
    /// * `Result<Self>` - Validated job or an invalid-job error
    pub fn from_json(payload: &str, mode_override: Option<&str>) -> Result<Self> {
        let descriptor: JobDescriptor = serde_json::from_str(payload)
            .map_err(|e| JobError::InvalidDescriptor(e.to_string()))?;

        let mode = mode_override
            .or(descriptor.mode.as_deref())
            .ok_or(JobError::MissingMode)?
            .parse::<ExportMode>()?;

        let filter = match (descriptor.filter.as_deref(), descriptor.latest) {
            (Some("latest"), _) => FilterKind::Latest,
            (Some("all"), _) => FilterKind::All,
            (Some(other), _) => {
                return Err(JobError::InvalidDescriptor(format!("unknown filter '{other}'")).into());
            }
            (None, Some(true)) => FilterKind::Latest,
            (None, _) => FilterKind::All,
        };

        let timezone = match descriptor.timezone.as_deref() {
            None | Some("") => None,
            Some(name) => Some(
                name.parse::<Tz>()
                    .map_err(|_| JobError::UnknownTimezone(name.to_string()))?,
            ),
        };

        if descriptor.survey.is_empty() {
            return Err(JobError::InvalidDescriptor("survey id is empty".to_string()).into());
        }

        Ok(Self {
            survey_id: descriptor.survey,
            mode,
            filter,
            timezone,
            destination: Destination {
                bucket: descriptor.bucket,
                key: descriptor.s3_object,
            },
            layer_name: descriptor
                .name
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| "export".to_string()),
            open: descriptor.open,
        })
    }
}
