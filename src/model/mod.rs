//! Domain types shared by every stage of the export pipeline.

pub mod feature;
pub mod geometry;
pub mod job;

pub use feature::{Centroid, Entry, Source, SurveyFeature};
pub use geometry::{Geometry, GeometryKind, Position};
pub use job::{Destination, ExportJob, ExportMode, FilterKind};
