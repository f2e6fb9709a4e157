//! BSON value conversion for output cells
//!
//! Survey answers are schema-less: the same field may hold a string in one
//! entry, a number in another and a list of choices in a third. This module
//! turns those values into what each output format needs:
//! - Cell text for CSV, KML and SQLite (lists joined with `;`)
//! - JSON property values for GeoJSON
//!
//! # Design
//!
//! A common trait `BsonConverter` lets encoders pick a strategy without
//! caring how each BSON type is rendered.

mod converter;
mod helpers;
mod strategies;

pub use converter::BsonConverter;
pub use helpers::{datetime_to_iso_string, format_double};
pub use strategies::{CellConverter, JsonConverter, MULTI_VALUE_SEPARATOR};

#[cfg(test)]
mod tests;
