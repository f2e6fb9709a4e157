//! Strategy implementations for BSON conversion
//!
//! - CellConverter: cell text for CSV, KML and SQLite
//! - JsonConverter: flat JSON property values for GeoJSON

use bson::{Bson, Document};
use serde_json::{Number, Value as JsonValue};

use super::converter::BsonConverter;
use super::helpers::{binary_to_hex, datetime_to_iso_string, format_double};

/// Separator placed between the values of a multi-valued answer.
pub const MULTI_VALUE_SEPARATOR: &str = ";";

/// Cell text converter
///
/// Renders any value as a single cell. Multi-valued answers collapse into
/// one cell joined by [`MULTI_VALUE_SEPARATOR`]; they are never split across
/// columns. Missing and null values render empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct CellConverter;

impl CellConverter {
    pub fn new() -> Self {
        Self
    }

    fn join(&self, values: &[Bson]) -> String {
        values
            .iter()
            .map(|v| self.convert(v))
            .collect::<Vec<_>>()
            .join(MULTI_VALUE_SEPARATOR)
    }

    /// Sub-documents render as compact relaxed Extended JSON.
    fn document(&self, doc: &Document) -> String {
        Bson::Document(doc.clone()).into_relaxed_extjson().to_string()
    }
}

impl BsonConverter for CellConverter {
    type Output = String;

    fn convert(&self, value: &Bson) -> String {
        match value {
            Bson::String(s) => s.clone(),
            Bson::Int32(n) => n.to_string(),
            Bson::Int64(n) => n.to_string(),
            Bson::Double(f) => format_double(*f),
            Bson::Boolean(b) => b.to_string(),
            Bson::Null | Bson::Undefined => String::new(),
            Bson::ObjectId(oid) => oid.to_hex(),
            Bson::DateTime(dt) => datetime_to_iso_string(dt),
            Bson::Decimal128(d) => d.to_string(),
            Bson::Array(values) => self.join(values),
            Bson::Document(doc) => self.document(doc),
            Bson::Binary(bin) => binary_to_hex(bin),
            other => other.clone().into_relaxed_extjson().to_string(),
        }
    }
}

/// JSON property converter
///
/// Scalars keep their JSON type so numeric answers stay numeric in the
/// converted layer. Lists and sub-documents cannot be stored in a flat
/// attribute table and become cell text.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonConverter {
    cells: CellConverter,
}

impl JsonConverter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BsonConverter for JsonConverter {
    type Output = JsonValue;

    fn convert(&self, value: &Bson) -> JsonValue {
        match value {
            Bson::String(s) => JsonValue::String(s.clone()),
            Bson::Int32(n) => JsonValue::from(*n),
            Bson::Int64(n) => JsonValue::from(*n),
            // NaN and infinities have no JSON form
            Bson::Double(f) => Number::from_f64(*f).map_or(JsonValue::Null, JsonValue::Number),
            Bson::Boolean(b) => JsonValue::Bool(*b),
            Bson::Null | Bson::Undefined => JsonValue::Null,
            other => JsonValue::String(self.cells.convert(other)),
        }
    }
}
