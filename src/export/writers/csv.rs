//! CSV encoder
//!
//! One header line, then one LF-terminated line per entry. Columns are the
//! core columns followed by the discovered info and response fields. A
//! multi-valued answer stays in a single cell joined by `;`.

use crate::error::Result;
use crate::export::naming::{FieldNamer, NamingRule};
use crate::export::schema::SchemaDescriptor;
use crate::model::Entry;
use crate::values::{BsonConverter, CellConverter};

use super::{CORE_COLUMNS, EncoderOptions, TextEncoder, TimeRenderer, core_cells};

/// Encoder for CSV format
pub struct CsvEncoder {
    /// Column headers
    headers: Vec<String>,
    info_fields: Vec<String>,
    response_fields: Vec<String>,
    time: TimeRenderer,
    converter: CellConverter,
}

impl CsvEncoder {
    /// Create a new CSV encoder
    ///
    /// # Arguments
    /// * `schema` - Discovered schema
    /// * `options` - Encoder options
    pub fn new(schema: &SchemaDescriptor, options: &EncoderOptions) -> Self {
        let mut namer = FieldNamer::new(NamingRule::Verbatim);
        let headers = CORE_COLUMNS
            .iter()
            .map(|c| c.to_string())
            .chain(
                schema
                    .info_fields()
                    .iter()
                    .chain(schema.response_fields())
                    .map(|f| namer.name(f)),
            )
            .collect();

        Self {
            headers,
            info_fields: schema.info_fields().to_vec(),
            response_fields: schema.response_fields().to_vec(),
            time: TimeRenderer::new(options),
            converter: CellConverter::new(),
        }
    }

    /// Escape a CSV value if necessary
    ///
    /// Values containing a comma or a line break are wrapped in double
    /// quotes. Embedded quotes are left as they are.
    fn escape_csv_value(value: &str) -> String {
        if value.contains(',') || value.contains('\n') || value.contains('\r') {
            format!("\"{}\"", value)
        } else {
            value.to_string()
        }
    }

    fn line<I>(cells: I) -> String
    where
        I: IntoIterator<Item = String>,
    {
        let mut line = cells
            .into_iter()
            .map(|c| Self::escape_csv_value(&c))
            .collect::<Vec<_>>()
            .join(",");
        line.push('\n');
        line
    }
}

impl TextEncoder for CsvEncoder {
    fn begin(&mut self) -> String {
        Self::line(self.headers.iter().cloned())
    }

    fn encode(&mut self, entry: &Entry) -> Result<String> {
        let core = core_cells(entry, &self.time);
        let info = self
            .info_fields
            .iter()
            .map(|f| self.converter.convert_optional(entry.info.get(f)));
        let responses = self
            .response_fields
            .iter()
            .map(|f| self.converter.convert_optional(entry.responses.get(f)));

        Ok(Self::line(core.into_iter().chain(info).chain(responses)))
    }

    fn finish(&mut self) -> String {
        String::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::writers::test_support::{entry, schema_for};
    use bson::doc;

    fn split_row(line: &str) -> Vec<String> {
        line.split(',')
            .map(|cell| cell.trim_matches('"').to_string())
            .collect()
    }

    #[test]
    fn test_header_is_core_then_fields() {
        let a = entry("a", doc! { "use": "vacant" });
        let mut encoder = CsvEncoder::new(&schema_for(&[a]), &EncoderOptions::default());
        assert_eq!(
            encoder.begin(),
            "object_id,address,collector,timestamp,source,entry_id,lat,long,photos,use\n"
        );
        assert_eq!(encoder.finish(), "");
    }

    #[test]
    fn test_disjoint_fields_render_empty() {
        let a = entry("a", doc! { "use": "vacant" });
        let b = entry("b", doc! { "condition": "poor" });
        let schema = schema_for(&[a.clone(), b.clone()]);
        let mut encoder = CsvEncoder::new(&schema, &EncoderOptions::default());

        let header = encoder.begin();
        assert!(header.trim_end().ends_with("photos,use,condition"));

        let row_a = encoder.encode(&a).unwrap();
        let row_b = encoder.encode(&b).unwrap();
        assert!(row_a.ends_with(",vacant,\n"));
        assert!(row_b.ends_with(",,poor\n"));
    }

    #[test]
    fn test_list_joined_in_one_cell() {
        let e = entry("a", doc! { "hazards": ["fire", "flood", "mold"] });
        let schema = schema_for(std::slice::from_ref(&e));
        assert_eq!(schema.arity("hazards"), 3);

        let mut encoder = CsvEncoder::new(&schema, &EncoderOptions::default());
        let row = encoder.encode(&e).unwrap();
        let cells = split_row(row.trim_end());
        assert_eq!(cells.len(), CORE_COLUMNS.len() + 1);
        assert_eq!(cells.last().unwrap(), "fire;flood;mold");
    }

    #[test]
    fn test_comma_values_are_quoted() {
        let e = entry("a", doc! { "notes": "broken window, boarded" });
        let mut encoder = CsvEncoder::new(&schema_for(std::slice::from_ref(&e)), &EncoderOptions::default());
        let row = encoder.encode(&e).unwrap();
        assert!(row.ends_with(",\"broken window, boarded\"\n"));
        // addresses without commas stay bare
        assert!(row.contains(",12 Main St,"));
    }

    #[test]
    fn test_quotes_are_not_doubled() {
        assert_eq!(CsvEncoder::escape_csv_value("say \"hi\""), "say \"hi\"");
        assert_eq!(CsvEncoder::escape_csv_value("a,\"b\""), "\"a,\"b\"\"");
        assert_eq!(CsvEncoder::escape_csv_value("two\nlines"), "\"two\nlines\"");
    }

    #[test]
    fn test_round_trip_of_comma_free_values() {
        let e = entry("parcel-9", doc! { "use": "vacant lot", "floors": 2 });
        let mut encoder = CsvEncoder::new(&schema_for(std::slice::from_ref(&e)), &EncoderOptions::default());
        let cells = split_row(encoder.encode(&e).unwrap().trim_end());

        assert_eq!(cells[0], "parcel-9");
        assert_eq!(cells[1], "12 Main St");
        assert_eq!(cells[2], "Ana");
        assert_eq!(cells[3], "2024-03-01T15:04:05.000Z");
        assert_eq!(cells[4], "mobile");
        assert_eq!(cells[9], "vacant lot");
        assert_eq!(cells[10], "2");
    }

    #[test]
    fn test_timezone_applied() {
        let e = entry("a", doc! {});
        let options = EncoderOptions {
            timezone: Some(chrono_tz::America::Detroit),
        };
        let mut encoder = CsvEncoder::new(&schema_for(std::slice::from_ref(&e)), &options);
        let cells = split_row(encoder.encode(&e).unwrap().trim_end());
        assert_eq!(cells[3], "2024-03-01T10:04:05-05:00");
    }
}
