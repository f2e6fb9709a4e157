//! KML encoder
//!
//! Produces a KML 2.2 document with one `Placemark` per entry, placed at the
//! feature centroid. Every column becomes a `Data` element of the
//! placemark's `ExtendedData`; names and values are XML-escaped.

use quick_xml::escape::escape;

use crate::error::Result;
use crate::export::naming::{FieldNamer, NamingRule};
use crate::export::schema::SchemaDescriptor;
use crate::model::Entry;
use crate::values::{BsonConverter, CellConverter, format_double};

use super::{CORE_COLUMNS, EncoderOptions, TextEncoder, TimeRenderer, core_cells};

const HEADER: &str = concat!(
    "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n",
    "<kml xmlns=\"http://www.opengis.net/kml/2.2\">\n",
    "<Document><name>KML Export</name><open>1</open><description></description>\n",
    "<Folder>\n",
    "<name>Placemarks</name>\n",
    "<description></description>\n",
);

const TRAILER: &str = "\n</Folder></Document></kml>";

/// Encoder for KML format
pub struct KmlEncoder {
    /// Escaped column names, in output order
    names: Vec<String>,
    info_fields: Vec<String>,
    response_fields: Vec<String>,
    time: TimeRenderer,
    converter: CellConverter,
}

impl KmlEncoder {
    pub fn new(schema: &SchemaDescriptor, options: &EncoderOptions) -> Self {
        let mut namer = FieldNamer::new(NamingRule::Verbatim);
        let names = CORE_COLUMNS
            .iter()
            .map(|c| c.to_string())
            .chain(
                schema
                    .info_fields()
                    .iter()
                    .chain(schema.response_fields())
                    .map(|f| namer.name(f)),
            )
            .map(|name| escape(name.as_str()).into_owned())
            .collect();

        Self {
            names,
            info_fields: schema.info_fields().to_vec(),
            response_fields: schema.response_fields().to_vec(),
            time: TimeRenderer::new(options),
            converter: CellConverter::new(),
        }
    }
}

impl TextEncoder for KmlEncoder {
    fn begin(&mut self) -> String {
        HEADER.to_string()
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
        let values = core.into_iter().chain(info).chain(responses);

        let mut out = String::with_capacity(256 + self.names.len() * 64);
        out.push_str("<Placemark><name></name><description></description>");
        out.push_str(&format!(
            "<Point><coordinates>{},{}</coordinates></Point>",
            format_double(entry.centroid.lon),
            format_double(entry.centroid.lat)
        ));
        out.push_str("<ExtendedData>");
        for (name, value) in self.names.iter().zip(values) {
            out.push_str(&format!(
                "<Data name=\"{name}\"><displayName>{name}</displayName><value>{}</value></Data>\n",
                escape(value.as_str())
            ));
        }
        out.push_str("</ExtendedData></Placemark>\n");
        Ok(out)
    }

    fn finish(&mut self) -> String {
        TRAILER.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::writers::test_support::{entry, schema_for};
    use bson::doc;

    #[test]
    fn test_document_frame() {
        let mut encoder = KmlEncoder::new(&schema_for(&[]), &EncoderOptions::default());
        let document = format!("{}{}", encoder.begin(), encoder.finish());
        assert!(document.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<kml"));
        assert!(document.ends_with("</Folder></Document></kml>"));
    }

    #[test]
    fn test_placemark_coordinates_and_data() {
        let e = entry("parcel-1", doc! { "hazards": ["fire", "flood"] });
        let mut encoder = KmlEncoder::new(&schema_for(std::slice::from_ref(&e)), &EncoderOptions::default());
        let placemark = encoder.encode(&e).unwrap();

        assert!(placemark.contains("<coordinates>-83.25,42.5</coordinates>"));
        assert!(placemark.contains(
            "<Data name=\"object_id\"><displayName>object_id</displayName><value>parcel-1</value></Data>"
        ));
        assert!(placemark.contains(
            "<Data name=\"hazards\"><displayName>hazards</displayName><value>fire;flood</value></Data>"
        ));
        assert!(placemark.ends_with("</Placemark>\n"));
    }

    #[test]
    fn test_names_and_values_escaped() {
        let e = entry("a", doc! { "Q<1> & \"2\"": "x < y & z" });
        let mut encoder = KmlEncoder::new(&schema_for(std::slice::from_ref(&e)), &EncoderOptions::default());
        let placemark = encoder.encode(&e).unwrap();

        assert!(placemark.contains("<value>x &lt; y &amp; z</value>"));
        assert!(placemark.contains("name=\"Q&lt;1&gt; &amp; &quot;2&quot;\""));
        assert!(!placemark.contains("x < y"));
    }

    #[test]
    fn test_missing_field_renders_empty_value() {
        let a = entry("a", doc! { "use": "vacant" });
        let b = entry("b", doc! {});
        let mut encoder = KmlEncoder::new(&schema_for(&[a, b.clone()]), &EncoderOptions::default());
        let placemark = encoder.encode(&b).unwrap();
        assert!(placemark.contains("<displayName>use</displayName><value></value>"));
    }
}
