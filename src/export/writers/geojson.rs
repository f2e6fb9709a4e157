//! GeoJSON encoder
//!
//! Writes a single `FeatureCollection`. Properties are flat so the
//! conversion tool can map each one to an attribute column: core columns
//! with every attachment in its own `photos`, `photos1`, ... property,
//! then `i_`/`r_` prefixed info and response fields.

use serde_json::{Map, Value as JsonValue};

use crate::error::Result;
use crate::export::naming::{FieldNamer, NamingRule};
use crate::export::schema::SchemaDescriptor;
use crate::model::Entry;
use crate::values::{BsonConverter, JsonConverter};

use super::{EncoderOptions, TextEncoder, TimeRenderer};

/// Encoder for GeoJSON format
pub struct GeoJsonEncoder {
    /// (property name, field) pairs for info fields
    info: Vec<(String, String)>,
    /// (property name, field) pairs for response fields
    responses: Vec<(String, String)>,
    photo_keys: Vec<String>,
    first: bool,
    time: TimeRenderer,
    converter: JsonConverter,
}

impl GeoJsonEncoder {
    pub fn new(schema: &SchemaDescriptor, options: &EncoderOptions) -> Self {
        let mut namer = FieldNamer::new(NamingRule::Identifier);
        for core in [
            "object_id",
            "address",
            "collector",
            "timestamp",
            "source",
            "entry_id",
            "lat",
            "long",
        ] {
            namer.name(core);
        }

        let photo_keys = (0..schema.file_count().max(1))
            .map(|i| match i {
                0 => namer.name("photos"),
                n => namer.name(&format!("photos{n}")),
            })
            .collect();

        let info = schema
            .info_fields()
            .iter()
            .map(|f| (namer.name(&format!("i_{f}")), f.clone()))
            .collect();
        let responses = schema
            .response_fields()
            .iter()
            .map(|f| (namer.name(&format!("r_{f}")), f.clone()))
            .collect();

        Self {
            info,
            responses,
            photo_keys,
            first: true,
            time: TimeRenderer::new(options),
            converter: JsonConverter::new(),
        }
    }

    fn properties(&self, entry: &Entry) -> Map<String, JsonValue> {
        let text = |v: &Option<String>| v.clone().map_or(JsonValue::Null, JsonValue::String);

        let mut props = Map::new();
        props.insert("object_id".into(), JsonValue::from(entry.object_id.as_str()));
        props.insert("address".into(), text(&entry.address));
        props.insert("collector".into(), text(&entry.source.collector));
        props.insert("timestamp".into(), JsonValue::from(self.time.render(&entry.created)));
        props.insert("source".into(), JsonValue::from(entry.source.kind.as_str()));
        props.insert("entry_id".into(), JsonValue::from(entry.id.as_str()));
        props.insert("lat".into(), JsonValue::from(entry.centroid.lat));
        props.insert("long".into(), JsonValue::from(entry.centroid.lon));

        for (i, key) in self.photo_keys.iter().enumerate() {
            let value = entry.files.get(i).map_or(JsonValue::Null, |f| JsonValue::from(f.as_str()));
            props.insert(key.clone(), value);
        }
        for (key, field) in &self.info {
            props.insert(key.clone(), self.converter.convert_optional(entry.info.get(field)));
        }
        for (key, field) in &self.responses {
            props.insert(
                key.clone(),
                self.converter.convert_optional(entry.responses.get(field)),
            );
        }
        props
    }
}

impl TextEncoder for GeoJsonEncoder {
    fn begin(&mut self) -> String {
        "{\"type\":\"FeatureCollection\",\"features\":[".to_string()
    }

    fn encode(&mut self, entry: &Entry) -> Result<String> {
        let mut feature = Map::new();
        feature.insert("type".into(), JsonValue::from("Feature"));
        feature.insert("geometry".into(), serde_json::to_value(&entry.geometry)?);
        feature.insert("properties".into(), JsonValue::Object(self.properties(entry)));

        let mut out = if self.first {
            String::new()
        } else {
            ",".to_string()
        };
        self.first = false;
        out.push_str(&serde_json::to_string(&feature)?);
        Ok(out)
    }

    fn finish(&mut self) -> String {
        "]}\n".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::writers::test_support::{entry, schema_for};
    use crate::model::Geometry;
    use bson::doc;

    fn collection(encoder: &mut GeoJsonEncoder, entries: &[Entry]) -> JsonValue {
        let mut text = encoder.begin();
        for e in entries {
            text.push_str(&encoder.encode(e).unwrap());
        }
        text.push_str(&encoder.finish());
        serde_json::from_str(&text).unwrap()
    }

    #[test]
    fn test_empty_collection_is_valid() {
        let mut encoder = GeoJsonEncoder::new(&schema_for(&[]), &EncoderOptions::default());
        let value = collection(&mut encoder, &[]);
        assert_eq!(value["type"], "FeatureCollection");
        assert_eq!(value["features"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn test_features_separated_by_commas() {
        let a = entry("a", doc! { "use": "vacant" });
        let mut b = entry("b", doc! { "floors": 2 });
        b.geometry = Geometry::Polygon(vec![vec![
            vec![0.0, 0.0],
            vec![1.0, 0.0],
            vec![1.0, 1.0],
            vec![0.0, 0.0],
        ]]);
        let entries = [a, b];
        let mut encoder =
            GeoJsonEncoder::new(&schema_for(&entries), &EncoderOptions::default());
        let value = collection(&mut encoder, &entries);

        let features = value["features"].as_array().unwrap();
        assert_eq!(features.len(), 2);
        assert_eq!(features[0]["geometry"]["type"], "Point");
        assert_eq!(features[1]["geometry"]["type"], "Polygon");

        let props = &features[0]["properties"];
        assert_eq!(props["r_use"], "vacant");
        assert_eq!(props["r_floors"], JsonValue::Null);
        assert_eq!(props["lat"], 42.5);
        assert_eq!(features[1]["properties"]["r_floors"], 2);
    }

    #[test]
    fn test_photo_columns_follow_file_count() {
        let mut e = entry("a", doc! {});
        e.files = vec!["1.jpg".into(), "2.jpg".into(), "3.jpg".into()];
        let mut short = entry("b", doc! {});
        short.files = vec!["only.jpg".into()];

        let entries = [e, short];
        let mut encoder =
            GeoJsonEncoder::new(&schema_for(&entries), &EncoderOptions::default());
        let value = collection(&mut encoder, &entries);

        let first = &value["features"][0]["properties"];
        assert_eq!(first["photos"], "1.jpg");
        assert_eq!(first["photos2"], "3.jpg");
        let second = &value["features"][1]["properties"];
        assert_eq!(second["photos"], "only.jpg");
        assert_eq!(second["photos1"], JsonValue::Null);
    }

    #[test]
    fn test_property_names_are_identifiers() {
        let mut e = entry("a", doc! { "Q 1": "x", "list": ["a", "b"] });
        e.info = doc! { "ward #": 3 };
        let mut encoder =
            GeoJsonEncoder::new(&schema_for(std::slice::from_ref(&e)), &EncoderOptions::default());
        let value = collection(&mut encoder, std::slice::from_ref(&e));

        let props = value["features"][0]["properties"].as_object().unwrap();
        assert_eq!(props["r_Q_1"], "x");
        assert_eq!(props["r_list"], "a;b");
        assert_eq!(props["i_ward__"], 3);

        let keys: Vec<_> = props.keys().map(String::as_str).collect();
        assert_eq!(&keys[..9], &[
            "object_id", "address", "collector", "timestamp", "source", "entry_id", "lat",
            "long", "photos"
        ]);
    }
}
