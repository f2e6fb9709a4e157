//! Tests for the value converters

use super::*;
use bson::{Bson, DateTime, doc, oid::ObjectId};
use serde_json::{Value as JsonValue, json};

// ===== Cell converter =====

#[test]
fn test_cell_scalars() {
    let cells = CellConverter::new();
    assert_eq!(cells.convert(&Bson::String("vacant".into())), "vacant");
    assert_eq!(cells.convert(&Bson::Int32(7)), "7");
    assert_eq!(cells.convert(&Bson::Int64(-12)), "-12");
    assert_eq!(cells.convert(&Bson::Double(2.0)), "2");
    assert_eq!(cells.convert(&Bson::Double(2.25)), "2.25");
    assert_eq!(cells.convert(&Bson::Boolean(true)), "true");
}

#[test]
fn test_cell_missing_and_null_are_empty() {
    let cells = CellConverter::new();
    assert_eq!(cells.convert_optional(None), "");
    assert_eq!(cells.convert(&Bson::Null), "");
}

#[test]
fn test_cell_list_joined_with_semicolon() {
    let cells = CellConverter::new();
    let value = Bson::Array(vec![
        Bson::String("fire".into()),
        Bson::String("flood".into()),
        Bson::String("mold".into()),
    ]);
    assert_eq!(cells.convert(&value), "fire;flood;mold");
}

#[test]
fn test_cell_mixed_list() {
    let cells = CellConverter::new();
    let value = Bson::Array(vec![Bson::Int32(1), Bson::Null, Bson::Double(2.5)]);
    assert_eq!(cells.convert(&value), "1;;2.5");
}

#[test]
fn test_cell_object_id_and_date() {
    let cells = CellConverter::new();
    let oid = ObjectId::new();
    assert_eq!(cells.convert(&Bson::ObjectId(oid)), oid.to_hex());
    assert_eq!(
        cells.convert(&Bson::DateTime(DateTime::from_millis(0))),
        "1970-01-01T00:00:00Z"
    );
}

#[test]
fn test_cell_document_is_compact_json() {
    let cells = CellConverter::new();
    let value = Bson::Document(doc! { "a": 1, "b": "x" });
    assert_eq!(cells.convert(&value), r#"{"a":1,"b":"x"}"#);
}

// ===== JSON converter =====

#[test]
fn test_json_scalars_keep_type() {
    let json = JsonConverter::new();
    assert_eq!(json.convert(&Bson::Int32(3)), json!(3));
    assert_eq!(json.convert(&Bson::Double(1.5)), json!(1.5));
    assert_eq!(json.convert(&Bson::Boolean(false)), json!(false));
    assert_eq!(json.convert(&Bson::String("x".into())), json!("x"));
    assert_eq!(json.convert(&Bson::Null), JsonValue::Null);
}

#[test]
fn test_json_missing_is_null() {
    let json = JsonConverter::new();
    assert_eq!(json.convert_optional(None), JsonValue::Null);
}

#[test]
fn test_json_list_flattened_to_text() {
    let json = JsonConverter::new();
    let value = Bson::Array(vec![Bson::String("a".into()), Bson::String("b".into())]);
    assert_eq!(json.convert(&value), json!("a;b"));
}

#[test]
fn test_json_non_finite_double_is_null() {
    let json = JsonConverter::new();
    assert_eq!(json.convert(&Bson::Double(f64::INFINITY)), JsonValue::Null);
}
