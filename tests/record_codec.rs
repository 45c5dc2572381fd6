//! Record Codec Tests
//!
//! Encoding and decoding through a real store round trip: null deletion,
//! multi-valued fields, metadata tagging and item naming.

use sdb_adapter::record::{
    decode, encode, item_name, FieldKind, Model, RecordError, CODEC_VERSION, METADATA_ATTR,
};
use sdb_adapter::store::{MemoryStore, StoreClient};
use serde_json::{json, Map, Value};

// =============================================================================
// Test Utilities
// =============================================================================

fn products() -> Model {
    Model::new("products")
        .key("sku", FieldKind::String)
        .field("name", FieldKind::String)
        .field("price", FieldKind::Float)
        .field("stock", FieldKind::Integer)
        .field("active", FieldKind::Boolean)
        .field("tags", FieldKind::List)
        .field("released", FieldKind::Date)
}

fn attrs(value: Value) -> Map<String, Value> {
    value.as_object().cloned().expect("attributes are an object")
}

fn store() -> MemoryStore {
    MemoryStore::new().with_domain("shop")
}

// =============================================================================
// Round Trip
// =============================================================================

#[test]
fn test_round_trip_through_store() {
    let model = products();
    let store = store();
    let input = attrs(json!({
        "sku": "A1",
        "name": "Bolt",
        "price": 2.5,
        "stock": 40,
        "active": true,
        "tags": ["steel", "m6"],
        "released": "2021-03-04"
    }));

    let encoded = encode(&model, &input).unwrap();
    store
        .put_attributes("shop", &encoded.item_name, &encoded.writable, true)
        .unwrap();

    let raw = store.get_attributes("shop", &encoded.item_name, &[]).unwrap();
    let decoded = decode(&model, &encoded.item_name, &raw).unwrap();

    assert_eq!(decoded.get("name"), &json!("Bolt"));
    assert_eq!(decoded.get("price"), &json!(2.5));
    assert_eq!(decoded.get("stock"), &json!(40));
    assert_eq!(decoded.get("active"), &json!(true));
    assert_eq!(decoded.get("tags"), &json!(["m6", "steel"]));
    assert_eq!(decoded.get("released"), &json!("2021-03-04"));

    let metadata = decoded.metadata.expect("metadata is present");
    assert_eq!(metadata.type_name, "products");
    assert_eq!(metadata.codec_version.as_deref(), Some(CODEC_VERSION));
}

#[test]
fn test_round_trip_restores_whole_record() {
    let model = Model::new("events")
        .serial("id")
        .field("title", FieldKind::String)
        .field("body", FieldKind::Text)
        .field("seats", FieldKind::Integer)
        .field("fee", FieldKind::Float)
        .field("whole_fee", FieldKind::Float)
        .field("public", FieldKind::Boolean)
        .field("day", FieldKind::Date)
        .field("starts_at", FieldKind::DateTime)
        .field("tags", FieldKind::List)
        .field("venue", FieldKind::String);
    let store = store();
    let input = attrs(json!({
        "id": item_name::generate_serial(),
        "title": "Launch",
        "body": "Doors open at six.",
        "seats": 120,
        "fee": 12.5,
        "whole_fee": 3,
        "public": false,
        "day": "2020-01-01",
        "starts_at": "2020-01-01T18:00:00Z",
        "tags": ["evening", "launch"],
        "venue": null
    }));

    let encoded = encode(&model, &input).unwrap();
    assert!(!encoded.writable.contains_key("venue"));
    store
        .put_attributes("shop", &encoded.item_name, &encoded.writable, true)
        .unwrap();

    let raw = store.get_attributes("shop", &encoded.item_name, &[]).unwrap();
    let decoded = decode(&model, &encoded.item_name, &raw).unwrap();
    assert_eq!(decoded.attributes, input);
}

#[test]
fn test_null_field_deleted_and_read_back_as_null() {
    let model = products();
    let store = store();

    let first = encode(&model, &attrs(json!({"sku": "A1", "name": "Bolt"}))).unwrap();
    store
        .put_attributes("shop", &first.item_name, &first.writable, true)
        .unwrap();

    let second = encode(&model, &attrs(json!({"sku": "A1", "name": null}))).unwrap();
    assert_eq!(second.item_name, first.item_name);
    assert_eq!(second.deletable, vec!["name".to_string()]);
    store
        .delete_attributes("shop", &second.item_name, Some(&second.deletable))
        .unwrap();

    let raw = store.get_attributes("shop", &first.item_name, &[]).unwrap();
    assert!(!raw.contains_key("name"));
    let decoded = decode(&model, &first.item_name, &raw).unwrap();
    assert_eq!(decoded.get("name"), &Value::Null);
}

#[test]
fn test_encode_is_deterministic() {
    let model = products();
    let input = attrs(json!({"sku": "A1", "tags": ["b", "a", "b"]}));
    let first = encode(&model, &input).unwrap();
    let second = encode(&model, &input).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.writable["tags"], vec!["a", "b"]);
}

#[test]
fn test_metadata_written_for_type_filtering() {
    let encoded = encode(&products(), &attrs(json!({"sku": "A1"}))).unwrap();
    let metadata = &encoded.writable[METADATA_ATTR];
    assert!(metadata.contains(&"products".to_string()));
    assert!(metadata.contains(&CODEC_VERSION.to_string()));
}

// =============================================================================
// Item Naming
// =============================================================================

#[test]
fn test_natural_key_names_are_stable() {
    let model = products();
    let a = item_name::derive(&model, &attrs(json!({"sku": "A1", "name": "x"}))).unwrap();
    let b = item_name::derive(&model, &attrs(json!({"sku": "A1", "name": "y"}))).unwrap();
    let c = item_name::derive(&model, &attrs(json!({"sku": "A2"}))).unwrap();
    assert_eq!(a, b);
    assert_ne!(a, c);
}

#[test]
fn test_serial_key_names_use_the_value() {
    let model = Model::new("posts").serial("id").field("title", FieldKind::String);
    let id = item_name::generate_serial();
    let name = item_name::derive(&model, &attrs(json!({"id": id.clone()}))).unwrap();
    assert_eq!(name, id);
}

#[test]
fn test_missing_key_rejected() {
    let err = encode(&products(), &attrs(json!({"name": "Bolt"}))).unwrap_err();
    assert!(matches!(err, RecordError::MissingKey { .. }));
}

// =============================================================================
// Invalid Input
// =============================================================================

#[test]
fn test_unknown_field_rejected() {
    let err = encode(&products(), &attrs(json!({"sku": "A1", "colour": "red"}))).unwrap_err();
    assert!(matches!(err, RecordError::UnknownField { .. }));
}

#[test]
fn test_corrupt_stored_value_reported() {
    let model = products();
    let mut raw = sdb_adapter::record::AttributeMap::new();
    raw.insert("stock".to_string(), vec!["many".to_string()]);
    let err = decode(&model, "x", &raw).unwrap_err();
    assert!(err.is_stored_data());
}
