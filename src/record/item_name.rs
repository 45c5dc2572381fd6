//! Item naming
//!
//! Serial models use a generated, time-ordered identifier that is also the
//! serial field's value. Models with natural keys use a SHA-256 digest of the
//! type name and the key values taken in field-name order, so the same key
//! always addresses the same item.

use base64::Engine;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::errors::{RecordError, RecordResult};
use super::model::Model;
use crate::condition::value_text;

/// Generates a new serial identifier.
///
/// Identifiers sort in creation order.
pub fn generate_serial() -> String {
    Uuid::now_v7().to_string()
}

/// Derives the item name for a record
pub fn derive(model: &Model, attributes: &Map<String, Value>) -> RecordResult<String> {
    if let Some(serial) = model.serial_field() {
        return key_text(model, &serial.name, attributes);
    }

    let keys = model.key_fields();
    if keys.is_empty() {
        return Err(RecordError::NoKey(model.type_name().to_string()));
    }

    let values = keys
        .iter()
        .map(|field| key_text(model, &field.name, attributes))
        .collect::<RecordResult<Vec<_>>>()?;
    Ok(digest(model.type_name(), &values))
}

fn key_text(model: &Model, field: &str, attributes: &Map<String, Value>) -> RecordResult<String> {
    match attributes.get(field) {
        None | Some(Value::Null) => Err(RecordError::MissingKey {
            model: model.type_name().to_string(),
            field: field.to_string(),
        }),
        Some(value) => Ok(value_text(value)),
    }
}

fn digest(type_name: &str, values: &[String]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(type_name.as_bytes());
    hasher.update(b"+");
    // Length-prefixed so no two key tuples share a byte stream.
    for value in values {
        hasher.update((value.len() as u64).to_be_bytes());
        hasher.update(value.as_bytes());
    }
    let result = hasher.finalize();
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(result)
}
