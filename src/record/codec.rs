//! Record codec
//!
//! Converts typed attribute maps to and from the store's flat representation,
//! where every attribute is an unordered set of strings.
//!
//! # Conventions
//!
//! - Null fields are never written; they are deleted from the item instead
//! - Every item carries `__dm_metadata = [codec version, type]` plus the
//!   deprecated `simpledb_type = [type]`
//! - Multi-valued fields are written sorted and de-duplicated

use std::collections::BTreeMap;
use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate};
use regex::Regex;
use serde_json::{Map, Number, Value};

use super::errors::{RecordError, RecordResult};
use super::item_name;
use super::model::{FieldDef, FieldKind, Model};
use crate::condition::{value_text, Condition};

/// Attribute holding `[codec version, type]`
pub const METADATA_ATTR: &str = "__dm_metadata";

/// Deprecated attribute holding `[type]`, still written for older readers
pub const DEPRECATED_TYPE_ATTR: &str = "simpledb_type";

/// Version stamped into every encoded item
pub const CODEC_VERSION: &str = "v01.01.00";

/// Attributes every selection must request
pub const META_ATTRS: [&str; 2] = [METADATA_ATTR, DEPRECATED_TYPE_ATTR];

/// Store-side attribute map: name to values
pub type AttributeMap = BTreeMap<String, Vec<String>>;

fn version_pattern() -> &'static Regex {
    static VERSION: OnceLock<Regex> = OnceLock::new();
    VERSION.get_or_init(|| Regex::new(r"^v\d+\.\d+\.\d+$").expect("version pattern is valid"))
}

/// Type tag read back from an item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordMetadata {
    pub type_name: String,
    /// `None` for items written before the metadata attribute existed
    pub codec_version: Option<String>,
}

/// An item ready to be written
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedRecord {
    pub item_name: String,
    /// Attributes to put, metadata included
    pub writable: AttributeMap,
    /// Attributes to delete because their field is null
    pub deletable: Vec<String>,
}

/// An item read back into typed form
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedRecord {
    pub item_name: String,
    /// One entry per model field; absent fields are `null`
    pub attributes: Map<String, Value>,
    pub metadata: Option<RecordMetadata>,
}

impl DecodedRecord {
    /// Returns the value of a field, `null` if absent
    pub fn get(&self, field: &str) -> &Value {
        self.attributes.get(field).unwrap_or(&Value::Null)
    }

    /// Restricts the attributes to the given fields
    pub fn project(mut self, fields: &[String]) -> Self {
        self.attributes.retain(|name, _| fields.iter().any(|f| f == name));
        self
    }
}

/// Read filter selecting the items of one model
pub fn type_filter(model: &Model) -> Condition {
    Condition::or(vec![
        Condition::eq(METADATA_ATTR, model.type_name()),
        Condition::eq(DEPRECATED_TYPE_ATTR, model.type_name()),
    ])
}

/// Encodes an attribute map for writing.
///
/// Fields missing from `attributes` are left untouched in the store; fields
/// set to `null` (or to an empty list) are scheduled for deletion.
pub fn encode(model: &Model, attributes: &Map<String, Value>) -> RecordResult<EncodedRecord> {
    let item_name = item_name::derive(model, attributes)?;
    encode_named(model, item_name, attributes)
}

/// Encodes attributes for an item whose name is already known, as when
/// updating a subset of an existing record's fields.
pub fn encode_named(
    model: &Model,
    item_name: impl Into<String>,
    attributes: &Map<String, Value>,
) -> RecordResult<EncodedRecord> {
    let item_name = item_name.into();
    let mut writable = AttributeMap::new();
    let mut deletable = Vec::new();

    for (name, value) in attributes {
        let field = model.get_field(name).ok_or_else(|| RecordError::UnknownField {
            model: model.type_name().to_string(),
            field: name.clone(),
        })?;
        let values = encode_field(field, value)?;
        if values.is_empty() {
            deletable.push(name.clone());
        } else {
            writable.insert(name.clone(), values);
        }
    }

    writable.insert(
        METADATA_ATTR.to_string(),
        vec![CODEC_VERSION.to_string(), model.type_name().to_string()],
    );
    writable.insert(
        DEPRECATED_TYPE_ATTR.to_string(),
        vec![model.type_name().to_string()],
    );

    Ok(EncodedRecord {
        item_name,
        writable,
        deletable,
    })
}

fn encode_field(field: &FieldDef, value: &Value) -> RecordResult<Vec<String>> {
    if value.is_null() {
        return Ok(Vec::new());
    }

    if field.kind == FieldKind::List {
        let mut values: Vec<String> = match value {
            Value::Array(items) => items
                .iter()
                .filter(|v| !v.is_null())
                .map(|v| scalar_text(field, v))
                .collect::<RecordResult<_>>()?,
            other => vec![scalar_text(field, other)?],
        };
        values.sort();
        values.dedup();
        return Ok(values);
    }

    let invalid = || RecordError::InvalidValue {
        field: field.name.clone(),
        kind: field.kind.kind_name(),
        value: value.to_string(),
    };

    let text = match (field.kind, value) {
        (FieldKind::Integer, Value::Number(n)) => n.as_i64().ok_or_else(invalid)?.to_string(),
        (FieldKind::Integer, Value::String(s)) => {
            s.trim().parse::<i64>().map_err(|_| invalid())?.to_string()
        }
        // Integral input keeps its integer text so it decodes back unchanged.
        (FieldKind::Float, Value::Number(n)) => n.to_string(),
        (FieldKind::Float, Value::String(s)) => {
            s.trim().parse::<f64>().map_err(|_| invalid())?.to_string()
        }
        (FieldKind::Boolean, Value::Bool(b)) => b.to_string(),
        // Dates are validated, then stored as given.
        (FieldKind::Date, Value::String(s)) => {
            NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| invalid())?;
            s.clone()
        }
        (FieldKind::DateTime, Value::String(s)) => {
            DateTime::parse_from_rfc3339(s).map_err(|_| invalid())?;
            s.clone()
        }
        (FieldKind::String | FieldKind::Text | FieldKind::Serial, other) => {
            scalar_text(field, other)?
        }
        _ => return Err(invalid()),
    };
    Ok(vec![text])
}

fn scalar_text(field: &FieldDef, value: &Value) -> RecordResult<String> {
    match value {
        Value::String(_) | Value::Number(_) | Value::Bool(_) => Ok(value_text(value)),
        other => Err(RecordError::InvalidValue {
            field: field.name.clone(),
            kind: field.kind.kind_name(),
            value: other.to_string(),
        }),
    }
}

/// Decodes a stored item.
///
/// Attributes the model does not declare are ignored. A scalar field holding
/// several values decodes to the first one.
pub fn decode(model: &Model, item_name: &str, raw: &AttributeMap) -> RecordResult<DecodedRecord> {
    let mut attributes = Map::new();
    for field in model.fields() {
        let value = match raw.get(&field.name) {
            None => Value::Null,
            Some(values) if values.is_empty() => Value::Null,
            Some(values) => decode_field(field, values)?,
        };
        attributes.insert(field.name.clone(), value);
    }

    Ok(DecodedRecord {
        item_name: item_name.to_string(),
        attributes,
        metadata: decode_metadata(raw),
    })
}

fn decode_field(field: &FieldDef, values: &[String]) -> RecordResult<Value> {
    if field.kind == FieldKind::List {
        let mut items: Vec<&String> = values.iter().collect();
        items.sort();
        items.dedup();
        return Ok(Value::Array(
            items.into_iter().map(|s| Value::String(s.clone())).collect(),
        ));
    }

    let text = &values[0];
    let corrupt = || RecordError::Corrupt {
        field: field.name.clone(),
        kind: field.kind.kind_name(),
        value: text.clone(),
    };

    let value = match field.kind {
        FieldKind::Integer => Value::Number(text.parse::<i64>().map_err(|_| corrupt())?.into()),
        FieldKind::Float => match text.parse::<i64>() {
            Ok(i) => Value::Number(i.into()),
            Err(_) => {
                let f = text.parse::<f64>().map_err(|_| corrupt())?;
                Value::Number(Number::from_f64(f).ok_or_else(corrupt)?)
            }
        },
        FieldKind::Boolean => match text.as_str() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => return Err(corrupt()),
        },
        _ => Value::String(text.clone()),
    };
    Ok(value)
}

fn decode_metadata(raw: &AttributeMap) -> Option<RecordMetadata> {
    if let Some(values) = raw.get(METADATA_ATTR) {
        let codec_version = values
            .iter()
            .find(|v| version_pattern().is_match(v))
            .cloned();
        let type_name = values.iter().find(|v| !version_pattern().is_match(v)).cloned();
        if let Some(type_name) = type_name {
            return Some(RecordMetadata {
                type_name,
                codec_version,
            });
        }
    }

    raw.get(DEPRECATED_TYPE_ATTR)
        .and_then(|values| values.first())
        .map(|type_name| RecordMetadata {
            type_name: type_name.clone(),
            codec_version: None,
        })
}
