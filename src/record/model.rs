//! Model definitions
//!
//! A model names the record type and declares its fields. The type name
//! doubles as the discriminator stamped into every stored item, so several
//! models can share one domain.

use serde::{Deserialize, Serialize};

/// Field kinds understood by the codec
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// UTF-8 string
    String,
    /// Long UTF-8 string
    Text,
    /// 64-bit signed integer
    Integer,
    /// 64-bit floating point
    Float,
    /// Boolean
    Boolean,
    /// Calendar date, `YYYY-MM-DD`
    Date,
    /// RFC 3339 timestamp
    DateTime,
    /// Generated identifier, assigned at create
    Serial,
    /// Unordered multi-valued string set
    List,
}

impl FieldKind {
    /// Returns the kind name for error messages
    pub fn kind_name(&self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Text => "text",
            FieldKind::Integer => "integer",
            FieldKind::Float => "float",
            FieldKind::Boolean => "boolean",
            FieldKind::Date => "date",
            FieldKind::DateTime => "datetime",
            FieldKind::Serial => "serial",
            FieldKind::List => "list",
        }
    }

    /// Returns true for kinds stored as several attribute values
    pub fn is_multi_valued(&self) -> bool {
        matches!(self, FieldKind::List)
    }
}

/// Field definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub kind: FieldKind,
    /// Part of the natural key
    #[serde(default)]
    pub key: bool,
}

/// Record type definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Model {
    type_name: String,
    fields: Vec<FieldDef>,
}

impl Model {
    /// Create a model with no fields
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            fields: Vec::new(),
        }
    }

    /// Adds a non-key field
    pub fn field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.push(FieldDef {
            name: name.into(),
            kind,
            key: false,
        });
        self
    }

    /// Adds a natural key field
    pub fn key(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.push(FieldDef {
            name: name.into(),
            kind,
            key: true,
        });
        self
    }

    /// Adds a serial key field
    pub fn serial(mut self, name: impl Into<String>) -> Self {
        self.fields.push(FieldDef {
            name: name.into(),
            kind: FieldKind::Serial,
            key: true,
        });
        self
    }

    /// Type discriminator written into stored items
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn get_field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }

    /// Returns the serial field, if the model has one
    pub fn serial_field(&self) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.kind == FieldKind::Serial)
    }

    /// Returns the key fields sorted by name
    pub fn key_fields(&self) -> Vec<&FieldDef> {
        let mut keys: Vec<&FieldDef> = self.fields.iter().filter(|f| f.key).collect();
        keys.sort_by(|a, b| a.name.cmp(&b.name));
        keys
    }
}
