//! Dialect quoting rules
//!
//! Names that are plain identifiers are emitted bare; anything else is
//! wrapped in backticks with embedded backticks doubled. Values are always
//! wrapped in double quotes with embedded double quotes doubled.

use serde_json::Value;

use crate::condition::value_text;

/// Pseudo-attribute addressing the item name
pub const ITEM_NAME: &str = "itemName()";

/// Quotes an attribute or domain name
pub fn quote_name(name: &str) -> String {
    if name == ITEM_NAME || is_plain_identifier(name) {
        return name.to_string();
    }
    format!("`{}`", name.replace('`', "``"))
}

/// Quotes a string value
pub fn quote_value(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

/// Quotes a JSON value by its textual form
pub fn quote_json(value: &Value) -> String {
    quote_value(&value_text(value))
}

fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}
