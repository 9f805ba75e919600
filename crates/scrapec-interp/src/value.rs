//! Row values.

use indexmap::IndexMap;
use serde::Serialize;

/// A single cell in a row.
///
/// Serialises untagged: `Null` → JSON null, `Text` → string,
/// `List` → array of strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// No value: the selector matched nothing, or the attribute was
    /// absent.
    Null,

    /// A scalar: extracted text, an attribute value, a `set_field`
    /// literal, or a timestamp.
    Text(String),

    /// An `extract_list` / `extract_attribute_list` result.
    List(Vec<String>),
}

impl Value {
    /// True for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl From<Option<String>> for Value {
    fn from(value: Option<String>) -> Self {
        match value {
            Some(text) => Value::Text(text),
            None => Value::Null,
        }
    }
}

/// A row under construction or committed to the result set.
///
/// Column order is first-insertion order and survives to output, which
/// is why this is an `IndexMap` rather than a hash map.
pub type Row = IndexMap<String, Value>;
