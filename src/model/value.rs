//! Attribute value type for entity and relation bags.
//!
//! The engine hands back schemaless JSON documents, so the value model is the
//! JSON model (minus arbitrary-precision numbers). Serialization is untagged:
//! a `Value` round-trips to exactly the JSON the engine produced.

use serde::{Deserialize, Serialize};

use super::PropertyMap;

/// A single attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Map(PropertyMap),
}

// ============================================================================
// Text views
// ============================================================================

impl Value {
    /// Render as display text. Lists are joined with `" + "`, the way
    /// multi-valued labels are shown in the explorer UI.
    pub fn to_display_text(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::String(s) => {
                let trimmed = s.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_owned())
            }
            Value::List(items) => {
                let parts: Vec<String> = items.iter().filter_map(Value::to_display_text).collect();
                (!parts.is_empty()).then(|| parts.join(" + "))
            }
            Value::Bool(b) => Some(b.to_string()),
            Value::Int(i) => Some(i.to_string()),
            Value::Float(v) => Some(v.to_string()),
            Value::Map(_) => None,
        }
    }

    /// All string leaves of this value, in order. Used for text matching.
    pub fn text_leaves(&self) -> Vec<&str> {
        match self {
            Value::String(s) => vec![s.as_str()],
            Value::List(items) => items.iter().flat_map(Value::text_leaves).collect(),
            _ => Vec::new(),
        }
    }
}

// ============================================================================
// Conversions (From impls)
// ============================================================================

impl From<bool> for Value { fn from(v: bool) -> Self { Value::Bool(v) } }
impl From<i32> for Value { fn from(v: i32) -> Self { Value::Int(v as i64) } }
impl From<i64> for Value { fn from(v: i64) -> Self { Value::Int(v) } }
impl From<f64> for Value { fn from(v: f64) -> Self { Value::Float(v) } }
impl From<String> for Value { fn from(v: String) -> Self { Value::String(v) } }
impl From<&str> for Value { fn from(v: &str) -> Self { Value::String(v.to_owned()) } }
impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self { Value::List(v.into_iter().map(Into::into).collect()) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_from() {
        assert_eq!(Value::from("hello"), Value::String("hello".into()));
        assert_eq!(Value::from(42), Value::Int(42));
        assert_eq!(Value::from(2.5), Value::Float(2.5));
        assert_eq!(Value::from(true), Value::Bool(true));
    }

    #[test]
    fn test_untagged_json_shape() {
        let v: Value = serde_json::from_str(r#"{"label": "T cell", "synonyms": ["a", "b"], "n": 3}"#).unwrap();
        let Value::Map(m) = &v else { panic!("expected map, got {v:?}") };
        assert_eq!(m.get("label"), Some(&Value::from("T cell")));
        assert_eq!(m.get("n"), Some(&Value::Int(3)));
        assert_eq!(serde_json::to_value(&m["synonyms"]).unwrap(), serde_json::json!(["a", "b"]));
    }

    #[test]
    fn test_display_text() {
        assert_eq!(Value::from("  ").to_display_text(), None);
        assert_eq!(Value::from(vec!["CD4", "CD8"]).to_display_text().as_deref(), Some("CD4 + CD8"));
        assert_eq!(Value::Int(7).to_display_text().as_deref(), Some("7"));
        assert_eq!(Value::from(vec![Value::Null, Value::from("")]).to_display_text(), None);
    }
}
