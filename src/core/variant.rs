// src/core/variant.rs

//! # Variant Values
//!
//! Every evaluated property ends up as a [`Variant`]: a small, serializable,
//! dynamically typed value (scalar, list or nested map). It is the currency
//! exchanged between the evaluator, the property maps and the persisted model.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A nested map of evaluated values, ordered by key for deterministic output.
pub type VariantMap = BTreeMap<String, Variant>;

/// A dynamically typed, evaluated property value.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub enum Variant {
    /// An evaluated value that is explicitly empty (`null`).
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Variant>),
    Map(VariantMap),
}

impl Variant {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Truthiness as the build language understands it.
    ///
    /// Strings are false when empty, `"0"` or `"false"`; lists and maps are
    /// true when non-empty.
    pub fn to_bool(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::String(s) => !(s.is_empty() || s == "0" || s.eq_ignore_ascii_case("false")),
            Self::List(items) => !items.is_empty(),
            Self::Map(map) => !map.is_empty(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&VariantMap> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Variant]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Bool(b) => Some(i64::from(*b)),
            Self::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Converts a scalar to its string form. Lists are joined with `,`.
    pub fn to_string_value(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Bool(b) => b.to_string(),
            Self::Int(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::String(s) => s.clone(),
            Self::List(items) => items
                .iter()
                .map(Self::to_string_value)
                .collect::<Vec<_>>()
                .join(","),
            Self::Map(_) => serde_json::Value::from(self).to_string(),
        }
    }

    /// Coerces the value into a list of strings.
    ///
    /// A single string becomes a one-element list and `null` an empty one,
    /// matching how list-typed properties accept scalar assignments.
    pub fn to_string_list(&self) -> Vec<String> {
        match self {
            Self::Null => Vec::new(),
            Self::List(items) => items
                .iter()
                .filter(|v| !v.is_null())
                .map(Self::to_string_value)
                .collect(),
            other => vec![other.to_string_value()],
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "{}", s),
            other => write!(f, "{}", serde_json::Value::from(other)),
        }
    }
}

// --- Conversions ---

impl From<bool> for Variant {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Variant {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for Variant {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Variant {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Vec<String>> for Variant {
    fn from(value: Vec<String>) -> Self {
        Self::List(value.into_iter().map(Self::String).collect())
    }
}

impl From<VariantMap> for Variant {
    fn from(value: VariantMap) -> Self {
        Self::Map(value)
    }
}

impl From<serde_json::Value> for Variant {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Float(n.as_f64().unwrap_or_default()),
            },
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => {
                Self::List(items.into_iter().map(Self::from).collect())
            }
            serde_json::Value::Object(map) => {
                Self::Map(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

impl From<&Variant> for serde_json::Value {
    fn from(value: &Variant) -> Self {
        match value {
            Variant::Null => Self::Null,
            Variant::Bool(b) => Self::Bool(*b),
            Variant::Int(i) => Self::from(*i),
            Variant::Float(f) => serde_json::Number::from_f64(*f)
                .map(Self::Number)
                .unwrap_or(Self::Null),
            Variant::String(s) => Self::String(s.clone()),
            Variant::List(items) => Self::Array(items.iter().map(Self::from).collect()),
            Variant::Map(map) => Self::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Self::from(v)))
                    .collect(),
            ),
        }
    }
}

/// Serde adapter writing a [`VariantMap`] as plain nested data (`{"a": 1}`)
/// instead of the tagged form used by the binary store. For human-edited
/// formats such as TOML.
pub mod natural_map {
    use super::{Variant, VariantMap};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::BTreeMap;

    pub fn serialize<S: Serializer>(map: &VariantMap, serializer: S) -> Result<S::Ok, S::Error> {
        let plain: BTreeMap<&String, serde_json::Value> =
            map.iter().map(|(k, v)| (k, serde_json::Value::from(v))).collect();
        plain.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<VariantMap, D::Error> {
        let plain = BTreeMap::<String, serde_json::Value>::deserialize(deserializer)?;
        Ok(plain.into_iter().map(|(k, v)| (k, Variant::from(v))).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness_follows_script_semantics() {
        assert!(!Variant::Null.to_bool());
        assert!(Variant::from("yes").to_bool());
        assert!(!Variant::from("").to_bool());
        assert!(!Variant::from("false").to_bool());
        assert!(!Variant::from("0").to_bool());
        assert!(Variant::Int(2).to_bool());
        assert!(!Variant::List(vec![]).to_bool());
    }

    #[test]
    fn test_string_list_coercion() {
        assert_eq!(Variant::from("a.cpp").to_string_list(), vec!["a.cpp"]);
        assert!(Variant::Null.to_string_list().is_empty());
        let list = Variant::from(vec!["x".to_string(), "y".to_string()]);
        assert_eq!(list.to_string_list(), vec!["x", "y"]);
    }

    #[test]
    fn test_json_conversion_keeps_structure() {
        let json: serde_json::Value =
            serde_json::from_str(r#"{"cpp": {"defines": ["A", "B"], "optimize": 2}}"#).unwrap();
        let variant = Variant::from(json.clone());

        let cpp = variant.as_map().unwrap().get("cpp").unwrap().as_map().unwrap();
        assert_eq!(cpp.get("optimize"), Some(&Variant::Int(2)));
        assert_eq!(serde_json::Value::from(&variant), json);
    }
}
