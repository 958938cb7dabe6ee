//! Property-list values read from spec files.
//!
//! Spec files carry a JSON encoding of a property list. Numbers keep their
//! integer/real distinction; everything else maps one to one.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};

/// A decoded property-list item.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyListItem {
    String(String),
    Bool(bool),
    Integer(i64),
    Real(f64),
    Array(Vec<PropertyListItem>),
    Dict(BTreeMap<String, PropertyListItem>),
}

/// A dictionary of property-list items.
pub type PropertyListDict = BTreeMap<String, PropertyListItem>;

impl PropertyListItem {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyListItem::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[PropertyListItem]> {
        match self {
            PropertyListItem::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&PropertyListDict> {
        match self {
            PropertyListItem::Dict(items) => Some(items),
            _ => None,
        }
    }

    /// Interpret the item as a boolean, accepting YES/NO style strings.
    pub fn loose_bool(&self) -> Option<bool> {
        match self {
            PropertyListItem::Bool(b) => Some(*b),
            PropertyListItem::Integer(i) => Some(*i != 0),
            PropertyListItem::String(s) => match s.as_str() {
                "YES" | "Yes" | "yes" | "TRUE" | "True" | "true" | "1" => Some(true),
                "NO" | "No" | "no" | "FALSE" | "False" | "false" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Short name of the item kind, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            PropertyListItem::String(_) => "string",
            PropertyListItem::Bool(_) => "boolean",
            PropertyListItem::Integer(_) => "integer",
            PropertyListItem::Real(_) => "real",
            PropertyListItem::Array(_) => "array",
            PropertyListItem::Dict(_) => "dictionary",
        }
    }

    /// Decode a property list from JSON text.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        Ok(value.into())
    }

    /// Read and decode a property list file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read property list: {}", path.display()))?;
        Self::from_json_str(&text)
            .with_context(|| format!("failed to parse property list: {}", path.display()))
    }
}

impl From<serde_json::Value> for PropertyListItem {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;

        match value {
            // Property lists have no null; treat it as an empty string.
            Value::Null => PropertyListItem::String(String::new()),
            Value::Bool(b) => PropertyListItem::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => PropertyListItem::Integer(i),
                None => PropertyListItem::Real(n.as_f64().unwrap_or(0.0)),
            },
            Value::String(s) => PropertyListItem::String(s),
            Value::Array(items) => {
                PropertyListItem::Array(items.into_iter().map(Into::into).collect())
            }
            Value::Object(items) => PropertyListItem::Dict(
                items.into_iter().map(|(k, v)| (k, v.into())).collect(),
            ),
        }
    }
}

impl From<&str> for PropertyListItem {
    fn from(value: &str) -> Self {
        PropertyListItem::String(value.to_string())
    }
}

impl From<String> for PropertyListItem {
    fn from(value: String) -> Self {
        PropertyListItem::String(value)
    }
}

impl fmt::Display for PropertyListItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyListItem::String(s) => write!(f, "{:?}", s),
            PropertyListItem::Bool(b) => write!(f, "{}", if *b { "YES" } else { "NO" }),
            PropertyListItem::Integer(i) => write!(f, "{}", i),
            PropertyListItem::Real(r) => write!(f, "{}", r),
            PropertyListItem::Array(items) => {
                f.write_str("(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str(")")
            }
            PropertyListItem::Dict(items) => {
                f.write_str("{")?;
                for (key, item) in items {
                    write!(f, "{:?} = {}; ", key, item)?;
                }
                f.write_str("}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_json_property_list() {
        let item = PropertyListItem::from_json_str(
            r#"{"Identifier": "com.example.cc", "Options": [{"Name": "FOO"}], "Count": 2, "On": true}"#,
        )
        .unwrap();

        let dict = item.as_dict().unwrap();
        assert_eq!(dict["Identifier"].as_str(), Some("com.example.cc"));
        assert_eq!(dict["Options"].as_array().map(<[_]>::len), Some(1));
        assert_eq!(dict["Count"], PropertyListItem::Integer(2));
        assert_eq!(dict["On"].loose_bool(), Some(true));
    }

    #[test]
    fn test_loose_bool() {
        assert_eq!(PropertyListItem::from("NO").loose_bool(), Some(false));
        assert_eq!(PropertyListItem::from("yes").loose_bool(), Some(true));
        assert_eq!(PropertyListItem::from("maybe").loose_bool(), None);
    }

    #[test]
    fn test_display_is_compact() {
        let item = PropertyListItem::Array(vec!["a".into(), PropertyListItem::Bool(false)]);
        assert_eq!(item.to_string(), r#"("a", NO)"#);
    }
}
