//! Ordered attribute store for descriptive metadata.
//!
//! Attributes keep their insertion order so emitted metadata reads the same
//! way the source published it.

use std::fmt;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// A single attribute value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Text(String),
    Int(i64),
    Double(f64),
    Ints(Vec<i64>),
    Doubles(Vec<f64>),
}

impl AttributeValue {
    /// String form, only for `Text`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// First numeric element as `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Double(v) => Some(*v),
            Self::Ints(v) => v.first().map(|&x| x as f64),
            Self::Doubles(v) => v.first().copied(),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }

    /// All numeric elements as `f64`.
    pub fn to_f64_vec(&self) -> Vec<f64> {
        match self {
            Self::Ints(v) => v.iter().map(|&x| x as f64).collect(),
            Self::Doubles(v) => v.clone(),
            other => other.as_f64().into_iter().collect(),
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => write!(f, "{}", s),
            Self::Int(v) => write!(f, "{}", v),
            Self::Double(v) => write!(f, "{}", v),
            Self::Ints(v) => write!(f, "{:?}", v),
            Self::Doubles(v) => write!(f, "{:?}", v),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<Vec<f64>> for AttributeValue {
    fn from(v: Vec<f64>) -> Self {
        Self::Doubles(v)
    }
}

/// Ordered name -> value map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes {
    entries: Vec<(String, AttributeValue)>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(AttributeValue::as_str)
    }

    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(AttributeValue::as_f64)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Insert or replace, keeping the original position on replace.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<AttributeValue>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<AttributeValue> {
        let position = self.entries.iter().position(|(n, _)| n == name)?;
        Some(self.entries.remove(position).1)
    }

    /// Remove every listed name that is present.
    pub fn remove_all(&mut self, names: &[&str]) {
        self.entries.retain(|(n, _)| !names.contains(&n.as_str()));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }
}

impl FromIterator<(String, AttributeValue)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (String, AttributeValue)>>(iter: I) -> Self {
        let mut attributes = Attributes::new();
        for (name, value) in iter {
            attributes.set(name, value);
        }
        attributes
    }
}

impl Serialize for Attributes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_keeps_position() {
        let mut attrs = Attributes::new();
        attrs.set("title", "SST");
        attrs.set("units", "degree_C");
        attrs.set("title", "Sea Surface Temperature");

        let names: Vec<_> = attrs.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["title", "units"]);
        assert_eq!(attrs.get_str("title"), Some("Sea Surface Temperature"));
    }

    #[test]
    fn test_remove_and_clone_are_independent() {
        let mut attrs = Attributes::new();
        attrs.set("rows", 100i64);
        attrs.set("cols", 200i64);
        attrs.set("actual_range", vec![1.0, 30.0]);

        let copy = attrs.clone();
        assert_eq!(attrs.remove("rows"), Some(AttributeValue::Int(100)));
        attrs.remove_all(&["cols", "missing"]);

        assert_eq!(attrs.len(), 1);
        assert_eq!(copy.len(), 3);
        assert_eq!(attrs.get("actual_range").unwrap().to_f64_vec(), vec![1.0, 30.0]);
    }

    #[test]
    fn test_numeric_access() {
        let mut attrs = Attributes::new();
        attrs.set("missing_value", "-9999");
        attrs.set("scale", 2i64);
        assert_eq!(attrs.get_f64("missing_value"), Some(-9999.0));
        assert_eq!(attrs.get_f64("scale"), Some(2.0));
        assert_eq!(attrs.get_str("scale"), None);
    }

    #[test]
    fn test_serializes_in_order() {
        let mut attrs = Attributes::new();
        attrs.set("z", "last?");
        attrs.set("a", 1.5);
        let json = serde_json::to_string(&attrs).unwrap();
        assert_eq!(json, r#"{"z":"last?","a":1.5}"#);
    }
}
