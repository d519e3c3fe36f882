use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single annotation value. Serialized untagged, so JSON inputs read naturally.
///
/// Variant order decides how JSON is read back: integer lists stay integer
/// lists, and any shape not listed here (null, objects, mixed lists) is kept
/// verbatim in `Other` so it survives a load/store cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    IntList(Vec<i64>),
    FloatList(Vec<f64>),
    TextList(Vec<String>),
    Other(serde_json::Value),
}

impl MetaValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for MetaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{}", v),
            Self::Int(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::Text(s) => f.write_str(s),
            Self::FloatList(values) => write!(
                f,
                "[{}]",
                values
                    .iter()
                    .map(|v| v.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            Self::IntList(values) => write!(
                f,
                "[{}]",
                values
                    .iter()
                    .map(|v| v.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            Self::TextList(values) => write!(f, "[{}]", values.join(", ")),
            Self::Other(value) => write!(f, "{}", value),
        }
    }
}

impl From<bool> for MetaValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for MetaValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<usize> for MetaValue {
    fn from(value: usize) -> Self {
        Self::Int(value as i64)
    }
}

impl From<f64> for MetaValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for MetaValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<i64>> for MetaValue {
    fn from(value: Vec<i64>) -> Self {
        Self::IntList(value)
    }
}

impl From<Vec<f64>> for MetaValue {
    fn from(value: Vec<f64>) -> Self {
        Self::FloatList(value)
    }
}

/// Open key/value annotation set attached to identifications, hits and maps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetaInfo(BTreeMap<String, MetaValue>);

impl MetaInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&MetaValue> {
        self.0.get(key)
    }

    pub fn exists(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<MetaValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(|k| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetaValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Copies every annotation of `other` into `self`, overwriting keys that exist in both.
    pub fn copy_from(&mut self, other: &MetaInfo) {
        for (key, value) in other.0.iter() {
            self.0.insert(key.clone(), value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn untagged_values_deserialize_by_shape() {
        let meta: MetaInfo = serde_json::from_value(json!({
            "UID": "id1",
            "missed_cleavages": 2,
            "rt_align": 12.5,
            "fragment_mass_error_ppm": [1.0, -2.5],
            "tags": ["a", "b"]
        }))
        .expect("meta");
        assert_eq!(meta.get("UID"), Some(&MetaValue::Text("id1".into())));
        assert_eq!(meta.get("missed_cleavages"), Some(&MetaValue::Int(2)));
        assert_eq!(meta.get("rt_align"), Some(&MetaValue::Float(12.5)));
        assert_eq!(
            meta.get("fragment_mass_error_ppm"),
            Some(&MetaValue::FloatList(vec![1.0, -2.5]))
        );
        assert_eq!(
            meta.get("tags"),
            Some(&MetaValue::TextList(vec!["a".into(), "b".into()]))
        );
    }

    #[test]
    fn copy_from_overwrites_and_keeps_untouched_keys() {
        let mut target = MetaInfo::new();
        target.set("UID", "id1");
        target.set("missed_cleavages", 0_i64);
        let mut source = MetaInfo::new();
        source.set("missed_cleavages", 1_i64);
        source.set("is_contaminant", 0_i64);
        target.copy_from(&source);
        assert_eq!(target.len(), 3);
        assert_eq!(target.get("missed_cleavages"), Some(&MetaValue::Int(1)));
        assert_eq!(target.get("UID").and_then(|v| v.as_str()), Some("id1"));
    }

    #[test]
    fn display_formats_lists_in_brackets() {
        assert_eq!(MetaValue::FloatList(vec![1.5, 2.0]).to_string(), "[1.5, 2]");
        assert_eq!(MetaValue::IntList(vec![2, 3]).to_string(), "[2, 3]");
        assert_eq!(MetaValue::Int(-1).to_string(), "-1");
        assert_eq!(MetaValue::Bool(true).to_string(), "true");
    }

    #[test]
    fn int_lists_booleans_and_unknown_shapes_survive_reload() {
        let raw = json!({
            "charges": [1, 2],
            "decoy": true,
            "note": null,
            "mixed": [1, "a"],
            "nested": {"k": 1},
            "ppm": [1.5, 2]
        });
        let meta: MetaInfo = serde_json::from_value(raw.clone()).expect("meta");
        assert_eq!(meta.get("charges"), Some(&MetaValue::IntList(vec![1, 2])));
        assert_eq!(meta.get("decoy"), Some(&MetaValue::Bool(true)));
        assert_eq!(meta.get("note"), Some(&MetaValue::Other(serde_json::Value::Null)));
        assert_eq!(meta.get("ppm"), Some(&MetaValue::FloatList(vec![1.5, 2.0])));
        let stored = serde_json::to_value(&meta).expect("serialize");
        assert_eq!(stored["charges"], json!([1, 2]));
        assert_eq!(stored["decoy"], json!(true));
        assert_eq!(stored["note"], json!(null));
        assert_eq!(stored["mixed"], json!([1, "a"]));
        assert_eq!(stored["nested"], json!({"k": 1}));
    }
}
