// ABOUTME: Metadata tree passed through every task evaluation
// ABOUTME: Provides the Meta value tree, lookup helpers, and JSON conversion

pub mod spec;

pub use spec::{MetaFieldError, SpecField, Specification, TypeTag, Verification};

use indexmap::IndexMap;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Hierarchical metadata tree threaded through task evaluation.
///
/// A `Meta` is either an ordered key/value mapping or a named record with
/// ordered fields. The engine never mutates a `Meta` it received; overrides
/// produce a new tree (`with` / `updated`), so concurrent branches of an
/// evaluation never contend on shared mutable state.
#[derive(Debug, Clone, PartialEq)]
pub enum Meta {
    Map(IndexMap<String, MetaValue>),
    Record(Record),
}

/// A named record variant of [`Meta`]: a type name plus ordered fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    type_name: String,
    fields: IndexMap<String, MetaValue>,
}

/// A single value inside a [`Meta`] tree.
#[derive(Debug, Clone, PartialEq)]
pub enum MetaValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<MetaValue>),
    Meta(Meta),
}

impl Meta {
    /// Create an empty mapping.
    pub fn new() -> Self {
        Meta::Map(IndexMap::new())
    }

    /// Create an empty record with the given type name.
    pub fn record(type_name: impl Into<String>) -> Self {
        Meta::Record(Record {
            type_name: type_name.into(),
            fields: IndexMap::new(),
        })
    }

    fn fields(&self) -> &IndexMap<String, MetaValue> {
        match self {
            Meta::Map(fields) => fields,
            Meta::Record(record) => &record.fields,
        }
    }

    fn fields_mut(&mut self) -> &mut IndexMap<String, MetaValue> {
        match self {
            Meta::Map(fields) => fields,
            Meta::Record(record) => &mut record.fields,
        }
    }

    /// Look up a key; `None` when absent.
    pub fn get(&self, key: &str) -> Option<&MetaValue> {
        self.fields().get(key)
    }

    /// Look up a key, falling back to the supplied default when absent.
    pub fn get_or<'a>(&'a self, key: &str, default: &'a MetaValue) -> &'a MetaValue {
        self.get(key).unwrap_or(default)
    }

    /// The nested metadata subtree addressed by `key`.
    ///
    /// Runners use this to scope metadata per dependency: a missing key or a
    /// non-tree value yields an empty mapping rather than an error.
    pub fn scope(&self, key: &str) -> Meta {
        match self.get(key) {
            Some(MetaValue::Meta(meta)) => meta.clone(),
            _ => Meta::new(),
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields().contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields().keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields().len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields().is_empty()
    }

    /// Return a new tree with `key` set to `value`, leaving the receiver's
    /// other entries intact.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<MetaValue>) -> Self {
        self.fields_mut().insert(key.into(), value.into());
        self
    }

    /// Return a new tree with every override applied.
    pub fn updated<I, K, V>(&self, overrides: I) -> Meta
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<MetaValue>,
    {
        let mut updated = self.clone();
        for (key, value) in overrides {
            updated.fields_mut().insert(key.into(), value.into());
        }
        updated
    }

    /// Convert to a JSON object. Records flatten to an object of their
    /// fields, so a record does not survive a JSON round trip as a record.
    pub fn to_json(&self) -> serde_json::Value {
        let map: serde_json::Map<String, serde_json::Value> = self
            .fields()
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect();
        serde_json::Value::Object(map)
    }

    /// Build a mapping from a JSON object; `None` for any other JSON value.
    pub fn from_json(value: &serde_json::Value) -> Option<Meta> {
        match value {
            serde_json::Value::Object(map) => Some(Meta::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), MetaValue::from_json(v)))
                    .collect(),
            )),
            _ => None,
        }
    }
}

impl Default for Meta {
    fn default() -> Self {
        Meta::new()
    }
}

impl Record {
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(|k| k.as_str())
    }
}

impl MetaValue {
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            MetaValue::Null => serde_json::Value::Null,
            MetaValue::Bool(b) => serde_json::Value::Bool(*b),
            MetaValue::Int(i) => serde_json::Value::from(*i),
            MetaValue::Float(f) => serde_json::Value::from(*f),
            MetaValue::String(s) => serde_json::Value::String(s.clone()),
            MetaValue::List(items) => {
                serde_json::Value::Array(items.iter().map(MetaValue::to_json).collect())
            }
            MetaValue::Meta(meta) => meta.to_json(),
        }
    }

    pub fn from_json(value: &serde_json::Value) -> MetaValue {
        match value {
            serde_json::Value::Null => MetaValue::Null,
            serde_json::Value::Bool(b) => MetaValue::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => MetaValue::Int(i),
                None => MetaValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => MetaValue::String(s.clone()),
            serde_json::Value::Array(items) => {
                MetaValue::List(items.iter().map(MetaValue::from_json).collect())
            }
            serde_json::Value::Object(map) => MetaValue::Meta(Meta::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), MetaValue::from_json(v)))
                    .collect(),
            )),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            MetaValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetaValue::Float(f) => Some(*f),
            MetaValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            MetaValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetaValue::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_meta(&self) -> Option<&Meta> {
        match self {
            MetaValue::Meta(meta) => Some(meta),
            _ => None,
        }
    }
}

impl From<bool> for MetaValue {
    fn from(value: bool) -> Self {
        MetaValue::Bool(value)
    }
}

impl From<i64> for MetaValue {
    fn from(value: i64) -> Self {
        MetaValue::Int(value)
    }
}

impl From<i32> for MetaValue {
    fn from(value: i32) -> Self {
        MetaValue::Int(value as i64)
    }
}

impl From<u64> for MetaValue {
    fn from(value: u64) -> Self {
        match i64::try_from(value) {
            Ok(i) => MetaValue::Int(i),
            Err(_) => MetaValue::Float(value as f64),
        }
    }
}

impl From<f64> for MetaValue {
    fn from(value: f64) -> Self {
        MetaValue::Float(value)
    }
}

impl From<&str> for MetaValue {
    fn from(value: &str) -> Self {
        MetaValue::String(value.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(value: String) -> Self {
        MetaValue::String(value)
    }
}

impl From<Vec<MetaValue>> for MetaValue {
    fn from(value: Vec<MetaValue>) -> Self {
        MetaValue::List(value)
    }
}

impl From<Meta> for MetaValue {
    fn from(value: Meta) -> Self {
        MetaValue::Meta(value)
    }
}

impl Serialize for Meta {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Meta {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Meta::from_json(&value).ok_or_else(|| D::Error::custom("metadata must be a JSON object"))
    }
}

impl Serialize for MetaValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for MetaValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(MetaValue::from_json(&value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_with_default() {
        let meta = Meta::new().with("x", 3);

        assert_eq!(meta.get("x"), Some(&MetaValue::Int(3)));
        assert_eq!(meta.get("missing"), None);
        assert_eq!(
            meta.get_or("missing", &MetaValue::Int(0)),
            &MetaValue::Int(0)
        );
    }

    #[test]
    fn test_updated_leaves_original_intact() {
        let original = Meta::new().with("x", 1).with("y", 2);
        let updated = original.updated([("y", 20), ("z", 30)]);

        assert_eq!(original.get("y"), Some(&MetaValue::Int(2)));
        assert!(!original.contains_key("z"));
        assert_eq!(updated.get("y"), Some(&MetaValue::Int(20)));
        assert_eq!(updated.get("z"), Some(&MetaValue::Int(30)));
    }

    #[test]
    fn test_scope_returns_nested_tree_or_empty() {
        let meta = Meta::new()
            .with("inner", Meta::new().with("value", 42))
            .with("scalar", 7);

        let inner = meta.scope("inner");
        assert_eq!(inner.get("value"), Some(&MetaValue::Int(42)));

        assert!(meta.scope("missing").is_empty());
        assert!(meta.scope("scalar").is_empty());
    }

    #[test]
    fn test_record_fields_behave_like_mapping() {
        let meta = Meta::record("ScanConfig").with("threshold", 0.5).with("window", 10);

        assert_eq!(meta.get("window"), Some(&MetaValue::Int(10)));
        assert_eq!(meta.keys().collect::<Vec<_>>(), vec!["threshold", "window"]);
        match &meta {
            Meta::Record(record) => assert_eq!(record.type_name(), "ScanConfig"),
            Meta::Map(_) => panic!("expected record variant"),
        }
    }

    #[test]
    fn test_json_round_trip_preserves_map_order() {
        let meta = Meta::new()
            .with("zeta", 1)
            .with("alpha", Meta::new().with("nested", true))
            .with("list", vec![MetaValue::Int(1), MetaValue::String("two".into())]);

        let json = meta.to_json();
        let back = Meta::from_json(&json).unwrap();

        assert_eq!(back, meta);
        assert_eq!(back.keys().collect::<Vec<_>>(), vec!["zeta", "alpha", "list"]);
    }

    #[test]
    fn test_record_decodes_as_mapping() {
        let record = Meta::record("Config").with("a", 1);
        let back = Meta::from_json(&record.to_json()).unwrap();

        assert!(matches!(back, Meta::Map(_)));
        assert_eq!(back.get("a"), Some(&MetaValue::Int(1)));
    }

    #[test]
    fn test_from_json_rejects_non_objects() {
        assert!(Meta::from_json(&serde_json::json!([1, 2])).is_none());
        assert!(Meta::from_json(&serde_json::json!("text")).is_none());
    }
}
