use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceType {
    Media,
    Medias,
    Captions,
    String,
    Number,
    Boolean,
    Object,
    Objects,
}

/// A named value users can point preset parameters at with `data:[key]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceItem {
    pub key: String,
    #[serde(rename = "type")]
    pub ref_type: ReferenceType,
    #[serde(default)]
    pub value: Value,
}

/// Flattened `key -> value` pool that reference tokens resolve against.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BaseData {
    values: HashMap<String, Value>,
}

impl BaseData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Later items win when keys repeat.
    pub fn from_items<I>(items: I) -> Self
    where
        I: IntoIterator<Item = ReferenceItem>,
    {
        let mut values = HashMap::new();
        for item in items {
            values.insert(item.key, item.value);
        }
        Self { values }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.values.insert(key.into(), value)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl From<serde_json::Map<String, Value>> for BaseData {
    fn from(map: serde_json::Map<String, Value>) -> Self {
        Self {
            values: map.into_iter().collect(),
        }
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for BaseData {
    fn from_iter<T: IntoIterator<Item = (K, Value)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}
