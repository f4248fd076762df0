use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

pub use crate::property::fixed::{
    decode_property_stream, filetime_to_unix_millis, FixedPropertyRecord, FixedValue,
    PropertyCounters, PropertyFlags, PropertyStream, PropertyStreamKind,
};

pub mod fixed;
pub mod tags;

/// A decoded property value.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PropertyValue {
    /// 8-bit text, one code unit per byte
    String(String),
    /// UTF-16LE text
    Unicode(String),
    Binary(Vec<u8>),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Bool(bool),
    Time(DateTime<Utc>),
    Fixed(FixedPropertyRecord),
    Bag(PropertyBag),
    BagList(Vec<PropertyBag>),
}

impl PropertyValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(text) | PropertyValue::Unicode(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            PropertyValue::Binary(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            PropertyValue::Int16(value) => Some(*value as i64),
            PropertyValue::Int32(value) => Some(*value as i64),
            PropertyValue::Int64(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bag(&self) -> Option<&PropertyBag> {
        match self {
            PropertyValue::Bag(bag) => Some(bag),
            _ => None,
        }
    }

    pub fn as_fixed(&self) -> Option<&FixedPropertyRecord> {
        match self {
            PropertyValue::Fixed(record) => Some(record),
            _ => None,
        }
    }
}

/// Ordered, schema-free name to value mapping.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PropertyBag {
    entries: Vec<(String, PropertyValue)>,
}

impl PropertyBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.entries
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(PropertyValue::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Sets `key`, replacing an existing value in place.
    pub fn insert(&mut self, key: impl Into<String>, value: PropertyValue) -> Option<PropertyValue> {
        let key = key.into();
        match self.entries.iter_mut().find(|(name, _)| *name == key) {
            Some((_, existing)) => Some(std::mem::replace(existing, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    /// Adds `value` without overwriting: a taken `key` becomes `key-2`, `key-3`, ...
    /// Returns the key actually used.
    pub fn insert_unique(&mut self, key: &str, value: PropertyValue) -> String {
        let mut candidate = key.to_string();
        let mut suffix = 2;
        while self.contains_key(&candidate) {
            candidate = format!("{}-{}", key, suffix);
            suffix += 1;
        }
        self.entries.push((candidate.clone(), value));
        candidate
    }
}

impl Serialize for PropertyBag {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}
