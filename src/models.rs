//! Core data structures for plume processing.
//!
//! Defines the ordered plume record, its field values, the derived
//! statistic sets returned by wind models, and run statistics.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// A single field value inside a plume record
///
/// Values read from disk are always `Text`. Derived values produced during
/// enrichment are numeric until written, after which they read back as text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Float(f64),
}

impl FieldValue {
    /// Numeric view of the value, parsing text when possible
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Text(text) => text.trim().parse::<f64>().ok(),
            FieldValue::Integer(value) => Some(*value as f64),
            FieldValue::Float(value) => Some(*value),
        }
    }

    /// Render the value the way it is written to the output table
    pub fn to_text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(text) => write!(f, "{}", text),
            FieldValue::Integer(value) => write!(f, "{}", value),
            FieldValue::Float(value) => write!(f, "{}", value),
        }
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<u32> for FieldValue {
    fn from(value: u32) -> Self {
        FieldValue::Integer(i64::from(value))
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

/// Derived wind statistics for one (record, wind type, altitude) triple
pub type WindStats = Vec<(String, f64)>;

/// Derived emission statistics for one (record, wind type) pair
pub type EmissionStats = Vec<(String, f64)>;

/// One plume detection plus every field derived for it
///
/// Field order is insertion order and is the column order used when the
/// record heads an output table. Updating an existing field keeps its
/// position.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    fields: Vec<(String, FieldValue)>,
}

impl Record {
    /// Create an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a record from ordered (name, value) pairs
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<FieldValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut record = Self::new();
        record.merge(pairs);
        record
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Look up a field value by name
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Set a field, overwriting in place when it already exists
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(key, _)| *key == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
    }

    /// Ordered merge with last-write-wins on name collisions
    ///
    /// Fields are applied in iteration order. A name already present keeps its
    /// column position and takes the incoming value; new names are appended.
    pub fn merge<K, V, I>(&mut self, fields: I)
    where
        K: Into<String>,
        V: Into<FieldValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        for (name, value) in fields {
            self.insert(name, value);
        }
    }

    /// Field names in column order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(key, _)| key.as_str())
    }

    /// Name of the first field, if any
    pub fn first_key(&self) -> Option<&str> {
        self.fields.first().map(|(key, _)| key.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Text of a field, empty when the field is absent
    pub fn text(&self, name: &str) -> String {
        self.get(name).map(FieldValue::to_text).unwrap_or_default()
    }

    /// True when this record has exactly the given field names, in any order
    pub fn matches_header(&self, header: &[String]) -> bool {
        self.len() == header.len() && header.iter().all(|name| self.contains_key(name))
    }

    /// Values rendered in header order; `None` if a header field is missing
    pub fn values_for(&self, header: &[String]) -> Option<Vec<String>> {
        header
            .iter()
            .map(|name| self.get(name).map(FieldValue::to_text))
            .collect()
    }

    /// Field-for-field equality once every value is rendered as text
    pub fn text_eq(&self, other: &Record) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|(name, value)| other.get(name).map(FieldValue::to_text) == Some(value.to_text()))
    }
}

impl IntoIterator for Record {
    type Item = (String, FieldValue);
    type IntoIter = std::vec::IntoIter<(String, FieldValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

/// Statistics for one complete load, enrich, and write run
#[derive(Debug, Default)]
pub struct ProcessingStats {
    pub files_loaded: usize,
    pub records_loaded: usize,
    pub records_enriched: usize,
    pub rows_written: usize,
    pub rows_skipped: usize,
    pub duplicates_dropped: usize,
    pub rows_replaced: usize,
    pub output_path: PathBuf,
    pub backup_path: Option<PathBuf>,
    pub processing_time_ms: u128,
}
