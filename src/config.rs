//! Configuration management for the plume pipeline.
//!
//! Provides the processing parameters shared by the loader, enrichment
//! engine, and writer, with layered loading: defaults, then an optional
//! TOML file, then command-line overrides applied by the caller.

use crate::constants::{
    DEFAULT_DELIMITER, DEFAULT_FILL_VALUE, DEFAULT_IME_FIELD, DEFAULT_PLUME_LENGTH_FIELD,
    DEFAULT_SORT_KEY, DEFAULT_THRESHOLD_FIELD, DEFAULT_WIND_SPEED_COLUMN,
};
use crate::error::{PlumeError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// How a list of records is ordered after loading
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    /// Sort by the first field of the first record. Callers must make sure
    /// the identifier column comes first in every input file.
    FirstColumn,
    /// Sort by a named field
    Field(String),
    /// Keep file order
    Unsorted,
}

/// How newly enriched records are combined with rows already on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    /// Keep every existing and new row
    Append,
    /// Drop new records identical (as text) to an existing row
    SkipDuplicates,
    /// Drop existing rows whose values for these fields match a new record
    ReplaceByKey(Vec<String>),
}

/// Pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Name of the field carrying the threshold parsed from the filename
    pub threshold_field: String,

    /// Sentinel passed to the wind model for unavailable values
    pub fill_value: Option<f64>,

    /// Ordering applied to records after loading
    pub loader_sort: SortKey,

    /// Field used to order the merged output table
    pub output_sort_key: Option<String>,

    /// Combination of new and persisted rows
    pub merge_policy: MergePolicy,

    /// Field delimiter for input and output tables
    pub delimiter: u8,

    /// Wind speed column in wind observation files
    pub wind_speed_column: String,

    /// Identifier column used to match wind observation rows to a plume
    pub wind_match_field: Option<String>,

    /// Plume field holding the integrated methane enhancement
    pub ime_field: String,

    /// Plume field holding the plume length
    pub plume_length_field: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            threshold_field: DEFAULT_THRESHOLD_FIELD.to_string(),
            fill_value: Some(DEFAULT_FILL_VALUE),
            loader_sort: SortKey::FirstColumn,
            output_sort_key: Some(DEFAULT_SORT_KEY.to_string()),
            merge_policy: MergePolicy::SkipDuplicates,
            delimiter: DEFAULT_DELIMITER,
            wind_speed_column: DEFAULT_WIND_SPEED_COLUMN.to_string(),
            wind_match_field: Some(DEFAULT_SORT_KEY.to_string()),
            ime_field: DEFAULT_IME_FIELD.to_string(),
            plume_length_field: DEFAULT_PLUME_LENGTH_FIELD.to_string(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a TOML file, filling unspecified keys with defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PlumeError::io(format!("Failed to read config file {}", path.display()), e)
        })?;
        let config: PipelineConfig = toml::from_str(&content).map_err(|e| {
            PlumeError::configuration(format!(
                "Failed to parse config file {}: {}",
                path.display(),
                e
            ))
        })?;
        debug!("Loaded configuration from {}", path.display());
        config.validate()?;
        Ok(config)
    }

    /// Check settings that cannot be expressed in the type system
    pub fn validate(&self) -> Result<()> {
        if self.threshold_field.trim().is_empty() {
            return Err(PlumeError::configuration("threshold_field must not be empty"));
        }
        if let SortKey::Field(name) = &self.loader_sort {
            if name.trim().is_empty() {
                return Err(PlumeError::configuration("loader sort field must not be empty"));
            }
        }
        if let MergePolicy::ReplaceByKey(fields) = &self.merge_policy {
            if fields.is_empty() {
                return Err(PlumeError::configuration(
                    "replace_by_key merge policy needs at least one field",
                ));
            }
        }
        if self.delimiter == b'"' || self.delimiter == b'\n' {
            return Err(PlumeError::configuration(format!(
                "invalid delimiter {:?}",
                self.delimiter as char
            )));
        }
        Ok(())
    }

    /// Set the fill value passed to the wind model
    pub fn with_fill_value(mut self, fill_value: Option<f64>) -> Self {
        self.fill_value = fill_value;
        self
    }

    /// Set the threshold field name
    pub fn with_threshold_field(mut self, name: impl Into<String>) -> Self {
        self.threshold_field = name.into();
        self
    }

    /// Set the loader ordering
    pub fn with_loader_sort(mut self, sort: SortKey) -> Self {
        self.loader_sort = sort;
        self
    }

    /// Set or clear the output sort key
    pub fn with_output_sort_key(mut self, key: Option<String>) -> Self {
        self.output_sort_key = key;
        self
    }

    /// Set the merge policy
    pub fn with_merge_policy(mut self, policy: MergePolicy) -> Self {
        self.merge_policy = policy;
        self
    }

    /// Replace rows sharing the output sort key and threshold with new ones
    pub fn with_force_reprocess(mut self) -> Self {
        let mut key_fields = Vec::new();
        if let Some(sort_key) = &self.output_sort_key {
            key_fields.push(sort_key.clone());
        }
        key_fields.push(self.threshold_field.clone());
        self.merge_policy = MergePolicy::ReplaceByKey(key_fields);
        self
    }

    /// Set or clear the identifier column matched in wind observation files
    pub fn with_wind_match_field(mut self, field: Option<String>) -> Self {
        self.wind_match_field = field;
        self
    }

    /// Set the field delimiter
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }
}
