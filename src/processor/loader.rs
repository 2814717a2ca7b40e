//! Plume list loading
//!
//! Reads delimited plume files into ordered records, tags every record with
//! the minimum ppmm threshold encoded in its file path, and orders the
//! combined list.

use crate::config::{PipelineConfig, SortKey};
use crate::constants::THRESHOLD_PATTERN;
use crate::error::{PlumeError, Result};
use crate::models::Record;
use regex::Regex;
use std::fs::File;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, info};

static THRESHOLD_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(THRESHOLD_PATTERN).expect("threshold pattern is valid"));

/// Extract the minimum ppmm threshold from a plume file path
///
/// The whole path is searched, so the threshold may come from a directory
/// name as well as the file name.
pub fn parse_threshold(path: &Path) -> Result<u32> {
    let path_str = path.to_string_lossy();
    let digits = THRESHOLD_REGEX
        .captures(&path_str)
        .and_then(|captures| captures.get(1))
        .ok_or_else(|| PlumeError::ThresholdParse {
            pattern: THRESHOLD_PATTERN.to_string(),
            path: path.to_path_buf(),
        })?
        .as_str();
    digits
        .parse::<u32>()
        .map_err(|_| PlumeError::ThresholdOutOfRange {
            value: digits.to_string(),
            path: path.to_path_buf(),
        })
}

/// Read every row of a delimited file as a text record
///
/// Field order follows the header row. Surrounding whitespace is trimmed from
/// headers and values. A row whose length differs from the header is an error.
pub fn read_records(path: &Path, delimiter: u8) -> Result<Vec<Record>> {
    read_rows(path, delimiter, false)
}

/// Like [`read_records`], but rows of any length are accepted
///
/// A short row yields a record with only the leading header fields. Values
/// past the end of the header are kept under `column <n>` (1-based), so the
/// record no longer matches the header either way.
pub fn read_records_lenient(path: &Path, delimiter: u8) -> Result<Vec<Record>> {
    read_rows(path, delimiter, true)
}

fn read_rows(path: &Path, delimiter: u8, flexible: bool) -> Result<Vec<Record>> {
    let file = File::open(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => PlumeError::FileNotFound {
            path: path.to_path_buf(),
        },
        _ => PlumeError::io(format!("Failed to open {}", path.display()), e),
    })?;

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .flexible(flexible)
        .from_reader(file);

    let headers = reader
        .headers()
        .map_err(|e| PlumeError::csv_parsing(path, "Failed to read header row", Some(e)))?
        .clone();

    let mut records = Vec::new();
    for (index, row) in reader.records().enumerate() {
        let row = row.map_err(|e| {
            PlumeError::csv_parsing(path, format!("Failed to read row {}", index + 1), Some(e))
        })?;
        let mut record = Record::from_pairs(headers.iter().zip(row.iter()));
        if row.len() > headers.len() {
            debug!(
                "Row {} of {} has {} fields, header has {}",
                index + 1,
                path.display(),
                row.len(),
                headers.len()
            );
            for (position, value) in row.iter().enumerate().skip(headers.len()) {
                record.insert(format!("column {}", position + 1), value);
            }
        }
        records.push(record);
    }

    debug!("Read {} records from {}", records.len(), path.display());
    Ok(records)
}

/// Stable sort of records by string value of the chosen key
pub fn sort_records(records: &mut [Record], sort: &SortKey) {
    let key = match sort {
        SortKey::Unsorted => return,
        SortKey::Field(name) => name.clone(),
        SortKey::FirstColumn => match records.first().and_then(Record::first_key) {
            Some(name) => name.to_string(),
            None => return,
        },
    };
    debug!("Sorting {} records by '{}'", records.len(), key);
    records.sort_by_cached_key(|record| record.text(&key));
}

/// Loads plume files into one ordered batch of records
#[derive(Debug, Clone)]
pub struct RecordLoader {
    threshold_field: String,
    delimiter: u8,
    sort: SortKey,
}

impl RecordLoader {
    /// Create a loader from pipeline configuration
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            threshold_field: config.threshold_field.clone(),
            delimiter: config.delimiter,
            sort: config.loader_sort.clone(),
        }
    }

    /// Load one file and tag each record with its threshold
    ///
    /// The threshold is parsed before the file is opened, so a path without a
    /// threshold fails even when the file is missing.
    pub fn load_file(&self, path: &Path) -> Result<Vec<Record>> {
        let threshold = parse_threshold(path)?;
        let mut records = read_records(path, self.delimiter)?;
        for record in &mut records {
            record.insert(self.threshold_field.clone(), threshold);
        }
        Ok(records)
    }

    /// Load all files in order, flatten, and sort the combined batch
    ///
    /// Any failure aborts the whole batch.
    pub fn load_files(&self, paths: &[PathBuf]) -> Result<Vec<Record>> {
        info!("Loading {} plume file(s)", paths.len());

        let mut records = Vec::new();
        for path in paths {
            records.extend(self.load_file(path)?);
        }
        sort_records(&mut records, &self.sort);

        info!("Loaded {} plume records", records.len());
        Ok(records)
    }
}
