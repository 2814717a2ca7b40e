//! Error handling for plume enrichment operations.
//!
//! Provides error types with context for input loading, wind model
//! evaluation, and output table persistence failures.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlumeError {
    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Plume file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Plume directory not found: {path}")]
    PlumeDirectoryNotFound { path: PathBuf },

    #[error("No match for '{pattern}' found in {path}")]
    ThresholdParse { pattern: String, path: PathBuf },

    #[error("Threshold {value} in {path} is out of range")]
    ThresholdOutOfRange { value: String, path: PathBuf },

    #[error("CSV parsing error in file '{path}': {message}")]
    CsvParsing {
        path: PathBuf,
        message: String,
        #[source]
        source: Option<csv::Error>,
    },

    #[error("Wind data directory not found: {path}")]
    WindDirectoryNotFound { path: PathBuf },

    #[error("Wind model failed for {wind_type}: {message}")]
    WindModel { wind_type: String, message: String },

    #[error("Output write failed for {path}: {reason}")]
    WriteFailed { path: PathBuf, reason: String },

    #[error("Directory traversal error: {message}")]
    DirectoryTraversal {
        message: String,
        #[source]
        source: walkdir::Error,
    },

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl PlumeError {
    /// Create an I/O error with context
    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// Create a CSV parsing error with context
    pub fn csv_parsing(
        path: impl Into<PathBuf>,
        message: impl Into<String>,
        source: Option<csv::Error>,
    ) -> Self {
        Self::CsvParsing {
            path: path.into(),
            message: message.into(),
            source,
        }
    }

    /// Create a wind model error
    pub fn wind_model(wind_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::WindModel {
            wind_type: wind_type.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// True when the error means an input plume file is missing
    pub fn is_missing_input(&self) -> bool {
        matches!(self, Self::FileNotFound { .. })
    }
}

impl From<std::io::Error> for PlumeError {
    fn from(error: std::io::Error) -> Self {
        Self::Io {
            message: "I/O operation failed".to_string(),
            source: error,
        }
    }
}

impl From<walkdir::Error> for PlumeError {
    fn from(error: walkdir::Error) -> Self {
        Self::DirectoryTraversal {
            message: "Directory traversal failed".to_string(),
            source: error,
        }
    }
}

pub type Result<T> = std::result::Result<T, PlumeError>;
