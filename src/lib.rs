//! Plume Processor Library
//!
//! A Rust library for enriching methane plume detection lists with wind
//! statistics and emission-rate estimates, and merging the results into a
//! persistent plume table.
//!
//! This library provides tools for:
//! - Loading delimited plume lists tagged with the threshold in their file names
//! - Classifying wind data directories by wind type and altitude
//! - Enriching plumes through a pluggable wind model
//! - Merging into an existing table with backup, stable sort, and atomic rewrite

pub mod cli;
pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod processor;
pub mod progress;
pub mod wind;

// Re-export commonly used types
pub use config::{MergePolicy, PipelineConfig, SortKey};
pub use error::{PlumeError, Result};
pub use models::{FieldValue, ProcessingStats, Record};
pub use processor::PlumeProcessor;
pub use wind::{RunningWindModel, WindModel, WindType};
