//! Wind statistics and emission-rate models
//!
//! The enrichment engine depends only on the [`WindModel`] trait. The
//! [`RunningWindModel`] shipped here summarises wind speeds found in per-altitude
//! CSV files and applies the IME emission estimate `Q = IME * U / L`.

use crate::config::PipelineConfig;
use crate::error::{PlumeError, Result};
use crate::models::{EmissionStats, Record, WindStats};
use crate::wind::classifier::{WindType, parse_altitude};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

const SECONDS_PER_HOUR: f64 = 3600.0;

/// External wind computation used by the enrichment engine
///
/// Implementations must behave as pure functions of their inputs. Any error
/// returned aborts enrichment of the whole batch.
pub trait WindModel {
    /// Wind statistics for one record, wind type and altitude
    fn compute_wind_stats(
        &self,
        record: &Record,
        wind_subdir: &Path,
        fill: Option<f64>,
        wind_type: WindType,
        altitude: u32,
    ) -> Result<WindStats>;

    /// Emission statistics for one record and wind type, computed after all
    /// altitudes of that wind type have been merged into the record
    fn compute_emission_rate(
        &self,
        record: &Record,
        wind_type: WindType,
        fill: Option<f64>,
    ) -> Result<EmissionStats>;
}

/// Field name for the latest wind speed mean of a wind type
pub fn wind_speed_field(wind_type: WindType) -> String {
    format!("{} Wind Speed (m/s)", wind_type)
}

/// Field name for the latest wind speed standard deviation of a wind type
pub fn wind_speed_std_field(wind_type: WindType) -> String {
    format!("{} Wind Speed Std (m/s)", wind_type)
}

pub fn emission_rate_field(wind_type: WindType) -> String {
    format!("{} Emission Rate (kg/hr)", wind_type)
}

pub fn emission_uncertainty_field(wind_type: WindType) -> String {
    format!("{} Emission Uncertainty (kg/hr)", wind_type)
}

/// Summary of wind speed samples
#[derive(Debug, Clone, Copy, PartialEq)]
struct SpeedSummary {
    mean: f64,
    std: f64,
    count: usize,
}

impl SpeedSummary {
    fn from_samples(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let count = samples.len();
        let mean = samples.iter().sum::<f64>() / count as f64;
        let variance = samples.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / count as f64;
        Some(Self {
            mean,
            std: variance.sqrt(),
            count,
        })
    }
}

/// Reference wind model reading `alt<N>` CSV data under each wind-type directory
///
/// Per altitude it reports the mean and standard deviation of the wind speed
/// column, both as altitude-specific fields and as per-type fields. The
/// per-type fields are rewritten by every altitude, so the highest altitude
/// wins. Rows carrying the record's identifier column are matched to the
/// record; files without that column contribute every row.
#[derive(Debug, Clone)]
pub struct RunningWindModel {
    wind_speed_column: String,
    id_field: Option<String>,
    ime_field: String,
    plume_length_field: String,
}

impl RunningWindModel {
    /// Create a model from pipeline configuration
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            wind_speed_column: config.wind_speed_column.clone(),
            id_field: config.wind_match_field.clone(),
            ime_field: config.ime_field.clone(),
            plume_length_field: config.plume_length_field.clone(),
        }
    }

    /// Files holding data for one altitude, in name order
    fn altitude_files(&self, wind_subdir: &Path, altitude: u32) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let mut entries: Vec<PathBuf> = fs::read_dir(wind_subdir)
            .map_err(|e| {
                PlumeError::io(format!("Failed to read {}", wind_subdir.display()), e)
            })?
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .and_then(parse_altitude)
                    == Some(altitude)
            })
            .collect();
        entries.sort();

        for entry in entries {
            if entry.is_dir() {
                for item in WalkDir::new(&entry).sort_by_file_name() {
                    let item = item?;
                    if item.file_type().is_file() && is_csv_file(item.path()) {
                        files.push(item.path().to_path_buf());
                    }
                }
            } else if is_csv_file(&entry) {
                files.push(entry);
            }
        }
        Ok(files)
    }

    /// Wind speed samples from one file, filtered to the record when possible
    fn read_samples(
        &self,
        path: &Path,
        record: &Record,
        fill: Option<f64>,
        wind_type: WindType,
    ) -> Result<Vec<f64>> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|e| {
                PlumeError::wind_model(
                    wind_type.as_str(),
                    format!("cannot open {}: {}", path.display(), e),
                )
            })?;

        let headers = reader
            .headers()
            .map_err(|e| {
                PlumeError::wind_model(
                    wind_type.as_str(),
                    format!("cannot read header of {}: {}", path.display(), e),
                )
            })?
            .clone();

        let speed_index = headers
            .iter()
            .position(|h| h == self.wind_speed_column.as_str())
            .ok_or_else(|| {
                PlumeError::wind_model(
                    wind_type.as_str(),
                    format!(
                        "column '{}' missing from {}",
                        self.wind_speed_column,
                        path.display()
                    ),
                )
            })?;

        let id_filter = self.id_field.as_ref().and_then(|field| {
            let index = headers.iter().position(|h| h == field.as_str())?;
            let value = record.get(field)?.to_text();
            Some((index, value))
        });

        let mut samples = Vec::new();
        for row in reader.records() {
            let row = row.map_err(|e| {
                PlumeError::wind_model(
                    wind_type.as_str(),
                    format!("bad row in {}: {}", path.display(), e),
                )
            })?;

            if let Some((index, value)) = &id_filter {
                if row.get(*index) != Some(value.as_str()) {
                    continue;
                }
            }

            let Some(speed) = row.get(speed_index).and_then(|s| s.parse::<f64>().ok()) else {
                continue;
            };
            if !speed.is_finite() || Some(speed) == fill {
                continue;
            }
            samples.push(speed);
        }
        Ok(samples)
    }
}

impl WindModel for RunningWindModel {
    fn compute_wind_stats(
        &self,
        record: &Record,
        wind_subdir: &Path,
        fill: Option<f64>,
        wind_type: WindType,
        altitude: u32,
    ) -> Result<WindStats> {
        let mut samples = Vec::new();
        for file in self.altitude_files(wind_subdir, altitude)? {
            samples.extend(self.read_samples(&file, record, fill, wind_type)?);
        }

        let missing = fill.unwrap_or(f64::NAN);
        let summary = SpeedSummary::from_samples(&samples);
        let (mean, std, count) = match summary {
            Some(s) => (s.mean, s.std, s.count),
            None => (missing, missing, 0),
        };

        debug!(
            "{} alt{}: {} wind samples for {}",
            wind_type,
            altitude,
            count,
            wind_subdir.display()
        );

        Ok(vec![
            (format!("{} Wind Speed alt{} (m/s)", wind_type, altitude), mean),
            (format!("{} Wind Speed Std alt{} (m/s)", wind_type, altitude), std),
            (format!("{} Wind Samples alt{}", wind_type, altitude), count as f64),
            (wind_speed_field(wind_type), mean),
            (wind_speed_std_field(wind_type), std),
        ])
    }

    fn compute_emission_rate(
        &self,
        record: &Record,
        wind_type: WindType,
        fill: Option<f64>,
    ) -> Result<EmissionStats> {
        let usable = |name: &str| {
            record
                .get(name)
                .and_then(|value| value.as_f64())
                .filter(|value| value.is_finite() && Some(*value) != fill)
        };

        let ime = usable(&self.ime_field);
        let length = usable(&self.plume_length_field).filter(|l| *l > 0.0);
        let speed = usable(&wind_speed_field(wind_type));
        let speed_std = usable(&wind_speed_std_field(wind_type));

        let missing = fill.unwrap_or(f64::NAN);
        let (rate, uncertainty) = match (ime, length, speed) {
            (Some(ime), Some(length), Some(speed)) => {
                let per_metre = ime * SECONDS_PER_HOUR / length;
                let uncertainty = speed_std.map(|std| per_metre * std).unwrap_or(missing);
                (per_metre * speed, uncertainty)
            }
            _ => (missing, missing),
        };

        Ok(vec![
            (emission_rate_field(wind_type), rate),
            (emission_uncertainty_field(wind_type), uncertainty),
        ])
    }
}

fn is_csv_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "csv")
}
