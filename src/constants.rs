//! Application constants for the plume processor
//!
//! Default field names, fill values, and file patterns used throughout
//! the loader, enrichment engine, and writer.

// =============================================================================
// Record Fields
// =============================================================================

/// Field added to every loaded plume carrying the threshold from its filename
pub const DEFAULT_THRESHOLD_FIELD: &str = "Minimum Threshold (ppmm)";

/// Identifier column expected first in every plume file
pub const DEFAULT_SORT_KEY: &str = "Candidate ID";

/// Integrated methane enhancement column consumed by the emission model
pub const DEFAULT_IME_FIELD: &str = "IME (kg)";

/// Plume length column consumed by the emission model
pub const DEFAULT_PLUME_LENGTH_FIELD: &str = "Plume Length (m)";

/// Wind speed column read from wind observation files
pub const DEFAULT_WIND_SPEED_COLUMN: &str = "wind_speed";

// =============================================================================
// Missing Data
// =============================================================================

/// Sentinel written in place of values that cannot be computed
pub const DEFAULT_FILL_VALUE: f64 = -9999.0;

// =============================================================================
// File Patterns
// =============================================================================

/// Pattern extracting the minimum ppmm threshold from a plume file path
pub const THRESHOLD_PATTERN: &str = r"minppmm(\d+)";

/// Pattern extracting an altitude from a wind data entry name
pub const ALTITUDE_PATTERN: &str = r"^alt(\d+)(?:\.[A-Za-z0-9]+)?$";

/// Threshold used when building the default plume file pattern
pub const DEFAULT_MIN_PPMM: u32 = 1000;

/// Default relative path pattern for plume list discovery
pub fn default_plume_file_pattern(min_ppmm: u32) -> String {
    format!(
        "ang.*_detections/ime_minppmm{}/ang.*_ime_minppmm{}.*",
        min_ppmm, min_ppmm
    )
}

/// Suffix appended to the output path for the pre-merge snapshot
pub const BACKUP_SUFFIX: &str = ".bak";

/// Default field delimiter for plume files
pub const DEFAULT_DELIMITER: u8 = b',';
