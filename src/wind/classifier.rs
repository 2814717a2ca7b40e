//! Wind data directory classification
//!
//! Maps a wind-data subdirectory name to a wind type and discovers the
//! altitude levels available beneath it. Names outside the known vocabulary
//! classify as unknown and are skipped by the enrichment engine.

use crate::constants::ALTITUDE_PATTERN;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::LazyLock;
use tracing::debug;

static ALTITUDE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(ALTITUDE_PATTERN).expect("altitude pattern is valid"));

/// Wind data sources understood by the enrichment engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum WindType {
    /// Bulk (station or campaign averaged) winds
    Bulk,
    /// High-Resolution Rapid Refresh model
    Hrrr,
    /// Real-Time Mesoscale Analysis
    Rtma,
    /// GMAO GEOS forward processing
    Gmao,
    /// ECMWF reanalysis
    Era5,
}

impl WindType {
    /// Detect wind type from a directory name
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.to_lowercase();

        if name.contains("bulk") {
            Some(WindType::Bulk)
        } else if name.contains("hrrr") {
            Some(WindType::Hrrr)
        } else if name.contains("rtma") {
            Some(WindType::Rtma)
        } else if name.contains("gmao") || name.contains("geos") {
            Some(WindType::Gmao)
        } else if name.contains("era5") {
            Some(WindType::Era5)
        } else {
            None
        }
    }

    /// Canonical name used in derived field names
    pub fn as_str(&self) -> &'static str {
        match self {
            WindType::Bulk => "bulk",
            WindType::Hrrr => "HRRR",
            WindType::Rtma => "RTMA",
            WindType::Gmao => "GMAO",
            WindType::Era5 => "ERA5",
        }
    }
}

impl std::fmt::Display for WindType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of classifying one wind-data subdirectory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindClassification {
    name: String,
    wind_type: Option<WindType>,
    altitudes: Vec<u32>,
}

impl WindClassification {
    /// Classify a name without touching the filesystem
    pub fn from_name(name: &str) -> Self {
        Self {
            name: name.to_string(),
            wind_type: WindType::from_name(name),
            altitudes: Vec::new(),
        }
    }

    /// Classify a wind-type directory and discover its altitudes
    ///
    /// Altitudes are only discovered for recognized names.
    pub fn from_dir(dir: &Path) -> Self {
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let mut classification = Self::from_name(&name);
        if classification.wind_type.is_some() {
            classification.altitudes = discover_altitudes(dir);
        }
        classification
    }

    pub fn is_unknown(&self) -> bool {
        self.wind_type.is_none()
    }

    pub fn wind_type(&self) -> Option<WindType> {
        self.wind_type
    }

    /// Canonical type name; `None` for unknown directories
    pub fn type_as_str(&self) -> Option<&'static str> {
        self.wind_type.map(|wind_type| wind_type.as_str())
    }

    /// Directory name this classification was derived from
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Available altitudes in ascending order
    pub fn altitudes(&self) -> &[u32] {
        &self.altitudes
    }
}

/// Extract an altitude from an entry name like `alt500` or `alt500.csv`
pub fn parse_altitude(name: &str) -> Option<u32> {
    ALTITUDE_REGEX
        .captures(name)
        .and_then(|captures| captures.get(1))
        .and_then(|m| m.as_str().parse::<u32>().ok())
}

/// List the altitudes available under a wind-type directory
///
/// Unreadable directories and entries that do not name an altitude are
/// skipped. The result is sorted ascending and free of duplicates.
pub fn discover_altitudes(dir: &Path) -> Vec<u32> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!("Cannot read wind directory {}: {}", dir.display(), e);
            return Vec::new();
        }
    };

    let mut altitudes = Vec::new();
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') {
            continue;
        }
        match parse_altitude(&name) {
            Some(altitude) => altitudes.push(altitude),
            None => debug!("Skipping non-altitude entry {} in {}", name, dir.display()),
        }
    }

    altitudes.sort_unstable();
    altitudes.dedup();
    altitudes
}
