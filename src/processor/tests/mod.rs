//! Integration tests for the processor module
//!
//! Tests the complete pipeline using temporary plume and wind directory
//! structures.


use std::fs;
use std::path::{Path, PathBuf};

/// Plume file path used throughout the pipeline tests
pub const PLUME_FILE: &str =
    "ang20160101_detections/ime_minppmm1000/ang20160101_ime_minppmm1000_plumes.csv";

/// Write a plume list below `root` and return its path
pub fn write_plume_file(root: &Path, relative: &str, content: &str) -> PathBuf {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, content).unwrap();
    path
}

/// Write a wind observation file for one altitude of one wind source
pub fn write_wind_file(wind_root: &Path, source: &str, altitude: &str, speeds: &[f64]) {
    let dir = wind_root.join(source).join(altitude);
    fs::create_dir_all(&dir).unwrap();
    let mut content = String::from("wind_speed\n");
    for speed in speeds {
        content.push_str(&format!("{}\n", speed));
    }
    fs::write(dir.join("winds.csv"), content).unwrap();
}
