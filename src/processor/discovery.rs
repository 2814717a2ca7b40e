//! Plume file discovery
//!
//! One-shot scan of a plume directory for plume lists whose path, relative
//! to the directory, matches a regular expression. Results are returned in
//! path order so repeated scans feed the loader identically.

use crate::error::{PlumeError, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// File discovery component for plume directories
#[derive(Debug)]
pub struct PlumeFileDiscovery {
    plume_dir: PathBuf,
    pattern: Regex,
}

impl PlumeFileDiscovery {
    /// Create a discovery over `plume_dir`
    ///
    /// The pattern must match the whole relative path, using `/` separators,
    /// e.g. `ang.*_detections/ime_minppmm1000/ang.*_ime_minppmm1000.*`.
    pub fn new(plume_dir: impl Into<PathBuf>, pattern: &str) -> Result<Self> {
        let pattern = Regex::new(&format!("^(?:{})$", pattern)).map_err(|e| {
            PlumeError::configuration(format!("Invalid plume file pattern '{}': {}", pattern, e))
        })?;
        Ok(Self {
            plume_dir: plume_dir.into(),
            pattern,
        })
    }

    /// Find all matching plume files
    ///
    /// ```text
    /// plume_dir/
    ///   ang20160101_detections/
    ///     ime_minppmm1000/
    ///       ang20160101_ime_minppmm1000_plumes.csv
    ///   ang20160102_detections/
    ///     ime_minppmm1000/
    ///       ang20160102_ime_minppmm1000_plumes.csv
    /// ```
    pub fn discover(&self) -> Result<Vec<PathBuf>> {
        if !self.plume_dir.is_dir() {
            return Err(PlumeError::PlumeDirectoryNotFound {
                path: self.plume_dir.clone(),
            });
        }

        debug!("Searching for plume files in: {}", self.plume_dir.display());

        let mut files = Vec::new();
        for entry in WalkDir::new(&self.plume_dir).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            if self.matches(entry.path()) {
                files.push(entry.into_path());
            }
        }

        debug!("Found {} plume files", files.len());
        Ok(files)
    }

    /// True when the path relative to the plume directory matches the pattern
    fn matches(&self, path: &Path) -> bool {
        let Ok(relative) = path.strip_prefix(&self.plume_dir) else {
            return false;
        };
        let relative = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        self.pattern.is_match(&relative)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::default_plume_file_pattern;
    use std::fs;
    use tempfile::TempDir;

    /// Helper to create a test plume directory structure
    fn create_test_plume_dir(temp_dir: &TempDir) -> PathBuf {
        let plume_dir = temp_dir.path().join("plumes");

        for day in ["ang20160102", "ang20160101"] {
            let dir = plume_dir
                .join(format!("{}_detections", day))
                .join("ime_minppmm1000");
            fs::create_dir_all(&dir).unwrap();
            fs::write(
                dir.join(format!("{}_ime_minppmm1000_plumes.csv", day)),
                "Candidate ID\n001\n",
            )
            .unwrap();
        }

        // Different threshold, should not match the default pattern
        let other = plume_dir
            .join("ang20160101_detections")
            .join("ime_minppmm500");
        fs::create_dir_all(&other).unwrap();
        fs::write(other.join("ang20160101_ime_minppmm500_plumes.csv"), "x\n").unwrap();

        // Top-level file, should not match
        fs::write(plume_dir.join("notes.txt"), "notes").unwrap();

        plume_dir
    }

    #[test]
    fn test_discover_with_default_pattern() {
        let temp_dir = TempDir::new().unwrap();
        let plume_dir = create_test_plume_dir(&temp_dir);

        let discovery =
            PlumeFileDiscovery::new(&plume_dir, &default_plume_file_pattern(1000)).unwrap();
        let files = discovery.discover().unwrap();

        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "ang20160101_ime_minppmm1000_plumes.csv",
                "ang20160102_ime_minppmm1000_plumes.csv"
            ]
        );
    }

    #[test]
    fn test_discover_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let discovery = PlumeFileDiscovery::new(temp_dir.path().join("absent"), ".*").unwrap();
        assert!(matches!(
            discovery.discover(),
            Err(PlumeError::PlumeDirectoryNotFound { .. })
        ));
    }

    #[test]
    fn test_invalid_pattern() {
        let result = PlumeFileDiscovery::new("/tmp", "ang(");
        assert!(matches!(result, Err(PlumeError::Configuration { .. })));
    }
}
