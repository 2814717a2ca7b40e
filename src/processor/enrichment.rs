//! Wind enrichment of plume records
//!
//! Each record is matched against every recognized wind source under the
//! wind root. Wind statistics are merged per altitude, then one emission
//! estimate per wind type is accumulated and merged once all wind types
//! have been processed.

use crate::error::{PlumeError, Result};
use crate::models::Record;
use crate::progress::ProgressObserver;
use crate::wind::{WindClassification, WindModel, WindType};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A recognized wind-type directory and its altitudes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindSource {
    pub path: PathBuf,
    pub wind_type: WindType,
    pub altitudes: Vec<u32>,
}

/// List recognized wind sources under a wind root in name order
///
/// Hidden entries and plain files are ignored. Directories whose names do not
/// classify as a wind type are skipped without error.
pub fn scan_wind_sources(wind_root: &Path) -> Result<Vec<WindSource>> {
    if !wind_root.is_dir() {
        return Err(PlumeError::WindDirectoryNotFound {
            path: wind_root.to_path_buf(),
        });
    }

    let mut names: Vec<String> = fs::read_dir(wind_root)
        .map_err(|e| PlumeError::io(format!("Failed to read {}", wind_root.display()), e))?
        .collect::<std::io::Result<Vec<_>>>()
        .map_err(|e| PlumeError::io(format!("Failed to read {}", wind_root.display()), e))?
        .into_iter()
        .map(|entry| entry.file_name().to_string_lossy().to_string())
        .filter(|name| !name.starts_with('.'))
        .collect();
    names.sort();

    let mut sources = Vec::new();
    for name in names {
        let path = wind_root.join(&name);
        if !path.is_dir() {
            debug!("Skipping non-directory wind entry {}", name);
            continue;
        }

        let classification = WindClassification::from_dir(&path);
        match classification.wind_type() {
            Some(wind_type) => {
                debug!(
                    "Wind source {} -> {} at altitudes {:?}",
                    name,
                    wind_type,
                    classification.altitudes()
                );
                sources.push(WindSource {
                    path,
                    wind_type,
                    altitudes: classification.altitudes().to_vec(),
                });
            }
            None => debug!("Skipping unknown wind directory {}", name),
        }
    }
    Ok(sources)
}

/// Enrich one record from pre-scanned wind sources
///
/// Per source, every altitude's wind statistics are merged into the record in
/// ascending altitude order, so a later altitude overwrites colliding fields.
/// The emission estimate is then computed from the record as mutated so far
/// and accumulated separately; colliding emission fields take the value from
/// the last source. The accumulated emission fields are merged at the end.
pub fn enrich_record<M: WindModel + ?Sized>(
    record: &mut Record,
    sources: &[WindSource],
    model: &M,
    fill: Option<f64>,
) -> Result<()> {
    let mut emission_stats = Record::new();

    for source in sources {
        debug!("Processing winds in {}", source.path.display());
        for &altitude in &source.altitudes {
            let wind_stats =
                model.compute_wind_stats(record, &source.path, fill, source.wind_type, altitude)?;
            record.merge(wind_stats);
        }
        emission_stats.merge(model.compute_emission_rate(record, source.wind_type, fill)?);
    }

    record.merge(emission_stats);
    Ok(())
}

/// Applies a wind model to plume records using one wind root
pub struct EnrichmentEngine<M: WindModel> {
    model: M,
    wind_root: PathBuf,
    fill: Option<f64>,
}

impl<M: WindModel> EnrichmentEngine<M> {
    /// Create an engine over a wind root directory
    pub fn new(model: M, wind_root: impl Into<PathBuf>, fill: Option<f64>) -> Self {
        Self {
            model,
            wind_root: wind_root.into(),
            fill,
        }
    }

    pub fn wind_root(&self) -> &Path {
        &self.wind_root
    }

    /// Enrich a single record in place
    pub fn enrich_record(&self, record: &mut Record) -> Result<()> {
        let sources = scan_wind_sources(&self.wind_root)?;
        enrich_record(record, &sources, &self.model, self.fill)
    }

    /// Enrich every record in order
    ///
    /// The wind root is scanned once for the batch. The first model error
    /// aborts the batch.
    pub fn enrich_all(
        &self,
        mut records: Vec<Record>,
        observer: Option<&dyn ProgressObserver>,
    ) -> Result<Vec<Record>> {
        let sources = scan_wind_sources(&self.wind_root)?;
        info!(
            "Enriching {} plumes from {} wind source(s) in {}",
            records.len(),
            sources.len(),
            self.wind_root.display()
        );

        if let Some(observer) = observer {
            observer.enrichment_started(records.len());
        }

        for (index, record) in records.iter_mut().enumerate() {
            enrich_record(record, &sources, &self.model, self.fill)?;
            debug!("Computed plume {:?}", record);
            if let Some(observer) = observer {
                observer.record_enriched(index, record);
            }
        }

        if let Some(observer) = observer {
            observer.enrichment_finished();
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EmissionStats, FieldValue, WindStats};
    use std::cell::RefCell;
    use tempfile::TempDir;

    /// Model that records every call and returns deterministic fields
    #[derive(Default)]
    struct RecordingModel {
        calls: RefCell<Vec<String>>,
    }

    impl WindModel for RecordingModel {
        fn compute_wind_stats(
            &self,
            record: &Record,
            wind_subdir: &Path,
            fill: Option<f64>,
            wind_type: WindType,
            altitude: u32,
        ) -> Result<WindStats> {
            let dir = wind_subdir.file_name().unwrap().to_string_lossy();
            self.calls
                .borrow_mut()
                .push(format!("wind:{}:{}:{}", dir, wind_type, altitude));
            assert_eq!(fill, Some(-9999.0));
            assert!(record.contains_key("Candidate ID"));
            Ok(vec![
                (format!("{} alt{} speed", wind_type, altitude), altitude as f64),
                (format!("{} speed", wind_type), altitude as f64),
            ])
        }

        fn compute_emission_rate(
            &self,
            record: &Record,
            wind_type: WindType,
            _fill: Option<f64>,
        ) -> Result<EmissionStats> {
            self.calls
                .borrow_mut()
                .push(format!("emission:{}", wind_type));
            let speed = record
                .get(&format!("{} speed", wind_type))
                .and_then(FieldValue::as_f64)
                .unwrap_or(0.0);
            Ok(vec![
                (format!("{} rate", wind_type), speed * 2.0),
                ("last emission type".to_string(), speed),
            ])
        }
    }

    struct FailingModel;

    impl WindModel for FailingModel {
        fn compute_wind_stats(
            &self,
            _record: &Record,
            _wind_subdir: &Path,
            _fill: Option<f64>,
            wind_type: WindType,
            _altitude: u32,
        ) -> Result<WindStats> {
            Err(PlumeError::wind_model(wind_type.as_str(), "corrupt wind file"))
        }

        fn compute_emission_rate(
            &self,
            _record: &Record,
            _wind_type: WindType,
            _fill: Option<f64>,
        ) -> Result<EmissionStats> {
            Ok(Vec::new())
        }
    }

    fn create_wind_root(temp_dir: &TempDir) -> PathBuf {
        let root = temp_dir.path().join("winds");
        fs::create_dir_all(root.join("bulk").join("alt500")).unwrap();
        fs::create_dir_all(root.join("bulk").join("alt1000")).unwrap();
        fs::create_dir_all(root.join("hrrr").join("alt10")).unwrap();
        fs::create_dir_all(root.join(".hidden").join("alt1")).unwrap();
        fs::create_dir_all(root.join("unknown_source").join("alt1")).unwrap();
        fs::write(root.join("bulk_readme.txt"), "not a directory").unwrap();
        root
    }

    fn plume() -> Record {
        Record::from_pairs([
            ("Candidate ID", FieldValue::from("001")),
            ("Minimum Threshold (ppmm)", FieldValue::from(1000_i64)),
        ])
    }

    #[test]
    fn test_scan_wind_sources_sorted_and_filtered() {
        let temp_dir = TempDir::new().unwrap();
        let root = create_wind_root(&temp_dir);

        let sources = scan_wind_sources(&root).unwrap();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].wind_type, WindType::Bulk);
        assert_eq!(sources[0].altitudes, vec![500, 1000]);
        assert_eq!(sources[1].wind_type, WindType::Hrrr);
        assert_eq!(sources[1].altitudes, vec![10]);
    }

    #[test]
    fn test_scan_missing_wind_root() {
        let temp_dir = TempDir::new().unwrap();
        let result = scan_wind_sources(&temp_dir.path().join("absent"));
        assert!(matches!(
            result,
            Err(PlumeError::WindDirectoryNotFound { .. })
        ));
    }

    #[test]
    fn test_enrich_call_order_and_collisions() {
        let temp_dir = TempDir::new().unwrap();
        let root = create_wind_root(&temp_dir);
        let engine = EnrichmentEngine::new(RecordingModel::default(), &root, Some(-9999.0));

        let mut record = plume();
        engine.enrich_record(&mut record).unwrap();

        assert_eq!(
            *engine.model.calls.borrow(),
            vec![
                "wind:bulk:bulk:500",
                "wind:bulk:bulk:1000",
                "emission:bulk",
                "wind:hrrr:HRRR:10",
                "emission:HRRR",
            ]
        );

        // Per-altitude fields are all kept; the shared field holds the last altitude
        assert_eq!(record.get("bulk alt500 speed"), Some(&FieldValue::Float(500.0)));
        assert_eq!(record.get("bulk alt1000 speed"), Some(&FieldValue::Float(1000.0)));
        assert_eq!(record.get("bulk speed"), Some(&FieldValue::Float(1000.0)));

        // Emission computed from the record after all bulk altitudes were merged
        assert_eq!(record.get("bulk rate"), Some(&FieldValue::Float(2000.0)));
        assert_eq!(record.get("HRRR rate"), Some(&FieldValue::Float(20.0)));

        // Emission collisions resolve to the last wind type in name order
        assert_eq!(
            record.get("last emission type"),
            Some(&FieldValue::Float(10.0))
        );

        // Emission fields are merged after every wind field
        let keys: Vec<&str> = record.keys().collect();
        assert_eq!(
            &keys[keys.len() - 3..],
            &["bulk rate", "last emission type", "HRRR rate"]
        );
    }

    #[test]
    fn test_unknown_sources_contribute_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("winds");
        fs::create_dir_all(root.join("lidar").join("alt100")).unwrap();
        fs::create_dir_all(root.join(".bulk").join("alt100")).unwrap();

        let engine = EnrichmentEngine::new(RecordingModel::default(), &root, Some(-9999.0));
        let original = plume();
        let enriched = engine.enrich_all(vec![original.clone()], None).unwrap();

        assert_eq!(enriched, vec![original]);
        assert!(engine.model.calls.borrow().is_empty());
    }

    #[test]
    fn test_enrichment_is_deterministic() {
        let temp_dir = TempDir::new().unwrap();
        let root = create_wind_root(&temp_dir);
        let engine = EnrichmentEngine::new(RecordingModel::default(), &root, Some(-9999.0));

        let first = engine.enrich_all(vec![plume(), plume()], None).unwrap();
        let second = engine.enrich_all(vec![plume(), plume()], None).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_model_error_aborts_batch() {
        let temp_dir = TempDir::new().unwrap();
        let root = create_wind_root(&temp_dir);
        let engine = EnrichmentEngine::new(FailingModel, &root, Some(-9999.0));

        let result = engine.enrich_all(vec![plume()], None);
        match result {
            Err(PlumeError::WindModel { wind_type, message }) => {
                assert_eq!(wind_type, "bulk");
                assert_eq!(message, "corrupt wind file");
            }
            other => panic!("Expected WindModel error, got {:?}", other),
        }
    }

    #[test]
    fn test_observer_notified_per_record() {
        #[derive(Default)]
        struct CountingObserver {
            events: RefCell<Vec<String>>,
        }

        impl ProgressObserver for CountingObserver {
            fn enrichment_started(&self, total: usize) {
                self.events.borrow_mut().push(format!("start:{}", total));
            }
            fn record_enriched(&self, index: usize, _record: &Record) {
                self.events.borrow_mut().push(format!("record:{}", index));
            }
            fn enrichment_finished(&self) {
                self.events.borrow_mut().push("finish".to_string());
            }
        }

        let temp_dir = TempDir::new().unwrap();
        let root = create_wind_root(&temp_dir);
        let engine = EnrichmentEngine::new(RecordingModel::default(), &root, Some(-9999.0));
        let observer = CountingObserver::default();

        let with_observer = engine
            .enrich_all(vec![plume(), plume()], Some(&observer))
            .unwrap();
        let without_observer = engine.enrich_all(vec![plume(), plume()], None).unwrap();

        assert_eq!(with_observer, without_observer);
        assert_eq!(
            *observer.events.borrow(),
            vec!["start:2", "record:0", "record:1", "finish"]
        );
    }
}
