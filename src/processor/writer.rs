//! Output table merging and persistence
//!
//! Combines newly enriched plumes with the rows already stored in the output
//! table, backs the old table up, and rewrites the whole table through a
//! temporary file that replaces the output only once every row is written.

use crate::config::{MergePolicy, PipelineConfig};
use crate::constants::BACKUP_SUFFIX;
use crate::error::{PlumeError, Result};
use crate::models::Record;
use crate::processor::loader::read_records_lenient;
use crate::progress::ProgressObserver;
use std::collections::HashSet;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

#[cfg(unix)]
const NEW_TABLE_MODE: u32 = 0o644;

/// Outcome of one write
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteSummary {
    /// Rows read from the existing output table
    pub existing_rows: usize,
    /// New records offered to the writer
    pub new_rows: usize,
    /// New records dropped because an identical row already existed
    pub duplicates_dropped: usize,
    /// Existing rows dropped in favour of a new record with the same key
    pub rows_replaced: usize,
    /// Rows written after the header
    pub rows_written: usize,
    /// Rows left out because their fields did not match the header
    pub rows_skipped: usize,
    /// Snapshot of the table taken before it was rewritten
    pub backup_path: Option<PathBuf>,
}

impl WriteSummary {
    /// True when the output file was rewritten
    pub fn wrote_output(&self) -> bool {
        self.new_rows > 0
    }
}

/// Sibling path holding the pre-merge snapshot: `<path>.bak`
pub fn backup_path_for(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(BACKUP_SUFFIX);
    PathBuf::from(name)
}

/// Writer merging plume records into a persisted table
#[derive(Debug, Clone)]
pub struct PlumeTableWriter {
    output_path: PathBuf,
    sort_key: Option<String>,
    merge_policy: MergePolicy,
    delimiter: u8,
}

impl PlumeTableWriter {
    /// Create a writer from pipeline configuration
    pub fn new(output_path: impl Into<PathBuf>, config: &PipelineConfig) -> Self {
        Self {
            output_path: output_path.into(),
            sort_key: config.output_sort_key.clone(),
            merge_policy: config.merge_policy.clone(),
            delimiter: config.delimiter,
        }
    }

    /// Override the sort key
    pub fn with_sort_key(mut self, sort_key: Option<String>) -> Self {
        self.sort_key = sort_key;
        self
    }

    /// Override the merge policy
    pub fn with_merge_policy(mut self, merge_policy: MergePolicy) -> Self {
        self.merge_policy = merge_policy;
        self
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Merge `records` into the output table
    ///
    /// An empty batch leaves the filesystem untouched. When the output already
    /// exists it is read, then copied to `<output>.bak` before the rewrite.
    pub fn write(
        &self,
        records: Vec<Record>,
        observer: Option<&dyn ProgressObserver>,
    ) -> Result<WriteSummary> {
        let mut summary = WriteSummary::default();

        if records.is_empty() {
            warn!("Skipped insertion because plume list was empty");
            return Ok(summary);
        }
        summary.new_rows = records.len();

        let mut existing = Vec::new();
        if self.output_path.is_file() {
            existing = read_records_lenient(&self.output_path, self.delimiter)?;
            summary.existing_rows = existing.len();

            let backup_path = backup_path_for(&self.output_path);
            fs::copy(&self.output_path, &backup_path).map_err(|e| {
                PlumeError::io(
                    format!("Failed to back up {}", self.output_path.display()),
                    e,
                )
            })?;
            info!("Original plume file backed up to {}", backup_path.display());
            summary.backup_path = Some(backup_path);
        }

        let mut plumes = self.merge(existing, records, &mut summary);
        self.sort(&mut plumes);

        let Some(first) = plumes.first() else {
            warn!("Nothing left to write after merging");
            return Ok(summary);
        };
        let header: Vec<String> = first.keys().map(str::to_string).collect();

        self.write_table(&header, &plumes, observer, &mut summary)?;
        info!(
            "Extended plume file written to {} ({} rows)",
            self.output_path.display(),
            summary.rows_written
        );
        Ok(summary)
    }

    /// Existing rows followed by new records, filtered by the merge policy
    fn merge(
        &self,
        mut existing: Vec<Record>,
        mut records: Vec<Record>,
        summary: &mut WriteSummary,
    ) -> Vec<Record> {
        match &self.merge_policy {
            MergePolicy::Append => {}
            MergePolicy::SkipDuplicates => {
                let before = records.len();
                records.retain(|record| !existing.iter().any(|row| row.text_eq(record)));
                summary.duplicates_dropped = before - records.len();
            }
            MergePolicy::ReplaceByKey(fields) => {
                let key_of = |record: &Record| -> Vec<String> {
                    fields.iter().map(|field| record.text(field)).collect()
                };
                let new_keys: HashSet<Vec<String>> = records.iter().map(key_of).collect();
                let before = existing.len();
                existing.retain(|row| !new_keys.contains(&key_of(row)));
                summary.rows_replaced = before - existing.len();
            }
        }

        if summary.duplicates_dropped > 0 || summary.rows_replaced > 0 {
            debug!(
                "Merge policy {:?}: {} duplicates dropped, {} rows replaced",
                self.merge_policy, summary.duplicates_dropped, summary.rows_replaced
            );
        }

        existing.extend(records);
        existing
    }

    /// Stable sort by the sort key when the first record has it
    fn sort(&self, plumes: &mut [Record]) {
        let Some(sort_key) = &self.sort_key else {
            return;
        };
        match plumes.first() {
            Some(first) if first.contains_key(sort_key) => {
                plumes.sort_by_cached_key(|record| record.text(sort_key));
            }
            Some(_) => {
                warn!("Sort key {} not found.", sort_key);
                warn!("Plumes left unsorted.");
            }
            None => {}
        }
    }

    /// Write header and rows to a temporary file, then move it over the output
    fn write_table(
        &self,
        header: &[String],
        plumes: &[Record],
        observer: Option<&dyn ProgressObserver>,
        summary: &mut WriteSummary,
    ) -> Result<()> {
        let parent = match self.output_path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let mut temp_file = NamedTempFile::new_in(&parent).map_err(|e| {
            PlumeError::io(
                format!("Failed to create temporary file in {}", parent.display()),
                e,
            )
        })?;

        {
            let mut writer = csv::WriterBuilder::new()
                .delimiter(self.delimiter)
                .from_writer(temp_file.as_file_mut());
            writer.write_record(header).map_err(|e| self.write_error(e))?;

            for plume in plumes {
                match plume.values_for(header) {
                    Some(values) if plume.len() == header.len() => {
                        writer.write_record(&values).map_err(|e| self.write_error(e))?;
                        summary.rows_written += 1;
                    }
                    _ => {
                        warn!("Could not write plume: {:?}", plume);
                        warn!(
                            "Check that the plume fields match the header in {}",
                            self.output_path.display()
                        );
                        if let Some(observer) = observer {
                            observer.row_skipped(plume, "fields do not match the header");
                        }
                        summary.rows_skipped += 1;
                    }
                }
            }
            writer.flush().map_err(|e| {
                PlumeError::io(format!("Failed to flush {}", self.output_path.display()), e)
            })?;
        }
        temp_file.as_file_mut().sync_all().map_err(|e| {
            PlumeError::io(format!("Failed to sync {}", self.output_path.display()), e)
        })?;

        match fs::metadata(&self.output_path) {
            Ok(metadata) => fs::set_permissions(temp_file.path(), metadata.permissions())?,
            Err(_) => set_new_table_permissions(temp_file.path())?,
        }

        temp_file
            .persist(&self.output_path)
            .map_err(|e| PlumeError::WriteFailed {
                path: self.output_path.clone(),
                reason: e.error.to_string(),
            })?;
        Ok(())
    }

    fn write_error(&self, error: csv::Error) -> PlumeError {
        PlumeError::WriteFailed {
            path: self.output_path.clone(),
            reason: error.to_string(),
        }
    }
}

/// Temp files are created owner-only; a fresh table gets the usual `rw-r--r--`
#[cfg(unix)]
fn set_new_table_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(NEW_TABLE_MODE))
        .map_err(|e| PlumeError::io(format!("Failed to set permissions on {}", path.display()), e))
}

#[cfg(not(unix))]
fn set_new_table_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FieldValue;
    use crate::processor::loader::read_records;
    use tempfile::TempDir;

    fn writer(output: &Path) -> PlumeTableWriter {
        PlumeTableWriter::new(output, &PipelineConfig::default())
    }

    fn plume(id: &str, ime: &str) -> Record {
        Record::from_pairs([
            ("Candidate ID", FieldValue::from(id)),
            ("IME (kg)", FieldValue::from(ime)),
            ("Minimum Threshold (ppmm)", FieldValue::from(1000_i64)),
        ])
    }

    #[test]
    fn test_backup_path_appends_suffix() {
        assert_eq!(
            backup_path_for(Path::new("/out/plumes.csv")),
            PathBuf::from("/out/plumes.csv.bak")
        );
    }

    #[test]
    fn test_first_write_creates_table_without_backup() {
        let temp_dir = TempDir::new().unwrap();
        let output = temp_dir.path().join("plumes.csv");

        let summary = writer(&output)
            .write(vec![plume("002", "5"), plume("001", "7")], None)
            .unwrap();

        assert_eq!(summary.rows_written, 2);
        assert_eq!(summary.backup_path, None);
        assert!(!backup_path_for(&output).exists());
        assert_eq!(
            fs::read_to_string(&output).unwrap(),
            "Candidate ID,IME (kg),Minimum Threshold (ppmm)\n001,7,1000\n002,5,1000\n"
        );
    }

    #[test]
    fn test_empty_batch_is_a_no_op() {
        let temp_dir = TempDir::new().unwrap();
        let output = temp_dir.path().join("plumes.csv");
        fs::write(&output, "Candidate ID\n000\n").unwrap();

        let summary = writer(&output).write(Vec::new(), None).unwrap();

        assert!(!summary.wrote_output());
        assert_eq!(fs::read_to_string(&output).unwrap(), "Candidate ID\n000\n");
        assert!(!backup_path_for(&output).exists());
    }

    #[test]
    fn test_merge_with_existing_table_and_backup() {
        let temp_dir = TempDir::new().unwrap();
        let output = temp_dir.path().join("plumes.csv");
        let original = "Candidate ID,IME (kg),Minimum Threshold (ppmm)\n000,1,1000\n";
        fs::write(&output, original).unwrap();

        let summary = writer(&output).write(vec![plume("001", "2")], None).unwrap();

        assert_eq!(summary.existing_rows, 1);
        assert_eq!(summary.rows_written, 2);
        assert_eq!(summary.backup_path, Some(backup_path_for(&output)));
        assert_eq!(
            fs::read_to_string(backup_path_for(&output)).unwrap(),
            original
        );

        let rows = read_records(&output, b',').unwrap();
        let ids: Vec<String> = rows.iter().map(|r| r.text("Candidate ID")).collect();
        assert_eq!(ids, vec!["000", "001"]);
    }

    #[test]
    fn test_missing_sort_key_keeps_existing_then_new() {
        let temp_dir = TempDir::new().unwrap();
        let output = temp_dir.path().join("plumes.csv");
        fs::write(
            &output,
            "Candidate ID,IME (kg),Minimum Threshold (ppmm)\n009,1,1000\n",
        )
        .unwrap();

        let summary = writer(&output)
            .with_sort_key(Some("Plume ID".to_string()))
            .write(vec![plume("001", "2")], None)
            .unwrap();
        assert_eq!(summary.rows_written, 2);

        let rows = read_records(&output, b',').unwrap();
        let ids: Vec<String> = rows.iter().map(|r| r.text("Candidate ID")).collect();
        assert_eq!(ids, vec!["009", "001"]);
    }

    #[test]
    fn test_mismatched_rows_are_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let output = temp_dir.path().join("plumes.csv");

        let mut extra = plume("002", "3");
        extra.insert("bulk Wind Speed (m/s)", 2.5);
        let missing = Record::from_pairs([("Candidate ID", "003")]);

        let summary = writer(&output)
            .write(vec![plume("001", "1"), extra, missing], None)
            .unwrap();

        assert_eq!(summary.rows_written, 1);
        assert_eq!(summary.rows_skipped, 2);
        let rows = read_records(&output, b',').unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].text("Candidate ID"), "001");
    }

    #[test]
    fn test_ragged_existing_rows_are_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let output = temp_dir.path().join("plumes.csv");
        fs::write(
            &output,
            "Candidate ID,IME (kg),Minimum Threshold (ppmm)\n000,5,1000\n009,7\n010,1,1000,x\n",
        )
        .unwrap();

        let summary = writer(&output).write(vec![plume("001", "2")], None).unwrap();

        assert_eq!(summary.existing_rows, 3);
        assert_eq!(summary.rows_written, 2);
        assert_eq!(summary.rows_skipped, 2);
        assert_eq!(
            fs::read_to_string(&output).unwrap(),
            "Candidate ID,IME (kg),Minimum Threshold (ppmm)\n000,5,1000\n001,2,1000\n"
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_new_table_is_world_readable() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let output = temp_dir.path().join("plumes.csv");
        writer(&output).write(vec![plume("001", "1")], None).unwrap();

        let mode = fs::metadata(&output).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);

        // Later rewrites keep whatever mode the table has
        fs::set_permissions(&output, fs::Permissions::from_mode(0o640)).unwrap();
        writer(&output).write(vec![plume("002", "1")], None).unwrap();
        let mode = fs::metadata(&output).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o640);
    }

    #[test]
    fn test_repeated_write_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let output = temp_dir.path().join("plumes.csv");
        let batch = vec![plume("001", "1"), plume("002", "2")];

        writer(&output).write(batch.clone(), None).unwrap();
        let first = fs::read_to_string(&output).unwrap();

        let summary = writer(&output).write(batch, None).unwrap();
        assert_eq!(summary.duplicates_dropped, 2);
        assert_eq!(fs::read_to_string(&output).unwrap(), first);
        assert_eq!(fs::read_to_string(backup_path_for(&output)).unwrap(), first);
    }

    #[test]
    fn test_append_policy_keeps_duplicates() {
        let temp_dir = TempDir::new().unwrap();
        let output = temp_dir.path().join("plumes.csv");
        let append = writer(&output).with_merge_policy(MergePolicy::Append);

        append.write(vec![plume("001", "1")], None).unwrap();
        let summary = append.write(vec![plume("001", "1")], None).unwrap();

        assert_eq!(summary.rows_written, 2);
        assert_eq!(read_records(&output, b',').unwrap().len(), 2);
    }

    #[test]
    fn test_replace_by_key_policy() {
        let temp_dir = TempDir::new().unwrap();
        let output = temp_dir.path().join("plumes.csv");
        let config = PipelineConfig::default().with_force_reprocess();
        let replace = PlumeTableWriter::new(&output, &config);

        replace
            .write(vec![plume("001", "1"), plume("002", "2")], None)
            .unwrap();
        let summary = replace.write(vec![plume("001", "9")], None).unwrap();

        assert_eq!(summary.rows_replaced, 1);
        let rows = read_records(&output, b',').unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].text("IME (kg)"), "9");
        assert_eq!(rows[1].text("IME (kg)"), "2");
    }

    #[test]
    fn test_written_rows_round_trip_as_text() {
        let temp_dir = TempDir::new().unwrap();
        let output = temp_dir.path().join("plumes.csv");
        let mut record = plume("001", "120.5");
        record.insert("bulk Emission Rate (kg/hr)", 2160.25);

        writer(&output).write(vec![record.clone()], None).unwrap();
        let rows = read_records(&output, b',').unwrap();

        assert_eq!(rows.len(), 1);
        assert!(rows[0].text_eq(&record));
        assert_eq!(rows[0].get("Minimum Threshold (ppmm)"), Some(&FieldValue::from("1000")));
    }
}
