//! Main processing engine.
//!
//! Orchestrates the plume workflow using specialized modules for plume
//! file discovery, loading, wind enrichment, and merging into the
//! persisted output table.

pub mod discovery;
pub mod enrichment;
pub mod loader;
pub mod writer;

#[cfg(test)]
pub mod tests;

use self::{enrichment::EnrichmentEngine, loader::RecordLoader, writer::PlumeTableWriter};

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::models::ProcessingStats;
use crate::progress::ProgressObserver;
use crate::wind::{RunningWindModel, WindModel};

use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

/// Runs load, enrichment, and merge for one output table
pub struct PlumeProcessor<M: WindModel = RunningWindModel> {
    config: PipelineConfig,
    loader: RecordLoader,
    engine: EnrichmentEngine<M>,
    writer: PlumeTableWriter,
}

impl PlumeProcessor<RunningWindModel> {
    /// Create a processor using the reference wind model
    pub fn new(
        wind_dir: impl Into<PathBuf>,
        output_path: impl Into<PathBuf>,
        config: PipelineConfig,
    ) -> Self {
        let model = RunningWindModel::new(&config);
        Self::with_model(model, wind_dir, output_path, config)
    }
}

impl<M: WindModel> PlumeProcessor<M> {
    /// Create a processor around any wind model
    pub fn with_model(
        model: M,
        wind_dir: impl Into<PathBuf>,
        output_path: impl Into<PathBuf>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            loader: RecordLoader::new(&config),
            engine: EnrichmentEngine::new(model, wind_dir, config.fill_value),
            writer: PlumeTableWriter::new(output_path, &config),
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn output_path(&self) -> &Path {
        self.writer.output_path()
    }

    /// Main processing entry point
    ///
    /// Loads every input file, enriches each plume, and merges the batch into
    /// the output table. Loader and wind model errors abort before the output
    /// is touched.
    pub fn process(
        &self,
        input_files: &[PathBuf],
        observer: Option<&dyn ProgressObserver>,
    ) -> Result<ProcessingStats> {
        let start_time = Instant::now();
        info!(
            "Processing {} plume file(s) with winds from {}",
            input_files.len(),
            self.engine.wind_root().display()
        );

        let plumes = self.loader.load_files(input_files)?;
        let records_loaded = plumes.len();

        let plumes = self.engine.enrich_all(plumes, observer)?;
        let records_enriched = plumes.len();

        let summary = self.writer.write(plumes, observer)?;

        Ok(ProcessingStats {
            files_loaded: input_files.len(),
            records_loaded,
            records_enriched,
            rows_written: summary.rows_written,
            rows_skipped: summary.rows_skipped,
            duplicates_dropped: summary.duplicates_dropped,
            rows_replaced: summary.rows_replaced,
            output_path: self.writer.output_path().to_path_buf(),
            backup_path: summary.backup_path,
            processing_time_ms: start_time.elapsed().as_millis(),
        })
    }
}
