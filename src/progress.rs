//! Progress observation for the enrichment pipeline
//!
//! Components accept an optional [`ProgressObserver`]; passing `None` leaves
//! behaviour unchanged. [`ProgressReporter`] renders progress with an
//! indicatif bar for terminal use.

use crate::models::Record;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

/// Receives progress notifications from the loader, engine, and writer
///
/// Every method has an empty default so observers only implement what
/// they display.
pub trait ProgressObserver {
    /// Enrichment of `total` records is starting
    fn enrichment_started(&self, _total: usize) {}

    /// Record number `index` (zero based) has been enriched
    fn record_enriched(&self, _index: usize, _record: &Record) {}

    /// Enrichment of the batch has finished
    fn enrichment_finished(&self) {}

    /// A row could not be written and was left out of the output table
    fn row_skipped(&self, _record: &Record, _reason: &str) {}
}

/// Terminal progress bar over enriched records
pub struct ProgressReporter {
    progress_bar: ProgressBar,
    id_field: Option<String>,
}

impl ProgressReporter {
    /// Create a reporter; a hidden reporter draws nothing
    pub fn new(visible: bool, id_field: Option<String>) -> Self {
        let progress_bar = if visible {
            ProgressBar::new(0)
        } else {
            ProgressBar::hidden()
        };
        if let Ok(style) = ProgressStyle::default_bar().template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} plumes ({percent}%) | {msg}",
        ) {
            progress_bar.set_style(style.progress_chars("█▉▊▋▌▍▎▏  "));
        }
        Self {
            progress_bar,
            id_field,
        }
    }
}

impl ProgressObserver for ProgressReporter {
    fn enrichment_started(&self, total: usize) {
        self.progress_bar.set_length(total as u64);
        self.progress_bar.set_message("Enriching plumes");
        debug!("Progress bar initialized for {} plumes", total);
    }

    fn record_enriched(&self, _index: usize, record: &Record) {
        if let Some(field) = &self.id_field {
            self.progress_bar.set_message(format!("{} {}", field, record.text(field)));
        }
        self.progress_bar.inc(1);
    }

    fn enrichment_finished(&self) {
        self.progress_bar.finish_with_message("Enrichment complete");
    }

    fn row_skipped(&self, record: &Record, reason: &str) {
        let label = self
            .id_field
            .as_ref()
            .map(|field| record.text(field))
            .unwrap_or_default();
        self.progress_bar
            .println(format!("Skipped row {}: {}", label, reason));
    }
}
