//! Command-line interface components.

use crate::config::PipelineConfig;
use crate::constants::{DEFAULT_MIN_PPMM, default_plume_file_pattern};
use crate::error::PlumeError;
use crate::models::ProcessingStats;
use crate::processor::PlumeProcessor;
use crate::processor::discovery::PlumeFileDiscovery;
use crate::progress::ProgressReporter;
use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use std::path::PathBuf;
use tracing::{debug, info, warn};

#[derive(Parser, Debug, Clone)]
#[command(name = "plume-processor")]
#[command(about = "Add wind statistics and emission rates to plume lists and merge them into a plume table")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Args {
    /// Plume list to process (repeatable); the path must contain minppmm<digits>
    #[arg(short = 'i', long = "infile", value_name = "PATH")]
    pub infile: Vec<PathBuf>,

    /// Directory to scan once for plume lists matching --regex
    #[arg(short = 'p', long = "plumedir", value_name = "DIR")]
    pub plume_dir: Option<PathBuf>,

    /// Pattern for plume lists, relative to --plumedir
    #[arg(short = 'r', long = "regex", default_value_t = default_plume_file_pattern(DEFAULT_MIN_PPMM))]
    pub regex: String,

    /// Path to the wind data directory (one subdirectory per wind source)
    #[arg(short = 'w', long = "windir", value_name = "DIR")]
    pub wind_dir: PathBuf,

    /// Path to the output plume table
    #[arg(short = 'o', long = "outfile", value_name = "PATH")]
    pub output_path: PathBuf,

    /// Force reprocessing: replace rows already in the table for the same plumes
    #[arg(short, long)]
    pub force: bool,

    /// TOML configuration file
    #[arg(short = 'c', long = "config", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    /// Fill value for unavailable wind data
    #[arg(long, allow_negative_numbers = true)]
    pub fill: Option<f64>,

    /// Field used to sort the output table
    #[arg(long, value_name = "FIELD")]
    pub sort_key: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Only log warnings and errors, no progress bar
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Args {
    /// Log level implied by the verbosity flags
    pub fn get_log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "warn"
        } else {
            "info"
        }
    }
}

/// Set up structured logging based on CLI arguments
///
/// Quiet runs log compact lines without timestamps; otherwise every line
/// carries the time since start.
pub fn setup_logging(args: &Args) {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let log_level = args.get_log_level();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("plume_processor={}", log_level)));

    let compact = args.quiet.then(|| {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .compact()
    });
    let timed = (!args.quiet).then(|| {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .with_timer(fmt::time::uptime())
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(compact)
        .with(timed)
        .init();

    debug!("Logging initialized at level: {}", log_level);
}

/// Load configuration using layered approach (defaults -> file -> args)
pub fn load_configuration(args: &Args) -> Result<PipelineConfig> {
    let mut config = match &args.config_file {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => PipelineConfig::default(),
    };

    if let Some(fill) = args.fill {
        config = config.with_fill_value(Some(fill));
    }
    if let Some(sort_key) = &args.sort_key {
        config = config.with_output_sort_key(Some(sort_key.clone()));
    }
    if args.force {
        config = config.with_force_reprocess();
    }

    config.validate()?;
    Ok(config)
}

/// Explicit input files followed by any found under --plumedir
pub fn collect_input_files(args: &Args) -> Result<Vec<PathBuf>> {
    let mut files = args.infile.clone();

    if let Some(plume_dir) = &args.plume_dir {
        let discovery = PlumeFileDiscovery::new(plume_dir, &args.regex)?;
        let found = discovery
            .discover()
            .with_context(|| format!("Failed to scan {}", plume_dir.display()))?;
        info!("Found {} plume file(s) in {}", found.len(), plume_dir.display());
        for path in found {
            if !files.contains(&path) {
                files.push(path);
            }
        }
    }

    Ok(files)
}

/// Run the pipeline without touching global logging state
///
/// Returns `None` when there was nothing to process or an input file was
/// missing; both are reported and are not failures.
pub fn execute(args: &Args) -> Result<Option<ProcessingStats>> {
    let config = load_configuration(args)?;
    let input_files = collect_input_files(args)?;

    if input_files.is_empty() {
        warn!("Nothing to do");
        return Ok(None);
    }

    let reporter = ProgressReporter::new(!args.quiet, config.output_sort_key.clone());
    let processor = PlumeProcessor::new(&args.wind_dir, &args.output_path, config);

    match processor.process(&input_files, Some(&reporter)) {
        Ok(stats) => Ok(Some(stats)),
        Err(PlumeError::FileNotFound { path }) => {
            println!("{} {}", "Could not find file:".bright_red(), path.display());
            Ok(None)
        }
        Err(error) => Err(error).context("Plume processing failed"),
    }
}

/// Main command entry point
pub fn run(args: Args) -> Result<Option<ProcessingStats>> {
    setup_logging(&args);

    let stats = execute(&args)?;
    if let Some(stats) = &stats {
        if !args.quiet {
            print_summary(stats);
        }
    }
    Ok(stats)
}

/// Print the end-of-run report
fn print_summary(stats: &ProcessingStats) {
    println!("\n{}", "Processing Summary".bright_green().bold());
    println!(
        "  {} {}ms",
        "Time elapsed:".bright_cyan(),
        stats.processing_time_ms.to_string().bright_white()
    );
    println!(
        "  {} {}",
        "Plume files:".bright_cyan(),
        stats.files_loaded.to_string().bright_white()
    );
    println!(
        "  {} {}",
        "Plumes enriched:".bright_cyan(),
        stats.records_enriched.to_string().bright_white().bold()
    );
    println!(
        "  {} {}",
        "Rows written:".bright_cyan(),
        stats.rows_written.to_string().bright_white().bold()
    );
    if stats.duplicates_dropped > 0 {
        println!(
            "  {} {}",
            "Already present:".bright_cyan(),
            stats.duplicates_dropped.to_string().bright_white()
        );
    }
    if stats.rows_replaced > 0 {
        println!(
            "  {} {}",
            "Rows replaced:".bright_cyan(),
            stats.rows_replaced.to_string().bright_white()
        );
    }
    if stats.rows_skipped > 0 {
        println!(
            "  {} {}",
            "Rows skipped:".bright_red(),
            stats.rows_skipped.to_string().bright_red().bold()
        );
    }
    println!(
        "  {} {}",
        "Output:".bright_cyan(),
        stats.output_path.display()
    );
    if let Some(backup) = &stats.backup_path {
        println!("  {} {}", "Backup:".bright_cyan(), backup.display());
    }
}
