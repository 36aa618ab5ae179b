//! Binary entry point for logdedup.
//!
//! This binary provides the CLI interface for the duplicate detection engine.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use clap::{Parser, Subcommand};
use logdedup::cli;
use logdedup::config::{CONFIG_PATH_ENV, LogdedupConfig};
use logdedup::observability::{self, LoggingConfig};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Logdedup - strips rows already delivered by overlapping CSV log exports.
#[derive(Parser)]
#[command(name = "logdedup")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true, env = CONFIG_PATH_ENV)]
    config: Option<PathBuf>,

    /// Path to the duplicate cache file (overrides configuration).
    #[arg(short, long, global = true)]
    storage: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Remove rows seen in earlier deliveries from a CSV file.
    Dedup {
        /// CSV file to deduplicate ("-" for stdin).
        input: PathBuf,

        /// Write the result here instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show cache statistics as JSON.
    Stats,

    /// Clear the duplicate cache.
    Clear,
}

/// Main entry point.
fn main() -> ExitCode {
    let cli = Cli::parse();

    let (mut config, skipped_config) = match load_config(cli.config.as_deref()) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        },
    };
    if let Some(storage) = cli.storage.clone() {
        config = config.with_storage_path(storage);
    }

    let logging = LoggingConfig::from_settings(Some(&config.logging), cli.verbose);
    if let Err(e) = observability::init(logging) {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }
    if let Some(e) = skipped_config {
        tracing::warn!(error = %e, "Ignoring unreadable configuration file");
    }

    match run_command(cli.command, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        },
    }
}

/// Runs the selected command.
fn run_command(command: Commands, config: &LogdedupConfig) -> logdedup::Result<()> {
    match command {
        Commands::Dedup { input, output } => {
            let report = cli::dedup::execute(config, &input, output.as_deref())?;
            eprintln!("{}", cli::dedup::summary(&report));
            report.flush_error.map_or(Ok(()), Err)
        },

        Commands::Stats => cli::stats::execute(config, &mut std::io::stdout().lock()),

        Commands::Clear => {
            let dropped = cli::clear::execute(config)?;
            eprintln!(
                "Cleared {dropped} cached row hashes from {}",
                config.dedup.storage_path.display()
            );
            Ok(())
        },
    }
}

/// Loads configuration.
///
/// An explicit path must load. The default location is best effort; the
/// second value is the error from a default file that was skipped.
fn load_config(
    path: Option<&Path>,
) -> logdedup::Result<(LogdedupConfig, Option<logdedup::Error>)> {
    match path {
        Some(config_path) if !config_path.as_os_str().is_empty() => {
            LogdedupConfig::load_from_file(config_path).map(|config| (config, None))
        },
        _ => Ok(LogdedupConfig::load_default()),
    }
}
