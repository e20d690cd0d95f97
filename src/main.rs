//! AlertSplit - vehicle alert splitter and reporter
//!
//! A CLI tool that partitions a delimited alert export into one
//! spreadsheet per operating-post group and renders a composite
//! report of the result.
//!
//! Exit codes:
//!   0 - Success (including a report with no data)
//!   1 - Runtime error or invalid arguments
//!   2 - The input was read but no group produced an artifact

mod analysis;
mod cli;
mod config;
mod export;
mod input;
mod models;
mod partition;
mod report;

use anyhow::{Context, Result};
use cli::Args;
use config::{Config, DEFAULT_CONFIG_FILE};
use partition::{NoProgress, ProgressBarObserver, ProgressObserver};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

fn main() {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        if let Err(e) = handle_init_config() {
            eprintln!("❌ Error: {:#}", e);
            std::process::exit(1);
        }
        return;
    }

    init_logging(&args);

    info!("AlertSplit v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run(args) {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(e) => {
            error!("Run failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .alertsplit.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(DEFAULT_CONFIG_FILE);

    if path.exists() {
        anyhow::bail!(
            "{} already exists. Remove it first or edit it manually.",
            DEFAULT_CONFIG_FILE
        );
    }

    let content = Config::default_toml()?;
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", DEFAULT_CONFIG_FILE);
    println!("   Edit it to customize groups, removed columns, colors, and more.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run the partitioner and the report. Returns the exit code (0 or 2).
fn run(args: Args) -> Result<i32> {
    let start_time = Instant::now();

    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    for (code, groups) in config.overlapping_codes() {
        warn!("Code {} is listed in {}; its records go to each", code, groups.join(", "));
    }

    let input_path = args
        .input
        .clone()
        .context("An input file is required")?;

    // Step 1: Split the input by group
    println!("📥 Processing: {}", input_path.display());
    let bar = (!args.quiet).then(ProgressBarObserver::new);
    let observer: &dyn ProgressObserver = match bar {
        Some(ref bar) => bar,
        None => &NoProgress,
    };
    let outcome = partition::process_file(&input_path, &config, observer);
    if let Some(bar) = bar {
        bar.finish();
    }

    if let Some(reason) = outcome.failure {
        anyhow::bail!("Failed to process {}: {}", input_path.display(), reason);
    }

    let artifacts = outcome.artifacts;
    if artifacts.is_empty() {
        println!("\n⚠️  No group matched any record. No files were generated.");
        return Ok(2);
    }

    println!("\n📁 Generated {} file(s):", artifacts.len());
    for artifact in &artifacts {
        println!("   📄 {} ({} records)", artifact.path.display(), artifact.rows);
    }

    // Step 2: Render the report
    if !args.no_report {
        println!("\n📊 Generating report...");
        let paths: Vec<PathBuf> = artifacts.iter().map(|a| a.path.clone()).collect();
        let output = args.report.as_deref();

        let rendered = match args.summary_json {
            Some(ref summary_path) => match report::prepare(&paths, &config) {
                Some(data) => {
                    write_summary(&data, summary_path)?;
                    println!("   Summary saved to: {}", summary_path.display());
                    report::render_report(&data, &config, output)
                }
                None => None,
            },
            None => report::render(&paths, &config, output),
        };

        match rendered {
            Some(path) => println!("   Report saved to: {}", path.display()),
            None => println!("   ⚠️  No report generated (no data or render failure, see log)."),
        }
    }

    println!("\n✅ Done in {:.1}s", start_time.elapsed().as_secs_f64());
    Ok(0)
}

/// Write the report statistics as pretty JSON.
fn write_summary(data: &analysis::ReportData, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(data).context("Failed to serialize summary")?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write summary to {}", path.display()))?;
    Ok(())
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", DEFAULT_CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {:#}", e);
            Ok(Config::default())
        }
    }
}
