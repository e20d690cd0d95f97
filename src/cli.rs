//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::PathBuf;

/// AlertSplit - split vehicle alert exports by operating post
///
/// Reads a delimited alert export, writes one spreadsheet per operating
/// post (PA) group and renders a composite report with category, volume,
/// driver and temporal trend panels.
///
/// Examples:
///   alertsplit alertas.csv
///   alertsplit alertas.csv --top-drivers 10 --report ./relatorio.png
///   alertsplit alertas.csv --no-report
///   alertsplit alertas.csv --summary-json resumo.json
///   alertsplit --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Delimited alert export to process
    ///
    /// Not required when using --init-config.
    #[arg(value_name = "INPUT", required_unless_present = "init_config")]
    pub input: Option<PathBuf>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .alertsplit.toml in the current directory
    #[arg(short, long, value_name = "FILE", env = "ALERTSPLIT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Number of drivers in the ranking panels
    ///
    /// Overrides [report].top_drivers from the config file.
    #[arg(long, value_name = "N")]
    pub top_drivers: Option<usize>,

    /// Output file for the report image
    ///
    /// Defaults to the downloads folder.
    #[arg(long, value_name = "FILE", conflicts_with = "no_report")]
    pub report: Option<PathBuf>,

    /// Only write the group spreadsheets, skip the report
    #[arg(long)]
    pub no_report: bool,

    /// Also write the report statistics as JSON
    #[arg(long, value_name = "FILE", conflicts_with = "no_report")]
    pub summary_json: Option<PathBuf>,

    /// Generate a default .alertsplit.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        match self.input {
            Some(ref input) if !input.is_file() => {
                return Err(format!("Input file does not exist: {}", input.display()));
            }
            None => return Err("An input file is required".to_string()),
            _ => {}
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if self.top_drivers == Some(0) {
            return Err("Top drivers must be at least 1".to_string());
        }

        if let Some(ref config) = self.config {
            if !config.exists() {
                return Err(format!("Config file does not exist: {}", config.display()));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn make_args(input: PathBuf) -> Args {
        Args {
            input: Some(input),
            config: None,
            verbose: false,
            quiet: false,
            top_drivers: None,
            report: None,
            no_report: false,
            summary_json: None,
            init_config: false,
        }
    }

    #[test]
    fn test_validation_accepts_existing_input() {
        let file = NamedTempFile::new().unwrap();
        assert!(make_args(file.path().to_path_buf()).validate().is_ok());
    }

    #[test]
    fn test_validation_missing_input() {
        let args = make_args(PathBuf::from("/definitely/not/here.csv"));
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let file = NamedTempFile::new().unwrap();
        let mut args = make_args(file.path().to_path_buf());
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_zero_top_drivers() {
        let file = NamedTempFile::new().unwrap();
        let mut args = make_args(file.path().to_path_buf());
        args.top_drivers = Some(0);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_init_config_skips_validation() {
        let mut args = make_args(PathBuf::from("missing.csv"));
        args.input = None;
        args.init_config = true;
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_parse_from_command_line() {
        let args = Args::try_parse_from(["alertsplit", "alertas.csv", "--top-drivers", "3", "-v"]).unwrap();
        assert_eq!(args.input, Some(PathBuf::from("alertas.csv")));
        assert_eq!(args.top_drivers, Some(3));
        assert!(args.verbose);

        assert!(Args::try_parse_from(["alertsplit"]).is_err());
        assert!(Args::try_parse_from(["alertsplit", "--init-config"]).is_ok());
        assert!(Args::try_parse_from(["alertsplit", "a.csv", "--no-report", "--report", "r.png"]).is_err());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args(PathBuf::from("a.csv"));
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }
}
