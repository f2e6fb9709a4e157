//! Command-line interface for survey-export
//!
//! This module handles:
//! - Command-line argument parsing using clap
//! - Configuration loading and CLI overrides
//! - The result line reported on success

use clap::Parser;
use std::path::PathBuf;

use crate::config::{Config, LogLevel};
use crate::error::Result;

/// Survey response exporter
#[derive(Parser, Debug)]
#[command(
    name = "survey-export",
    version,
    about = "Export survey responses to CSV, KML or Shapefile archives",
    long_about = "Streams the entries of one survey out of MongoDB, encodes them in the
requested format and uploads the result to blob storage."
)]
pub struct CliArgs {
    /// Job descriptor as JSON
    ///
    /// Example: {"survey":"abc","bucket":"exports","s3Object":"abc/out.csv"}
    #[arg(value_name = "JOB")]
    pub job: String,

    /// Export mode (csv, kml, shapefile, sqlite); overrides the descriptor
    #[arg(short = 'm', long, value_name = "MODE")]
    pub mode: Option<String>,

    /// Configuration file path
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Quiet mode (errors only)
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Verbose mode (detailed logging)
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Very verbose mode (debug logging)
    #[arg(long = "vv")]
    pub very_verbose: bool,
}

/// CLI interface handler
pub struct CliInterface {
    /// Parsed command-line arguments
    args: CliArgs,

    /// Loaded configuration
    config: Config,
}

impl CliInterface {
    /// Parse the process arguments and load the configuration
    ///
    /// # Returns
    /// * `Result<Self>` - New CLI interface or error
    pub fn new() -> Result<Self> {
        Self::from_args(CliArgs::parse())
    }

    /// Build the interface from already parsed arguments
    pub fn from_args(args: CliArgs) -> Result<Self> {
        let mut config = Config::load(args.config_file.as_deref())?;
        Self::apply_logging_args(&mut config, &args);
        Ok(Self { args, config })
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the CLI arguments
    pub fn args(&self) -> &CliArgs {
        &self.args
    }

    /// Apply logging-related CLI arguments to configuration
    fn apply_logging_args(config: &mut Config, args: &CliArgs) {
        config.logging.level = if args.very_verbose {
            LogLevel::Trace
        } else if args.verbose {
            LogLevel::Debug
        } else if args.quiet {
            LogLevel::Error
        } else {
            config.logging.level
        };
    }

    /// Sanitize URI by hiding credentials
    ///
    /// # Arguments
    /// * `uri` - The URI to sanitize
    ///
    /// # Returns
    /// * `String` - URI with everything between `://` and `@` replaced
    pub fn sanitize_uri(uri: &str) -> String {
        if let (Some(proto_end), Some(host_start)) = (uri.find("://"), uri.rfind('@')) {
            if host_start > proto_end {
                return format!("{}***{}", &uri[..proto_end + 3], &uri[host_start..]);
            }
        }
        uri.to_string()
    }
}

/// Line written to stdout when an export succeeds
pub fn result_line() -> String {
    serde_json::json!({ "type": "result", "data": null }).to_string()
}
