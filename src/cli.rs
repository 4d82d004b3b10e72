//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::report::OutputFormat;
use clap::Parser;
use std::path::PathBuf;

/// JRscan - tumor-type image classification client
///
/// Send a brain MRI image to a prediction service and display the
/// estimated tumor type. Results are indicative only and never a
/// medical diagnosis.
///
/// Examples:
///   jrscan --image scan.png --consent
///   jrscan --image scan.png --consent --endpoint http://lab:8000/predict
///   jrscan --image scan.jpg --consent --mock --format json --output report.json
///   jrscan --interactive
///   jrscan --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Image to analyze (JPG, PNG or WebP, 10 MiB max)
    #[arg(
        short,
        long,
        value_name = "FILE",
        required_unless_present_any = ["interactive", "init_config"],
        conflicts_with = "interactive"
    )]
    pub image: Option<PathBuf>,

    /// Confirm that the result is not a medical diagnosis
    ///
    /// Analysis never runs without this acknowledgement.
    #[arg(long)]
    pub consent: bool,

    /// Run an interactive session reading commands from stdin
    #[arg(long)]
    pub interactive: bool,

    /// Prediction endpoint URL
    ///
    /// Defaults to http://localhost:8000/predict or the config file value.
    #[arg(long, value_name = "URL", env = "JRSCAN_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Use the built-in mock generator instead of the prediction service
    #[arg(long)]
    pub mock: bool,

    /// Always return this mock record (0, 1 or 2)
    ///
    /// Applies whenever the mock analyzer is active, from --mock or the
    /// config file. Ignored with the prediction service.
    #[arg(long, value_name = "INDEX")]
    pub mock_index: Option<usize>,

    /// Output format (markdown, json)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Export the rendered result to this file
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .jrscan.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// File holding persisted client flags
    #[arg(long, value_name = "FILE")]
    pub state_file: Option<PathBuf>,

    /// Keep client flags in memory only
    #[arg(long, conflicts_with = "state_file")]
    pub no_persist: bool,

    /// Acknowledge the medical disclaimer without displaying it
    #[arg(long)]
    pub accept_disclaimer: bool,

    /// Request timeout in seconds
    ///
    /// By default requests wait as long as the service takes.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .jrscan.toml configuration file
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

        if let Some(ref endpoint) = self.endpoint {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err("Endpoint URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        if let Some(index) = self.mock_index {
            if index > 2 {
                return Err("Mock index must be 0, 1 or 2".to_string());
            }
        }

        if let Some(ref image) = self.image {
            if !image.exists() {
                return Err(format!("Image does not exist: {}", image.display()));
            }
            if !image.is_file() {
                return Err(format!("Image path is not a file: {}", image.display()));
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
