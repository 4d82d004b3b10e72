//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.jrscan.toml` files.

use crate::report::OutputFormat;
use crate::upload::{ACCEPTED_TYPES, MAX_FILE_SIZE};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = ".jrscan.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Prediction service settings.
    #[serde(default)]
    pub client: ClientConfig,

    /// Upload validation settings.
    #[serde(default)]
    pub upload: UploadConfig,

    /// Disclaimer persistence settings.
    #[serde(default)]
    pub disclaimer: DisclaimerConfig,
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Format used to print and export results.
    #[serde(default)]
    pub format: OutputFormat,

    /// Export path applied after each successful analysis.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

/// Prediction service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// URL of the prediction endpoint.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Request timeout in seconds. Unset means no timeout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,

    /// Use the mock generator instead of the service.
    #[serde(default)]
    pub mock: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout_seconds: None,
            mock: false,
        }
    }
}

fn default_endpoint() -> String {
    crate::analyzer::remote::DEFAULT_ENDPOINT.to_string()
}

/// Upload validation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Maximum image size in bytes (inclusive).
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    /// Accepted MIME types.
    #[serde(default = "default_accepted_types")]
    pub accepted_types: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size: default_max_file_size(),
            accepted_types: default_accepted_types(),
        }
    }
}

fn default_max_file_size() -> u64 {
    MAX_FILE_SIZE
}

fn default_accepted_types() -> Vec<String> {
    ACCEPTED_TYPES.iter().map(|t| t.to_string()).collect()
}

/// Disclaimer persistence settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DisclaimerConfig {
    /// State file path. Defaults to the local data directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_file: Option<String>,
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE_NAME);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// Only explicitly provided values override the file.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref endpoint) = args.endpoint {
            self.client.endpoint = endpoint.clone();
        }
        if let Some(timeout) = args.timeout {
            self.client.timeout_seconds = Some(timeout);
        }
        if args.mock {
            self.client.mock = true;
        }

        if let Some(format) = args.format {
            self.general.format = format;
        }
        if let Some(ref output) = args.output {
            self.general.output = Some(output.display().to_string());
        }
        if args.verbose {
            self.general.verbose = true;
        }

        if let Some(ref state_file) = args.state_file {
            self.disclaimer.state_file = Some(state_file.display().to_string());
        }
    }

    /// Log level for the run: `--quiet` wins, then `-v` or
    /// `[general] verbose`, then INFO.
    pub fn log_level(&self, args: &crate::cli::Args) -> tracing::Level {
        if !args.quiet && self.general.verbose {
            tracing::Level::DEBUG
        } else {
            args.log_level()
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
