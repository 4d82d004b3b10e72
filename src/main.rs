//! JRscan - tumor-type image classification client
//!
//! A CLI tool that sends a brain MRI image to a prediction service and
//! displays the estimated tumor type with its confidence, an explanation
//! and the mandatory medical disclaimers.
//!
//! Exit codes:
//!   0 - A result was displayed (or the interactive session ended normally)
//!   1 - Validation, consent, analysis or runtime failure

mod analyzer;
mod cli;
mod config;
mod disclaimer;
mod models;
mod report;
mod session;
mod upload;

use analyzer::Analyzer;
use anyhow::{Context, Result};
use cli::Args;
use config::{Config, CONFIG_FILE_NAME};
use disclaimer::{DisclaimerGate, JsonFileStore, KeyValueStore, MemoryStore};
use session::{Session, SessionOptions, ViewController};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;
use upload::UploadPolicy;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Load configuration before logging so [general] verbose applies
    let (mut config, source) = match load_config(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);

    // Initialize logging
    init_logging(config.log_level(&args));

    info!("JRscan v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    match source {
        ConfigSource::File(path) => info!("Loaded config from: {}", path.display()),
        ConfigSource::Defaults => debug!("No config file found, using defaults"),
        ConfigSource::Invalid(reason) => warn!("Failed to load config: {}", reason),
    }

    match run(args, config).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Run failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .jrscan.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to set the prediction endpoint, timeout and upload limits.");
    Ok(())
}

/// Initialize logging at the given level.
fn init_logging(level: tracing::Level) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run a one-shot or interactive session. Returns the exit code.
async fn run(args: Args, config: Config) -> Result<i32> {
    let analyzer = build_analyzer(&args, &config)?;
    let store = build_store(&args, &config)?;
    let gate = DisclaimerGate::load(store)?;

    let options = SessionOptions {
        format: config.general.format,
        output: config.general.output.as_ref().map(PathBuf::from),
        show_progress: !args.quiet,
        accept_disclaimer: args.accept_disclaimer,
    };
    let controller = ViewController::new(UploadPolicy::from(&config.upload));
    let mut session = Session::new(controller, analyzer, gate, options);

    let mut stdout = std::io::stdout();

    if args.interactive {
        println!("🧠 JRscan interactive session");
        let input = tokio::io::BufReader::new(tokio::io::stdin());
        session.run_interactive(input, &mut stdout).await?;
        return Ok(0);
    }

    let image = args
        .image
        .as_deref()
        .context("An image is required outside interactive mode")?;
    let exit_code = session.run_once(image, args.consent, &mut stdout).await?;
    debug!(
        "Finished in state {} (disclaimer acknowledged: {})",
        session.controller().state(),
        session.disclaimer().has_seen()
    );

    if exit_code == 0 {
        println!("\n✅ Analysis complete.");
    }
    Ok(exit_code)
}

/// Build the analyzer and announce which back-end is in use.
fn build_analyzer(args: &Args, config: &Config) -> Result<Box<dyn Analyzer>> {
    let analyzer = analyzer::build_analyzer(&config.client, args.mock_index)?;

    if config.client.mock {
        println!("🤖 Using the built-in mock analyzer (no prediction service).");
    } else {
        println!("🤖 Prediction service: {}", config.client.endpoint);
        if let Some(timeout) = config.client.timeout_seconds {
            println!("   Timeout: {}s", timeout);
        }
    }
    Ok(analyzer)
}

/// Open the store holding the disclaimer flag.
fn build_store(args: &Args, config: &Config) -> Result<Box<dyn KeyValueStore>> {
    if args.no_persist {
        debug!("Client flags kept in memory only");
        return Ok(Box::new(MemoryStore::new()));
    }

    let path = match config.disclaimer.state_file {
        Some(ref path) => PathBuf::from(path),
        None => JsonFileStore::default_path()?,
    };

    match JsonFileStore::open(&path) {
        Ok(store) => {
            debug!("Client flags stored in {}", store.path().display());
            Ok(Box::new(store))
        }
        Err(e) => {
            warn!("{:#}; falling back to in-memory flags", e);
            Ok(Box::new(MemoryStore::new()))
        }
    }
}

/// Where the configuration came from, logged once logging is up.
enum ConfigSource {
    File(PathBuf),
    Defaults,
    Invalid(String),
}

/// Load configuration from file or use defaults.
///
/// An explicit `--config` must parse; a broken default file falls back to
/// the built-in settings.
fn load_config(args: &Args) -> Result<(Config, ConfigSource)> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        let config = Config::load(config_path)?;
        return Ok((config, ConfigSource::File(config_path.clone())));
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => Ok((config, ConfigSource::File(PathBuf::from(CONFIG_FILE_NAME)))),
        Ok(None) => Ok((Config::default(), ConfigSource::Defaults)),
        Err(e) => Ok((Config::default(), ConfigSource::Invalid(format!("{:#}", e)))),
    }
}
