use clap::{Parser, Subcommand};
use coffer::config::{default_config_path, LoggingConfig};
use coffer::types::Timestamp;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing_subscriber::EnvFilter;

pub mod check;
pub mod init;
pub mod status;
pub mod version;

#[derive(Parser)]
#[command(name = "coffer")]
#[command(author = "Coffer Project")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Operator CLI for the Coffer treasury engine", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a commented default configuration file
    Init {
        /// Path to config file (default: ~/.config/coffer/config.toml)
        #[arg(long)]
        config: Option<String>,

        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Validate a configuration file and show the genesis treasury
    Check {
        /// Path to config file (default: ~/.config/coffer/config.toml)
        #[arg(long)]
        config: Option<String>,
    },

    /// Show treasury state from the latest snapshot
    Status {
        /// Path to config file (default: ~/.config/coffer/config.toml)
        #[arg(long)]
        config: Option<String>,

        /// Path to snapshot file (default: ~/.local/share/coffer/treasury.cbor)
        #[arg(long)]
        snapshot: Option<String>,

        /// Number of recent events to show
        #[arg(long, default_value_t = 10)]
        events: usize,

        /// Print the summary and events as JSON
        #[arg(long)]
        json: bool,
    },

    /// Display version information
    Version,
}

pub async fn execute(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Init { config, force } => init::execute(config, force),
        Commands::Check { config } => check::execute(config),
        Commands::Status {
            config,
            snapshot,
            events,
            json,
        } => status::execute(config, snapshot, events, json).await,
        Commands::Version => {
            version::execute();
            Ok(())
        }
    }
}

pub(crate) fn resolve_config_path(config: Option<String>) -> PathBuf {
    config.map(PathBuf::from).unwrap_or_else(default_config_path)
}

pub(crate) fn unix_now() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Install the global subscriber. `RUST_LOG` overrides the configured level.
///
/// A subscriber that is already installed is left in place.
pub(crate) fn init_logging(logging: &LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&logging.level))?;

    let installed = match &logging.file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init(),
    };
    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
    Ok(())
}
