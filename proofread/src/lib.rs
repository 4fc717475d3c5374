pub mod analysis;
mod commands;
pub mod config;
pub mod error;
pub mod heuristics;
pub mod metrics;
pub mod monitor;
pub mod network;
pub mod notify;
pub mod permissions;
pub mod pipeline;
mod secure_storage;
pub mod source;
pub mod state;
pub mod store;
pub mod utils;

use anyhow::Context;
use clap::Parser;
use error::AppError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use commands::Cli;

fn default_log_level(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

/// Logs go to stderr so stdout stays clean for reports and JSON.
pub fn init_logging(verbosity: u8) -> Result<(), AppError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_log_level(verbosity)));

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_env_filter(filter)
        .try_init()
        .map_err(|err| AppError::LoggingInit(err.to_string()))
}

fn init_rustls_crypto_provider() {
    if rustls::crypto::CryptoProvider::get_default().is_some() {
        return;
    }

    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        warn!("rustls CryptoProvider was already installed");
    } else {
        info!("rustls CryptoProvider initialized with ring");
    }
}

pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    if let Err(init_err) = init_logging(cli.verbose) {
        eprintln!("logging bootstrap failed: {init_err}");
    }
    init_rustls_crypto_provider();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Runtime(err.to_string()))
        .context("failed to start async runtime")?;

    runtime.block_on(commands::execute(cli.command))
}
