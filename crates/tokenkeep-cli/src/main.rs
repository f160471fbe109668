//! tokenkeep - command-line frontend for a tokenkeep session.
//!
//! Each invocation hydrates the persisted session, runs one command
//! (status, login, register, logout, refresh, passwd, profile) and exits.

mod app;
mod cli;

use std::io;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tokenkeep_core::Config;

use app::App;
use cli::Cli;

/// Initialize the tracing subscriber for logging
fn init_tracing(verbosity: u8) {
    // RUST_LOG wins over -v when set
    let default_level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr).with_target(false))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = Config::load()?;
    if let Some(url) = cli.api_url {
        config.api_base_url = url;
    }
    info!(api = %config.api_base_url, "tokenkeep starting");

    let app = App::new(&config)?;
    app.run(cli.command).await
}
