//! shellcache - drive the offline cache and update engine from a terminal.
//!
//! Each subcommand is one worker or page event run against the on-disk
//! cache store, so install, activate, fetch and apply can be exercised and
//! inspected step by step.

mod cli;
mod commands;
mod host;

use std::io;
use std::path::Path;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::{Cli, Command};
use commands::Engine;

/// Log file name prefix inside `--log-dir`
const LOG_FILE_PREFIX: &str = "shellcache.log";

/// Initialize the tracing subscriber for logging.
///
/// `RUST_LOG` controls the level unless `-v` flags are given. The returned
/// guard must live until exit so buffered file output is flushed.
fn init_tracing(verbose: u8, log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let _guard = init_tracing(cli.verbose, cli.log_dir.as_deref());
    info!("shellcache starting");

    let config = cli.config.as_deref();
    match cli.command {
        Command::Init { force } => commands::run_init(config, force),
        Command::Install => commands::run_install(&Engine::load(config)?).await,
        Command::Activate => commands::run_activate(&Engine::load(config)?).await,
        Command::Fetch(args) => commands::run_fetch(&Engine::load(config)?, &args).await,
        Command::Status => commands::run_status(&Engine::load(config)?).await,
        Command::Check { force } => commands::run_check(&Engine::load(config)?, force).await,
        Command::Apply { location } => commands::run_apply(&Engine::load(config)?, location).await,
        Command::Push { payload } => commands::run_push(&Engine::load(config)?, &payload).await,
        Command::Watch { location } => commands::run_watch(&Engine::load(config)?, location).await,
    }
}
