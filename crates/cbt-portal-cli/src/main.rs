//! CBT Portal CLI - session management and course/department browsing
//! against the portal's REST backend.

mod commands;

use std::io;
use std::process::ExitCode;

use anyhow::Result;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cbt_portal_core::auth::{self, SessionStore};
use cbt_portal_core::{ApiClient, ApiError, Config};

use commands::Command;

/// Initialize the tracing subscriber for logging.
///
/// `RUST_LOG` controls the level (default `warn`). With `CBT_LOG_DIR` set,
/// logs also go to a daily rolling file there.
fn init_tracing() -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let stderr_layer = fmt::layer().with_writer(io::stderr);

    match std::env::var("CBT_LOG_DIR") {
        Ok(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "cbt-portal.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(stderr_layer)
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .with(filter)
                .init();
            Some(guard)
        }
        Err(_) => {
            tracing_subscriber::registry()
                .with(stderr_layer)
                .with(filter)
                .init();
            None
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();
    let _log_guard = init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match Command::parse(&args) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("Error: {}\n", e);
            eprintln!("{}", commands::USAGE);
            return ExitCode::from(2);
        }
    };

    match run(command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if matches!(e.downcast_ref::<ApiError>(), Some(ApiError::AuthExpired)) {
                eprintln!("Your session has expired. Run `cbt-portal login` to sign in again.");
            } else {
                eprintln!("Error: {:#}", e);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command) -> Result<()> {
    if let Command::Help = command {
        println!("{}", commands::USAGE);
        return Ok(());
    }

    let mut config = Config::load_with_env()?;
    info!(base_url = %config.base_url(), storage = ?config.session_storage, "CBT portal CLI starting");

    // Rehydrate before any authenticated call
    let session = SessionStore::open(auth::storage_for(&config)?);
    let client = ApiClient::new(&config, session)?;

    let result = commands::dispatch(command, &client, &mut config).await;
    // Session writes run in the background; land the last one before exit
    client.session().flush().await;
    result
}
