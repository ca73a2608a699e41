//! Todolane - command-line client for the todolane task API.
//!
//! Logs in against the API, keeps the session tokens in the OS keyring and
//! watches the session so an expiring token can be extended in time.

mod cli;
mod commands;

use std::io;
use std::path::Path;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use todolane_core::{ApiError, Config};

use cli::{Cli, Commands};
use commands::Context;

/// File name prefix for rolling log files
const LOG_FILE_PREFIX: &str = "todolane.log";

/// Initialize the tracing subscriber for logging.
///
/// Logs go to stderr unless `log_dir` is set, in which case they go to a
/// daily rolling file there. The returned guard must outlive all logging.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(writer).with_ansi(false))
                .with(filter)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(io::stderr))
                .with(filter)
                .init();
            None
        }
    }
}

#[tokio::main]
async fn main() {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        if e
            .downcast_ref::<ApiError>()
            .is_some_and(ApiError::requires_login)
        {
            eprintln!("Run `todolane login` to start a new session.");
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let _guard = init_tracing(config.log_dir.as_deref());
    info!(command = ?cli.command, "todolane starting");

    let mut ctx = Context::new(config, cli.json)?;
    match cli.command {
        Commands::Login(args) => commands::login(&mut ctx, args).await,
        Commands::Logout => commands::logout(&ctx),
        Commands::Status => commands::status(&ctx),
        Commands::Whoami => commands::whoami(&ctx).await,
        Commands::Register(args) => commands::register(&ctx, args).await,
        Commands::VerifyOtp(args) => commands::verify_otp(&ctx, args).await,
        Commands::ResendOtp(args) => commands::resend_otp(&ctx, args).await,
        Commands::ForgotPassword(args) => commands::forgot_password(&ctx, args).await,
        Commands::ResetPassword(args) => commands::reset_password(&ctx, args).await,
        Commands::Todos(args) => commands::todos(&ctx, args.command).await,
        Commands::Watch => commands::watch(&ctx).await,
    }
}
