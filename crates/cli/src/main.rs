mod cli;
mod commands;

use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use lakeshore_core::{config::load_dotenv, PipelineConfig};
use tracing::{error, info};

use crate::cli::{CliArgs, Command};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    load_dotenv();
    let args = CliArgs::parse();

    match run(args).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!(error = %format!("{e:#}"), "lakeshore failed");
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Returns whether the command fully succeeded.
async fn run(args: CliArgs) -> Result<bool> {
    let config = PipelineConfig::load(&args.config)
        .with_context(|| format!("failed to load configuration from {}", args.config.display()))?;

    let shutdown = Arc::new(AtomicBool::new(false));

    match args.command {
        Command::Run { target } => {
            watch_ctrl_c(Arc::clone(&shutdown));
            let ok = commands::run_pipeline(&config, target, Arc::clone(&shutdown)).await?;
            if shutdown.load(Ordering::SeqCst) {
                info!("Interrupted, exiting");
                return Ok(true);
            }
            Ok(ok)
        }
        Command::Schedule => commands::schedule(&config, shutdown).await,
        Command::Status => commands::status(&config),
        Command::Storage { action } => commands::storage(&config, action),
    }
}

fn watch_ctrl_c(flag: Arc<AtomicBool>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, finishing current step");
            flag.store(true, Ordering::SeqCst);
        }
    });
}
