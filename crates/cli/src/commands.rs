use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use lakeshore_core::PipelineConfig;
use lakeshore_pipeline::{build_scheduler, skeleton_from_config, Orchestrator, RunMode};
use lakeshore_storage::{LayoutManager, RetentionManager};
use serde::Serialize;
use tracing::info;

use crate::cli::{RunTarget, StorageCommand};

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub async fn run_pipeline(config: &PipelineConfig, target: RunTarget, shutdown: Arc<AtomicBool>) -> Result<bool> {
    let mode = match target {
        RunTarget::File => RunMode::File,
        RunTarget::Api => RunMode::Api,
        RunTarget::Full => RunMode::Full,
    };
    let orchestrator = Orchestrator::from_config(config, shutdown);
    let report = orchestrator.run(mode).await;
    print_json(&report.summary)?;
    Ok(report.is_success())
}

pub async fn schedule(config: &PipelineConfig, shutdown: Arc<AtomicBool>) -> Result<bool> {
    let orchestrator = Orchestrator::from_config(config, Arc::clone(&shutdown));
    let scheduler = Arc::new(build_scheduler(config, &orchestrator).context("failed to set up scheduler")?);

    let handle = Arc::clone(&scheduler);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, stopping scheduler");
            shutdown.store(true, Ordering::SeqCst);
            handle.shutdown();
        }
    });

    info!(jobs = ?scheduler.job_names(), "Scheduler running, Ctrl-C to stop");
    scheduler.run().await;
    Ok(true)
}

pub fn status(config: &PipelineConfig) -> Result<bool> {
    let orchestrator = Orchestrator::from_config(config, Arc::new(AtomicBool::new(false)));
    print_json(&orchestrator.status())?;
    Ok(true)
}

pub fn storage(config: &PipelineConfig, action: StorageCommand) -> Result<bool> {
    let base = &config.data.base_dir;
    let layout = LayoutManager::new(base);

    match action {
        StorageCommand::Init => {
            let created = layout
                .initialize(&skeleton_from_config(config))
                .context("failed to initialize storage layout")?;
            println!("Initialized {} directories under {}", created.len(), base.display());
            Ok(true)
        }
        StorageCommand::Migrate => {
            let summary = layout.migrate(&config.storage.migrations);
            println!("Migrated {} files, {} failed", summary.migrated.len(), summary.failed);
            Ok(summary.failed == 0)
        }
        StorageCommand::Cleanup { dry_run, execute } => {
            let dry_run = if execute {
                false
            } else {
                dry_run || config.storage.cleanup_dry_run
            };
            let report = RetentionManager::new(base).cleanup(&config.storage.retention_days, dry_run);
            print_json(&report)?;
            Ok(report.failed.is_empty())
        }
        StorageCommand::Stats => {
            print_json(&layout.statistics())?;
            Ok(true)
        }
        StorageCommand::Validate => {
            let report = layout.validate();
            print_json(&report)?;
            Ok(report.valid)
        }
        StorageCommand::Report { output } => {
            let text = layout.report();
            match output {
                Some(path) => {
                    std::fs::write(&path, text)
                        .with_context(|| format!("failed to write report to {}", path.display()))?;
                    println!("Report written to {}", path.display());
                }
                None => println!("{text}"),
            }
            Ok(true)
        }
    }
}
