//! Built-in scheduled jobs and the scheduler wiring for them.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError};
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use lakeshore_core::config::JobScheduleConfig;
use lakeshore_core::{PipelineConfig, Tier};
use lakeshore_ingest::IngestionJob;
use lakeshore_scheduler::{JobOutcome, JobScheduler, JobState, ScheduledJob, SharedSchedulerState, Trigger};
use lakeshore_storage::{prune_dated_files, LayoutManager, RetentionManager};
use serde_json::json;
use tracing::{info, warn};

use crate::orchestrator::Orchestrator;

/// Runs an ingestion job on schedule; a failed source is a logical failure.
pub struct IngestionTask {
    name: String,
    job: Arc<dyn IngestionJob>,
}

impl IngestionTask {
    pub fn new(name: &str, job: Arc<dyn IngestionJob>) -> Self {
        Self {
            name: name.to_string(),
            job,
        }
    }
}

#[async_trait]
impl ScheduledJob for IngestionTask {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self) -> anyhow::Result<JobOutcome> {
        let results = self
            .job
            .run()
            .await
            .with_context(|| format!("{} could not start", self.name))?;

        let failed: Vec<&str> = results
            .iter()
            .filter(|r| !r.is_success())
            .map(|r| r.data_type.as_str())
            .collect();
        let summary = json!({
            "sources": results.len(),
            "failed_sources": failed,
            "records": results.iter().map(|r| r.records_count).sum::<usize>(),
        });
        Ok(if failed.is_empty() {
            JobOutcome::success(summary)
        } else {
            JobOutcome::failure(summary)
        })
    }
}

/// Logs tier sizes and the jobs that ran in the last hour.
pub struct HealthCheckJob {
    layout: LayoutManager,
    state: SharedSchedulerState,
}

impl HealthCheckJob {
    pub fn new(layout: LayoutManager, state: SharedSchedulerState) -> Self {
        Self { layout, state }
    }
}

#[async_trait]
impl ScheduledJob for HealthCheckJob {
    fn name(&self) -> &str {
        "health_check"
    }

    async fn run(&self) -> anyhow::Result<JobOutcome> {
        let layout = self.layout.clone();
        let stats = tokio::task::spawn_blocking(move || layout.statistics())
            .await
            .context("storage statistics task failed")?;

        let mut tiers = serde_json::Map::new();
        for (tier, tier_stats) in &stats.tiers {
            let mb = tier_stats.size_bytes as f64 / 1024.0 / 1024.0;
            info!(tier = %tier, size_mb = mb, files = tier_stats.file_count, "Tier size");
            tiers.insert(tier.to_string(), json!(tier_stats));
        }

        let cutoff = Utc::now() - chrono::Duration::hours(1);
        let recent: BTreeMap<String, JobState> = {
            let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
            state
                .jobs
                .iter()
                .filter(|(_, s)| s.last_start.is_some_and(|t| t >= cutoff))
                .map(|(name, s)| (name.clone(), s.status))
                .collect()
        };
        info!(recent_jobs = recent.len(), "Jobs run in the last hour");
        for (name, status) in &recent {
            info!(job = %name, status = ?status, "Recent job");
        }

        Ok(JobOutcome::success(json!({
            "total_bytes": stats.total_bytes,
            "tiers": tiers,
            "recent_jobs": recent,
        })))
    }
}

/// Applies the retention policy to the lake tiers and, with the `metadata`
/// tier's age limit, to the run metadata directory. Any failed deletion makes
/// the run a failure.
pub struct RetentionCleanupJob {
    manager: RetentionManager,
    retention: BTreeMap<Tier, u32>,
    dry_run: bool,
    metadata_dir: Option<PathBuf>,
}

impl RetentionCleanupJob {
    pub fn new(manager: RetentionManager, retention: BTreeMap<Tier, u32>, dry_run: bool) -> Self {
        Self {
            manager,
            retention,
            dry_run,
            metadata_dir: None,
        }
    }

    pub fn with_metadata_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.metadata_dir = Some(dir.into());
        self
    }
}

#[async_trait]
impl ScheduledJob for RetentionCleanupJob {
    fn name(&self) -> &str {
        "retention_cleanup"
    }

    async fn run(&self) -> anyhow::Result<JobOutcome> {
        let manager = self.manager.clone();
        let retention = self.retention.clone();
        let dry_run = self.dry_run;
        let metadata_dir = self.metadata_dir.clone();
        let (report, metadata) = tokio::task::spawn_blocking(move || {
            let now = Utc::now();
            let report = manager.cleanup_at(now, &retention, dry_run);
            let metadata = match (metadata_dir, retention.get(&Tier::Metadata)) {
                (Some(dir), Some(&days)) => Some(prune_dated_files(&dir, days, now, dry_run)),
                _ => None,
            };
            (report, metadata)
        })
        .await
        .context("retention task failed")?;

        let metadata_failed = metadata.as_ref().map_or(0, |m| m.failed.len());
        let summary = json!({
            "dry_run": report.dry_run,
            "candidates": report.candidates.len(),
            "total_bytes": report.total_bytes,
            "deleted": report.deleted.len(),
            "failed": report.failed.len(),
            "metadata_files": metadata.as_ref().map(|m| json!({
                "candidates": m.candidates.len(),
                "deleted": m.deleted.len(),
                "failed": m.failed.len(),
            })),
        });
        Ok(if report.failed.is_empty() && metadata_failed == 0 {
            JobOutcome::success(summary)
        } else {
            JobOutcome::failure(summary)
        })
    }
}

fn schedule_trigger(name: &str, schedule: &JobScheduleConfig) -> anyhow::Result<Trigger> {
    Trigger::parse(name, schedule.interval.as_deref(), schedule.start_time.as_deref())
        .with_context(|| format!("invalid schedule for {name}"))
}

/// Register every enabled built-in job from `config`.
pub fn build_scheduler(config: &PipelineConfig, orchestrator: &Orchestrator) -> anyhow::Result<JobScheduler> {
    let sched = &config.scheduling;
    let mut scheduler = JobScheduler::new(Duration::from_secs(sched.tick_secs))
        .with_status_file(&config.data.status_file);

    for (name, schedule, job) in [
        ("file_ingestion", &sched.file_ingestion, orchestrator.file_job()),
        ("api_ingestion", &sched.api_ingestion, orchestrator.api_job()),
    ] {
        if !schedule.enabled {
            info!(job = name, "Job disabled");
            continue;
        }
        let Some(job) = job else {
            warn!(job = name, "Ingester not initialized, job not scheduled");
            continue;
        };
        scheduler.register(Arc::new(IngestionTask::new(name, job)), schedule_trigger(name, schedule)?)?;
    }

    let health = HealthCheckJob::new(LayoutManager::new(&config.data.base_dir), scheduler.state_handle());
    scheduler.register(
        Arc::new(health),
        Trigger::parse("health_check", Some(sched.health_check_interval.as_str()), None)?,
    )?;

    let cleanup = RetentionCleanupJob::new(
        RetentionManager::new(&config.data.base_dir),
        config.storage.retention_days.clone(),
        config.storage.cleanup_dry_run,
    )
    .with_metadata_dir(&config.data.metadata_dir);
    scheduler.register(
        Arc::new(cleanup),
        Trigger::parse("retention_cleanup", Some(sched.cleanup_interval.as_str()), None)?,
    )?;

    Ok(scheduler)
}
