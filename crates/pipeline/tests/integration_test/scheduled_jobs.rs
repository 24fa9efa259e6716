use std::collections::BTreeMap;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use chrono::{Duration, Utc};
use lakeshore_core::{PipelineConfig, Tier};
use lakeshore_pipeline::{build_scheduler, Orchestrator, RetentionCleanupJob};
use lakeshore_scheduler::{JobScheduler, JobState, Trigger};
use lakeshore_storage::{RetentionManager, TIMESTAMP_FORMAT};
use tempfile::TempDir;

fn partition(base: &std::path::Path, age_days: i64) -> std::path::PathBuf {
    let ts = Utc::now() - Duration::days(age_days);
    let dir = base
        .join("raw/source=csv_ingestion/type=events")
        .join(format!("timestamp={}", ts.format(TIMESTAMP_FORMAT)));
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("events.parquet"), b"data").unwrap();
    dir
}

fn config_in(dir: &TempDir) -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.data.base_dir = dir.path().join("lake");
    config.data.metadata_dir = dir.path().join("metadata");
    config.data.status_file = dir.path().join("status.json");
    config
}

#[tokio::test]
async fn retention_job_deletes_only_when_not_dry_run() {
    let dir = TempDir::new().unwrap();
    let old = partition(dir.path(), 100);
    let fresh = partition(dir.path(), 10);
    let retention = BTreeMap::from([(Tier::Raw, 90)]);

    let mut scheduler = JobScheduler::new(std::time::Duration::from_secs(1));
    let dry = RetentionCleanupJob::new(RetentionManager::new(dir.path()), retention.clone(), true);
    scheduler
        .register(Arc::new(dry), Trigger::every(std::time::Duration::from_secs(3600)))
        .unwrap();
    assert_eq!(scheduler.run_once("retention_cleanup").await.unwrap(), JobState::Success);
    assert!(old.exists());
    let summary = scheduler.status().get("retention_cleanup").unwrap().last_summary.clone().unwrap();
    assert_eq!(summary["candidates"], 1);
    assert_eq!(summary["deleted"], 0);

    let mut scheduler = JobScheduler::new(std::time::Duration::from_secs(1));
    let live = RetentionCleanupJob::new(RetentionManager::new(dir.path()), retention, false);
    scheduler
        .register(Arc::new(live), Trigger::every(std::time::Duration::from_secs(3600)))
        .unwrap();
    assert_eq!(scheduler.run_once("retention_cleanup").await.unwrap(), JobState::Success);
    assert!(!old.exists());
    assert!(fresh.exists());
}

#[tokio::test]
async fn default_config_registers_all_builtin_jobs() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);
    let orchestrator = Orchestrator::from_config(&config, Arc::new(AtomicBool::new(false)));

    let scheduler = build_scheduler(&config, &orchestrator).unwrap();
    assert_eq!(
        scheduler.job_names(),
        vec!["file_ingestion", "api_ingestion", "health_check", "retention_cleanup"]
    );
    let status = scheduler.status();
    assert!(status.jobs.values().all(|s| s.next_run.is_some()));
}

#[tokio::test]
async fn health_check_reports_tier_sizes() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);
    partition(&config.data.base_dir, 1);
    let orchestrator = Orchestrator::from_config(&config, Arc::new(AtomicBool::new(false)));
    let scheduler = build_scheduler(&config, &orchestrator).unwrap();

    assert_eq!(scheduler.run_once("health_check").await.unwrap(), JobState::Success);
    let status = scheduler.status();
    let summary = status.get("health_check").unwrap().last_summary.as_ref().unwrap();
    assert_eq!(summary["tiers"]["raw"]["file_count"], 1);
    assert!(summary["recent_jobs"].get("health_check").is_some());
    assert!(config.data.status_file.is_file());
}

#[tokio::test]
async fn disabled_jobs_are_not_registered() {
    let dir = TempDir::new().unwrap();
    let mut config = config_in(&dir);
    config.scheduling.api_ingestion.enabled = false;
    let orchestrator = Orchestrator::from_config(&config, Arc::new(AtomicBool::new(false)));

    let scheduler = build_scheduler(&config, &orchestrator).unwrap();
    assert!(!scheduler.job_names().contains(&"api_ingestion"));
}

#[tokio::test]
async fn retention_job_prunes_old_run_metadata() {
    let dir = TempDir::new().unwrap();
    let metadata_dir = dir.path().join("metadata");
    std::fs::create_dir_all(&metadata_dir).unwrap();
    let stamp = |days: i64| (Utc::now() - Duration::days(days)).format(TIMESTAMP_FORMAT).to_string();
    let old_run = metadata_dir.join(format!("pipeline_execution_{}.json", stamp(800)));
    let recent_run = metadata_dir.join(format!("pipeline_execution_{}.json", stamp(3)));
    std::fs::write(&old_run, b"{}").unwrap();
    std::fs::write(&recent_run, b"{}").unwrap();

    let retention = BTreeMap::from([(Tier::Raw, 90), (Tier::Metadata, 730)]);
    let job = RetentionCleanupJob::new(RetentionManager::new(dir.path().join("lake")), retention, false)
        .with_metadata_dir(&metadata_dir);
    let mut scheduler = JobScheduler::new(std::time::Duration::from_secs(1));
    scheduler
        .register(Arc::new(job), Trigger::every(std::time::Duration::from_secs(3600)))
        .unwrap();

    assert_eq!(scheduler.run_once("retention_cleanup").await.unwrap(), JobState::Success);
    assert!(!old_run.exists());
    assert!(recent_run.exists());
    let summary = scheduler.status().get("retention_cleanup").unwrap().last_summary.clone().unwrap();
    assert_eq!(summary["metadata_files"]["deleted"], 1);
}
