use std::sync::Arc;
use std::time::Duration;

use lakeshore_pipeline::{Orchestrator, RunMode, RunReport};
use tempfile::TempDir;

use crate::helpers::MockIngester;

fn orchestrator(dir: &TempDir, file: Arc<MockIngester>, api: Arc<MockIngester>) -> Orchestrator {
    Orchestrator::new(dir.path().join("metadata"))
        .with_file_job(file)
        .with_api_job(api)
        .with_cooldown(Duration::ZERO)
}

fn read_metadata(report: &RunReport) -> serde_json::Value {
    let path = report.metadata_path.as_ref().expect("metadata written");
    serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap()
}

#[tokio::test]
async fn full_run_succeeds_and_writes_metadata() {
    let dir = TempDir::new().unwrap();
    let file = Arc::new(MockIngester::succeeding("file", &[("events", 99), ("item_properties", 40)]));
    let api = Arc::new(MockIngester::succeeding("api", &[("products", 30), ("categories", 24)]));

    let report = orchestrator(&dir, file, api).run_full().await;
    assert!(report.is_success());
    assert_eq!(report.summary.total_sources, 4);
    assert_eq!(report.summary.file_records, 139);
    assert_eq!(report.summary.api_records, 54);
    assert_eq!(report.summary.total_records, 193);

    let meta = read_metadata(&report);
    assert_eq!(meta["overall_status"], "success");
    assert_eq!(meta["summary"]["successful_sources"], 4);
    assert_eq!(meta["file_ingestion"]["results"].as_array().unwrap().len(), 2);
    let name = report.metadata_path.unwrap();
    let name = name.file_name().unwrap().to_string_lossy();
    assert!(name.starts_with("pipeline_execution_"));
    assert!(name.ends_with(".json"));
}

#[tokio::test]
async fn failed_file_phase_does_not_block_api_phase() {
    let dir = TempDir::new().unwrap();
    let file = Arc::new(MockIngester::erroring("file", "no file sources configured"));
    let api = Arc::new(MockIngester::succeeding("api", &[("products", 30)]));

    let report = orchestrator(&dir, Arc::clone(&file), Arc::clone(&api)).run_full().await;

    assert_eq!(file.calls(), 1);
    assert_eq!(api.calls(), 1);
    assert!(!report.is_success());
    assert!(report.api_ingestion.as_ref().unwrap().success);
    assert_eq!(report.summary.failed_sources, 1);
    assert_eq!(report.summary.successful_sources, 1);
    assert_eq!(report.summary.api_records, 30);
    assert!(report.summary.errors[0].contains("no file sources configured"));
    assert_eq!(read_metadata(&report)["overall_status"], "failed");
}

#[tokio::test]
async fn one_failed_source_fails_the_run() {
    let dir = TempDir::new().unwrap();
    let file = Arc::new(MockIngester::with_failed_source("file", ("events", 10), "item_properties"));
    let api = Arc::new(MockIngester::succeeding("api", &[("products", 5)]));

    let report = orchestrator(&dir, file, api).run_full().await;
    assert!(!report.is_success());
    assert_eq!(report.summary.total_sources, 3);
    assert_eq!(report.summary.file_records, 10);
    assert!(report.summary.errors[0].contains("item_properties"));
}

#[tokio::test]
async fn single_phase_modes_only_run_their_phase() {
    let dir = TempDir::new().unwrap();
    let file = Arc::new(MockIngester::succeeding("file", &[("events", 1)]));
    let api = Arc::new(MockIngester::succeeding("api", &[("products", 1)]));
    let orch = orchestrator(&dir, Arc::clone(&file), Arc::clone(&api));

    let report = orch.run(RunMode::Api).await;
    assert!(report.file_ingestion.is_none());
    assert_eq!((file.calls(), api.calls()), (0, 1));

    let report = orch.run(RunMode::File).await;
    assert!(report.api_ingestion.is_none());
    assert_eq!((file.calls(), api.calls()), (1, 1));
}

#[tokio::test]
async fn runs_in_the_same_second_get_distinct_metadata_files() {
    let dir = TempDir::new().unwrap();
    let file = Arc::new(MockIngester::succeeding("file", &[("events", 1)]));
    let api = Arc::new(MockIngester::succeeding("api", &[("products", 1)]));
    let orch = orchestrator(&dir, file, api);

    let mut paths = Vec::new();
    for _ in 0..3 {
        paths.push(orch.run(RunMode::File).await.metadata_path.unwrap());
    }
    paths.sort();
    paths.dedup();
    assert_eq!(paths.len(), 3);
    assert_eq!(std::fs::read_dir(dir.path().join("metadata")).unwrap().count(), 3);
}

#[tokio::test]
async fn missing_ingester_is_reported_as_failed_phase() {
    let dir = TempDir::new().unwrap();
    let file = Arc::new(MockIngester::succeeding("file", &[("events", 1)]));
    let orch = Orchestrator::new(dir.path().join("metadata"))
        .with_file_job(file)
        .with_cooldown(Duration::ZERO);

    let report = orch.run_full().await;
    assert!(!report.is_success());
    assert_eq!(
        report.api_ingestion.unwrap().error.as_deref(),
        Some("api ingester not initialized")
    );

    let status = orch.status();
    assert!(status.components.file_ingester);
    assert!(!status.components.api_ingester);
    assert!(!status.components.scheduler);
    let meta_dir = &status.data_directories["metadata_dir"];
    assert!(meta_dir.exists);
    assert_eq!(meta_dir.file_count, 1);
}
