use lakeshore_core::config::{DedupPolicy, FileIngestionConfig, FileSourceConfig};
use lakeshore_core::{Tier, FILE_SOURCE};
use lakeshore_ingest::{FileIngestionJob, IngestionJob};
use lakeshore_storage::{build_path, sidecar_path_for, StorageOrganizer};
use tempfile::TempDir;

use crate::helpers::write_events_csv;

fn events_config(path: std::path::PathBuf, backup: bool) -> FileIngestionConfig {
    FileIngestionConfig {
        retry_delay_secs: 0,
        chunk_size: 40,
        backup_files: backup,
        sources: vec![FileSourceConfig {
            data_type: "events".into(),
            paths: vec![path],
            expected_columns: vec!["timestamp".into(), "visitorid".into(), "event".into()],
            dedup: DedupPolicy::FullRow,
        }],
        ..FileIngestionConfig::default()
    }
}

#[tokio::test]
async fn csv_with_malformed_row_lands_in_raw_tier() {
    let input = TempDir::new().unwrap();
    let lake = TempDir::new().unwrap();
    let csv = write_events_csv(input.path(), 99, Some(50));

    let organizer = StorageOrganizer::new(lake.path());
    let job = FileIngestionJob::new(events_config(csv, true), organizer.clone());
    let results = job.run().await.unwrap();
    assert_eq!(results.len(), 1);

    let result = &results[0];
    assert!(result.is_success(), "{:?}", result.errors);
    assert_eq!(result.records_count, 99);
    assert_eq!(result.rows_skipped, 1);
    assert_eq!(result.duplicates_removed, 0);

    let output = result.output_path.clone().unwrap();
    let partition = lake
        .path()
        .join(build_path(Tier::Raw, "events", FILE_SOURCE, result.started_at).unwrap());
    assert_eq!(output.parent().unwrap(), partition);
    assert!(sidecar_path_for(&output).is_file());

    let sidecar = organizer.read_sidecar(&output).unwrap();
    assert_eq!(sidecar.data_info.rows, 99);
    assert_eq!(sidecar.metadata["malformed_rows"], 1);

    let latest = organizer.read_parquet(&organizer.latest_path("events")).unwrap();
    assert_eq!(latest.num_rows(), 99);

    let archive = lake
        .path()
        .join(build_path(Tier::Archive, "events_files", FILE_SOURCE, result.started_at).unwrap());
    assert!(archive.join("events.csv").is_file());
}

#[tokio::test]
async fn duplicate_rows_are_removed_before_storage() {
    let input = TempDir::new().unwrap();
    let lake = TempDir::new().unwrap();
    let path = input.path().join("events.csv");
    std::fs::write(
        &path,
        "timestamp,visitorid,event\n1,10,view\n1,10,view\n2,11,addtocart\n",
    )
    .unwrap();

    let job = FileIngestionJob::new(events_config(path, false), StorageOrganizer::new(lake.path()));
    let result = job.run().await.unwrap().remove(0);
    assert!(result.is_success());
    assert_eq!(result.records_count, 2);
    assert_eq!(result.duplicates_removed, 1);
    assert!(!lake.path().join("archive").exists());
}
