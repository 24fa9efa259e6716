use chrono::{Duration, TimeZone, Utc};
use lakeshore_core::{Tier, Value};
use lakeshore_storage::{build_path, StorageOrganizer};
use serde_json::json;

use crate::helpers::make_batch;

#[test]
fn latest_pointer_tracks_second_organize() {
    let dir = tempfile::tempdir().unwrap();
    let org = StorageOrganizer::new(dir.path());
    let t1 = Utc.with_ymd_and_hms(2024, 2, 1, 8, 0, 0).unwrap();
    let t2 = t1 + Duration::seconds(1);

    let first = org.organize(&make_batch(2, "first"), "events", "csv_ingestion", t1, json!({})).unwrap();
    let second = org.organize(&make_batch(4, "second"), "events", "csv_ingestion", t2, json!({})).unwrap();
    assert_ne!(first, second);

    let latest = org.read_parquet(&org.latest_path("events")).unwrap();
    assert_eq!(latest.num_rows(), 4);
    let label = latest.column_index("label").unwrap();
    assert!(latest.column(label).all(|v| *v == Value::from("second")));

    // Both objects stay in their own partitions.
    assert_eq!(org.read_parquet(&first).unwrap().num_rows(), 2);
}

#[test]
fn stored_object_lives_under_builder_path() {
    let dir = tempfile::tempdir().unwrap();
    let org = StorageOrganizer::new(dir.path()).with_tier(Tier::Processed);
    let ts = Utc.with_ymd_and_hms(2024, 2, 1, 8, 30, 15).unwrap();

    let path = org
        .organize(&make_batch(1, "x"), "products", "api_ingestion", ts, json!({"endpoint": "products"}))
        .unwrap();
    let partition = dir.path().join(build_path(Tier::Processed, "products", "api_ingestion", ts).unwrap());
    assert_eq!(path.parent().unwrap(), partition);
    assert!(partition.join("products_api_ingestion_20240201_083015.metadata.json").exists());
    assert!(dir.path().join("processed/products_latest.parquet").exists());
}

#[test]
fn pointers_are_per_data_type() {
    let dir = tempfile::tempdir().unwrap();
    let org = StorageOrganizer::new(dir.path());
    let ts = Utc.with_ymd_and_hms(2024, 2, 1, 8, 0, 0).unwrap();
    org.organize(&make_batch(1, "e"), "events", "s", ts, json!({})).unwrap();
    org.organize(&make_batch(3, "p"), "item_properties", "s", ts, json!({})).unwrap();

    assert_eq!(org.read_parquet(&org.latest_path("events")).unwrap().num_rows(), 1);
    assert_eq!(org.read_parquet(&org.latest_path("item_properties")).unwrap().num_rows(), 3);
}
