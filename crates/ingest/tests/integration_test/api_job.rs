use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use lakeshore_core::{Tier, API_SOURCE};
use lakeshore_ingest::{ApiIngestionJob, IngestError, IngestionJob};
use lakeshore_storage::{build_path, StorageOrganizer};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::{api_config, endpoint};

fn products(range: std::ops::Range<u32>, total: u32) -> serde_json::Value {
    let items: Vec<_> = range
        .map(|i| json!({"id": i, "title": format!("item {i}"), "price": 9.5, "tags": ["x"], "images": []}))
        .collect();
    json!({"products": items, "total": total, "skip": 0, "limit": 2})
}

#[tokio::test]
async fn paginated_endpoint_collects_every_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/products"))
        .and(query_param("skip", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(products(0..2, 5)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/products"))
        .and(query_param("skip", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(products(2..4, 5)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/products"))
        .and(query_param("skip", "4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(products(4..5, 5)))
        .expect(1)
        .mount(&server)
        .await;

    let lake = TempDir::new().unwrap();
    let config = api_config(vec![(
        "products",
        endpoint(format!("{}/products", server.uri()), true, Some(2)),
    )]);
    let organizer = StorageOrganizer::new(lake.path());
    let job = ApiIngestionJob::new(config, organizer.clone()).unwrap();

    let result = job.run().await.unwrap().remove(0);
    assert!(result.is_success(), "{:?}", result.errors);
    assert_eq!(result.records_count, 5);
    assert_eq!(result.metadata["pages"], 3);

    let stored = organizer.read_parquet(result.output_path.as_ref().unwrap()).unwrap();
    assert_eq!(stored.num_rows(), 5);
    assert!(stored.column_index("data_source").is_some());
    assert!(stored.column_index("image_count").is_some());

    let backups = lake
        .path()
        .join(build_path(Tier::Archive, "api_responses", API_SOURCE, result.started_at).unwrap());
    assert_eq!(std::fs::read_dir(backups).unwrap().count(), 1);
}

#[tokio::test]
async fn rate_limited_request_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 1}, {"id": 2}])))
        .expect(1)
        .mount(&server)
        .await;

    let lake = TempDir::new().unwrap();
    let config = api_config(vec![("users", endpoint(format!("{}/users", server.uri()), false, None))]);
    let job = ApiIngestionJob::new(config, StorageOrganizer::new(lake.path())).unwrap();

    let result = job.run().await.unwrap().remove(0);
    assert!(result.is_success(), "{:?}", result.errors);
    assert_eq!(result.records_count, 2);
}

#[tokio::test]
async fn not_found_fails_without_retry_and_other_endpoints_continue() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("nope"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/categories"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(["beauty", "laptops"])))
        .expect(1)
        .mount(&server)
        .await;

    let lake = TempDir::new().unwrap();
    let config = api_config(vec![
        ("missing", endpoint(format!("{}/missing", server.uri()), false, None)),
        ("categories", endpoint(format!("{}/categories", server.uri()), false, None)),
    ]);
    let job = ApiIngestionJob::new(config, StorageOrganizer::new(lake.path())).unwrap();

    let results = job.run().await.unwrap();
    assert_eq!(results.len(), 2);
    assert!(!results[0].is_success());
    assert!(results[0].errors[0].contains("404"));
    assert!(results[0].output_path.is_none());
    assert!(results[1].is_success());
    assert_eq!(results[1].records_count, 2);
}

#[tokio::test]
async fn empty_endpoint_table_is_error() {
    let lake = TempDir::new().unwrap();
    let job = ApiIngestionJob::new(api_config(vec![]), StorageOrganizer::new(lake.path())).unwrap();
    assert!(matches!(job.run().await, Err(IngestError::Config(_))));
}

#[tokio::test]
async fn pages_before_a_failed_page_are_backed_up() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/products"))
        .and(query_param("skip", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(products(0..2, 5)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/products"))
        .and(query_param("skip", "2"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let lake = TempDir::new().unwrap();
    let config = api_config(vec![(
        "products",
        endpoint(format!("{}/products", server.uri()), true, Some(2)),
    )]);
    let job = ApiIngestionJob::new(config, StorageOrganizer::new(lake.path())).unwrap();

    let result = job.run().await.unwrap().remove(0);
    assert!(!result.is_success());
    assert!(result.output_path.is_none());

    let backups = lake
        .path()
        .join(build_path(Tier::Archive, "api_responses", API_SOURCE, result.started_at).unwrap());
    let files: Vec<_> = std::fs::read_dir(&backups).unwrap().map(|e| e.unwrap().path()).collect();
    assert_eq!(files.len(), 1);
    let pages: serde_json::Value = serde_json::from_slice(&std::fs::read(&files[0]).unwrap()).unwrap();
    assert_eq!(pages.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn shutdown_cuts_the_rate_limit_pause_short() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 1}])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/carts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 2}])))
        .expect(0)
        .mount(&server)
        .await;

    let lake = TempDir::new().unwrap();
    let mut config = api_config(vec![
        ("users", endpoint(format!("{}/users", server.uri()), false, None)),
        ("carts", endpoint(format!("{}/carts", server.uri()), false, None)),
    ]);
    config.rate_limit_delay_secs = 60;
    let flag = Arc::new(AtomicBool::new(false));
    let job = ApiIngestionJob::new(config, StorageOrganizer::new(lake.path()))
        .unwrap()
        .with_shutdown(Arc::clone(&flag));

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        flag.store(true, Ordering::SeqCst);
    });
    let results = tokio::time::timeout(Duration::from_secs(10), job.run())
        .await
        .expect("pause should end on shutdown")
        .unwrap();
    assert_eq!(results.len(), 1);
    assert!(results[0].is_success());
}
