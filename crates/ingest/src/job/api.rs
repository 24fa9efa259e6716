use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use lakeshore_core::config::{ApiIngestionConfig, DedupPolicy, EndpointConfig};
use lakeshore_core::API_SOURCE;
use lakeshore_storage::{StorageOrganizer, TIMESTAMP_FORMAT};
use reqwest::Client;
use serde_json::{json, Value as Json};
use tracing::{info, warn};

use super::{record_store_outcome, IngestionJob};
use crate::dedup::dedupe;
use crate::retry::{RetryExecutor, RetryPolicy};
use crate::shape::{annotate, ShaperRegistry};
use crate::source::{collect_chunks, ApiChunkedSource};
use crate::{IngestError, IngestionResult};

const PAUSE_SLICE: Duration = Duration::from_millis(100);

/// Pulls every configured endpoint into the `raw` tier, one result per
/// endpoint. Endpoints run sequentially with a rate-limit pause between them.
pub struct ApiIngestionJob {
    config: ApiIngestionConfig,
    organizer: StorageOrganizer,
    client: Client,
    shapers: ShaperRegistry,
    shutdown: Option<Arc<AtomicBool>>,
}

impl ApiIngestionJob {
    pub fn new(config: ApiIngestionConfig, organizer: StorageOrganizer) -> Result<Self, IngestError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("lakeshore/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| IngestError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            config,
            organizer,
            client,
            shapers: ShaperRegistry::default(),
            shutdown: None,
        })
    }

    pub fn with_shapers(mut self, shapers: ShaperRegistry) -> Self {
        self.shapers = shapers;
        self
    }

    pub fn with_shutdown(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown = Some(flag);
        self
    }

    fn retry_executor(&self) -> RetryExecutor {
        let executor = RetryExecutor::new(RetryPolicy::new(
            self.config.retry_attempts,
            Duration::from_secs(self.config.retry_delay_secs),
        ));
        match &self.shutdown {
            Some(flag) => executor.with_shutdown(flag.clone()),
            None => executor,
        }
    }

    fn shutting_down(&self) -> bool {
        self.shutdown
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Rate-limit pause between endpoints, cut short by shutdown.
    async fn pause(&self, delay: Duration) {
        let mut remaining = delay;
        while !remaining.is_zero() && !self.shutting_down() {
            let step = remaining.min(PAUSE_SLICE);
            tokio::time::sleep(step).await;
            remaining -= step;
        }
    }

    /// Fetch, shape, annotate, dedupe and store one endpoint.
    pub async fn ingest_endpoint(&self, name: &str, endpoint: &EndpointConfig) -> IngestionResult {
        let start = Instant::now();
        let started_at = Utc::now();
        let mut result = IngestionResult::new(API_SOURCE, name, started_at);

        let mut source = match ApiChunkedSource::new(
            name,
            endpoint.clone(),
            self.config.page_size,
            self.client.clone(),
            self.shapers.resolve(name),
            self.retry_executor(),
        ) {
            Ok(s) => s,
            Err(e) => return result.fail(e, start),
        };

        // Pages fetched before a failing page are still backed up.
        let collected = collect_chunks(&mut source).await;

        if self.config.backup_responses && source.pages_fetched() > 0 {
            let file_name = format!("{name}_{}.json", started_at.format(TIMESTAMP_FORMAT));
            let pages = Json::Array(source.raw_pages().to_vec());
            if let Err(e) = self
                .organizer
                .archive_json(&pages, "api_responses", API_SOURCE, started_at, &file_name)
            {
                warn!(endpoint = name, error = %e, "Failed to back up raw responses");
                result.errors.push(format!("backup: {e}"));
            }
        }

        let batch = match collected {
            Ok(b) => b,
            Err(e) => return result.fail(e, start),
        };

        if batch.num_rows() == 0 || batch.num_columns() == 0 {
            return result.fail(format!("endpoint '{name}' returned no records"), start);
        }

        let batch = annotate(batch, name, started_at);
        let (clean, removed) = match dedupe(batch, &DedupPolicy::FullRow) {
            Ok(v) => v,
            Err(e) => return result.fail(IngestError::from(e), start),
        };

        let metadata = json!({
            "ingestion_source": API_SOURCE,
            "endpoint": name,
            "url": endpoint.url,
            "pages": source.pages_fetched(),
            "total_records": clean.num_rows(),
            "duplicates_removed": removed,
        });

        let outcome = self
            .organizer
            .organize(&clean, name, API_SOURCE, started_at, metadata.clone());
        if let Err(e) = record_store_outcome(&mut result, outcome) {
            return result.fail(e, start);
        }

        result.records_count = clean.num_rows();
        result.duplicates_removed = removed;
        result.metadata = metadata;

        let result = result.succeed(start);
        info!(
            endpoint = name,
            records = result.records_count,
            pages = source.pages_fetched(),
            elapsed_secs = result.elapsed_secs,
            "Endpoint ingested"
        );
        result
    }
}

#[async_trait]
impl IngestionJob for ApiIngestionJob {
    fn name(&self) -> &str {
        "api"
    }

    async fn run(&self) -> Result<Vec<IngestionResult>, IngestError> {
        if self.config.endpoints.is_empty() {
            return Err(IngestError::Config("no API endpoints configured".into()));
        }

        let pause = Duration::from_secs(self.config.rate_limit_delay_secs);
        let mut results = Vec::with_capacity(self.config.endpoints.len());
        for (i, (name, endpoint)) in self.config.endpoints.iter().enumerate() {
            if i > 0 {
                self.pause(pause).await;
            }
            if self.shutting_down() {
                warn!(endpoint = %name, "Shutdown requested, skipping remaining endpoints");
                break;
            }
            results.push(self.ingest_endpoint(name, endpoint).await);
        }
        Ok(results)
    }
}
