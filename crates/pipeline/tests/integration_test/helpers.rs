use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use lakeshore_ingest::{IngestError, IngestionJob, IngestionResult, IngestionStatus};

/// An ingester returning canned results, or a phase-level error.
pub struct MockIngester {
    pub name: String,
    pub outcome: Result<Vec<(String, bool, usize)>, String>,
    pub calls: AtomicUsize,
}

impl MockIngester {
    pub fn succeeding(name: &str, sources: &[(&str, usize)]) -> Self {
        Self {
            name: name.to_string(),
            outcome: Ok(sources.iter().map(|(s, n)| (s.to_string(), true, *n)).collect()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_failed_source(name: &str, ok: (&str, usize), failed: &str) -> Self {
        Self {
            name: name.to_string(),
            outcome: Ok(vec![(ok.0.to_string(), true, ok.1), (failed.to_string(), false, 0)]),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn erroring(name: &str, error: &str) -> Self {
        Self {
            name: name.to_string(),
            outcome: Err(error.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IngestionJob for MockIngester {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self) -> Result<Vec<IngestionResult>, IngestError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let sources = self.outcome.clone().map_err(IngestError::Config)?;
        Ok(sources
            .into_iter()
            .map(|(data_type, ok, records)| {
                let mut result = IngestionResult::new(&self.name, &data_type, Utc::now());
                if ok {
                    result.status = IngestionStatus::Success;
                    result.records_count = records;
                } else {
                    result.errors.push("source unavailable".into());
                }
                result
            })
            .collect())
    }
}
