use std::path::PathBuf;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestionStatus {
    Success,
    Failed,
}

/// Outcome of ingesting one source (a configured file set or one endpoint).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionResult {
    pub source: String,
    pub data_type: String,
    pub status: IngestionStatus,
    pub records_count: usize,
    pub duplicates_removed: usize,
    /// Rows dropped because their field count did not match the header.
    pub rows_skipped: usize,
    pub files_processed: usize,
    pub output_path: Option<PathBuf>,
    pub started_at: DateTime<Utc>,
    pub elapsed_secs: f64,
    pub errors: Vec<String>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl IngestionResult {
    pub fn new(source: &str, data_type: &str, started_at: DateTime<Utc>) -> Self {
        Self {
            source: source.to_string(),
            data_type: data_type.to_string(),
            status: IngestionStatus::Failed,
            records_count: 0,
            duplicates_removed: 0,
            rows_skipped: 0,
            files_processed: 0,
            output_path: None,
            started_at,
            elapsed_secs: 0.0,
            errors: Vec::new(),
            metadata: serde_json::Value::Null,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == IngestionStatus::Success
    }

    /// Mark failed with `error`, stamping elapsed time from `start`.
    pub fn fail(mut self, error: impl ToString, start: Instant) -> Self {
        self.status = IngestionStatus::Failed;
        self.errors.push(error.to_string());
        self.elapsed_secs = start.elapsed().as_secs_f64();
        self
    }

    pub fn succeed(mut self, start: Instant) -> Self {
        self.status = IngestionStatus::Success;
        self.elapsed_secs = start.elapsed().as_secs_f64();
        self
    }
}
