//! Ingestion jobs: retry + chunked source + dedup + organizer, one
//! [`IngestionResult`] per configured source.

mod api;
mod file;

use async_trait::async_trait;

pub use api::ApiIngestionJob;
pub use file::FileIngestionJob;

use crate::{IngestError, IngestionResult};

#[async_trait]
pub trait IngestionJob: Send + Sync {
    /// Phase name used in logs and run metadata (`file`, `api`).
    fn name(&self) -> &str;

    /// Ingest every configured source. Per-source failures are reported in
    /// the results; `Err` means the phase could not run at all.
    async fn run(&self) -> Result<Vec<IngestionResult>, IngestError>;
}

use std::path::PathBuf;

use lakeshore_storage::StorageError;
use tracing::warn;

/// Fold an organize outcome into `result`. A partial write still counts as
/// stored: the data path is recorded and the bookkeeping error is appended.
pub(crate) fn record_store_outcome(
    result: &mut IngestionResult,
    outcome: Result<PathBuf, StorageError>,
) -> Result<(), StorageError> {
    match outcome {
        Ok(path) => {
            result.output_path = Some(path);
            Ok(())
        }
        Err(e) => match e.stored_path() {
            Some(path) => {
                warn!(data_type = %result.data_type, error = %e, "Data stored with incomplete bookkeeping");
                result.output_path = Some(path.clone());
                result.errors.push(e.to_string());
                Ok(())
            }
            None => Err(e),
        },
    }
}
