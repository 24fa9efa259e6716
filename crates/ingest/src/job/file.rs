use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use lakeshore_core::config::{FileIngestionConfig, FileSourceConfig};
use lakeshore_core::{Batch, Value, FILE_SOURCE};
use lakeshore_storage::StorageOrganizer;
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use uuid::Uuid;

use super::{record_store_outcome, IngestionJob};
use crate::dedup::dedupe;
use crate::retry::{RetryExecutor, RetryPolicy};
use crate::source::FileChunkedSource;
use crate::{IngestError, IngestionResult};

/// Everything read from one source's files in a single attempt.
struct LoadedFiles {
    batch: Batch,
    malformed_rows: usize,
    files: Vec<PathBuf>,
    hashes: BTreeMap<String, String>,
    total_bytes: u64,
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn sha256_file(path: &Path) -> Result<String, IngestError> {
    let mut hasher = Sha256::new();
    let mut file = File::open(path)?;
    std::io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

/// Blocking read of every file into one batch.
fn load_files(
    paths: &[PathBuf],
    delimiter: u8,
    chunk_size: usize,
    expected_columns: &[String],
) -> Result<LoadedFiles, IngestError> {
    let mut loaded = LoadedFiles {
        batch: Batch::default(),
        malformed_rows: 0,
        files: Vec::with_capacity(paths.len()),
        hashes: BTreeMap::new(),
        total_bytes: 0,
    };

    for path in paths {
        let mut source = FileChunkedSource::open(path, delimiter, chunk_size, expected_columns)?;
        let mut file_batch = Batch::new(source.columns().to_vec());
        let mut chunks = 0usize;
        loop {
            let chunk = source.read_chunk()?;
            if !chunk.rows.is_empty() {
                chunks += 1;
                file_batch.append(chunk.rows);
            }
            if chunk.done {
                break;
            }
        }

        let name = file_name(path);
        info!(
            file = %path.display(),
            rows = file_batch.num_rows(),
            chunks,
            malformed = source.malformed_rows(),
            "Read input file"
        );
        loaded.malformed_rows += source.malformed_rows();
        loaded.batch.append(file_batch);
        loaded.hashes.insert(name, sha256_file(path)?);
        loaded.total_bytes += std::fs::metadata(path)?.len();
        loaded.files.push(path.clone());
    }

    Ok(loaded)
}

/// Loads configured delimited files into the `raw` tier.
pub struct FileIngestionJob {
    config: FileIngestionConfig,
    organizer: StorageOrganizer,
    shutdown: Option<Arc<AtomicBool>>,
}

impl FileIngestionJob {
    pub fn new(config: FileIngestionConfig, organizer: StorageOrganizer) -> Self {
        Self {
            config,
            organizer,
            shutdown: None,
        }
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

    /// Ingest one configured source: read, annotate, dedupe, organize, archive.
    pub async fn ingest_source(&self, source: &FileSourceConfig) -> IngestionResult {
        let start = Instant::now();
        let started_at = Utc::now();
        let mut result = IngestionResult::new(FILE_SOURCE, &source.data_type, started_at);

        let (present, missing): (Vec<PathBuf>, Vec<PathBuf>) =
            source.paths.iter().cloned().partition(|p| p.is_file());
        for path in &missing {
            warn!(data_type = %source.data_type, path = %path.display(), "Input file not found, skipping");
        }
        if present.is_empty() {
            return result.fail(
                format!("no readable input file for '{}' among {:?}", source.data_type, source.paths),
                start,
            );
        }

        let delimiter = match u8::try_from(self.config.delimiter) {
            Ok(d) => d,
            Err(_) => {
                return result.fail(
                    IngestError::Config(format!("delimiter {:?} is not a single byte", self.config.delimiter)),
                    start,
                )
            }
        };

        let label = format!("file:{}", source.data_type);
        let chunk_size = self.config.chunk_size;
        let loaded = self
            .retry_executor()
            .execute(&label, || {
                let paths = present.clone();
                let expected = source.expected_columns.clone();
                async move {
                    let handle = tokio::task::spawn_blocking(move || {
                        load_files(&paths, delimiter, chunk_size, &expected)
                    });
                    match handle.await {
                        Ok(loaded) => loaded,
                        Err(e) => Err(IngestError::Task(e.to_string())),
                    }
                }
            })
            .await;
        let loaded = match loaded {
            Ok(l) => l,
            Err(e) => return result.fail(e, start),
        };

        result.files_processed = loaded.files.len();
        result.rows_skipped = loaded.malformed_rows;

        if loaded.batch.is_empty() {
            return result.fail(
                format!(
                    "no valid data rows in input files for '{}' ({} malformed)",
                    source.data_type, loaded.malformed_rows
                ),
                start,
            );
        }

        let batch_id = Uuid::new_v4().to_string();
        // Constant per source so rows repeated across its files still dedupe.
        let batch = loaded
            .batch
            .with_constant_column("ingestion_source", Value::Text(format!("csv_{}", source.data_type)))
            .with_constant_column("ingestion_timestamp", Value::Text(started_at.to_rfc3339()))
            .with_constant_column("ingestion_batch_id", Value::Text(batch_id.clone()));
        let raw_rows = batch.num_rows();

        let (clean, removed) = match dedupe(batch, &source.dedup) {
            Ok(v) => v,
            Err(e) => return result.fail(IngestError::from(e), start),
        };
        if removed > 0 {
            warn!(data_type = %source.data_type, removed, "Removed duplicate records");
        }

        let metadata = json!({
            "ingestion_source": FILE_SOURCE,
            "batch_id": batch_id,
            "original_files": loaded.files,
            "file_hashes": loaded.hashes,
            "raw_records": raw_rows,
            "duplicates_removed": removed,
            "malformed_rows": loaded.malformed_rows,
            "file_size_mb": loaded.total_bytes as f64 / 1024.0 / 1024.0,
        });

        let outcome = self
            .organizer
            .organize(&clean, &source.data_type, FILE_SOURCE, started_at, metadata.clone());
        if let Err(e) = record_store_outcome(&mut result, outcome) {
            return result.fail(e, start);
        }

        result.records_count = clean.num_rows();
        result.duplicates_removed = removed;
        result.metadata = metadata;

        if self.config.backup_files {
            let archive_type = format!("{}_files", source.data_type);
            for path in &loaded.files {
                if let Err(e) = self
                    .organizer
                    .archive_file(path, &archive_type, FILE_SOURCE, started_at)
                {
                    warn!(file = %path.display(), error = %e, "Failed to archive original file");
                    result.errors.push(format!("archive {}: {e}", path.display()));
                }
            }
        }

        let result = result.succeed(start);
        info!(
            data_type = %source.data_type,
            records = result.records_count,
            duplicates = result.duplicates_removed,
            skipped = result.rows_skipped,
            elapsed_secs = result.elapsed_secs,
            "File source ingested"
        );
        result
    }
}

#[async_trait]
impl IngestionJob for FileIngestionJob {
    fn name(&self) -> &str {
        "file"
    }

    async fn run(&self) -> Result<Vec<IngestionResult>, IngestError> {
        if self.config.sources.is_empty() {
            return Err(IngestError::Config("no file sources configured".into()));
        }
        let mut results = Vec::with_capacity(self.config.sources.len());
        for source in &self.config.sources {
            results.push(self.ingest_source(source).await);
        }
        Ok(results)
    }
}
