use std::path::PathBuf;

use lakeshore_storage::StorageError;
use thiserror::Error;

use crate::dedup::DedupError;
use crate::retry::Retryable;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed CSV: {0}")]
    Csv(String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("{path}: missing columns {missing:?}")]
    Schema { path: PathBuf, missing: Vec<String> },

    #[error("dedup error: {0}")]
    Dedup(#[from] DedupError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("task failed: {0}")]
    Task(String),
}

impl Retryable for IngestError {
    fn is_retryable(&self) -> bool {
        match self {
            IngestError::Http { status, .. } => *status == 429 || *status >= 500,
            IngestError::Network(_) | IngestError::Io(_) => true,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for IngestError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            IngestError::MalformedResponse(err.to_string())
        } else {
            IngestError::Network(err.to_string())
        }
    }
}

impl From<csv::Error> for IngestError {
    fn from(err: csv::Error) -> Self {
        match err.into_kind() {
            csv::ErrorKind::Io(e) => IngestError::Io(e),
            other => IngestError::Csv(format!("{other:?}")),
        }
    }
}
