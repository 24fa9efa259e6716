use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::parquet::ParquetError;

/// Bookkeeping step that failed after the data file was already written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStage {
    Sidecar,
    LatestPointer,
}

impl fmt::Display for WriteStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteStage::Sidecar => f.write_str("sidecar metadata"),
            WriteStage::LatestPointer => f.write_str("latest pointer"),
        }
    }
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("core error: {0}")]
    Core(#[from] lakeshore_core::CoreError),

    #[error("parquet error: {0}")]
    Parquet(#[from] ParquetError),

    #[error("invalid partition key: {0}")]
    InvalidPartitionKey(String),

    #[error("invalid batch: {0}")]
    InvalidBatch(String),

    #[error("not found: {0}")]
    NotFound(PathBuf),

    /// The data file is durable but a later bookkeeping step failed.
    #[error("data written to {data_path} but {stage} failed: {reason}")]
    PartialWrite {
        data_path: PathBuf,
        stage: WriteStage,
        reason: String,
    },

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StorageError {
    /// Path of data that was stored despite the error, if any.
    pub fn stored_path(&self) -> Option<&PathBuf> {
        match self {
            StorageError::PartialWrite { data_path, .. } => Some(data_path),
            _ => None,
        }
    }
}
