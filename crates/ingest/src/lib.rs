//! Resilient ingestion: chunked sources, retries, dedup, response shaping and
//! the file / API ingestion jobs that feed the partitioned lake.

pub mod dedup;
pub mod error;
pub mod job;
pub mod result;
pub mod retry;
pub mod shape;
pub mod source;

pub use dedup::{dedupe, DedupError};
pub use error::IngestError;
pub use job::{ApiIngestionJob, FileIngestionJob, IngestionJob};
pub use result::{IngestionResult, IngestionStatus};
pub use retry::{RetryExecutor, RetryPolicy, Retryable};
pub use shape::ShaperRegistry;
pub use source::{ApiChunkedSource, Chunk, ChunkedSource, FileChunkedSource};
