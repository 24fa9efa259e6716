//! Bounded-size readers over files and paginated endpoints.

mod api;
mod file;

use async_trait::async_trait;
use lakeshore_core::Batch;

pub use api::ApiChunkedSource;
pub use file::FileChunkedSource;

use crate::IngestError;

/// One bounded piece of a dataset. `done` marks the final chunk; an empty
/// chunk is valid and carries no rows.
#[derive(Debug, Clone, Default)]
pub struct Chunk {
    pub rows: Batch,
    pub done: bool,
}

/// A dataset read piece by piece.
#[async_trait]
pub trait ChunkedSource: Send {
    async fn next_chunk(&mut self) -> Result<Chunk, IngestError>;
}

/// Drain `source`, concatenating every non-empty chunk into one batch.
pub async fn collect_chunks<S: ChunkedSource + ?Sized>(source: &mut S) -> Result<Batch, IngestError> {
    let mut batch = Batch::default();
    loop {
        let chunk = source.next_chunk().await?;
        if !chunk.rows.is_empty() {
            batch.append(chunk.rows);
        }
        if chunk.done {
            return Ok(batch);
        }
    }
}
