use std::fs::File;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use csv::{ByteRecord, ReaderBuilder};
use lakeshore_core::{Batch, Value};
use tracing::{debug, warn};

use super::{Chunk, ChunkedSource};
use crate::IngestError;

/// Decode ISO-8859-1 bytes; every byte maps to the code point of equal value.
fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Reads a delimited file `chunk_size` records at a time.
///
/// Records whose field count differs from the header are skipped and counted
/// in [`malformed_rows`](Self::malformed_rows). I/O errors abort the read.
pub struct FileChunkedSource {
    path: PathBuf,
    reader: csv::Reader<File>,
    columns: Vec<String>,
    chunk_size: usize,
    record: ByteRecord,
    malformed_rows: usize,
    done: bool,
}

impl FileChunkedSource {
    /// Open `path` and validate its header against `expected_columns`.
    pub fn open(
        path: &Path,
        delimiter: u8,
        chunk_size: usize,
        expected_columns: &[String],
    ) -> Result<Self, IngestError> {
        let mut reader = ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(true)
            .from_path(path)?;

        let columns: Vec<String> = reader
            .byte_headers()?
            .iter()
            .map(|h| decode_latin1(h).trim().to_string())
            .collect();

        let missing: Vec<String> = expected_columns
            .iter()
            .filter(|c| !columns.contains(c))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(IngestError::Schema {
                path: path.to_path_buf(),
                missing,
            });
        }

        debug!(path = %path.display(), columns = columns.len(), "Opened delimited file");
        Ok(Self {
            path: path.to_path_buf(),
            reader,
            columns,
            chunk_size: chunk_size.max(1),
            record: ByteRecord::new(),
            malformed_rows: 0,
            done: false,
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn malformed_rows(&self) -> usize {
        self.malformed_rows
    }

    /// Read the next window of up to `chunk_size` records.
    pub fn read_chunk(&mut self) -> Result<Chunk, IngestError> {
        let mut batch = Batch::new(self.columns.clone());
        if self.done {
            return Ok(Chunk { rows: batch, done: true });
        }

        let width = self.columns.len();
        let mut records = 0;
        while records < self.chunk_size {
            if !self.reader.read_byte_record(&mut self.record)? {
                self.done = true;
                break;
            }
            records += 1;

            if self.record.len() != width {
                self.malformed_rows += 1;
                warn!(
                    path = %self.path.display(),
                    line = self.record.position().map(|p| p.line()).unwrap_or_default(),
                    expected = width,
                    found = self.record.len(),
                    "Skipping malformed row"
                );
                continue;
            }

            let row = self
                .record
                .iter()
                .map(|field| Value::infer(&decode_latin1(field)))
                .collect();
            batch
                .push_row(row)
                .map_err(|e| IngestError::Csv(e.to_string()))?;
        }

        Ok(Chunk {
            rows: batch,
            done: self.done,
        })
    }
}

#[async_trait]
impl ChunkedSource for FileChunkedSource {
    async fn next_chunk(&mut self) -> Result<Chunk, IngestError> {
        self.read_chunk()
    }
}
