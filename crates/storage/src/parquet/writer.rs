use std::path::Path;
use std::sync::Arc;

use arrow::record_batch::RecordBatch;
use lakeshore_core::Batch;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use parquet::format::KeyValue;
use tracing::debug;

use super::builders::build_arrays;
use super::error::ParquetError;
use super::schema::build_schema;

/// Convert a [`Batch`] into an Arrow [`RecordBatch`].
pub fn batch_to_record_batch(batch: &Batch) -> Result<RecordBatch, ParquetError> {
    let schema = Arc::new(build_schema(batch));
    let arrays = build_arrays(batch, &schema)?;
    Ok(RecordBatch::try_new(schema, arrays)?)
}

/// Write a batch to `path` with Zstd compression.
///
/// `footer` pairs are stored as key-value metadata in the Parquet footer.
/// Returns the number of rows written.
pub fn write_parquet(
    batch: &Batch,
    path: &Path,
    footer: &[(&str, String)],
) -> Result<u64, ParquetError> {
    let record_batch = batch_to_record_batch(batch)?;
    let row_count = record_batch.num_rows() as u64;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = std::fs::File::create(path)?;

    let key_values = footer
        .iter()
        .map(|(k, v)| KeyValue::new(k.to_string(), Some(v.clone())))
        .collect::<Vec<_>>();
    let props = WriterProperties::builder()
        .set_compression(Compression::ZSTD(Default::default()))
        .set_key_value_metadata(if key_values.is_empty() { None } else { Some(key_values) })
        .build();

    let mut writer = ArrowWriter::try_new(file, record_batch.schema(), Some(props))?;
    writer.write(&record_batch)?;
    writer.close()?;

    debug!(path = %path.display(), rows = row_count, "Wrote Parquet file");
    Ok(row_count)
}
