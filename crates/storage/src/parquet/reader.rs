use std::path::Path;

use arrow::array::{Array, ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray};
use arrow::util::display::array_value_to_string;
use lakeshore_core::{Batch, Value};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use tracing::debug;

use super::error::ParquetError;

fn cell(array: &ArrayRef, row: usize) -> Result<Value, ParquetError> {
    if array.is_null(row) {
        return Ok(Value::Null);
    }
    let any = array.as_any();
    if let Some(a) = any.downcast_ref::<Int64Array>() {
        return Ok(Value::Int(a.value(row)));
    }
    if let Some(a) = any.downcast_ref::<Float64Array>() {
        return Ok(Value::Float(a.value(row)));
    }
    if let Some(a) = any.downcast_ref::<BooleanArray>() {
        return Ok(Value::Bool(a.value(row)));
    }
    if let Some(a) = any.downcast_ref::<StringArray>() {
        return Ok(Value::Text(a.value(row).to_string()));
    }
    Ok(Value::Text(array_value_to_string(array.as_ref(), row)?))
}

/// Read a whole Parquet file back into a [`Batch`].
pub fn read_parquet(path: &Path) -> Result<Batch, ParquetError> {
    let file = std::fs::File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let columns: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    let reader = builder.build()?;

    let mut batch = Batch::new(columns);
    for record_batch in reader {
        let record_batch = record_batch?;
        for row in 0..record_batch.num_rows() {
            let values = record_batch
                .columns()
                .iter()
                .map(|array| cell(array, row))
                .collect::<Result<Vec<_>, _>>()?;
            // Width always matches the file schema.
            batch
                .push_row(values)
                .map_err(|e| arrow::error::ArrowError::SchemaError(e.to_string()))?;
        }
    }

    debug!(path = %path.display(), rows = batch.num_rows(), "Read Parquet file");
    Ok(batch)
}
