//! Build typed Arrow arrays from batch rows.

use std::sync::Arc;

use arrow::array::{ArrayRef, BooleanBuilder, Float64Builder, Int64Builder, StringBuilder};
use arrow::datatypes::{DataType, Schema};
use lakeshore_core::{Batch, Value};

use super::error::ParquetError;

/// Build one array per schema field. Cells that do not fit the inferred type
/// become NULL; mixed columns were already widened to Utf8 by inference.
pub(crate) fn build_arrays(batch: &Batch, schema: &Schema) -> Result<Vec<ArrayRef>, ParquetError> {
    let num_rows = batch.num_rows();
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(schema.fields().len());

    for (col_idx, field) in schema.fields().iter().enumerate() {
        let array: ArrayRef = match field.data_type() {
            DataType::Int64 => {
                let mut builder = Int64Builder::with_capacity(num_rows);
                for value in batch.column(col_idx) {
                    match value {
                        Value::Int(i) => builder.append_value(*i),
                        _ => builder.append_null(),
                    }
                }
                Arc::new(builder.finish())
            }
            DataType::Float64 => {
                let mut builder = Float64Builder::with_capacity(num_rows);
                for value in batch.column(col_idx) {
                    match value {
                        Value::Float(f) => builder.append_value(*f),
                        Value::Int(i) => builder.append_value(*i as f64),
                        _ => builder.append_null(),
                    }
                }
                Arc::new(builder.finish())
            }
            DataType::Boolean => {
                let mut builder = BooleanBuilder::with_capacity(num_rows);
                for value in batch.column(col_idx) {
                    match value {
                        Value::Bool(b) => builder.append_value(*b),
                        _ => builder.append_null(),
                    }
                }
                Arc::new(builder.finish())
            }
            // Default: UTF-8 string
            _ => {
                let mut builder = StringBuilder::with_capacity(num_rows, num_rows * 32);
                for value in batch.column(col_idx) {
                    match value {
                        Value::Null => builder.append_null(),
                        other => builder.append_value(other.to_string()),
                    }
                }
                Arc::new(builder.finish())
            }
        };

        arrays.push(array);
    }

    Ok(arrays)
}
