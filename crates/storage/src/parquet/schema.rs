//! Arrow type inference from batch cells.

use arrow::datatypes::{DataType, Field, Schema};
use lakeshore_core::{Batch, Value};

/// Pick the narrowest Arrow type that holds every non-null cell.
pub(crate) fn infer_column_type<'a>(values: impl Iterator<Item = &'a Value>) -> DataType {
    let mut seen_int = false;
    let mut seen_float = false;
    let mut seen_bool = false;

    for value in values {
        match value {
            Value::Null => {}
            Value::Int(_) => seen_int = true,
            Value::Float(_) => seen_float = true,
            Value::Bool(_) => seen_bool = true,
            Value::Text(_) => return DataType::Utf8,
        }
    }

    match (seen_int, seen_float, seen_bool) {
        (true, false, false) => DataType::Int64,
        (_, true, false) => DataType::Float64,
        (false, false, true) => DataType::Boolean,
        _ => DataType::Utf8,
    }
}

pub(crate) fn build_schema(batch: &Batch) -> Schema {
    let fields: Vec<Field> = batch
        .columns()
        .iter()
        .enumerate()
        .map(|(idx, name)| Field::new(name, infer_column_type(batch.column(idx)), true))
        .collect();
    Schema::new(fields)
}
