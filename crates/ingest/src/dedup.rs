use std::collections::HashSet;

use lakeshore_core::config::{DedupPolicy, Keep};
use lakeshore_core::{Batch, Value};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DedupError {
    #[error("dedup key column '{0}' not present in batch")]
    MissingColumn(String),

    #[error("key subset policy has no columns")]
    EmptyKey,
}

/// Drop duplicate rows under `policy`, returning the cleaned batch and the
/// number of rows removed. Survivors keep their original relative order.
pub fn dedupe(batch: Batch, policy: &DedupPolicy) -> Result<(Batch, usize), DedupError> {
    let before = batch.num_rows();
    let kept = match policy {
        DedupPolicy::FullRow => {
            let mut seen: HashSet<&[Value]> = HashSet::with_capacity(before);
            batch
                .rows()
                .iter()
                .enumerate()
                .filter(|(_, row)| seen.insert(row.as_slice()))
                .map(|(i, _)| i)
                .collect::<Vec<_>>()
        }
        DedupPolicy::KeySubset { columns, keep } => {
            if columns.is_empty() {
                return Err(DedupError::EmptyKey);
            }
            let key_idx = columns
                .iter()
                .map(|c| {
                    batch
                        .column_index(c)
                        .ok_or_else(|| DedupError::MissingColumn(c.clone()))
                })
                .collect::<Result<Vec<_>, _>>()?;
            keyed_survivors(&batch, &key_idx, *keep)
        }
    };

    let removed = before - kept.len();
    Ok((batch.select_rows(&kept), removed))
}

fn keyed_survivors(batch: &Batch, key_idx: &[usize], keep: Keep) -> Vec<usize> {
    let key_of = |row: &Vec<Value>| -> Vec<Value> { key_idx.iter().map(|&i| row[i].clone()).collect() };
    let mut seen = HashSet::with_capacity(batch.num_rows());

    match keep {
        Keep::First => batch
            .rows()
            .iter()
            .enumerate()
            .filter(|(_, row)| seen.insert(key_of(*row)))
            .map(|(i, _)| i)
            .collect(),
        Keep::Last => {
            let mut kept: Vec<usize> = batch
                .rows()
                .iter()
                .enumerate()
                .rev()
                .filter(|(_, row)| seen.insert(key_of(*row)))
                .map(|(i, _)| i)
                .collect();
            kept.reverse();
            kept
        }
    }
}
