use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use lakeshore_core::{Batch, Tier, Value};

/// Batch of `n` event rows tagged with `label`.
pub fn make_batch(n: i64, label: &str) -> Batch {
    Batch::from_rows(
        vec!["visitorid".into(), "event".into(), "label".into()],
        (0..n)
            .map(|i| vec![Value::Int(i), "view".into(), label.into()])
            .collect(),
    )
    .unwrap()
}

/// Create a partition directory holding one file of `bytes` bytes.
pub fn make_partition(base: &Path, tier: Tier, ts: DateTime<Utc>, bytes: usize) -> PathBuf {
    let dir = base
        .join(tier.as_str())
        .join("source=csv_ingestion")
        .join("type=events")
        .join(format!("timestamp={}", ts.format("%Y%m%d_%H%M%S")));
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("events.parquet"), vec![7u8; bytes]).unwrap();
    dir
}
