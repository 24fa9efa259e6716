//! Deterministic partition paths.
//!
//! Layout: `<tier>/source=<source>/type=<data_type>/timestamp=<YYYYMMDD_HHMMSS>`.
//! Paths are relative to the lake root; no I/O happens here.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDateTime, Utc};
use lakeshore_core::Tier;
use regex::Regex;

use crate::StorageError;

/// Second-granularity stamp used in partition segments and file names.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

const TIMESTAMP_PREFIX: &str = "timestamp=";

fn validate_component(kind: &str, value: &str) -> Result<(), StorageError> {
    if value.trim().is_empty() {
        return Err(StorageError::InvalidPartitionKey(format!("{kind} is empty")));
    }
    if value.contains('/') || value.contains('\\') || value.contains('=') || value.contains("..") {
        return Err(StorageError::InvalidPartitionKey(format!(
            "{kind} '{value}' contains a reserved character"
        )));
    }
    Ok(())
}

/// Build the partition directory for a key, relative to the lake root.
pub fn build_path(
    tier: Tier,
    data_type: &str,
    source: &str,
    timestamp: DateTime<Utc>,
) -> Result<PathBuf, StorageError> {
    validate_component("data type", data_type)?;
    validate_component("source", source)?;

    let mut path = PathBuf::from(tier.as_str());
    path.push(format!("source={source}"));
    path.push(format!("type={data_type}"));
    path.push(format!("{TIMESTAMP_PREFIX}{}", timestamp.format(TIMESTAMP_FORMAT)));
    Ok(path)
}

/// Resolve a tier name, mapping failures to `InvalidPartitionKey`.
pub fn parse_tier(name: &str) -> Result<Tier, StorageError> {
    name.parse::<Tier>()
        .map_err(|_| StorageError::InvalidPartitionKey(format!("unknown tier '{name}'")))
}

/// File stem for a stored object: `<data_type>_<source>_<YYYYMMDD_HHMMSS>`.
pub fn file_stem(data_type: &str, source: &str, timestamp: DateTime<Utc>) -> String {
    format!("{data_type}_{source}_{}", timestamp.format(TIMESTAMP_FORMAT))
}

/// Parse a `timestamp=YYYYMMDD_HHMMSS` directory name.
pub fn parse_timestamp_segment(segment: &str) -> Option<DateTime<Utc>> {
    let raw = segment.strip_prefix(TIMESTAMP_PREFIX)?;
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .ok()
        .map(|ndt| ndt.and_utc())
}

/// True when a path component looks like a timestamp partition.
pub fn is_timestamp_segment(segment: &str) -> bool {
    segment.starts_with(TIMESTAMP_PREFIX)
}

static EMBEDDED_TIMESTAMP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{8}_\d{6})").expect("valid timestamp regex"));

/// Find an embedded `YYYYMMDD_HHMMSS` stamp in a file name.
pub fn extract_timestamp(file_name: &str) -> Option<DateTime<Utc>> {
    EMBEDDED_TIMESTAMP
        .captures_iter(file_name)
        .filter_map(|c| NaiveDateTime::parse_from_str(&c[1], TIMESTAMP_FORMAT).ok())
        .map(|ndt| ndt.and_utc())
        .next()
}

/// The `<tier>/<data_type>_latest.<ext>` pointer path, relative to the lake root.
pub fn latest_pointer_path(tier: Tier, data_type: &str, extension: &str) -> PathBuf {
    Path::new(tier.as_str()).join(format!("{data_type}_latest.{extension}"))
}
