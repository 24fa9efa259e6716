//! Age-based partition eviction per tier.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use lakeshore_core::Tier;
use serde::Serialize;
use tracing::{debug, error, info};
use walkdir::WalkDir;

use crate::dir_size;
use crate::partition::{extract_timestamp, is_timestamp_segment, parse_timestamp_segment};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CleanupCandidate {
    pub path: PathBuf,
    pub tier: Tier,
    pub partition_timestamp: DateTime<Utc>,
    pub age_days: i64,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CleanupFailure {
    pub path: PathBuf,
    pub error: String,
}

/// Outcome of one retention pass. Candidates are ordered oldest first.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CleanupReport {
    pub dry_run: bool,
    pub candidates: Vec<CleanupCandidate>,
    pub total_bytes: u64,
    pub deleted: Vec<PathBuf>,
    pub failed: Vec<CleanupFailure>,
}

#[derive(Debug, Clone)]
pub struct RetentionManager {
    base_dir: PathBuf,
}

impl RetentionManager {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn cleanup(&self, retention: &BTreeMap<Tier, u32>, dry_run: bool) -> CleanupReport {
        self.cleanup_at(Utc::now(), retention, dry_run)
    }

    /// Evaluate retention as of `now`. Tiers absent from `retention` are never
    /// touched; a dry run reports the same candidates without deleting.
    pub fn cleanup_at(
        &self,
        now: DateTime<Utc>,
        retention: &BTreeMap<Tier, u32>,
        dry_run: bool,
    ) -> CleanupReport {
        let report = self.scan_at(now, retention);
        if dry_run {
            for c in &report.candidates {
                info!(path = %c.path.display(), age_days = c.age_days, size_bytes = c.size_bytes, "Would delete partition");
            }
            return report;
        }
        self.execute(report)
    }

    /// Collect expired partitions without deleting anything.
    pub fn scan_at(&self, now: DateTime<Utc>, retention: &BTreeMap<Tier, u32>) -> CleanupReport {
        let mut candidates = Vec::new();
        for (&tier, &days) in retention {
            let cutoff = now - Duration::days(i64::from(days));
            let tier_dir = self.base_dir.join(tier.as_str());
            if !tier_dir.is_dir() {
                continue;
            }
            collect_expired(&tier_dir, tier, now, cutoff, &mut candidates);
        }
        candidates.sort_by(|a, b| {
            a.partition_timestamp
                .cmp(&b.partition_timestamp)
                .then_with(|| a.path.cmp(&b.path))
        });

        let total_bytes = candidates.iter().map(|c| c.size_bytes).sum();
        info!(candidates = candidates.len(), total_bytes, "Retention scan complete");
        CleanupReport {
            dry_run: true,
            candidates,
            total_bytes,
            ..Default::default()
        }
    }

    /// Delete every candidate of a scanned report. A failed deletion is
    /// recorded and the remaining candidates are still processed.
    pub fn execute(&self, mut report: CleanupReport) -> CleanupReport {
        report.dry_run = false;
        report.deleted.clear();
        report.failed.clear();
        for c in &report.candidates {
            match fs::remove_dir_all(&c.path) {
                Ok(()) => {
                    info!(path = %c.path.display(), age_days = c.age_days, "Deleted expired partition");
                    report.deleted.push(c.path.clone());
                }
                Err(e) => {
                    error!(path = %c.path.display(), error = %e, "Failed to delete partition");
                    report.failed.push(CleanupFailure {
                        path: c.path.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }
        report
    }
}

/// Delete the files directly inside `dir` whose name carries a
/// `YYYYMMDD_HHMMSS` stamp strictly older than `now - days`. Used for run
/// metadata documents, which live outside the tiered layout. Files without a
/// stamp are left alone.
pub fn prune_dated_files(dir: &Path, days: u32, now: DateTime<Utc>, dry_run: bool) -> CleanupReport {
    let cutoff = now - Duration::days(i64::from(days));
    let mut report = CleanupReport {
        dry_run,
        ..Default::default()
    };
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!(dir = %dir.display(), error = %e, "Nothing to prune");
            return report;
        }
    };

    for entry in entries.filter_map(Result::ok) {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(ts) = extract_timestamp(&entry.file_name().to_string_lossy()) else {
            continue;
        };
        if ts < cutoff {
            report.candidates.push(CleanupCandidate {
                size_bytes: entry.metadata().map(|m| m.len()).unwrap_or(0),
                path,
                tier: Tier::Metadata,
                partition_timestamp: ts,
                age_days: (now - ts).num_days(),
            });
        }
    }
    report.candidates.sort_by(|a, b| {
        a.partition_timestamp
            .cmp(&b.partition_timestamp)
            .then_with(|| a.path.cmp(&b.path))
    });
    report.total_bytes = report.candidates.iter().map(|c| c.size_bytes).sum();

    if dry_run {
        return report;
    }
    for c in &report.candidates {
        match fs::remove_file(&c.path) {
            Ok(()) => {
                info!(path = %c.path.display(), age_days = c.age_days, "Deleted expired file");
                report.deleted.push(c.path.clone());
            }
            Err(e) => {
                error!(path = %c.path.display(), error = %e, "Failed to delete file");
                report.failed.push(CleanupFailure {
                    path: c.path.clone(),
                    error: e.to_string(),
                });
            }
        }
    }
    report
}

fn collect_expired(
    tier_dir: &Path,
    tier: Tier,
    now: DateTime<Utc>,
    cutoff: DateTime<Utc>,
    out: &mut Vec<CleanupCandidate>,
) {
    let mut walker = WalkDir::new(tier_dir).min_depth(1).into_iter();
    while let Some(entry) = walker.next() {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                debug!(error = %e, "Skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if !is_timestamp_segment(&name) {
            continue;
        }
        // Partitions are leaves of the layout; nothing below them is scanned.
        walker.skip_current_dir();

        let Some(ts) = parse_timestamp_segment(&name) else {
            debug!(path = %entry.path().display(), "Malformed timestamp partition, skipped");
            continue;
        };
        if ts < cutoff {
            out.push(CleanupCandidate {
                path: entry.path().to_path_buf(),
                tier,
                partition_timestamp: ts,
                age_days: (now - ts).num_days(),
                size_bytes: dir_size(entry.path()),
            });
        }
    }
}
