//! Lake-wide maintenance: skeleton creation, legacy migration, statistics,
//! structural validation and a Markdown report.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use lakeshore_core::config::MigrationRule;
use lakeshore_core::Tier;
use serde::Serialize;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::dir_size;
use crate::organizer::StorageOrganizer;
use crate::partition::{is_timestamp_segment, parse_timestamp_segment};
use crate::StorageError;

/// One `<tier>/source=<source>/type=<data_type>` directory to pre-create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkeletonEntry {
    pub tier: Tier,
    pub source: String,
    pub data_type: String,
}

impl SkeletonEntry {
    pub fn new(tier: Tier, source: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            tier,
            source: source.into(),
            data_type: data_type.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MigrationSummary {
    pub migrated: Vec<PathBuf>,
    pub failed: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TierStatistics {
    pub size_bytes: u64,
    pub file_count: usize,
    pub partition_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct StorageStatistics {
    pub tiers: BTreeMap<Tier, TierStatistics>,
    pub total_bytes: u64,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub issues: Vec<String>,
    pub recommendations: Vec<String>,
}

fn is_pointer_or_temp(name: &str) -> bool {
    name.contains("_latest.") || (name.starts_with('.') && name.ends_with(".tmp"))
}

#[derive(Debug, Clone)]
pub struct LayoutManager {
    base_dir: PathBuf,
    organizer: StorageOrganizer,
}

impl LayoutManager {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        let base_dir = base_dir.into();
        Self {
            organizer: StorageOrganizer::new(base_dir.clone()),
            base_dir,
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Create every tier root plus the given source/type directories.
    pub fn initialize(&self, skeleton: &[SkeletonEntry]) -> Result<Vec<PathBuf>, StorageError> {
        let mut created = Vec::new();
        for tier in Tier::ALL {
            let dir = self.base_dir.join(tier.as_str());
            fs::create_dir_all(&dir)?;
            created.push(dir);
        }
        for entry in skeleton {
            let dir = self
                .base_dir
                .join(entry.tier.as_str())
                .join(format!("source={}", entry.source))
                .join(format!("type={}", entry.data_type));
            fs::create_dir_all(&dir)?;
            created.push(dir);
        }
        info!(base_dir = %self.base_dir.display(), dirs = created.len(), "Storage layout initialized");
        Ok(created)
    }

    /// Move legacy files matching each rule into the partitioned layout.
    /// Per-file failures are logged and counted; they never stop the pass.
    pub fn migrate(&self, rules: &[MigrationRule]) -> MigrationSummary {
        let mut summary = MigrationSummary::default();
        for rule in rules {
            let entries = match fs::read_dir(&rule.dir) {
                Ok(entries) => entries,
                Err(e) => {
                    debug!(dir = %rule.dir.display(), error = %e, "Migration source not readable, skipped");
                    continue;
                }
            };
            let mut files: Vec<PathBuf> = entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.is_file())
                .filter(|p| matches_rule(p, rule))
                .collect();
            files.sort();

            for file in files {
                match self
                    .organizer
                    .organize_file(&file, &rule.data_type, &rule.source, rule.tier)
                {
                    Ok(target) => summary.migrated.push(target),
                    Err(e) => {
                        warn!(file = %file.display(), error = %e, "Failed to migrate file");
                        summary.failed += 1;
                    }
                }
            }
        }
        info!(migrated = summary.migrated.len(), failed = summary.failed, "Migration complete");
        summary
    }

    pub fn statistics(&self) -> StorageStatistics {
        let mut tiers = BTreeMap::new();
        for tier in Tier::ALL {
            let dir = self.base_dir.join(tier.as_str());
            if !dir.is_dir() {
                continue;
            }
            let mut stats = TierStatistics {
                size_bytes: dir_size(&dir),
                ..Default::default()
            };
            for entry in WalkDir::new(&dir).into_iter().filter_map(|e| e.ok()) {
                if entry.file_type().is_file() {
                    stats.file_count += 1;
                } else if entry.file_type().is_dir()
                    && is_timestamp_segment(&entry.file_name().to_string_lossy())
                {
                    stats.partition_count += 1;
                }
            }
            tiers.insert(tier, stats);
        }
        let total_bytes = tiers.values().map(|s| s.size_bytes).sum();
        StorageStatistics {
            tiers,
            total_bytes,
            generated_at: Utc::now(),
        }
    }

    pub fn validate(&self) -> ValidationReport {
        let mut report = ValidationReport::default();

        for tier in Tier::ALL {
            let dir = self.base_dir.join(tier.as_str());
            if !dir.is_dir() {
                report.issues.push(format!("Missing tier directory: {}", dir.display()));
                continue;
            }

            match fs::read_dir(&dir) {
                Ok(entries) => {
                    for entry in entries.filter_map(|e| e.ok()) {
                        let name = entry.file_name().to_string_lossy().into_owned();
                        if entry.path().is_file() && !is_pointer_or_temp(&name) {
                            report.issues.push(format!("Orphaned file in {tier}: {name}"));
                            report
                                .recommendations
                                .push(format!("Move {name} into the partitioned layout (storage migrate)"));
                        }
                    }
                }
                Err(e) => report.issues.push(format!("Unreadable tier directory {}: {e}", dir.display())),
            }

            for entry in WalkDir::new(&dir).min_depth(1).into_iter().filter_map(|e| e.ok()) {
                let name = entry.file_name().to_string_lossy();
                if entry.file_type().is_dir()
                    && is_timestamp_segment(&name)
                    && parse_timestamp_segment(&name).is_none()
                {
                    report
                        .issues
                        .push(format!("Malformed partition: {}", entry.path().display()));
                }
            }
        }

        report.valid = report.issues.is_empty();
        report
    }

    /// Markdown summary combining statistics and validation.
    pub fn report(&self) -> String {
        let stats = self.statistics();
        let validation = self.validate();

        let mut out = String::new();
        let _ = writeln!(out, "# Data Lake Storage Report");
        let _ = writeln!(out, "Generated: {}", stats.generated_at.format("%Y-%m-%d %H:%M:%S UTC"));
        let _ = writeln!(out);
        let _ = writeln!(out, "## Storage Statistics");
        let _ = writeln!(out, "Total Size: {:.2} MB", mb(stats.total_bytes));
        let _ = writeln!(out);
        let _ = writeln!(out, "### Tier Breakdown");
        for (tier, s) in &stats.tiers {
            let _ = writeln!(
                out,
                "- **{tier}**: {:.2} MB ({} files, {} partitions)",
                mb(s.size_bytes),
                s.file_count,
                s.partition_count
            );
        }
        let _ = writeln!(out);
        let _ = writeln!(out, "## Storage Validation");
        let _ = writeln!(out, "Status: {}", if validation.valid { "VALID" } else { "INVALID" });
        if !validation.issues.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "### Issues Found");
            for issue in &validation.issues {
                let _ = writeln!(out, "- {issue}");
            }
        }
        if !validation.recommendations.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "### Recommendations");
            for rec in &validation.recommendations {
                let _ = writeln!(out, "- {rec}");
            }
        }
        out
    }
}

fn matches_rule(path: &Path, rule: &MigrationRule) -> bool {
    let name = match path.file_name() {
        Some(n) => n.to_string_lossy(),
        None => return false,
    };
    let ext_ok = path
        .extension()
        .map(|e| e.to_string_lossy().eq_ignore_ascii_case(rule.extension.trim_start_matches('.')))
        .unwrap_or(false);
    ext_ok && name.starts_with(&rule.prefix)
}

fn mb(bytes: u64) -> f64 {
    bytes as f64 / 1024.0 / 1024.0
}
