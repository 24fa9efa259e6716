//! Partitioned data-lake storage: path layout, Parquet codec, organizer,
//! retention and layout maintenance.

pub mod error;
pub mod layout;
pub mod organizer;
pub mod parquet;
pub mod partition;
pub mod retention;

pub use error::{StorageError, WriteStage};
pub use layout::{
    LayoutManager, MigrationSummary, SkeletonEntry, StorageStatistics, TierStatistics, ValidationReport,
};
pub use organizer::{sidecar_path_for, Sidecar, StorageOrganizer};
pub use partition::{build_path, extract_timestamp, file_stem, parse_timestamp_segment, TIMESTAMP_FORMAT};
pub use retention::{prune_dated_files, CleanupCandidate, CleanupReport, RetentionManager};

/// Total size in bytes of all files below `dir` (0 if missing).
pub fn dir_size(dir: &std::path::Path) -> u64 {
    walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.metadata().ok())
        .map(|m| m.len())
        .sum()
}
