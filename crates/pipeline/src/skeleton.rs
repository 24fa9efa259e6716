use lakeshore_core::{PipelineConfig, Tier, API_SOURCE, FILE_SOURCE};
use lakeshore_storage::SkeletonEntry;

/// Directories `storage init` creates for the configured sources: a raw
/// partition root per data type plus the archive roots for backups.
pub fn skeleton_from_config(config: &PipelineConfig) -> Vec<SkeletonEntry> {
    let mut entries = Vec::new();
    for source in &config.ingestion.sources {
        entries.push(SkeletonEntry::new(Tier::Raw, FILE_SOURCE, source.data_type.as_str()));
        entries.push(SkeletonEntry::new(
            Tier::Archive,
            FILE_SOURCE,
            format!("{}_files", source.data_type),
        ));
    }
    for name in config.api.endpoints.keys() {
        entries.push(SkeletonEntry::new(Tier::Raw, API_SOURCE, name.as_str()));
    }
    if !config.api.endpoints.is_empty() {
        entries.push(SkeletonEntry::new(Tier::Archive, API_SOURCE, "api_responses"));
    }
    entries
}
