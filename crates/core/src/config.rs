use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{CoreError, Tier};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

// ── Top-level config ──────────────────────────────────────────

/// Resolved pipeline configuration, loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub ingestion: FileIngestionConfig,
    #[serde(default)]
    pub api: ApiIngestionConfig,
    #[serde(default)]
    pub scheduling: SchedulingConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
}

impl PipelineConfig {
    /// Load config from `path`. A missing file yields defaults with a warning;
    /// an unreadable or invalid file is an error.
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let mut config = if path.exists() {
            debug!(path = %path.display(), "Loading pipeline config");
            let content = std::fs::read_to_string(path)?;
            toml::from_str::<Self>(&content)?
        } else {
            warn!(path = %path.display(), "Config file not found, using defaults");
            Self::default()
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// `LAKESHORE_BASE_DIR` relocates the lake root.
    pub fn apply_env_overrides(&mut self) {
        if let Some(base) = env_opt("LAKESHORE_BASE_DIR") {
            debug!(base_dir = %base, "Base dir overridden from environment");
            self.data.base_dir = PathBuf::from(base);
        }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.ingestion.chunk_size == 0 {
            return Err(CoreError::Config("ingestion.chunk_size must be > 0".into()));
        }
        if self.ingestion.retry_attempts == 0 || self.api.retry_attempts == 0 {
            return Err(CoreError::Config("retry_attempts must be >= 1".into()));
        }
        if self.api.page_size == 0 {
            return Err(CoreError::Config("api.page_size must be > 0".into()));
        }
        for source in &self.ingestion.sources {
            if let DedupPolicy::KeySubset { columns, .. } = &source.dedup {
                if columns.is_empty() {
                    return Err(CoreError::Config(format!(
                        "source '{}' uses key_subset dedup without columns",
                        source.data_type
                    )));
                }
            }
        }
        Ok(())
    }
}

// ── Data directories ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Root of the partitioned lake.
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,
    /// Where orchestrator run metadata is written.
    #[serde(default = "default_metadata_dir")]
    pub metadata_dir: PathBuf,
    /// Persisted scheduler job status table.
    #[serde(default = "default_status_file")]
    pub status_file: PathBuf,
}

fn default_base_dir() -> PathBuf {
    PathBuf::from("data/lake")
}

fn default_metadata_dir() -> PathBuf {
    PathBuf::from("data/ingestion_metadata")
}

fn default_status_file() -> PathBuf {
    PathBuf::from("data/scheduler_status.json")
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
            metadata_dir: default_metadata_dir(),
            status_file: default_status_file(),
        }
    }
}

// ── Storage ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Tier → maximum partition age in days. Tiers not listed are never cleaned.
    #[serde(default = "default_retention")]
    pub retention_days: BTreeMap<Tier, u32>,
    /// Scheduled retention only reports when true.
    #[serde(default = "default_true")]
    pub cleanup_dry_run: bool,
    /// Legacy file locations moved into the layout by `storage migrate`.
    #[serde(default)]
    pub migrations: Vec<MigrationRule>,
}

fn default_retention() -> BTreeMap<Tier, u32> {
    BTreeMap::from([(Tier::Raw, 90), (Tier::Processed, 365), (Tier::Metadata, 730)])
}

fn default_true() -> bool {
    true
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            retention_days: default_retention(),
            cleanup_dry_run: true,
            migrations: Vec::new(),
        }
    }
}

/// Maps legacy files (`dir/<prefix>*.<extension>`) onto a partition key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationRule {
    pub dir: PathBuf,
    #[serde(default)]
    pub prefix: String,
    pub extension: String,
    pub data_type: String,
    pub source: String,
    #[serde(default = "default_migration_tier")]
    pub tier: Tier,
}

fn default_migration_tier() -> Tier {
    Tier::Raw
}

// ── File ingestion ────────────────────────────────────────────

/// Which rows count as duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum DedupPolicy {
    /// All fields equal; the first occurrence survives.
    FullRow,
    /// Equal on `columns`; `keep` picks the surviving occurrence.
    KeySubset {
        columns: Vec<String>,
        #[serde(default)]
        keep: Keep,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Keep {
    First,
    #[default]
    Last,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileSourceConfig {
    pub data_type: String,
    pub paths: Vec<PathBuf>,
    #[serde(default)]
    pub expected_columns: Vec<String>,
    #[serde(default = "default_dedup")]
    pub dedup: DedupPolicy,
}

fn default_dedup() -> DedupPolicy {
    DedupPolicy::FullRow
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileIngestionConfig {
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
    /// Copy original files into the archive tier after a successful load.
    #[serde(default = "default_true")]
    pub backup_files: bool,
    #[serde(default = "default_file_sources")]
    pub sources: Vec<FileSourceConfig>,
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    5
}

fn default_chunk_size() -> usize {
    10_000
}

fn default_delimiter() -> char {
    ','
}

fn default_file_sources() -> Vec<FileSourceConfig> {
    vec![
        FileSourceConfig {
            data_type: "events".into(),
            paths: vec![PathBuf::from("data/events.csv")],
            expected_columns: ["timestamp", "visitorid", "event", "itemid", "transactionid"]
                .map(String::from)
                .to_vec(),
            dedup: DedupPolicy::FullRow,
        },
        FileSourceConfig {
            data_type: "item_properties".into(),
            paths: vec![
                PathBuf::from("data/item_properties_part1.csv"),
                PathBuf::from("data/item_properties_part2.csv"),
            ],
            expected_columns: ["timestamp", "itemid", "property", "value"]
                .map(String::from)
                .to_vec(),
            dedup: DedupPolicy::KeySubset {
                columns: vec!["itemid".into(), "property".into()],
                keep: Keep::Last,
            },
        },
    ]
}

impl Default for FileIngestionConfig {
    fn default() -> Self {
        Self {
            retry_attempts: default_retry_attempts(),
            retry_delay_secs: default_retry_delay(),
            chunk_size: default_chunk_size(),
            delimiter: default_delimiter(),
            backup_files: true,
            sources: default_file_sources(),
        }
    }
}

// ── API ingestion ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub params: IndexMap<String, String>,
    #[serde(default)]
    pub headers: IndexMap<String, String>,
    /// Overrides `api.page_size` for this endpoint.
    #[serde(default)]
    pub page_size: Option<usize>,
    /// Request pages with `limit`/`skip` until exhausted.
    #[serde(default)]
    pub paginate: bool,
}

fn default_method() -> String {
    "GET".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiIngestionConfig {
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Pause between endpoints.
    #[serde(default = "default_rate_limit_delay")]
    pub rate_limit_delay_secs: u64,
    #[serde(default = "default_true")]
    pub backup_responses: bool,
    #[serde(default = "default_endpoints")]
    pub endpoints: IndexMap<String, EndpointConfig>,
}

fn default_timeout() -> u64 {
    30
}

fn default_page_size() -> usize {
    100
}

fn default_rate_limit_delay() -> u64 {
    1
}

fn default_endpoints() -> IndexMap<String, EndpointConfig> {
    let mut endpoints = IndexMap::new();
    endpoints.insert(
        "products".to_string(),
        EndpointConfig {
            url: "https://dummyjson.com/products".into(),
            method: default_method(),
            params: IndexMap::new(),
            headers: IndexMap::new(),
            page_size: None,
            paginate: true,
        },
    );
    endpoints.insert(
        "categories".to_string(),
        EndpointConfig {
            url: "https://dummyjson.com/products/categories".into(),
            method: default_method(),
            params: IndexMap::new(),
            headers: IndexMap::new(),
            page_size: None,
            paginate: false,
        },
    );
    endpoints
}

impl Default for ApiIngestionConfig {
    fn default() -> Self {
        Self {
            retry_attempts: default_retry_attempts(),
            retry_delay_secs: default_retry_delay(),
            timeout_secs: default_timeout(),
            page_size: default_page_size(),
            rate_limit_delay_secs: default_rate_limit_delay(),
            backup_responses: true,
            endpoints: default_endpoints(),
        }
    }
}

// ── Scheduling ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobScheduleConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// `"30m"`, `"6h"`, `"1d"`; a bare number means minutes.
    pub interval: Option<String>,
    /// Daily `"HH:MM"` in local time.
    #[serde(default)]
    pub start_time: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulingConfig {
    #[serde(default = "default_tick")]
    pub tick_secs: u64,
    #[serde(default = "default_file_schedule")]
    pub file_ingestion: JobScheduleConfig,
    #[serde(default = "default_api_schedule")]
    pub api_ingestion: JobScheduleConfig,
    #[serde(default = "default_health_interval")]
    pub health_check_interval: String,
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval: String,
}

fn default_tick() -> u64 {
    30
}

fn default_file_schedule() -> JobScheduleConfig {
    JobScheduleConfig {
        enabled: true,
        interval: Some("6h".into()),
        start_time: Some("08:00".into()),
    }
}

fn default_api_schedule() -> JobScheduleConfig {
    JobScheduleConfig {
        enabled: true,
        interval: Some("2h".into()),
        start_time: Some("09:00".into()),
    }
}

fn default_health_interval() -> String {
    "30m".into()
}

fn default_cleanup_interval() -> String {
    "24h".into()
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            tick_secs: default_tick(),
            file_ingestion: default_file_schedule(),
            api_ingestion: default_api_schedule(),
            health_check_interval: default_health_interval(),
            cleanup_interval: default_cleanup_interval(),
        }
    }
}

// ── Orchestrator ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Pause between the file and API phases.
    #[serde(default = "default_cooldown")]
    pub cooldown_secs: u64,
}

fn default_cooldown() -> u64 {
    10
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: default_cooldown(),
        }
    }
}
