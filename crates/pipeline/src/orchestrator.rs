//! File phase → cooldown → API phase, with one run metadata document per run.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use lakeshore_core::PipelineConfig;
use lakeshore_ingest::{ApiIngestionJob, FileIngestionJob, IngestionJob, IngestionStatus};
use lakeshore_scheduler::{SchedulerState, SharedSchedulerState};
use lakeshore_storage::{StorageOrganizer, TIMESTAMP_FORMAT};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::report::{PhaseReport, RunMode, RunReport, RunSummary};

const SLEEP_SLICE: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Serialize)]
pub struct ComponentStatus {
    pub file_ingester: bool,
    pub api_ingester: bool,
    pub scheduler: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DirectoryStatus {
    pub path: PathBuf,
    pub exists: bool,
    /// Direct entries only.
    pub file_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineStatus {
    pub timestamp: DateTime<Utc>,
    pub components: ComponentStatus,
    /// Live table when a scheduler is attached, else the last persisted one.
    pub scheduler: Option<SchedulerState>,
    pub data_directories: BTreeMap<String, DirectoryStatus>,
}

pub struct Orchestrator {
    file_job: Option<Arc<dyn IngestionJob>>,
    api_job: Option<Arc<dyn IngestionJob>>,
    metadata_dir: PathBuf,
    cooldown: Duration,
    data_dirs: BTreeMap<String, PathBuf>,
    scheduler_state: Option<SharedSchedulerState>,
    status_file: Option<PathBuf>,
    shutdown: Arc<AtomicBool>,
}

impl Orchestrator {
    /// An orchestrator with no ingesters attached.
    pub fn new(metadata_dir: impl Into<PathBuf>) -> Self {
        let metadata_dir = metadata_dir.into();
        let mut data_dirs = BTreeMap::new();
        data_dirs.insert("metadata_dir".to_string(), metadata_dir.clone());
        Self {
            file_job: None,
            api_job: None,
            metadata_dir,
            cooldown: Duration::from_secs(10),
            data_dirs,
            scheduler_state: None,
            status_file: None,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Build both ingesters from `config`. An API client that cannot be
    /// built leaves the API ingester uninitialized; its phase then fails.
    pub fn from_config(config: &PipelineConfig, shutdown: Arc<AtomicBool>) -> Self {
        let organizer = StorageOrganizer::new(&config.data.base_dir);
        let file_job = FileIngestionJob::new(config.ingestion.clone(), organizer.clone())
            .with_shutdown(Arc::clone(&shutdown));

        let mut orchestrator = Self::new(&config.data.metadata_dir)
            .with_file_job(Arc::new(file_job))
            .with_cooldown(Duration::from_secs(config.orchestrator.cooldown_secs))
            .with_data_dir("base_dir", &config.data.base_dir)
            .with_status_file(&config.data.status_file)
            .with_shutdown(Arc::clone(&shutdown));

        match ApiIngestionJob::new(config.api.clone(), organizer) {
            Ok(job) => orchestrator = orchestrator.with_api_job(Arc::new(job.with_shutdown(shutdown))),
            Err(e) => error!(error = %e, "API ingester could not be initialized"),
        }
        orchestrator
    }

    pub fn with_file_job(mut self, job: Arc<dyn IngestionJob>) -> Self {
        self.file_job = Some(job);
        self
    }

    pub fn with_api_job(mut self, job: Arc<dyn IngestionJob>) -> Self {
        self.api_job = Some(job);
        self
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn with_data_dir(mut self, name: &str, path: impl Into<PathBuf>) -> Self {
        self.data_dirs.insert(name.to_string(), path.into());
        self
    }

    pub fn with_scheduler_state(mut self, state: SharedSchedulerState) -> Self {
        self.scheduler_state = Some(state);
        self
    }

    /// Persisted scheduler table to report when no scheduler is attached.
    pub fn with_status_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.status_file = Some(path.into());
        self
    }

    pub fn with_shutdown(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown = flag;
        self
    }

    pub fn file_job(&self) -> Option<Arc<dyn IngestionJob>> {
        self.file_job.clone()
    }

    pub fn api_job(&self) -> Option<Arc<dyn IngestionJob>> {
        self.api_job.clone()
    }

    fn shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    async fn run_phase(&self, label: &str, job: Option<&Arc<dyn IngestionJob>>) -> PhaseReport {
        let start = Instant::now();
        let Some(job) = job else {
            return PhaseReport::failed(format!("{label} ingester not initialized"), 0.0);
        };

        info!(phase = label, "Starting ingestion phase");
        let report = match job.run().await {
            Ok(results) => PhaseReport::from_results(results, start.elapsed().as_secs_f64()),
            Err(e) => {
                error!(phase = label, error = %e, "Ingestion phase could not run");
                PhaseReport::failed(e, start.elapsed().as_secs_f64())
            }
        };
        info!(
            phase = label,
            success = report.success,
            sources = report.results.len(),
            records = report.records(),
            elapsed_secs = report.elapsed_secs,
            "Ingestion phase finished"
        );
        report
    }

    /// Sleep for the cooldown unless shutdown interrupts it.
    async fn cooldown(&self) {
        if self.cooldown.is_zero() {
            return;
        }
        info!(secs = self.cooldown.as_secs(), "Cooling down before API ingestion");
        let mut remaining = self.cooldown;
        while !remaining.is_zero() && !self.shutting_down() {
            let step = remaining.min(SLEEP_SLICE);
            tokio::time::sleep(step).await;
            remaining -= step;
        }
    }

    /// Run the phases `mode` selects. A failed phase never prevents the
    /// other one; shutdown skips phases not yet started.
    pub async fn run(&self, mode: RunMode) -> RunReport {
        let started_at = Utc::now();
        let start = Instant::now();
        info!(?mode, "Pipeline run started");

        let file = if mode.includes_file() {
            Some(self.run_phase("file", self.file_job.as_ref()).await)
        } else {
            None
        };

        if mode == RunMode::Full {
            self.cooldown().await;
        }

        let api = if mode.includes_api() && !self.shutting_down() {
            Some(self.run_phase("api", self.api_job.as_ref()).await)
        } else {
            if mode.includes_api() {
                warn!("Shutdown requested, skipping API phase");
            }
            None
        };

        let summary = RunSummary::from_phases(file.as_ref(), api.as_ref());
        let overall_status = if summary.failed_sources == 0 {
            IngestionStatus::Success
        } else {
            IngestionStatus::Failed
        };

        let mut report = RunReport {
            mode,
            started_at,
            finished_at: Utc::now(),
            elapsed_secs: start.elapsed().as_secs_f64(),
            overall_status,
            file_ingestion: file,
            api_ingestion: api,
            summary,
            metadata_path: None,
        };

        match write_run_metadata(&self.metadata_dir, &report) {
            Ok(path) => {
                info!(path = %path.display(), "Run metadata saved");
                report.metadata_path = Some(path);
            }
            Err(e) => error!(dir = %self.metadata_dir.display(), error = %e, "Failed to save run metadata"),
        }

        let s = &report.summary;
        info!(
            status = ?report.overall_status,
            elapsed_secs = report.elapsed_secs,
            total_sources = s.total_sources,
            successful = s.successful_sources,
            failed = s.failed_sources,
            total_records = s.total_records,
            file_records = s.file_records,
            api_records = s.api_records,
            "Pipeline run finished"
        );
        for err in &s.errors {
            warn!(error = %err, "Source failed");
        }
        report
    }

    pub async fn run_full(&self) -> RunReport {
        self.run(RunMode::Full).await
    }

    pub fn status(&self) -> PipelineStatus {
        let scheduler = match &self.scheduler_state {
            Some(state) => Some(state.read().unwrap_or_else(PoisonError::into_inner).clone()),
            None => self
                .status_file
                .as_deref()
                .filter(|p| p.is_file())
                .and_then(|p| match SchedulerState::load(p) {
                    Ok(state) => Some(state),
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Unreadable scheduler status");
                        None
                    }
                }),
        };

        let data_directories = self
            .data_dirs
            .iter()
            .map(|(name, path)| (name.clone(), directory_status(path)))
            .collect();

        PipelineStatus {
            timestamp: Utc::now(),
            components: ComponentStatus {
                file_ingester: self.file_job.is_some(),
                api_ingester: self.api_job.is_some(),
                scheduler: self.scheduler_state.is_some(),
            },
            scheduler,
            data_directories,
        }
    }
}

fn directory_status(path: &Path) -> DirectoryStatus {
    let file_count = fs::read_dir(path).map(|entries| entries.count()).unwrap_or(0);
    DirectoryStatus {
        path: path.to_path_buf(),
        exists: path.is_dir(),
        file_count,
    }
}

/// Write `pipeline_execution_<ts>.json`, adding `_1`, `_2`, … when a run in
/// the same second already claimed the name.
fn write_run_metadata(dir: &Path, report: &RunReport) -> std::io::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let json = serde_json::to_vec_pretty(report)?;
    let stamp = report.started_at.format(TIMESTAMP_FORMAT).to_string();

    for n in 0u32.. {
        let name = match n {
            0 => format!("pipeline_execution_{stamp}.json"),
            n => format!("pipeline_execution_{stamp}_{n}.json"),
        };
        let path = dir.join(name);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                file.write_all(&json)?;
                return Ok(path);
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e),
        }
    }
    Err(std::io::Error::new(ErrorKind::Other, "no free run metadata name"))
}
