use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::SchedulerError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    #[default]
    Idle,
    Running,
    /// Last run completed and reported success.
    Success,
    /// Last run completed but reported a logical failure.
    Failed,
    /// Last run returned an error or panicked.
    Error,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    pub status: JobState,
    pub last_start: Option<DateTime<Utc>>,
    pub last_end: Option<DateTime<Utc>>,
    pub duration_secs: Option<f64>,
    pub success_count: u64,
    pub failure_count: u64,
    pub last_error: Option<String>,
    pub last_summary: Option<Json>,
    pub next_run: Option<DateTime<Utc>>,
}

/// Job name → status, persisted as one JSON object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchedulerState {
    pub jobs: BTreeMap<String, JobStatus>,
}

pub type SharedSchedulerState = Arc<RwLock<SchedulerState>>;

impl SchedulerState {
    pub fn get(&self, name: &str) -> Option<&JobStatus> {
        self.jobs.get(name)
    }

    pub fn is_running(&self, name: &str) -> bool {
        self.get(name).is_some_and(|s| s.status == JobState::Running)
    }

    /// Ensure an entry exists; counters from a previous session are kept.
    pub fn register(&mut self, name: &str, next_run: Option<DateTime<Utc>>) {
        let entry = self.jobs.entry(name.to_string()).or_default();
        entry.next_run = next_run;
    }

    pub fn set_next_run(&mut self, name: &str, next_run: Option<DateTime<Utc>>) {
        if let Some(entry) = self.jobs.get_mut(name) {
            entry.next_run = next_run;
        }
    }

    pub fn mark_running(&mut self, name: &str, at: DateTime<Utc>) {
        let entry = self.jobs.entry(name.to_string()).or_default();
        entry.status = JobState::Running;
        entry.last_start = Some(at);
        entry.last_error = None;
    }

    /// Record a completed run. `state` must be a terminal state.
    pub fn finish(
        &mut self,
        name: &str,
        state: JobState,
        at: DateTime<Utc>,
        error: Option<String>,
        summary: Option<Json>,
    ) {
        let entry = self.jobs.entry(name.to_string()).or_default();
        entry.status = state;
        entry.last_end = Some(at);
        entry.duration_secs = entry
            .last_start
            .map(|start| (at - start).num_milliseconds() as f64 / 1000.0);
        match state {
            JobState::Success => entry.success_count += 1,
            JobState::Failed | JobState::Error => entry.failure_count += 1,
            JobState::Idle | JobState::Running => {}
        }
        entry.last_error = error;
        entry.last_summary = summary;
    }

    /// Load a persisted table. Jobs left `running` by an interrupted process
    /// come back as `idle`.
    pub fn load(path: &Path) -> Result<Self, SchedulerError> {
        let content = fs::read(path)?;
        let mut state: Self = serde_json::from_slice(&content)?;
        for status in state.jobs.values_mut() {
            if status.status == JobState::Running {
                status.status = JobState::Idle;
            }
        }
        Ok(state)
    }

    /// Write the table to `path` through a temp file and rename.
    pub fn save(&self, path: &Path) -> Result<(), SchedulerError> {
        let parent = path.parent().filter(|p| !p.as_os_str().is_empty());
        if let Some(dir) = parent {
            fs::create_dir_all(dir)?;
        }
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "scheduler_status.json".to_string());
        let tmp = path.with_file_name(format!(".{file_name}.{}.tmp", uuid::Uuid::new_v4()));

        fs::write(&tmp, serde_json::to_vec_pretty(self)?)?;
        if let Err(e) = fs::rename(&tmp, path) {
            fs::remove_file(&tmp).ok();
            return Err(e.into());
        }
        Ok(())
    }
}
