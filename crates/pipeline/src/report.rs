use std::path::PathBuf;

use chrono::{DateTime, Utc};
use lakeshore_ingest::{IngestionResult, IngestionStatus};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    File,
    Api,
    Full,
}

impl RunMode {
    pub fn includes_file(self) -> bool {
        matches!(self, RunMode::File | RunMode::Full)
    }

    pub fn includes_api(self) -> bool {
        matches!(self, RunMode::Api | RunMode::Full)
    }
}

/// One phase (file or API) of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseReport {
    pub success: bool,
    pub elapsed_secs: f64,
    pub results: Vec<IngestionResult>,
    /// Set when the phase could not run at all.
    pub error: Option<String>,
}

impl PhaseReport {
    pub fn from_results(results: Vec<IngestionResult>, elapsed_secs: f64) -> Self {
        Self {
            success: results.iter().all(IngestionResult::is_success),
            elapsed_secs,
            results,
            error: None,
        }
    }

    pub fn failed(error: impl ToString, elapsed_secs: f64) -> Self {
        Self {
            success: false,
            elapsed_secs,
            results: Vec::new(),
            error: Some(error.to_string()),
        }
    }

    pub fn records(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.is_success())
            .map(|r| r.records_count)
            .sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total_sources: usize,
    pub successful_sources: usize,
    pub failed_sources: usize,
    pub total_records: usize,
    pub file_records: usize,
    pub api_records: usize,
    pub errors: Vec<String>,
}

impl RunSummary {
    /// Count per-source results. A phase that could not start counts as one
    /// failed source.
    pub fn from_phases(file: Option<&PhaseReport>, api: Option<&PhaseReport>) -> Self {
        let mut summary = Self::default();
        for (label, phase) in [("file", file), ("api", api)] {
            let Some(phase) = phase else { continue };

            if let Some(error) = &phase.error {
                summary.total_sources += 1;
                summary.failed_sources += 1;
                summary.errors.push(format!("{label}: {error}"));
            }
            for result in &phase.results {
                summary.total_sources += 1;
                if result.is_success() {
                    summary.successful_sources += 1;
                } else {
                    summary.failed_sources += 1;
                    summary.errors.push(format!(
                        "{label} ({}): {}",
                        result.data_type,
                        result.errors.join("; ")
                    ));
                }
            }

            match label {
                "file" => summary.file_records = phase.records(),
                _ => summary.api_records = phase.records(),
            }
        }
        summary.total_records = summary.file_records + summary.api_records;
        summary
    }
}

/// The run metadata document written once per orchestrator run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub mode: RunMode,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub elapsed_secs: f64,
    pub overall_status: IngestionStatus,
    pub file_ingestion: Option<PhaseReport>,
    pub api_ingestion: Option<PhaseReport>,
    pub summary: RunSummary,
    #[serde(skip)]
    pub metadata_path: Option<PathBuf>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.overall_status == IngestionStatus::Success
    }
}
