//! Wires ingestion jobs, the lake and the scheduler into runnable pipelines.

pub mod jobs;
pub mod orchestrator;
pub mod report;
pub mod skeleton;

pub use jobs::{build_scheduler, HealthCheckJob, IngestionTask, RetentionCleanupJob};
pub use orchestrator::{ComponentStatus, DirectoryStatus, Orchestrator, PipelineStatus};
pub use report::{PhaseReport, RunMode, RunReport, RunSummary};
pub use skeleton::skeleton_from_config;
