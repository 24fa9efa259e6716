use async_trait::async_trait;
use serde_json::Value as Json;

/// What a job reports back when it ran to completion.
///
/// `success = false` is a logical failure (some source failed); an `Err` from
/// [`ScheduledJob::run`] is an error.
#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub success: bool,
    pub summary: Json,
}

impl JobOutcome {
    pub fn success(summary: Json) -> Self {
        Self {
            success: true,
            summary,
        }
    }

    pub fn failure(summary: Json) -> Self {
        Self {
            success: false,
            summary,
        }
    }
}

/// A unit of work the scheduler can run periodically.
#[async_trait]
pub trait ScheduledJob: Send + Sync {
    /// Unique name, used as the status table key.
    fn name(&self) -> &str;

    async fn run(&self) -> anyhow::Result<JobOutcome>;
}
