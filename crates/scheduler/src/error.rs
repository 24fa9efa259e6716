use thiserror::Error;

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("invalid interval '{0}' (expected e.g. 30m, 6h, 1d or minutes)")]
    InvalidInterval(String),

    #[error("invalid daily time '{0}' (expected HH:MM)")]
    InvalidTime(String),

    #[error("job '{0}' has neither an interval nor a daily time")]
    NoTrigger(String),

    #[error("job '{0}' is already registered")]
    DuplicateJob(String),

    #[error("unknown job '{0}'")]
    UnknownJob(String),

    #[error("job '{0}' is already running")]
    AlreadyRunning(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("status serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
