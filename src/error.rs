use thiserror::Error;

pub type Result<T> = std::result::Result<T, ReconError>;

/// Engine-level failures. Tool failures never appear here: a broken or slow
/// external tool degrades its stage to empty data instead of erroring.
#[derive(Debug, Error)]
pub enum ReconError {
    #[error("scan {0} not found")]
    ScanNotFound(i64),

    #[error("schedule {0} not found")]
    ScheduleNotFound(i64),

    #[error("invalid cron expression '{0}'")]
    BadSchedule(String),

    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("{0}")]
    Internal(String),
}
