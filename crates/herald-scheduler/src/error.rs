use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur within the scheduling core.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The requested fire instant is not in the future at submission time.
    #[error("Invalid schedule: fire time {requested} is before current time {now}")]
    InvalidSchedule {
        requested: DateTime<Utc>,
        now: DateTime<Utc>,
    },

    /// No job with the given ID exists in the store.
    #[error("Job not found: {id}")]
    JobNotFound { id: String },

    /// The job's trigger was already claimed (double-fire race guard) or the
    /// job has moved past the state the operation expects.
    #[error("Job already handled: {id}")]
    AlreadyHandled { id: String },

    /// The scheduler is not accepting submissions (e.g. during shutdown).
    #[error("Scheduler unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
