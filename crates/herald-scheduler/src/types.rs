use chrono::{DateTime, Utc};
use herald_core::Message;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Group tag applied to every scheduled message job.
pub const MESSAGE_JOB_GROUP: &str = "message-jobs";

/// Failure detail recorded when a trigger misfires under the `Skip` policy.
pub const MISFIRED: &str = "misfired: fire time elapsed before dispatch";

/// Lifecycle state of a scheduled job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Waiting for its fire instant.
    Pending,
    /// Claimed by the dispatcher; delivery in flight.
    Firing,
    /// Delivery finished successfully.
    Completed,
    /// Delivery errored, or the trigger misfired under `Skip`.
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobState::Pending => "pending",
            JobState::Firing => "firing",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for JobState {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobState::Pending),
            "firing" => Ok(JobState::Firing),
            "completed" => Ok(JobState::Completed),
            "failed" => Ok(JobState::Failed),
            other => Err(format!("unknown job state: {other}")),
        }
    }
}

/// A scheduled job record.
///
/// State transitions are owned by the dispatcher and executor; callers only
/// observe snapshots via `SchedulerService::status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// UUID v4 string — unique for the process lifetime, never reused.
    pub id: String,
    /// Group tag, constant for message jobs.
    pub group: String,
    /// The payload delivered at fire time.
    pub message: Message,
    /// Current lifecycle state.
    pub state: JobState,
    /// Instant the job should fire, resolved to UTC at submission.
    pub fire_at: DateTime<Utc>,
    /// Instant the job was submitted.
    pub submitted_at: DateTime<Utc>,
    /// Instant the dispatcher claimed the trigger, if it has.
    pub fired_at: Option<DateTime<Utc>>,
    /// Instant the job reached a terminal state, if it has.
    pub finished_at: Option<DateTime<Utc>>,
    /// Captured error detail for `Failed` jobs.
    pub failure: Option<String>,
}

impl Job {
    pub fn new(message: Message, fire_at: DateTime<Utc>, submitted_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            group: MESSAGE_JOB_GROUP.to_string(),
            message,
            state: JobState::Pending,
            fire_at,
            submitted_at,
            fired_at: None,
            finished_at: None,
            failure: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn job_state_round_trip() {
        for state in [
            JobState::Pending,
            JobState::Firing,
            JobState::Completed,
            JobState::Failed,
        ] {
            let parsed: JobState = state.to_string().parse().unwrap();
            assert_eq!(parsed, state);
        }
        assert!("exploded".parse::<JobState>().is_err());
    }

    #[test]
    fn new_job_is_pending_with_fresh_id() {
        let at = Utc.with_ymd_and_hms(2030, 1, 1, 9, 0, 0).unwrap();
        let a = Job::new(Message::new("hi"), at, at);
        let b = Job::new(Message::new("hi"), at, at);

        assert_eq!(a.state, JobState::Pending);
        assert_eq!(a.group, MESSAGE_JOB_GROUP);
        assert!(a.fired_at.is_none() && a.finished_at.is_none());
        assert_ne!(a.id, b.id);
    }
}
