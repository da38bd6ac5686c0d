use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// What to do with a trigger whose fire instant has already passed by more
/// than the misfire threshold when the dispatcher first observes it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MisfirePolicy {
    /// Fire immediately on the next dispatch pass.
    #[default]
    FireNow,
    /// Mark the job failed without invoking the delivery action.
    Skip,
}

/// The time specification governing when a job becomes eligible to run.
///
/// Exactly one active trigger exists per job; it is consumed when the
/// dispatcher claims it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trigger {
    /// The job this trigger fires.
    pub job_id: String,
    /// Absolute fire instant, timezone-resolved at submission.
    pub fire_at: DateTime<Utc>,
    pub misfire: MisfirePolicy,
}

impl Trigger {
    pub fn new(job_id: impl Into<String>, fire_at: DateTime<Utc>, misfire: MisfirePolicy) -> Self {
        Self {
            job_id: job_id.into(),
            fire_at,
            misfire,
        }
    }

    /// A trigger is due once its fire instant is <= now.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.fire_at <= now
    }

    /// A trigger is misfired once it is due by more than `threshold`.
    pub fn is_misfired(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        now - self.fire_at > threshold
    }
}
