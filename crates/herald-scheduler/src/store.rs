//! In-memory job registry with an ordered due-index.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use crate::error::{Result, SchedulerError};
use crate::trigger::Trigger;
use crate::types::{Job, JobState};

struct Entry {
    job: Job,
    /// Present while the job is pending; consumed by `mark_firing` (or by a
    /// misfire skip) so a trigger can never be claimed twice.
    trigger: Option<Trigger>,
    seq: u64,
}

#[derive(Default)]
struct Inner {
    jobs: HashMap<String, Entry>,
    /// Due-index keyed (fire_at, insertion seq): iteration order is
    /// fire-instant ascending with FIFO tie-break.
    due: BTreeMap<(DateTime<Utc>, u64), String>,
    next_seq: u64,
}

/// Mapping from job id to (job, trigger), plus the due-index the dispatcher
/// polls. The single mutex makes every mutation atomic with respect to the
/// others — the store is the only shared mutable structure in the core.
#[derive(Default)]
pub struct JobStore {
    inner: Mutex<Inner>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job and its trigger as one atomic unit.
    pub fn insert(&self, job: Job, trigger: Trigger) {
        let inner = &mut *self.inner.lock().unwrap();
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.due.insert((trigger.fire_at, seq), job.id.clone());
        inner.jobs.insert(
            job.id.clone(),
            Entry {
                job,
                trigger: Some(trigger),
                seq,
            },
        );
    }

    /// All unclaimed triggers with fire instant <= `now`, fire-instant
    /// ascending, ties broken by insertion order.
    pub fn due_before(&self, now: DateTime<Utc>) -> Vec<(Job, Trigger)> {
        let inner = self.inner.lock().unwrap();
        inner
            .due
            .range(..=(now, u64::MAX))
            .filter_map(|(_, id)| {
                let entry = inner.jobs.get(id)?;
                let trigger = entry.trigger.clone()?;
                Some((entry.job.clone(), trigger))
            })
            .collect()
    }

    /// Claim a job for execution: atomically transition Pending -> Firing and
    /// drop its trigger from the due-index. Exactly one concurrent claimant
    /// succeeds; the rest get `AlreadyHandled` and must skip the job.
    pub fn mark_firing(&self, id: &str, at: DateTime<Utc>) -> Result<Job> {
        let inner = &mut *self.inner.lock().unwrap();
        let (key, job) = {
            let entry = inner
                .jobs
                .get_mut(id)
                .ok_or_else(|| SchedulerError::JobNotFound { id: id.to_string() })?;
            if entry.job.state != JobState::Pending {
                return Err(SchedulerError::AlreadyHandled { id: id.to_string() });
            }
            let trigger = match entry.trigger.take() {
                Some(t) => t,
                None => {
                    return Err(SchedulerError::AlreadyHandled { id: id.to_string() });
                }
            };
            entry.job.state = JobState::Firing;
            entry.job.fired_at = Some(at);
            ((trigger.fire_at, entry.seq), entry.job.clone())
        };
        inner.due.remove(&key);
        Ok(job)
    }

    /// Record successful delivery: Firing -> Completed.
    pub fn complete(&self, id: &str, at: DateTime<Utc>) -> Result<()> {
        let inner = &mut *self.inner.lock().unwrap();
        let entry = inner
            .jobs
            .get_mut(id)
            .ok_or_else(|| SchedulerError::JobNotFound { id: id.to_string() })?;
        if entry.job.state != JobState::Firing {
            return Err(SchedulerError::AlreadyHandled { id: id.to_string() });
        }
        entry.job.state = JobState::Completed;
        entry.job.finished_at = Some(at);
        Ok(())
    }

    /// Record a failure with captured detail. Valid from Firing (delivery
    /// error) and from Pending (misfire skip, which also consumes the
    /// trigger).
    pub fn fail(&self, id: &str, at: DateTime<Utc>, detail: impl Into<String>) -> Result<()> {
        let inner = &mut *self.inner.lock().unwrap();
        let key = {
            let entry = inner
                .jobs
                .get_mut(id)
                .ok_or_else(|| SchedulerError::JobNotFound { id: id.to_string() })?;
            if entry.job.state.is_terminal() {
                return Err(SchedulerError::AlreadyHandled { id: id.to_string() });
            }
            let key = entry
                .trigger
                .take()
                .map(|trigger| (trigger.fire_at, entry.seq));
            entry.job.state = JobState::Failed;
            entry.job.finished_at = Some(at);
            entry.job.failure = Some(detail.into());
            key
        };
        if let Some(key) = key {
            inner.due.remove(&key);
        }
        Ok(())
    }

    /// Cancel a pending job. Once `mark_firing` has succeeded the job can no
    /// longer be removed — callers may only observe the outcome.
    pub fn remove(&self, id: &str) -> Result<()> {
        let inner = &mut *self.inner.lock().unwrap();
        let state = inner
            .jobs
            .get(id)
            .map(|e| e.job.state)
            .ok_or_else(|| SchedulerError::JobNotFound { id: id.to_string() })?;
        if state != JobState::Pending {
            return Err(SchedulerError::AlreadyHandled { id: id.to_string() });
        }
        if let Some(entry) = inner.jobs.remove(id) {
            if let Some(trigger) = entry.trigger {
                inner.due.remove(&(trigger.fire_at, entry.seq));
            }
        }
        Ok(())
    }

    /// Snapshot of a job's current record.
    pub fn get(&self, id: &str) -> Option<Job> {
        self.inner.lock().unwrap().jobs.get(id).map(|e| e.job.clone())
    }

    /// Earliest unclaimed fire instant — the dispatcher's next wake target.
    pub fn next_fire_at(&self) -> Option<DateTime<Utc>> {
        self.inner
            .lock()
            .unwrap()
            .due
            .keys()
            .next()
            .map(|(at, _)| *at)
    }

    /// Number of jobs still waiting to fire.
    pub fn pending_count(&self) -> usize {
        self.inner.lock().unwrap().due.len()
    }

    /// Evict terminal jobs that finished at or before `cutoff`. Returns how
    /// many were removed.
    pub fn sweep_finished(&self, cutoff: DateTime<Utc>) -> usize {
        let inner = &mut *self.inner.lock().unwrap();
        let before = inner.jobs.len();
        inner.jobs.retain(|_, entry| {
            !(entry.job.state.is_terminal()
                && entry.job.finished_at.is_some_and(|t| t <= cutoff))
        });
        before - inner.jobs.len()
    }
}
