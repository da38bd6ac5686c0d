//! The dispatch loop: wake, query due triggers, claim, hand off.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration;
use herald_core::config::SchedulerConfig;
use herald_core::Clock;
use tokio::sync::{watch, Notify};
use tracing::{debug, error, info, warn};

use crate::error::SchedulerError;
use crate::executor::Executor;
use crate::store::JobStore;
use crate::trigger::MisfirePolicy;
use crate::types::MISFIRED;

/// How long to park when no trigger is pending. Submissions interrupt the
/// wait through the wake signal, so this only bounds the sweep cadence.
const IDLE_WAIT: StdDuration = StdDuration::from_secs(60);

/// Owns trigger selection. Selection is serialized (one loop), execution is
/// parallel (the executor's pool) — so no two workers ever fire the same job
/// and a slow delivery cannot starve the timer.
pub struct Dispatcher {
    store: Arc<JobStore>,
    clock: Arc<dyn Clock>,
    executor: Executor,
    wake: Arc<Notify>,
    misfire_threshold: Duration,
    retention: Duration,
}

impl Dispatcher {
    pub fn new(
        store: Arc<JobStore>,
        clock: Arc<dyn Clock>,
        executor: Executor,
        wake: Arc<Notify>,
        config: &SchedulerConfig,
    ) -> Self {
        Self {
            store,
            clock,
            executor,
            wake,
            misfire_threshold: Duration::seconds(config.misfire_threshold_secs as i64),
            retention: Duration::seconds(config.retention_secs as i64),
        }
    }

    /// Main loop. Sleeps until the earliest pending fire instant, waking
    /// early when a new trigger arrives, and runs until `shutdown`
    /// broadcasts `true`.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!("dispatcher started");
        loop {
            let wait = self.until_next_fire();
            tokio::select! {
                _ = tokio::time::sleep(wait) => self.pass(),
                _ = self.wake.notified() => self.pass(),
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("dispatcher shutting down");
                        break;
                    }
                }
            }
        }
    }

    fn until_next_fire(&self) -> StdDuration {
        match self.store.next_fire_at() {
            Some(next) => (next - self.clock.now())
                .to_std()
                .unwrap_or(StdDuration::ZERO),
            None => IDLE_WAIT,
        }
    }

    /// One dispatch pass: claim every due trigger and hand the jobs to the
    /// executor. Individual failures are logged and never stop the pass, let
    /// alone the loop.
    fn pass(&self) {
        let now = self.clock.now();

        for (job, trigger) in self.store.due_before(now) {
            if trigger.misfire == MisfirePolicy::Skip
                && trigger.is_misfired(now, self.misfire_threshold)
            {
                warn!(job_id = %job.id, fire_at = %trigger.fire_at, "trigger misfired, skipping");
                if let Err(e) = self.store.fail(&job.id, now, MISFIRED) {
                    debug!(job_id = %job.id, "misfire not recorded: {e}");
                }
                continue;
            }

            match self.store.mark_firing(&job.id, now) {
                Ok(claimed) => self.executor.spawn(claimed),
                // Lost the claim race to a concurrent pass — skip silently.
                Err(SchedulerError::AlreadyHandled { .. }) => {
                    debug!(job_id = %job.id, "trigger already claimed");
                }
                Err(e) => error!(job_id = %job.id, "claim failed: {e}"),
            }
        }

        let swept = self.store.sweep_finished(now - self.retention);
        if swept > 0 {
            debug!(count = swept, "swept finished jobs");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{t0, wait_for_terminal, RecordingDeliverer};
    use crate::trigger::Trigger;
    use crate::types::{Job, JobState};
    use herald_core::{Deliverer, ManualClock, Message};

    struct Fixture {
        store: Arc<JobStore>,
        clock: ManualClock,
        deliverer: Arc<RecordingDeliverer>,
        dispatcher: Dispatcher,
    }

    fn fixture(deliverer: Arc<RecordingDeliverer>) -> Fixture {
        let store = Arc::new(JobStore::new());
        let clock = ManualClock::new(t0());
        let config = SchedulerConfig::default();
        let deliverer_dyn: Arc<dyn Deliverer> = deliverer.clone();
        let executor = Executor::new(store.clone(), Arc::new(clock.clone()), deliverer_dyn, 1);
        let dispatcher = Dispatcher::new(
            store.clone(),
            Arc::new(clock.clone()),
            executor,
            Arc::new(Notify::new()),
            &config,
        );
        Fixture {
            store,
            clock,
            deliverer,
            dispatcher,
        }
    }

    fn schedule(
        store: &JobStore,
        text: &str,
        fire_at: chrono::DateTime<chrono::Utc>,
        misfire: MisfirePolicy,
    ) -> String {
        let job = Job::new(Message::new(text), fire_at, t0());
        let id = job.id.clone();
        store.insert(job, Trigger::new(id.clone(), fire_at, misfire));
        id
    }

    #[tokio::test]
    async fn fires_in_fire_instant_order() {
        let f = fixture(RecordingDeliverer::ok());
        let a = schedule(
            &f.store,
            "A",
            t0() + Duration::seconds(2),
            MisfirePolicy::FireNow,
        );
        let b = schedule(
            &f.store,
            "B",
            t0() + Duration::seconds(1),
            MisfirePolicy::FireNow,
        );

        f.clock.advance(Duration::seconds(3));
        f.dispatcher.pass();

        assert_eq!(wait_for_terminal(&f.store, &b).await, JobState::Completed);
        assert_eq!(wait_for_terminal(&f.store, &a).await, JobState::Completed);
        assert_eq!(f.deliverer.texts(), ["B".to_string(), "A".to_string()]);
    }

    #[tokio::test]
    async fn misfire_skip_fails_without_delivering() {
        let f = fixture(RecordingDeliverer::ok());
        let id = schedule(&f.store, "late", t0(), MisfirePolicy::Skip);

        f.clock.advance(Duration::seconds(
            herald_core::config::DEFAULT_MISFIRE_THRESHOLD_SECS as i64 + 1,
        ));
        f.dispatcher.pass();

        let job = f.store.get(&id).unwrap();
        assert_eq!(job.state, JobState::Failed);
        assert_eq!(job.failure.as_deref(), Some(MISFIRED));
        assert!(f.deliverer.texts().is_empty());
    }

    #[tokio::test]
    async fn misfire_fire_now_still_delivers() {
        let f = fixture(RecordingDeliverer::ok());
        let id = schedule(&f.store, "late", t0(), MisfirePolicy::FireNow);

        f.clock.advance(Duration::minutes(30));
        f.dispatcher.pass();

        assert_eq!(wait_for_terminal(&f.store, &id).await, JobState::Completed);
        assert_eq!(f.deliverer.texts(), ["late".to_string()]);
    }

    #[tokio::test]
    async fn skip_policy_within_threshold_fires_normally() {
        let f = fixture(RecordingDeliverer::ok());
        let id = schedule(&f.store, "on time", t0(), MisfirePolicy::Skip);

        f.clock.advance(Duration::seconds(5));
        f.dispatcher.pass();

        assert_eq!(wait_for_terminal(&f.store, &id).await, JobState::Completed);
    }

    #[tokio::test]
    async fn repeated_passes_never_double_fire() {
        let f = fixture(RecordingDeliverer::ok());
        let id = schedule(&f.store, "once", t0(), MisfirePolicy::FireNow);

        f.clock.advance(Duration::seconds(1));
        f.dispatcher.pass();
        f.dispatcher.pass();
        f.dispatcher.pass();

        assert_eq!(wait_for_terminal(&f.store, &id).await, JobState::Completed);
        assert_eq!(f.deliverer.texts().len(), 1);
    }

    #[tokio::test]
    async fn failing_job_does_not_stall_later_jobs() {
        let f = fixture(RecordingDeliverer::failing_on("boom", "payload exploded"));
        let bad = schedule(&f.store, "boom", t0(), MisfirePolicy::FireNow);

        f.clock.advance(Duration::seconds(1));
        f.dispatcher.pass();
        assert_eq!(wait_for_terminal(&f.store, &bad).await, JobState::Failed);
        assert!(f
            .store
            .get(&bad)
            .unwrap()
            .failure
            .unwrap()
            .contains("payload exploded"));

        // The loop keeps serving jobs submitted afterwards.
        let good = schedule(
            &f.store,
            "fine",
            f.clock.now() + Duration::seconds(1),
            MisfirePolicy::FireNow,
        );
        f.clock.advance(Duration::seconds(2));
        f.dispatcher.pass();
        assert_eq!(wait_for_terminal(&f.store, &good).await, JobState::Completed);
    }

    #[tokio::test]
    async fn cancelled_job_never_fires() {
        let f = fixture(RecordingDeliverer::ok());
        let id = schedule(
            &f.store,
            "cancelled",
            t0() + Duration::seconds(1),
            MisfirePolicy::FireNow,
        );

        f.store.remove(&id).unwrap();
        f.clock.advance(Duration::minutes(1));
        f.dispatcher.pass();

        assert!(f.deliverer.texts().is_empty());
        assert!(f.store.get(&id).is_none());
    }

    #[tokio::test]
    async fn pass_sweeps_expired_terminal_jobs() {
        let f = fixture(RecordingDeliverer::ok());
        let id = schedule(&f.store, "done", t0(), MisfirePolicy::FireNow);

        f.clock.advance(Duration::seconds(1));
        f.dispatcher.pass();
        wait_for_terminal(&f.store, &id).await;

        f.clock
            .advance(Duration::seconds(herald_core::config::DEFAULT_RETENTION_SECS as i64 + 1));
        f.dispatcher.pass();
        assert!(f.store.get(&id).is_none());
    }
}
