//! Public facade over the store, dispatcher, and executor.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use herald_core::config::SchedulerConfig;
use herald_core::{Clock, Deliverer, Message};
use tokio::sync::{watch, Notify};
use tracing::info;

use crate::dispatcher::Dispatcher;
use crate::error::{Result, SchedulerError};
use crate::executor::Executor;
use crate::store::JobStore;
use crate::trigger::{MisfirePolicy, Trigger};
use crate::types::Job;

/// The scheduling service: submit, cancel, status, start/stop.
///
/// Explicitly constructed and owned by the caller — created at startup,
/// `start` spawns the dispatch loop, `stop` shuts it down and refuses
/// further submissions. `submit` is the only externally exposed mutator.
pub struct SchedulerService {
    store: Arc<JobStore>,
    clock: Arc<dyn Clock>,
    wake: Arc<Notify>,
    config: SchedulerConfig,
    accepting: AtomicBool,
    shutdown: Mutex<Option<watch::Sender<bool>>>,
}

impl SchedulerService {
    pub fn new(config: SchedulerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            store: Arc::new(JobStore::new()),
            clock,
            wake: Arc::new(Notify::new()),
            config,
            accepting: AtomicBool::new(true),
            shutdown: Mutex::new(None),
        }
    }

    /// Spawn the dispatch loop with the given delivery mechanism. Jobs may be
    /// submitted before `start`; they fire once the loop is running.
    pub fn start(&self, deliverer: Arc<dyn Deliverer>) -> tokio::task::JoinHandle<()> {
        let (tx, rx) = watch::channel(false);
        *self.shutdown.lock().unwrap() = Some(tx);

        let executor = Executor::new(
            Arc::clone(&self.store),
            Arc::clone(&self.clock),
            deliverer,
            self.config.max_workers,
        );
        let dispatcher = Dispatcher::new(
            Arc::clone(&self.store),
            Arc::clone(&self.clock),
            executor,
            Arc::clone(&self.wake),
            &self.config,
        );
        tokio::spawn(dispatcher.run(rx))
    }

    /// Stop accepting submissions and signal the dispatch loop to exit.
    /// In-flight deliveries run to completion.
    pub fn stop(&self) {
        self.accepting.store(false, Ordering::SeqCst);
        if let Some(tx) = self.shutdown.lock().unwrap().take() {
            let _ = tx.send(true);
        }
        info!("scheduler service stopped");
    }

    /// Schedule `message` for delivery at `fire_at`.
    ///
    /// Rejects instants strictly before the current time (`InvalidSchedule`)
    /// and submissions after `stop` (`Unavailable`). On success the job and
    /// its trigger are stored as one atomic unit, the dispatcher is nudged in
    /// case the new trigger fires earlier than its current sleep target, and
    /// the stored job is returned. Nothing runs synchronously.
    pub fn submit(
        &self,
        message: Message,
        fire_at: DateTime<Utc>,
        misfire: MisfirePolicy,
    ) -> Result<Job> {
        if !self.accepting.load(Ordering::SeqCst) {
            return Err(SchedulerError::Unavailable(
                "scheduler is stopped".to_string(),
            ));
        }

        let now = self.clock.now();
        if fire_at < now {
            return Err(SchedulerError::InvalidSchedule {
                requested: fire_at,
                now,
            });
        }

        let job = Job::new(message, fire_at, now);
        let trigger = Trigger::new(job.id.clone(), fire_at, misfire);
        self.store.insert(job.clone(), trigger);
        self.wake.notify_one();

        info!(job_id = %job.id, fire_at = %fire_at, policy = ?misfire, "job scheduled");
        Ok(job)
    }

    /// Cancel a pending job. Fails with `AlreadyHandled` once the dispatcher
    /// has claimed its trigger.
    pub fn cancel(&self, id: &str) -> Result<()> {
        self.store.remove(id)?;
        info!(job_id = %id, "job cancelled");
        Ok(())
    }

    /// Snapshot of a job's record, if it is still retained.
    pub fn status(&self, id: &str) -> Option<Job> {
        self.store.get(id)
    }

    /// Number of jobs waiting to fire — exposed for the health probe.
    pub fn pending_count(&self) -> usize {
        self.store.pending_count()
    }
}
