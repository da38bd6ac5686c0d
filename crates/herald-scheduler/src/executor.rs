//! Worker pool running delivery actions outside the dispatch loop.

use std::sync::Arc;

use herald_core::{Clock, Deliverer};
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::store::JobStore;
use crate::types::Job;

/// Runs claimed jobs on spawned tasks, capped by a semaphore so a burst of
/// due triggers cannot spawn unbounded concurrent deliveries. A slow or
/// failing delivery never blocks the dispatcher or its siblings.
pub struct Executor {
    store: Arc<JobStore>,
    clock: Arc<dyn Clock>,
    deliverer: Arc<dyn Deliverer>,
    permits: Arc<Semaphore>,
}

impl Executor {
    pub fn new(
        store: Arc<JobStore>,
        clock: Arc<dyn Clock>,
        deliverer: Arc<dyn Deliverer>,
        max_workers: u32,
    ) -> Self {
        Self {
            store,
            clock,
            deliverer,
            permits: Arc::new(Semaphore::new(max_workers.max(1) as usize)),
        }
    }

    /// Hand a claimed job to the pool. Returns immediately; the permit is
    /// acquired inside the spawned task so the dispatch loop never waits for
    /// a free worker.
    pub fn spawn(&self, job: Job) {
        let store = Arc::clone(&self.store);
        let clock = Arc::clone(&self.clock);
        let deliverer = Arc::clone(&self.deliverer);
        let permits = Arc::clone(&self.permits);

        tokio::spawn(async move {
            let _permit = match permits.acquire_owned().await {
                Ok(p) => p,
                // Semaphore closed — executor dropped during shutdown.
                Err(_) => return,
            };

            debug!(job_id = %job.id, deliverer = deliverer.name(), "delivering");
            match deliverer.deliver(&job.message).await {
                Ok(()) => {
                    let now = clock.now();
                    match store.complete(&job.id, now) {
                        Ok(()) => info!(job_id = %job.id, "job completed"),
                        Err(e) => warn!(job_id = %job.id, "completion not recorded: {e}"),
                    }
                }
                Err(e) => {
                    error!(job_id = %job.id, error = %e, "delivery failed");
                    let now = clock.now();
                    if let Err(err) = store.fail(&job.id, now, e.to_string()) {
                        warn!(job_id = %job.id, "failure not recorded: {err}");
                    }
                }
            }
        });
    }
}
