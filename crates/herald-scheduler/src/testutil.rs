//! Shared test doubles for the scheduler crate's unit tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use herald_core::{Deliverer, DeliveryError, Message};

use crate::store::JobStore;
use crate::types::JobState;

pub(crate) fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 5, 1, 12, 0, 0).unwrap()
}

/// Records delivered texts; optionally fails deliveries whose text contains
/// a given substring.
pub(crate) struct RecordingDeliverer {
    delivered: Mutex<Vec<String>>,
    /// (substring, failure detail) — an empty substring fails everything.
    fail_on: Option<(String, String)>,
}

impl RecordingDeliverer {
    pub(crate) fn ok() -> Arc<Self> {
        Arc::new(Self {
            delivered: Mutex::new(Vec::new()),
            fail_on: None,
        })
    }

    pub(crate) fn failing(detail: &str) -> Arc<Self> {
        Self::failing_on("", detail)
    }

    pub(crate) fn failing_on(substring: &str, detail: &str) -> Arc<Self> {
        Arc::new(Self {
            delivered: Mutex::new(Vec::new()),
            fail_on: Some((substring.to_string(), detail.to_string())),
        })
    }

    pub(crate) fn texts(&self) -> Vec<String> {
        self.delivered.lock().unwrap().clone()
    }
}

#[async_trait]
impl Deliverer for RecordingDeliverer {
    fn name(&self) -> &str {
        "recording"
    }

    async fn deliver(&self, message: &Message) -> Result<(), DeliveryError> {
        self.delivered.lock().unwrap().push(message.text.clone());
        if let Some((substring, detail)) = &self.fail_on {
            if message.text.contains(substring.as_str()) {
                return Err(DeliveryError(detail.clone()));
            }
        }
        Ok(())
    }
}

/// Poll until the job reaches a terminal state (executor tasks run on the
/// test runtime, so a short yield loop is all that is needed).
pub(crate) async fn wait_for_terminal(store: &JobStore, id: &str) -> JobState {
    for _ in 0..200 {
        if let Some(job) = store.get(id) {
            if job.state.is_terminal() {
                return job.state;
            }
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("job {id} never reached a terminal state");
}
