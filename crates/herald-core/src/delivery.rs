//! Delivery seam — shared between the scheduler engine and whatever actually
//! sends the message (console, email, queue).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The payload a scheduled job delivers. Opaque to the scheduling core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Text to deliver.
    pub text: String,
}

impl Message {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Raised by a [`Deliverer`] when the message could not be handed over.
/// The executor records it as the job's failure detail.
#[derive(Debug, Error)]
#[error("delivery failed: {0}")]
pub struct DeliveryError(pub String);

/// Any component able to deliver a scheduled message.
///
/// The executor is delivery-mechanism-agnostic: console print, email, or a
/// queue producer all plug in here.
#[async_trait]
pub trait Deliverer: Send + Sync {
    /// Human-readable name, used in logs.
    fn name(&self) -> &str;

    /// Deliver the message. Errors are captured on the job, never propagated
    /// into the dispatch loop.
    async fn deliver(&self, message: &Message) -> Result<(), DeliveryError>;
}
