//! Console delivery — the default mechanism: print the message to stdout.

use async_trait::async_trait;
use herald_core::{Deliverer, DeliveryError, Message};
use tracing::info;

/// Writes the scheduled message to standard output. Any other delivery
/// mechanism (email, queue producer) plugs in through the same trait.
pub struct ConsoleDeliverer;

#[async_trait]
impl Deliverer for ConsoleDeliverer {
    fn name(&self) -> &str {
        "console"
    }

    async fn deliver(&self, message: &Message) -> Result<(), DeliveryError> {
        println!("{}", message.text);
        info!(bytes = message.text.len(), "message printed to console");
        Ok(())
    }
}
