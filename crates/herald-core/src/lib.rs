//! `herald-core` — shared types for the Herald message scheduler.
//!
//! Everything here is a leaf concern used by both the scheduling engine and
//! the gateway: configuration loading, the shared error type, the [`Clock`]
//! time source, and the delivery seam ([`Message`] + [`Deliverer`]).

pub mod clock;
pub mod config;
pub mod delivery;
pub mod error;

pub use clock::{Clock, ManualClock, SystemClock};
pub use delivery::{Deliverer, DeliveryError, Message};
pub use error::{HeraldError, Result};
