//! # The consumer contract.
//!
//! [`Consume`] is the interface every event destination implements. The
//! common handle type is [`ConsumerRef`], an `Arc<dyn Consume>` suitable for
//! sharing across producers and dispatchers.
//!
//! ## Rules
//! - **Fast and non-blocking.** One dispatcher task executes every consumer
//!   and every deadline firing of its instance; a blocking call here stalls
//!   all of them.
//! - Report through the result bits: return [`Outcome::KEEP`] only after
//!   re-queuing the carrier yourself, [`Outcome::DONE`] when a multi-event
//!   exchange reached logical completion.
//! - Never set [`Outcome::FAULT`]; the delivery wrapper owns that bit and
//!   sets it when `process` returns `Err` or panics.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::ConsumeError;
use crate::events::{Event, Outcome};

/// Shared handle to a consumer.
pub type ConsumerRef = Arc<dyn Consume>;

/// # Destination of an event delivery.
///
/// Implementations receive the carrier, read its payload, act, and return
/// the result bits. Errors and panics are caught by the delivery wrapper:
/// they surface as [`Outcome::FAULT`] on the origin hooks and the carrier is
/// still released, so a buggy consumer never leaks occupancy.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use eventline::{Consume, ConsumeError, Event, Outcome};
///
/// struct Printer;
///
/// #[async_trait]
/// impl Consume for Printer {
///     fn name(&self) -> &str { "printer" }
///
///     async fn process(&self, event: &Event) -> Result<Outcome, ConsumeError> {
///         println!("got {}", event.name());
///         Ok(Outcome::CONSUMED)
///     }
/// }
/// ```
#[async_trait]
pub trait Consume: Send + Sync + 'static {
    /// Returns a stable, human-readable consumer name.
    ///
    /// The default uses `type_name::<Self>()`, which can be verbose -
    /// override it when possible.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Processes a single delivery.
    ///
    /// Runs on the dispatcher task (or the sender's task for synchronous
    /// delivery). Must not block; must not park the task on anything
    /// unbounded.
    async fn process(&self, event: &Event) -> Result<Outcome, ConsumeError>;
}
