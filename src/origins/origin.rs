//! # Lifecycle observer trait.
//!
//! Provides [`Origin`], the extension point through which an application
//! observes what happens to a carrier it owns. Hooks run inline in whichever
//! task drives the transition (the dispatcher loop for dequeue/consume, the
//! releasing or acquiring task otherwise), so implementations must be quick
//! and must not block.
//!
//! ## Rules
//! - Hooks are pure observers: they must not mutate the carrier.
//! - Contention is reported here (`busy_on_acquire`), never as an error.
//! - All hooks default to no-ops; implement only what you need.
//!
//! ## Example
//! ```
//! use eventline::{Event, Origin, Outcome};
//!
//! struct Metrics;
//!
//! impl Origin for Metrics {
//!     fn consumed(&self, event: &Event, count: u64, outcome: Outcome) {
//!         if outcome.contains(Outcome::FAULT) {
//!             // export a failure metric, etc.
//!             let _ = (event.name(), count);
//!         }
//!     }
//! }
//! ```

use std::sync::Arc;

use crate::events::{Event, Outcome};

/// Shared handle to a lifecycle observer.
pub type OriginRef = Arc<dyn Origin>;

/// Observer of an event carrier's lifecycle.
///
/// Bound per carrier (at construction, acquisition, or via
/// [`Event::set_target`](crate::Event::set_target)); there is no global
/// registry. Hooks run inline — keep them fast.
pub trait Origin: Send + Sync + 'static {
    /// The carrier left a dispatcher queue (or entered synchronous delivery)
    /// and is about to be processed.
    fn dequeued(&self, _event: &Event) {}

    /// One delivery finished. `count` is the lifetime delivery total,
    /// `outcome` the bits the consumer returned (plus
    /// [`Outcome::FAULT`] if it failed).
    fn consumed(&self, _event: &Event, _count: u64, _outcome: Outcome) {}

    /// The carrier returned to "free". `count` is the lifetime delivery
    /// total at release time.
    fn released(&self, _event: &Event, _count: u64) {}

    /// An acquisition that expected a free carrier found it busy.
    fn busy_on_acquire(&self, _event: &Event) {}

    /// Name used in logs; prefer short, descriptive names.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}
