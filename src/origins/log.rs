//! # Simple logging origin for debugging and demos.
//!
//! [`LogOrigin`] prints carrier lifecycle transitions to stdout in a
//! human-readable format. This is primarily useful for development,
//! debugging, and examples.
//!
//! ## Output format
//! ```text
//! [dequeued] event=request
//! [consumed] event=request count=3 outcome=CONSUMED | DONE
//! [released] event=request count=3
//! [busy] event=request
//! ```

use crate::events::{Event, Outcome};
use crate::origins::Origin;

/// Simple stdout logging origin.
///
/// Enabled via the `logging` feature. Prints human-readable lifecycle lines
/// for every carrier it is bound to.
///
/// Not intended for production use - implement a custom [`Origin`] for
/// structured logging or metrics collection.
pub struct LogOrigin;

impl Origin for LogOrigin {
    fn dequeued(&self, event: &Event) {
        println!("[dequeued] event={}", event.name());
    }

    fn consumed(&self, event: &Event, count: u64, outcome: Outcome) {
        println!(
            "[consumed] event={} count={count} outcome={outcome:?}",
            event.name()
        );
    }

    fn released(&self, event: &Event, count: u64) {
        println!("[released] event={} count={count}", event.name());
    }

    fn busy_on_acquire(&self, event: &Event) {
        println!("[busy] event={}", event.name());
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
