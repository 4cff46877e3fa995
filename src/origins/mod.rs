//! Origin hooks: lifecycle observation for event carriers.
//!
//! An [`Origin`] is the application-owned observer of a carrier's lifecycle.
//! The engine calls its hooks on dequeue, on delivery, on release, and when
//! an acquisition that expected a free carrier hit a busy one; it never
//! depends on what the hooks do.
//!
//! ## Contents
//! - [`Origin`] — hook trait with default no-op methods
//! - [`LogOrigin`] — built-in stdout implementation (feature `logging`)
//!
//! There is no process-wide "null origin": a carrier without an origin simply
//! has none bound, and every hook site checks the `Option`.

mod origin;

#[cfg(feature = "logging")]
mod log;

pub use origin::{Origin, OriginRef};

#[cfg(feature = "logging")]
pub use log::LogOrigin;
