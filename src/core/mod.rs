//! Dispatch core: the single serialization task and its queues.
//!
//! This module contains the embedded implementation of the eventline engine.
//! The public API from this module is [`Dispatcher`], the handle to one
//! serialization task, plus its [`LineState`] and [`Stats`] snapshots.
//!
//! ## High-level architecture
//! ```text
//! producer tasks                     dispatcher task (one per instance)
//!   Event::send ──► [immediate queue] ──► deliver ─► consumer.process()
//!   TimeOrder::activate ─► [pending set] ─► sweep ─► fire due entries
//!                     │
//!                     └─ wake signal only when the loop is Waiting;
//!                        the loop re-checks both queues before sleeping
//! ```
//!
//! Internal modules:
//! - [`queues`]: the immediate-event queue and pending-deadline set with
//!   identity-based removal;
//! - [`runner`]: the serialization loop (sweep timers, drain events, sleep);
//! - [`dispatcher`]: the public handle (spawn/store/remove/close/join);
//! - [`state`]: the loop's lifecycle tag read by producers for wake
//!   decisions.

mod dispatcher;
mod queues;
mod runner;
mod state;

pub use dispatcher::{Dispatcher, Stats};
pub use state::LineState;
