//! # eventline
//!
//! **Eventline** is a cross-thread event/timer dispatch engine for Rust.
//!
//! One dispatcher task serializes delivery of asynchronous events and timed
//! deadline firings to consumer callbacks; producer tasks enqueue work
//! without blocking. Event carriers are reusable without allocation: an
//! occupancy protocol (acquire/release behind a single compare-and-set cell)
//! guarantees at most one concurrent holder, and recall/forced-reclaim paths
//! recover carriers from superseded messages and stuck consumers. The crate
//! is designed as a building block for state machines and request/response
//! layers that need strict per-instance serialization.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!  ┌────────────┐   ┌────────────┐   ┌────────────┐
//!  │ producer 1 │   │ producer 2 │   │ producer N │
//!  └─────┬──────┘   └─────┬──────┘   └─────┬──────┘
//!        │ acquire/fill   │ send           │ activate(delay)
//!        ▼                ▼                ▼
//! ┌───────────────────────────────────────────────────────────────┐
//! │  Dispatcher (one serialization task per instance)             │
//! │  - immediate queue (FIFO, multi-producer)                     │
//! │  - pending deadline set (earliest-first sweep)                │
//! │  - wake signal only when Waiting; re-checks before sleeping   │
//! └─────┬───────────────────────┬─────────────────────────────────┘
//!       │ deliver               │ fire (due within near_due)
//!       ▼                       ▼
//!  consumer.process(&event)   TimeOrder ─► same instance? deliver inline
//!       │                               └► other instance? enqueue there
//!       ▼
//!  Outcome bits ─► origin hooks (dequeued/consumed/released/busy)
//!       │
//!       └─► release (unless KEEP / statically bound) ─► carrier reusable
//! ```
//!
//! ### Lifecycle of one carrier
//! ```text
//! Event::new ──► try_acquire ──► fill payload ──► send
//!                    │                              │
//!                    │ busy:                        ├─ dispatcher bound:
//!                    │  - origin.busy_on_acquire    │    queued ─► delivered
//!                    │  - acquire_within (bounded)  │    on the loop task
//!                    │  - acquire_or_recall         └─ unbound: delivered
//!                    │  - acquire_or_force              in the sender task
//!                    ▼                                   │
//!              (exactly one holder)                      ▼
//!                                               release ─► free, reusable
//! ```
//!
//! ## Features
//! | Area            | Description                                                   | Key types / traits                  |
//! |-----------------|---------------------------------------------------------------|-------------------------------------|
//! | **Carriers**    | Reusable events with the acquire/release occupancy protocol.  | [`Event`], [`Target`], [`Stage`]    |
//! | **Consumers**   | Delivery contract returning result bits.                      | [`Consume`], [`ConsumeFn`], [`Outcome`] |
//! | **Deadlines**   | Coalescing timed entries with a fixed deferral ceiling.       | [`TimeOrder`]                       |
//! | **Dispatch**    | The serialization loop, recall, shutdown, stats.              | [`Dispatcher`], [`LineState`], [`Stats`] |
//! | **Waiting**     | Block a task until a correlated exchange completes.           | [`Awaiter`], [`Reply`]              |
//! | **Observation** | Lifecycle hooks owned by the application.                     | [`Origin`], [`Payload`]             |
//! | **Errors**      | Typed programming/consumer errors.                            | [`EventError`], [`ConsumeError`]    |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogOrigin`] _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use eventline::{Config, ConsumeError, ConsumeFn, Dispatcher, Event, Outcome, Target};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // One serialization task; consumers of this instance never run
//!     // concurrently with each other.
//!     let line = Dispatcher::spawn(Config::default());
//!
//!     let consumer = ConsumeFn::arc("greeter", |ev| async move {
//!         println!("hello from {}", ev.name());
//!         Ok::<_, ConsumeError>(Outcome::CONSUMED)
//!     });
//!
//!     // A reusable carrier: acquire, send, released after delivery.
//!     let ev = Event::new("greeting");
//!     assert!(ev.try_acquire(&Target::to(consumer).via(&line), false)?);
//!     ev.send().await?;
//!
//!     line.close();
//!     line.join().await;
//!     Ok(())
//! }
//! ```

mod config;
mod consumers;
mod core;
mod error;
mod events;
mod origins;
mod timers;

// ---- Public re-exports ----

pub use crate::config::Config;
pub use crate::consumers::{Awaiter, Consume, ConsumeFn, ConsumerRef, Reply};
pub use crate::core::{Dispatcher, LineState, Stats};
pub use crate::error::{ConsumeError, EventError};
pub use crate::events::{AcquireOutcome, Event, Outcome, Payload, Stage, Target};
pub use crate::origins::{Origin, OriginRef};
pub use crate::timers::TimeOrder;

// Optional: expose a simple built-in logging origin (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use crate::origins::LogOrigin;

/// Panic message for a lock poisoned by a panicking thread; the engine holds
/// its locks only for short field accesses, never across user code.
pub(crate) const ERR_POISONED_LOCK: &str = "eventline lock poisoned";
