//! # Dispatcher lifecycle state.
//!
//! [`LineState`] is written by the dispatcher loop and read by producers to
//! decide whether an enqueue needs a wake signal. The protocol tolerates a
//! stale read: the loop re-checks both queues after flipping to `Waiting`,
//! and the wake permit is retained by the notifier, so a racing producer
//! never strands work (see `runner.rs`).

use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle of a dispatcher's serialization loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LineState {
    /// Constructed but the loop has not run yet.
    NeverStarted = 0,
    /// The loop is between sleep and delivery, evaluating its queues.
    Running = 1,
    /// A consumer callback or deadline firing is executing right now.
    Busy = 2,
    /// The loop sleeps until a deadline or a wake signal.
    Waiting = 3,
    /// The loop has observed close and terminated.
    Finished = 4,
}

pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(LineState::NeverStarted as u8))
    }

    pub(crate) fn get(&self) -> LineState {
        match self.0.load(Ordering::SeqCst) {
            1 => LineState::Running,
            2 => LineState::Busy,
            3 => LineState::Waiting,
            4 => LineState::Finished,
            _ => LineState::NeverStarted,
        }
    }

    pub(crate) fn set(&self, state: LineState) {
        self.0.store(state as u8, Ordering::SeqCst);
    }
}
