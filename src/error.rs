//! Error types used by the eventline engine and consumers.
//!
//! This module defines two main error enums:
//!
//! - [`EventError`] — programming errors raised by the event machinery itself.
//! - [`ConsumeError`] — errors raised by individual consumer executions.
//!
//! Both types provide helper methods (`as_label`, `as_message`) for logging/metrics.
//! [`ConsumeError`] never crosses the dispatcher boundary as an error: the
//! delivery wrapper folds it into the [`Outcome::FAULT`](crate::Outcome::FAULT)
//! result bit and the event is still released.

use std::sync::Arc;
use thiserror::Error;

/// # Programming errors raised by the event machinery.
///
/// These are contract violations by the calling code, never transient
/// conditions: contention is reported through the origin hooks, not here.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum EventError {
    /// `send` was called on an event with no destination consumer bound.
    #[error("event '{event}' has no destination consumer bound")]
    NoConsumer {
        /// Debug name of the offending event.
        event: Arc<str>,
    },

    /// An acquire operation was called on a statically bound event.
    ///
    /// Events constructed with a fixed consumer skip the occupancy protocol
    /// entirely and are always ready to send.
    #[error("event '{event}' is statically bound; the occupancy protocol does not apply")]
    StaticBinding {
        /// Debug name of the offending event.
        event: Arc<str>,
    },
}

impl EventError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use eventline::EventError;
    ///
    /// let err = EventError::NoConsumer { event: "req".into() };
    /// assert_eq!(err.as_label(), "event_no_consumer");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            EventError::NoConsumer { .. } => "event_no_consumer",
            EventError::StaticBinding { .. } => "event_static_binding",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            EventError::NoConsumer { event } => format!("no consumer bound: {event}"),
            EventError::StaticBinding { event } => format!("statically bound: {event}"),
        }
    }
}

/// # Errors produced by consumer executions.
///
/// Returned from [`Consume::process`](crate::Consume::process). The dispatcher
/// catches these (and panics), logs them, and reports them to the origin via
/// the [`Outcome::FAULT`](crate::Outcome::FAULT) bit; delivery of other events
/// continues unaffected.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ConsumeError {
    /// Consumer could not act on the event; the carrier is released normally.
    #[error("processing failed: {reason}")]
    Failed {
        /// The underlying error message.
        reason: String,
    },

    /// Consumer hit a non-recoverable state; the surrounding application
    /// decides severity, the dispatcher treats it like any other failure.
    #[error("fatal consumer state: {reason}")]
    Fatal {
        /// The underlying error message.
        reason: String,
    },
}

impl ConsumeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use eventline::ConsumeError;
    ///
    /// let err = ConsumeError::Failed { reason: "boom".into() };
    /// assert_eq!(err.as_label(), "consume_failed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ConsumeError::Failed { .. } => "consume_failed",
            ConsumeError::Fatal { .. } => "consume_fatal",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            ConsumeError::Failed { reason } => format!("failed: {reason}"),
            ConsumeError::Fatal { reason } => format!("fatal: {reason}"),
        }
    }

    /// Indicates whether the failure is considered non-recoverable.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ConsumeError::Fatal { .. })
    }
}
