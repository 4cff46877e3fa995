//! # Function-backed consumer (`ConsumeFn`)
//!
//! [`ConsumeFn`] wraps a closure `F: Fn(Event) -> Fut`, producing a fresh
//! future per delivery. The closure receives its own handle to the carrier
//! (handles are cheap clones), which keeps the returned future `'static`.
//!
//! ## Example
//! ```rust
//! use eventline::{ConsumeError, ConsumeFn, ConsumerRef, Outcome};
//!
//! let c: ConsumerRef = ConsumeFn::arc("worker", |ev| async move {
//!     // read ev.read_payload::<MyPayload, _>(..), do work...
//!     let _ = ev.name();
//!     Ok::<_, ConsumeError>(Outcome::CONSUMED)
//! });
//!
//! assert_eq!(c.name(), "worker");
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::consumers::consume::Consume;
use crate::error::ConsumeError;
use crate::events::{Event, Outcome};

type Closure = dyn Fn(Event) -> BoxFuture<'static, Result<Outcome, ConsumeError>> + Send + Sync;

/// Function-backed consumer implementation.
///
/// Wraps a closure that *creates* a new future per delivery; shared state
/// goes into an explicit `Arc` inside the closure.
pub struct ConsumeFn {
    name: Cow<'static, str>,
    f: Box<Closure>,
}

impl ConsumeFn {
    /// Creates a new function-backed consumer.
    ///
    /// Prefer [`ConsumeFn::arc`] when you immediately need a
    /// [`ConsumerRef`](crate::ConsumerRef).
    pub fn new<F, Fut>(name: impl Into<Cow<'static, str>>, f: F) -> Self
    where
        F: Fn(Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Outcome, ConsumeError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            f: Box::new(move |ev| Box::pin(f(ev))),
        }
    }

    /// Creates the consumer and returns it as a shared handle.
    pub fn arc<F, Fut>(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self>
    where
        F: Fn(Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Outcome, ConsumeError>> + Send + 'static,
    {
        Arc::new(Self::new(name, f))
    }
}

#[async_trait]
impl Consume for ConsumeFn {
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(&self, event: &Event) -> Result<Outcome, ConsumeError> {
        (self.f)(event.clone()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_closure_sees_the_carrier() {
        let c = ConsumeFn::arc("echo", |ev: Event| async move {
            assert_eq!(ev.name(), "probe");
            Ok(Outcome::CONSUMED | Outcome::DONE)
        });
        let ev = Event::new("probe");
        let out = c.process(&ev).await.unwrap();
        assert!(out.contains(Outcome::DONE));
    }
}
