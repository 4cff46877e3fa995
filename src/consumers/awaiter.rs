//! # Synchronous wait adapter (`Awaiter`)
//!
//! [`Awaiter`] is a consumer that lets a foreign task block — bounded — until
//! a correlated request/response exchange reports completion. The response
//! carrier's payload implements [`Reply`]; when its `done()` turns true the
//! awaiter records the error text, flags completion, and wakes the waiting
//! task.
//!
//! ## Flow
//! ```text
//! requester task                     dispatcher task
//!   fill request, send ─────────►  ... remote work ...
//!   await_execution(timeout) ◄───  Awaiter::process(response)
//!   read error(), release carriers      └─ returns CONSUMED | DONE | KEEP
//! ```
//!
//! ## Rules
//! - `process` returns [`Outcome::KEEP`] on completion: release of the
//!   response carrier is deferred until the waiting task has read the result,
//!   then the waiter releases it.
//! - One waiting task per awaiter; the wake signal carries a single permit.
//! - [`Awaiter::clean`] resets the flag **and wakes any waiter early** — the
//!   recovery path for an exchange that will never complete.

use std::borrow::Cow;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::time;

use crate::consumers::consume::Consume;
use crate::error::ConsumeError;
use crate::events::{Event, Outcome, Payload};
use crate::ERR_POISONED_LOCK;

/// Payload-back contract of a request/response exchange.
///
/// The responding side sets `done` (and optionally an error text) into the
/// response payload; the [`Awaiter`] reads both.
pub trait Reply: Payload {
    /// Whether the exchange reached its terminal state.
    fn done(&self) -> bool;

    /// Error text of a failed exchange, if any.
    fn error(&self) -> Option<String>;
}

#[derive(Default)]
struct AwaitState {
    finished: bool,
    error: Option<String>,
}

/// Consumer that parks a caller until a correlated exchange completes.
///
/// Generic over the concrete [`Reply`] payload type of the response carrier.
pub struct Awaiter<R> {
    name: Cow<'static, str>,
    state: Mutex<AwaitState>,
    signal: Notify,
    _reply: PhantomData<fn(R)>,
}

impl<R: Reply> Awaiter<R> {
    /// Creates a new awaiter.
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(AwaitState::default()),
            signal: Notify::new(),
            _reply: PhantomData,
        }
    }

    /// Creates the awaiter as a shared handle, ready to bind as a consumer.
    pub fn arc(name: impl Into<Cow<'static, str>>) -> Arc<Self> {
        Arc::new(Self::new(name))
    }

    /// Whether completion has been observed and not yet cleared.
    pub fn is_finished(&self) -> bool {
        self.state.lock().expect(ERR_POISONED_LOCK).finished
    }

    /// Error text recorded with the completion, if any.
    pub fn error(&self) -> Option<String> {
        self.state.lock().expect(ERR_POISONED_LOCK).error.clone()
    }

    /// Parks the caller until completion or until `timeout` elapses.
    ///
    /// A zero timeout waits indefinitely (supported but discouraged).
    /// Returns whether completion was observed; when `clear_on_return` is
    /// set, the flag is reset before returning so the awaiter can serve the
    /// next exchange.
    ///
    /// A wake without completion — [`Awaiter::clean`] ran — returns `false`
    /// early instead of sleeping out the timeout.
    pub async fn await_execution(&self, timeout: Duration, clear_on_return: bool) -> bool {
        if !self.is_finished() {
            if timeout.is_zero() {
                self.signal.notified().await;
            } else {
                let _ = time::timeout(timeout, self.signal.notified()).await;
            }
        }
        let mut st = self.state.lock().expect(ERR_POISONED_LOCK);
        let done = st.finished;
        if clear_on_return {
            st.finished = false;
        }
        done
    }

    /// Resets `done`/`error` and wakes any waiter early.
    ///
    /// Recovery primitive for an exchange that will never complete; the
    /// woken waiter observes `false`.
    pub fn clean(&self) {
        let mut st = self.state.lock().expect(ERR_POISONED_LOCK);
        st.finished = false;
        st.error = None;
        drop(st);
        self.signal.notify_one();
    }
}

#[async_trait]
impl<R: Reply> Consume for Awaiter<R> {
    fn name(&self) -> &str {
        &self.name
    }

    /// Reads the response payload; on `done()` records the error, flags
    /// completion and defers release to the waiting task.
    async fn process(&self, event: &Event) -> Result<Outcome, ConsumeError> {
        let Some((done, error)) = event.read_payload::<R, _>(|r| (r.done(), r.error())) else {
            return Err(ConsumeError::Failed {
                reason: format!("event '{}' carries no reply payload", event.name()),
            });
        };
        if !done {
            return Ok(Outcome::CONSUMED);
        }
        let mut st = self.state.lock().expect(ERR_POISONED_LOCK);
        st.error = error;
        st.finished = true;
        drop(st);
        self.signal.notify_one();
        Ok(Outcome::CONSUMED | Outcome::DONE | Outcome::KEEP)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Target;

    #[derive(Default)]
    struct Ack {
        done: bool,
        error: Option<String>,
    }

    impl Payload for Ack {
        fn clean(&mut self) {
            self.done = false;
            self.error = None;
        }
        fn serialize(&self) -> Vec<u8> {
            vec![u8::from(self.done)]
        }
        fn deserialize(&mut self, bytes: &[u8]) -> bool {
            match bytes {
                [b] => {
                    self.done = *b != 0;
                    true
                }
                _ => false,
            }
        }
    }

    impl Reply for Ack {
        fn done(&self) -> bool {
            self.done
        }
        fn error(&self) -> Option<String> {
            self.error.clone()
        }
    }

    #[tokio::test]
    async fn test_completion_wakes_the_waiter() {
        let awaiter = Awaiter::<Ack>::arc("rsp");
        let back = Event::new("back").with_payload(Box::new(Ack::default()));
        assert!(back
            .try_acquire(&Target::to(awaiter.clone()), false)
            .unwrap());
        back.update_payload::<Ack, _>(|a| a.done = true);

        let waiting = {
            let awaiter = Arc::clone(&awaiter);
            tokio::spawn(
                async move { awaiter.await_execution(Duration::from_millis(500), true).await },
            )
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        back.send().await.unwrap();

        assert!(waiting.await.unwrap(), "waiter must observe completion");
        assert!(back.is_occupied(), "KEEP defers release to the waiter");
        back.release();
        assert!(!awaiter.is_finished(), "clear_on_return resets the flag");
    }

    #[tokio::test]
    async fn test_not_done_reply_keeps_waiting() {
        let awaiter = Awaiter::<Ack>::arc("rsp");
        let back = Event::new("back").with_payload(Box::new(Ack::default()));
        assert!(back
            .try_acquire(&Target::to(awaiter.clone()), false)
            .unwrap());
        back.send().await.unwrap();

        assert!(!awaiter.await_execution(Duration::from_millis(30), false).await);
        assert!(!back.is_occupied(), "intermediate reply releases normally");
    }

    #[tokio::test]
    async fn test_error_text_is_recorded() {
        let awaiter = Awaiter::<Ack>::arc("rsp");
        let back = Event::new("back").with_payload(Box::new(Ack::default()));
        assert!(back
            .try_acquire(&Target::to(awaiter.clone()), false)
            .unwrap());
        back.update_payload::<Ack, _>(|a| {
            a.done = true;
            a.error = Some("remote refused".into());
        });
        back.send().await.unwrap();

        assert!(awaiter.await_execution(Duration::from_millis(100), false).await);
        assert_eq!(awaiter.error().as_deref(), Some("remote refused"));
    }

    #[tokio::test]
    async fn test_clean_wakes_waiter_early() {
        let awaiter = Awaiter::<Ack>::arc("rsp");
        let waiting = {
            let awaiter = Arc::clone(&awaiter);
            tokio::spawn(async move {
                let started = std::time::Instant::now();
                let done = awaiter.await_execution(Duration::from_secs(5), false).await;
                (done, started.elapsed())
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        awaiter.clean();

        let (done, elapsed) = waiting.await.unwrap();
        assert!(!done, "a cleaned exchange reports no completion");
        assert!(elapsed < Duration::from_secs(1), "clean must wake early");
    }

    #[tokio::test]
    async fn test_missing_reply_payload_is_a_consumer_failure() {
        let awaiter = Awaiter::<Ack>::arc("rsp");
        let bare = Event::new("bare");
        let err = awaiter.process(&bare).await.unwrap_err();
        assert_eq!(err.as_label(), "consume_failed");
    }
}
