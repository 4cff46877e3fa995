//! # Reusable event carrier: occupancy protocol and delivery.
//!
//! [`Event`] is a correlation object a producer fills and sends to a
//! destination consumer, optionally through a [`Dispatcher`]. A carrier is
//! acquired, filled, sent, delivered and released — then it is free again and
//! may be reused indefinitely. Nothing is allocated per message, which keeps
//! latency-sensitive paths allocation-free.
//!
//! ## Occupancy protocol
//! ```text
//! try_acquire ──► occupied (payload cleaned, bindings adopted)
//!      │                       │ send
//!      │                       ▼
//!      │              [dispatcher queue] ──► deliver ──► release ──► free
//!      │                       ▲                            │
//!      └── busy? ──────────────┘ (recall / forced reclaim)  └─► waiters woken
//! ```
//!
//! ## Rules
//! - At most one producer holds a carrier at a time; the gate is a single
//!   atomic compare-and-set cell (see [`Stage`] for the diagnostic tag).
//! - Statically bound carriers ([`Event::bound`]) skip the protocol entirely
//!   and are always ready; acquiring one is a programming error.
//! - Delivery releases the carrier even when the consumer failed, unless the
//!   consumer returned [`Outcome::KEEP`].
//! - All lifecycle transitions are reported to the bound origin's hooks,
//!   never raised as errors.
//!
//! ## Example
//! ```
//! use eventline::{Event, Target};
//!
//! let ev = Event::new("request");
//! assert!(ev.try_acquire(&Target::new(), false).unwrap());
//! assert!(!ev.try_acquire(&Target::new(), false).unwrap());
//! ev.release();
//! assert!(!ev.is_occupied());
//! ```

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::Notify;
use tokio::time;

use crate::consumers::{Consume, ConsumerRef};
use crate::core::Dispatcher;
use crate::error::EventError;
use crate::events::occupancy::{clock_ms, OccupancyCell, Stage, StageCell};
use crate::events::outcome::Outcome;
use crate::events::payload::Payload;
use crate::origins::{Origin, OriginRef};
use crate::ERR_POISONED_LOCK;

/// Result of [`Event::acquire_or_force`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// The carrier was free (immediately or after the bounded wait).
    Free,
    /// The carrier was recalled from its dispatcher's queue before delivery
    /// and re-acquired; the superseded message will never be delivered.
    Recalled,
    /// The occupancy marker was forcibly cleared after the wait because the
    /// holder predates the wait start — the stuck-consumer recovery path.
    Forced,
    /// The carrier stayed busy; no acquisition happened.
    Busy,
}

/// Destination bundle for acquisition: consumer, dispatcher and origin.
///
/// Empty fields keep whatever the carrier already has bound, so a bare
/// `Target::new()` re-acquires a carrier without rebinding it.
///
/// ## Example
/// ```
/// use eventline::{ConsumeFn, ConsumeError, Outcome, Target};
///
/// let consumer = ConsumeFn::arc("sink", |_ev| async move {
///     Ok::<_, ConsumeError>(Outcome::CONSUMED)
/// });
/// let target = Target::to(consumer);
/// ```
#[derive(Clone, Default)]
pub struct Target {
    consumer: Option<ConsumerRef>,
    dispatcher: Option<Dispatcher>,
    origin: Option<OriginRef>,
}

impl Target {
    /// An empty target: acquisition keeps the existing bindings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A target with a destination consumer.
    #[must_use]
    pub fn to(consumer: ConsumerRef) -> Self {
        Self {
            consumer: Some(consumer),
            dispatcher: None,
            origin: None,
        }
    }

    /// Routes delivery through the given dispatcher instead of the sender's
    /// own task.
    #[must_use]
    pub fn via(mut self, dispatcher: &Dispatcher) -> Self {
        self.dispatcher = Some(dispatcher.clone());
        self
    }

    /// Attaches the origin whose hooks observe the carrier's lifecycle.
    #[must_use]
    pub fn observed_by(mut self, origin: OriginRef) -> Self {
        self.origin = Some(origin);
        self
    }
}

#[derive(Default)]
struct Bindings {
    consumer: Option<ConsumerRef>,
    dispatcher: Option<Dispatcher>,
    origin: Option<OriginRef>,
}

struct Inner {
    name: Arc<str>,
    occupancy: OccupancyCell,
    stage: StageCell,
    consumed: AtomicU64,
    static_bound: bool,
    bindings: Mutex<Bindings>,
    payload: Mutex<Option<Box<dyn Payload>>>,
    freed: Notify,
}

/// Reusable correlation object carrying a payload to a consumer.
///
/// `Event` is a cheap clonable handle; clones refer to the same carrier.
/// The producer (or a shared holder) owns the carrier across its whole reuse
/// lifetime — a dispatcher only keeps transient references while the carrier
/// is queued or executing.
#[derive(Clone)]
pub struct Event {
    inner: Arc<Inner>,
}

impl Event {
    /// Creates a free, dynamically acquired carrier.
    ///
    /// The name is a debug identity; it is never used for correlation.
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                occupancy: OccupancyCell::free(),
                stage: StageCell::new(),
                consumed: AtomicU64::new(0),
                static_bound: false,
                bindings: Mutex::new(Bindings::default()),
                payload: Mutex::new(None),
                freed: Notify::new(),
            }),
        }
    }

    /// Creates a statically bound carrier with a fixed consumer.
    ///
    /// Static carriers skip the acquire/release protocol and are always ready
    /// to [`send`](Event::send); the occupancy marker holds the creation
    /// timestamp permanently. Calling any acquire operation on one returns
    /// [`EventError::StaticBinding`].
    pub fn bound(
        name: impl Into<Arc<str>>,
        consumer: ConsumerRef,
        dispatcher: Option<&Dispatcher>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                occupancy: OccupancyCell::stamped(),
                stage: StageCell::new(),
                consumed: AtomicU64::new(0),
                static_bound: true,
                bindings: Mutex::new(Bindings {
                    consumer: Some(consumer),
                    dispatcher: dispatcher.cloned(),
                    origin: None,
                }),
                payload: Mutex::new(None),
                freed: Notify::new(),
            }),
        }
    }

    /// Installs the payload slot (builder style).
    #[must_use]
    pub fn with_payload(self, payload: Box<dyn Payload>) -> Self {
        *self.inner.payload.lock().expect(ERR_POISONED_LOCK) = Some(payload);
        self
    }

    /// Attaches an origin at construction (builder style).
    #[must_use]
    pub fn with_origin(self, origin: OriginRef) -> Self {
        self.inner.bindings.lock().expect(ERR_POISONED_LOCK).origin = Some(origin);
        self
    }

    // ---- identity & diagnostics ----

    /// Debug name of the carrier.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Whether `self` and `other` are handles to the same carrier.
    ///
    /// Recall and queue removal match by this identity, never by name.
    pub fn same(&self, other: &Event) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Whether a producer currently holds the carrier.
    ///
    /// Always `false` for statically bound carriers — the protocol does not
    /// apply to them.
    pub fn is_occupied(&self) -> bool {
        !self.inner.static_bound && self.inner.occupancy.is_occupied()
    }

    /// Current lifecycle stage (diagnostics only).
    pub fn stage(&self) -> Stage {
        self.inner.stage.get()
    }

    /// Number of successful deliveries over the carrier's lifetime.
    pub fn consumed_count(&self) -> u64 {
        self.inner.consumed.load(Ordering::Relaxed)
    }

    // ---- bindings ----

    /// Rebinds consumer/dispatcher/origin outside an acquisition.
    ///
    /// Empty target fields keep the existing bindings.
    pub fn set_target(&self, target: &Target) {
        self.adopt(target);
    }

    fn adopt(&self, target: &Target) {
        let mut b = self.inner.bindings.lock().expect(ERR_POISONED_LOCK);
        if let Some(consumer) = &target.consumer {
            b.consumer = Some(Arc::clone(consumer));
        }
        if let Some(dispatcher) = &target.dispatcher {
            b.dispatcher = Some(dispatcher.clone());
        }
        if let Some(origin) = &target.origin {
            b.origin = Some(Arc::clone(origin));
        }
    }

    fn snapshot(&self) -> (Option<ConsumerRef>, Option<Dispatcher>, Option<OriginRef>) {
        let b = self.inner.bindings.lock().expect(ERR_POISONED_LOCK);
        (b.consumer.clone(), b.dispatcher.clone(), b.origin.clone())
    }

    /// Origin for a contention report: the target's if given, else the bound
    /// one.
    fn contention_origin(&self, target: &Target) -> Option<OriginRef> {
        if target.origin.is_some() {
            return target.origin.clone();
        }
        self.inner
            .bindings
            .lock()
            .expect(ERR_POISONED_LOCK)
            .origin
            .clone()
    }

    // ---- payload ----

    /// Replaces the payload slot.
    pub fn set_payload(&self, payload: Box<dyn Payload>) {
        *self.inner.payload.lock().expect(ERR_POISONED_LOCK) = Some(payload);
    }

    /// Removes and returns the payload, leaving the slot empty.
    pub fn take_payload(&self) -> Option<Box<dyn Payload>> {
        self.inner.payload.lock().expect(ERR_POISONED_LOCK).take()
    }

    /// Reads the payload as the concrete type `T`.
    ///
    /// Returns `None` when the slot is empty or holds a different type.
    pub fn read_payload<T, R>(&self, f: impl FnOnce(&T) -> R) -> Option<R>
    where
        T: Payload,
    {
        let guard = self.inner.payload.lock().expect(ERR_POISONED_LOCK);
        let payload = guard.as_deref()?;
        let any: &dyn Any = payload;
        any.downcast_ref::<T>().map(f)
    }

    /// Mutates the payload as the concrete type `T`.
    ///
    /// Returns `None` when the slot is empty or holds a different type.
    pub fn update_payload<T, R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R>
    where
        T: Payload,
    {
        let mut guard = self.inner.payload.lock().expect(ERR_POISONED_LOCK);
        let payload = guard.as_deref_mut()?;
        let any: &mut dyn Any = payload;
        any.downcast_mut::<T>().map(f)
    }

    // ---- occupancy protocol ----

    /// Atomically claims a free carrier.
    ///
    /// On success the payload is [`clean`](Payload::clean)ed, the target's
    /// bindings are adopted and the stage becomes [`Stage::Acquired`].
    ///
    /// On contention returns `Ok(false)`; when `expect_free` is set the
    /// origin's [`busy_on_acquire`](crate::Origin::busy_on_acquire) hook is
    /// notified first, because the caller believed the carrier had to be
    /// free.
    ///
    /// # Errors
    /// [`EventError::StaticBinding`] when called on a statically bound
    /// carrier.
    pub fn try_acquire(&self, target: &Target, expect_free: bool) -> Result<bool, EventError> {
        if self.inner.static_bound {
            return Err(EventError::StaticBinding {
                event: Arc::clone(&self.inner.name),
            });
        }
        match self.inner.occupancy.try_claim() {
            Some(_) => {
                if let Some(payload) = self
                    .inner
                    .payload
                    .lock()
                    .expect(ERR_POISONED_LOCK)
                    .as_deref_mut()
                {
                    payload.clean();
                }
                self.adopt(target);
                self.inner.stage.set(Stage::Acquired);
                Ok(true)
            }
            None => {
                if expect_free {
                    if let Some(origin) = self.contention_origin(target) {
                        origin.busy_on_acquire(self);
                    }
                }
                Ok(false)
            }
        }
    }

    /// Claims the carrier, waiting up to `timeout` for a release.
    ///
    /// Acquires immediately when free; otherwise parks on the carrier's own
    /// release signal and retries once. A zero timeout waits indefinitely
    /// (supported but discouraged — prefer an explicit bound).
    ///
    /// This is the producer/consumer handoff primitive: the releasing side
    /// wakes exactly the parties parked here.
    ///
    /// # Errors
    /// [`EventError::StaticBinding`] when called on a statically bound
    /// carrier.
    pub async fn acquire_within(
        &self,
        timeout: Duration,
        target: &Target,
    ) -> Result<bool, EventError> {
        if self.try_acquire(target, false)? {
            return Ok(true);
        }
        self.wait_freed(timeout).await;
        self.try_acquire(target, true)
    }

    /// Claims the carrier, recalling a not-yet-delivered message if needed.
    ///
    /// When the carrier is busy because it still sits in its dispatcher's
    /// immediate queue, the stale message is removed, the carrier released
    /// and re-acquired — the superseded delivery never happens. A carrier
    /// that has already started executing cannot be recalled.
    ///
    /// # Errors
    /// [`EventError::StaticBinding`] when called on a statically bound
    /// carrier.
    pub fn acquire_or_recall(
        &self,
        target: &Target,
        expect_free: bool,
    ) -> Result<bool, EventError> {
        if self.try_acquire(target, false)? {
            return Ok(true);
        }
        let (_, dispatcher, _) = self.snapshot();
        if let Some(dispatcher) = dispatcher {
            if dispatcher.remove(self) {
                self.release();
                if self.try_acquire(target, false)? {
                    return Ok(true);
                }
            }
        }
        if expect_free {
            if let Some(origin) = self.contention_origin(target) {
                origin.busy_on_acquire(self);
            }
        }
        Ok(false)
    }

    /// Claims the carrier by any means available, bounded by `timeout`.
    ///
    /// Escalation order:
    /// 1. free claim ([`AcquireOutcome::Free`]);
    /// 2. recall from the dispatcher queue ([`AcquireOutcome::Recalled`]);
    /// 3. bounded wait for a release, then a fresh claim;
    /// 4. forced clear ([`AcquireOutcome::Forced`]) — only when the occupancy
    ///    timestamp predates the wait start, which proves the holder hung
    ///    before the wait began and no newer acquisition raced it.
    ///
    /// The forced path trades strict correctness for liveness under a
    /// suspected consumer bug; it is logged.
    ///
    /// # Errors
    /// [`EventError::StaticBinding`] when called on a statically bound
    /// carrier.
    pub async fn acquire_or_force(
        &self,
        timeout: Duration,
        target: &Target,
    ) -> Result<AcquireOutcome, EventError> {
        if self.try_acquire(target, false)? {
            return Ok(AcquireOutcome::Free);
        }
        let (_, dispatcher, _) = self.snapshot();
        if let Some(dispatcher) = dispatcher {
            if dispatcher.remove(self) {
                self.release();
                if self.try_acquire(target, false)? {
                    return Ok(AcquireOutcome::Recalled);
                }
            }
        }
        let wait_start = clock_ms();
        self.wait_freed(timeout).await;
        if self.try_acquire(target, false)? {
            return Ok(AcquireOutcome::Free);
        }
        if self.inner.occupancy.force_clear_if_older(wait_start) {
            eprintln!(
                "[eventline] event '{}' reclaimed by force after {:?}; holder never released",
                self.name(),
                timeout
            );
            if self.try_acquire(target, false)? {
                return Ok(AcquireOutcome::Forced);
            }
        }
        Ok(AcquireOutcome::Busy)
    }

    async fn wait_freed(&self, timeout: Duration) {
        if timeout.is_zero() {
            self.inner.freed.notified().await;
        } else {
            let _ = time::timeout(timeout, self.inner.freed.notified()).await;
        }
    }

    /// Returns the carrier to "free" and wakes blocked acquirers.
    ///
    /// Idempotent: releasing an already-free carrier is a no-op for the
    /// marker but still wakes waiters. A repeat release of a carrier that was
    /// already released is reported as a probable bug. Statically bound
    /// carriers ignore release entirely.
    pub fn release(&self) {
        if self.inner.static_bound {
            return;
        }
        if self.inner.occupancy.clear() {
            let count = self.inner.consumed.load(Ordering::Relaxed);
            let origin = self
                .inner
                .bindings
                .lock()
                .expect(ERR_POISONED_LOCK)
                .origin
                .clone();
            if let Some(origin) = origin {
                origin.released(self, count);
            }
            self.inner.stage.set(Stage::Released);
        } else if self.inner.stage.get() == Stage::Released {
            eprintln!("[eventline] event '{}' released twice", self.name());
        }
        self.inner.freed.notify_waiters();
    }

    // ---- delivery ----

    /// Sends the carrier to its bound consumer.
    ///
    /// Requires a consumer. Stamps the occupancy marker if it is still free,
    /// which covers fire-and-forget carriers that were never explicitly
    /// acquired. When a dispatcher is bound the carrier is enqueued and the
    /// dispatcher woken (`Ok(false)` if it has shut down); without one the
    /// consumer runs right here, in the sender's task.
    ///
    /// # Errors
    /// [`EventError::NoConsumer`] when no destination consumer is bound.
    pub async fn send(&self) -> Result<bool, EventError> {
        let (consumer, dispatcher, _) = self.snapshot();
        if consumer.is_none() {
            return Err(EventError::NoConsumer {
                event: Arc::clone(&self.inner.name),
            });
        }
        self.inner.occupancy.stamp_if_free();
        match dispatcher {
            Some(dispatcher) => Ok(dispatcher.store(self.clone())),
            None => {
                self.deliver().await;
                Ok(true)
            }
        }
    }

    pub(crate) fn mark_queued(&self) {
        self.inner.stage.set(Stage::Queued);
    }

    /// Stamps the occupancy marker if still free (activation bookkeeping).
    pub(crate) fn stamp_occupancy(&self) {
        self.inner.occupancy.stamp_if_free();
    }

    pub(crate) fn bound_dispatcher(&self) -> Option<Dispatcher> {
        self.inner
            .bindings
            .lock()
            .expect(ERR_POISONED_LOCK)
            .dispatcher
            .clone()
    }

    /// Runs the consumer callback for one delivery.
    ///
    /// Invoked by the dispatcher loop, or directly by [`send`](Event::send)
    /// when no dispatcher is bound. A consumer error or panic is folded into
    /// [`Outcome::FAULT`]; the loop never observes it. The carrier is
    /// released afterwards unless the consumer asked to keep it or the
    /// binding is static.
    pub(crate) async fn deliver(&self) {
        let (consumer, _, origin) = self.snapshot();
        if let Some(origin) = &origin {
            origin.dequeued(self);
        }
        let Some(consumer) = consumer else {
            eprintln!(
                "[eventline] event '{}' reached delivery with no consumer; dropped",
                self.name()
            );
            self.release();
            return;
        };
        self.inner.stage.set(Stage::Executing);
        let outcome = match std::panic::AssertUnwindSafe(consumer.process(self))
            .catch_unwind()
            .await
        {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(err)) => {
                eprintln!(
                    "[eventline] consumer '{}' failed on event '{}': {err}",
                    consumer.name(),
                    self.name()
                );
                Outcome::FAULT
            }
            Err(panic_err) => {
                eprintln!(
                    "[eventline] consumer '{}' panicked on event '{}': {panic_err:?}",
                    consumer.name(),
                    self.name()
                );
                Outcome::FAULT
            }
        };
        self.inner.stage.set(Stage::PostProcessing);
        let count = self.inner.consumed.fetch_add(1, Ordering::Relaxed) + 1;
        if let Some(origin) = &origin {
            origin.consumed(self, count, outcome);
        }
        if !outcome.contains(Outcome::KEEP) && !self.inner.static_bound {
            self.release();
        }
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("name", &self.inner.name)
            .field("stage", &self.inner.stage.get())
            .field("occupied", &self.is_occupied())
            .field("consumed", &self.consumed_count())
            .finish()
    }
}
