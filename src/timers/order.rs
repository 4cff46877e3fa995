//! # Deadline entry (`TimeOrder`)
//!
//! A [`TimeOrder`] is an event carrier with a scheduled firing time instead
//! of an immediate send. It registers with one timer [`Dispatcher`]'s pending
//! set; when the deadline elapses the dispatcher fires it — synchronously on
//! its own task when the destination dispatcher is the timer itself (so a
//! timeout transition is observed before other already-queued events), or by
//! pushing to the destination's immediate queue otherwise.
//!
//! ## State
//! ```text
//! inactive ──activate──► pending ──fire──► inactive
//!     ▲                    │  ▲
//!     └────deactivate──────┘  └── re-activate (remove + reinsert, windup+1)
//! ```
//!
//! ## Rules
//! - `execution_time == 0` means inactive; any nonzero value implies exactly
//!   one registration in the timer's pending set.
//! - The "latest" ceiling is fixed on first activation and never extended;
//!   later re-activations may push the firing later but never past it.
//! - A pending entry whose recorded time lies more than
//!   [`Config::stale_after`](crate::Config::stale_after) in the past is
//!   treated as abandoned: cleared, logged, re-created.

use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::consumers::ConsumerRef;
use crate::core::Dispatcher;
use crate::events::{clock_ms, Event};
use crate::ERR_POISONED_LOCK;

struct OrderInner {
    event: Event,
    /// Absolute firing time in wall-clock ms; 0 = inactive.
    execution_ms: AtomicU64,
    /// Hard ceiling for deferrals; 0 = not yet derived.
    latest_ms: AtomicU64,
    /// Re-activations while already pending (diagnostics).
    windup: AtomicU32,
    timer: Mutex<Option<Dispatcher>>,
}

/// Event carrier that fires at a scheduled time.
///
/// Cheap clonable handle; clones refer to the same entry. The timer
/// dispatcher that owns the pending registration may differ from the
/// destination dispatcher the carrier is delivered through.
#[derive(Clone)]
pub struct TimeOrder {
    inner: Arc<OrderInner>,
}

impl TimeOrder {
    /// Creates an inactive entry around a free, dynamically acquired carrier.
    pub fn new(name: impl Into<Arc<str>>, timer: &Dispatcher) -> Self {
        Self {
            inner: Arc::new(OrderInner {
                event: Event::new(name),
                execution_ms: AtomicU64::new(0),
                latest_ms: AtomicU64::new(0),
                windup: AtomicU32::new(0),
                timer: Mutex::new(Some(timer.clone())),
            }),
        }
    }

    /// Creates an inactive entry around a statically bound carrier.
    ///
    /// `destination` routes delivery; `None` runs the consumer on the timer
    /// task itself when the entry fires.
    pub fn bound(
        name: impl Into<Arc<str>>,
        timer: &Dispatcher,
        consumer: ConsumerRef,
        destination: Option<&Dispatcher>,
    ) -> Self {
        Self {
            inner: Arc::new(OrderInner {
                event: Event::bound(name, consumer, destination),
                execution_ms: AtomicU64::new(0),
                latest_ms: AtomicU64::new(0),
                windup: AtomicU32::new(0),
                timer: Mutex::new(Some(timer.clone())),
            }),
        }
    }

    /// The wrapped event carrier.
    pub fn event(&self) -> &Event {
        &self.inner.event
    }

    /// Whether `self` and `other` are handles to the same entry.
    pub fn same(&self, other: &TimeOrder) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Whether the entry is registered to fire.
    pub fn is_active(&self) -> bool {
        self.inner.execution_ms.load(Ordering::SeqCst) != 0
    }

    /// Scheduled firing time in wall-clock milliseconds; 0 when inactive.
    pub fn execution_time_ms(&self) -> u64 {
        self.inner.execution_ms.load(Ordering::SeqCst)
    }

    /// Number of re-activations that hit an already-pending entry.
    pub fn windup_count(&self) -> u32 {
        self.inner.windup.load(Ordering::Relaxed)
    }

    /// Schedules the entry `delay` from now, with the ceiling derived from
    /// this first request if none is fixed yet.
    pub fn activate(&self, delay: Duration) {
        let at = clock_ms() + delay.as_millis() as u64;
        self.activate_at_ms(at, 0);
    }

    /// Schedules the entry for the absolute time `at`, optionally fixing the
    /// deferral ceiling to `latest`.
    ///
    /// The ceiling is derived on the **first** activation only (`latest`, or
    /// `at` when absent) and never extended afterwards; a request beyond it
    /// is clamped. Re-activating a pending entry removes and re-inserts the
    /// registration — never a duplicate — and counts a windup.
    pub fn activate_at(&self, at: SystemTime, latest: Option<SystemTime>) {
        self.activate_at_ms(
            to_ms(at),
            latest.map_or(0, to_ms),
        );
    }

    fn activate_at_ms(&self, at_ms: u64, latest_ms: u64) {
        let timer = self.inner.timer.lock().expect(ERR_POISONED_LOCK).clone();
        let Some(timer) = timer else {
            eprintln!(
                "[eventline] time order '{}' has no timer dispatcher; activation dropped",
                self.inner.event.name()
            );
            return;
        };

        let now = clock_ms();
        let recorded = self.inner.execution_ms.load(Ordering::SeqCst);
        let mut pending = recorded != 0;
        let stale_ms = timer.config().stale_after.as_millis() as u64;
        if pending && now.saturating_sub(recorded) > stale_ms {
            eprintln!(
                "[eventline] time order '{}' pending {}ms past its deadline; treating as abandoned",
                self.inner.event.name(),
                now - recorded
            );
            self.deactivate();
            pending = false;
        }

        let mut ceiling = self.inner.latest_ms.load(Ordering::SeqCst);
        if ceiling == 0 {
            ceiling = if latest_ms != 0 { latest_ms } else { at_ms };
            self.inner.latest_ms.store(ceiling, Ordering::SeqCst);
        }
        let at_ms = at_ms.min(ceiling);

        if pending {
            self.inner.windup.fetch_add(1, Ordering::Relaxed);
            timer.unschedule(self);
        } else {
            self.inner.event.stamp_occupancy();
        }
        self.inner.execution_ms.store(at_ms, Ordering::SeqCst);
        timer.schedule(self.clone());
    }

    /// Clears both timestamps and withdraws the pending registration.
    ///
    /// No-op when already inactive. Advisory once firing has begun: the
    /// in-flight delivery is not affected.
    pub fn deactivate(&self) {
        self.inner.latest_ms.store(0, Ordering::SeqCst);
        self.inner.execution_ms.store(0, Ordering::SeqCst);
        let timer = self.inner.timer.lock().expect(ERR_POISONED_LOCK).clone();
        if let Some(timer) = timer {
            timer.unschedule(self);
        }
    }

    /// Fires the entry on the timer dispatcher `via`.
    ///
    /// The ceiling is cleared before the execution time so a concurrent
    /// re-activation observes a consistent inactive pair. Delivery runs
    /// inline when the destination dispatcher is the timer itself; otherwise
    /// the carrier goes through the ordinary send path.
    pub(crate) async fn fire(&self, via: &Dispatcher) {
        self.inner.latest_ms.store(0, Ordering::SeqCst);
        self.inner.execution_ms.store(0, Ordering::SeqCst);
        match self.inner.event.bound_dispatcher() {
            Some(destination) if destination.same(via) => self.inner.event.deliver().await,
            _ => {
                if let Err(err) = self.inner.event.send().await {
                    eprintln!(
                        "[eventline] time order '{}' could not fire: {err}",
                        self.inner.event.name()
                    );
                }
            }
        }
    }
}

impl fmt::Debug for TimeOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimeOrder")
            .field("event", &self.inner.event.name())
            .field("execution_ms", &self.execution_time_ms())
            .field("windup", &self.windup_count())
            .finish()
    }
}

fn to_ms(at: SystemTime) -> u64 {
    at.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
        .max(1)
}
