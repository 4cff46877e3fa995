//! # Dispatcher handle: spawn, enqueue, recall, shutdown.
//!
//! [`Dispatcher`] coordinates one serialization task. Producers enqueue
//! through [`Dispatcher::store`] (events) and `TimeOrder::activate`
//! (deadlines) from any task; the loop delivers everything on its own task,
//! one callback at a time.
//!
//! ## Wakeup discipline
//! An enqueue signals the loop only when its state reads
//! [`LineState::Waiting`] at that instant. A signal skipped because the loop
//! looked `Busy` is safe: the busy→waiting transition re-evaluates both
//! queues first, and a signal that races the transition is retained as a
//! permit by the notifier. No redundant wakeups, no lost ones.
//!
//! ## Example
//! ```
//! use eventline::{Config, ConsumeError, ConsumeFn, Dispatcher, Event, Outcome};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let line = Dispatcher::spawn(Config::default());
//! let consumer = ConsumeFn::arc("sink", |_ev| async move {
//!     Ok::<_, ConsumeError>(Outcome::CONSUMED)
//! });
//! let ev = Event::bound("job", consumer, Some(&line));
//! ev.send().await.unwrap();
//!
//! line.close();
//! line.join().await;
//! # }
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::core::queues::Queues;
use crate::core::runner;
use crate::core::state::{LineState, StateCell};
use crate::events::Event;
use crate::timers::TimeOrder;
use crate::ERR_POISONED_LOCK;

/// Counters and queue depths of one dispatcher instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    /// Immediate events delivered since spawn.
    pub delivered: u64,
    /// Deadline entries fired since spawn.
    pub fired: u64,
    /// Events currently queued for delivery.
    pub queued: usize,
    /// Deadline entries currently pending.
    pub pending: usize,
}

pub(crate) struct Shared {
    pub(crate) cfg: Config,
    pub(crate) queues: Queues,
    pub(crate) wake: Notify,
    pub(crate) state: StateCell,
    pub(crate) stop: CancellationToken,
    pub(crate) delivered: AtomicU64,
    pub(crate) fired: AtomicU64,
    worker: Mutex<Option<JoinHandle<()>>>,
}

/// Handle to one serialization task.
///
/// Cheap clonable; clones address the same instance. Multiple independent
/// instances may coexist — an event's destination dispatcher and a deadline's
/// timer dispatcher are bound per carrier, and cross-instance handoff goes
/// through the ordinary enqueue path.
#[derive(Clone)]
pub struct Dispatcher {
    pub(crate) shared: Arc<Shared>,
}

impl Dispatcher {
    /// Starts the serialization loop and returns its handle.
    #[must_use]
    pub fn spawn(cfg: Config) -> Self {
        let shared = Arc::new(Shared {
            cfg,
            queues: Queues::new(),
            wake: Notify::new(),
            state: StateCell::new(),
            stop: CancellationToken::new(),
            delivered: AtomicU64::new(0),
            fired: AtomicU64::new(0),
            worker: Mutex::new(None),
        });
        let line = Self {
            shared: Arc::clone(&shared),
        };
        let handle = tokio::spawn(runner::run(line.clone()));
        *shared.worker.lock().expect(ERR_POISONED_LOCK) = Some(handle);
        line
    }

    /// Enqueues an event for delivery and wakes the loop if it sleeps.
    ///
    /// Returns `false` when the dispatcher has shut down; the event is then
    /// not queued. Consumers that re-queue a carrier they were just handed
    /// (returning [`Outcome::KEEP`](crate::Outcome::KEEP)) use this too.
    pub fn store(&self, event: Event) -> bool {
        if self.shared.stop.is_cancelled() || self.state() == LineState::Finished {
            return false;
        }
        event.mark_queued();
        self.shared.queues.push_event(event);
        self.wake_if_waiting();
        true
    }

    /// Best-effort removal of a not-yet-delivered event (recall).
    ///
    /// Returns whether the event was found. Advisory: an event whose
    /// delivery already started is unaffected.
    pub fn remove(&self, event: &Event) -> bool {
        self.shared.queues.remove_event(event)
    }

    /// Registers a deadline entry and wakes the loop if it sleeps.
    pub(crate) fn schedule(&self, order: TimeOrder) -> bool {
        if self.shared.stop.is_cancelled() || self.state() == LineState::Finished {
            return false;
        }
        self.shared.queues.insert_order(order);
        self.wake_if_waiting();
        true
    }

    /// Withdraws a pending deadline entry; returns whether it was found.
    pub(crate) fn unschedule(&self, order: &TimeOrder) -> bool {
        self.shared.queues.remove_order(order)
    }

    fn wake_if_waiting(&self) {
        if self.state() == LineState::Waiting {
            self.shared.wake.notify_one();
        }
    }

    /// Whether `self` and `other` are handles to the same instance.
    pub fn same(&self, other: &Dispatcher) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    /// Current loop state.
    pub fn state(&self) -> LineState {
        self.shared.state.get()
    }

    /// The instance's timing configuration.
    pub fn config(&self) -> &Config {
        &self.shared.cfg
    }

    /// Counter and queue-depth snapshot.
    pub fn stats(&self) -> Stats {
        Stats {
            delivered: self.shared.delivered.load(Ordering::Relaxed),
            fired: self.shared.fired.load(Ordering::Relaxed),
            queued: self.shared.queues.events_len(),
            pending: self.shared.queues.orders_len(),
        }
    }

    /// Requests shutdown: sets the stop flag and wakes the loop so it can
    /// observe it. Queued items that were not delivered stay undelivered.
    pub fn close(&self) {
        self.shared.stop.cancel();
        self.shared.wake.notify_one();
    }

    /// Awaits loop termination after [`close`](Dispatcher::close).
    pub async fn join(&self) {
        let handle = self.shared.worker.lock().expect(ERR_POISONED_LOCK).take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("state", &self.state())
            .field("stats", &self.stats())
            .finish()
    }
}
