//! # The serialization loop.
//!
//! One pass of the loop:
//!
//! 1. **Sweep deadlines** when the next-check time has passed: take the
//!    pending set, fire every entry due within [`Config::near_due`] in
//!    ascending deadline order, re-insert the rest, and remember the minimum
//!    remaining time as the next wait (capped by [`Config::idle_ceiling`]).
//! 2. **Drain the immediate queue** completely, delivering each event. If
//!    anything was delivered, go back to 1 — delivery may have taken time or
//!    enqueued new work.
//! 3. **Sleep** for `max(wait, min_sleep)` or until a wake signal/close.
//!
//! ## Check-then-sleep
//! The state flips to `Waiting` **before** the final re-check of both
//! queues. A producer enqueues before it reads the state, so either it
//! observes `Waiting` and signals (the permit survives the race into the
//! sleep), or its item is already visible to the re-check. Both orders reach
//! delivery without a wakeup lost.
//!
//! ## Rules
//! - A consumer failure or panic never stops the loop.
//! - Firing order among due deadlines is ascending execution time; ordering
//!   between deadline firings and already-queued events is inherent timing,
//!   not coalesced away.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use crate::core::dispatcher::Dispatcher;
use crate::core::state::LineState;
use crate::events::clock_ms;
use crate::timers::TimeOrder;

pub(crate) async fn run(line: Dispatcher) {
    let shared = Arc::clone(&line.shared);
    shared.state.set(LineState::Running);
    let min_sleep_ms = (shared.cfg.min_sleep.as_millis() as u64).max(1);
    let mut next_check_ms: u64 = 0;

    loop {
        if shared.stop.is_cancelled() {
            break;
        }

        let now = clock_ms();
        let mut wait_ms = if next_check_ms <= now {
            let wait = sweep_orders(&line).await;
            next_check_ms = clock_ms() + wait;
            wait
        } else {
            next_check_ms - now
        };

        let mut delivered = false;
        while let Some(event) = shared.queues.pop_event() {
            shared.state.set(LineState::Busy);
            event.deliver().await;
            shared.delivered.fetch_add(1, Ordering::Relaxed);
            delivered = true;
            if shared.stop.is_cancelled() {
                break;
            }
        }
        if delivered {
            shared.state.set(LineState::Running);
            next_check_ms = 0;
            continue;
        }

        // Waiting must be visible before the final queue re-check; see the
        // module docs for why this cannot lose a wakeup.
        shared.state.set(LineState::Waiting);
        if shared.queues.has_events() {
            shared.state.set(LineState::Running);
            continue;
        }
        let now = clock_ms();
        if let Some(at) = shared.queues.earliest_order_ms() {
            wait_ms = wait_ms.min(at.saturating_sub(now));
        }
        if wait_ms == 0 {
            shared.state.set(LineState::Running);
            next_check_ms = 0;
            continue;
        }

        let sleep_for = Duration::from_millis(wait_ms.max(min_sleep_ms));
        tokio::select! {
            _ = shared.wake.notified() => {}
            _ = tokio::time::sleep(sleep_for) => {}
            _ = shared.stop.cancelled() => break,
        }
        shared.state.set(LineState::Running);
        // A wake may mean a new earliest deadline; re-derive it.
        next_check_ms = 0;
    }

    shared.state.set(LineState::Finished);
}

/// Fires every due deadline and returns the wait until the nearest survivor,
/// capped by the idle ceiling.
async fn sweep_orders(line: &Dispatcher) -> u64 {
    let shared = &line.shared;
    let idle_ms = (shared.cfg.idle_ceiling.as_millis() as u64).max(1);
    let pending = shared.queues.take_orders();
    if pending.is_empty() {
        return idle_ms;
    }

    let near_ms = shared.cfg.near_due.as_millis() as u64;
    let now = clock_ms();
    let mut due: Vec<TimeOrder> = Vec::new();
    let mut wait_ms = idle_ms;

    for order in pending {
        let at = order.execution_time_ms();
        if at == 0 {
            // Deactivated in place while registered.
            continue;
        }
        let remaining = at.saturating_sub(now);
        if remaining < near_ms.max(1) {
            due.push(order);
        } else {
            wait_ms = wait_ms.min(remaining);
            // Survivors go back before any firing so a re-activation from a
            // consumer finds them registered.
            shared.queues.insert_order(order);
        }
    }

    due.sort_by_key(TimeOrder::execution_time_ms);
    for order in due {
        shared.state.set(LineState::Busy);
        order.fire(line).await;
        shared.fired.fetch_add(1, Ordering::Relaxed);
    }
    wait_ms
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::consumers::{ConsumeFn, ConsumerRef};
    use crate::error::ConsumeError;
    use crate::events::payload::tests::Text;
    use crate::events::{Event, Outcome, Target};
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use std::time::Instant;

    fn recording(log: &Arc<Mutex<Vec<String>>>) -> ConsumerRef {
        let log = Arc::clone(log);
        ConsumeFn::arc("recorder", move |ev: Event| {
            let log = Arc::clone(&log);
            async move {
                let body = ev
                    .read_payload::<Text, _>(|t| t.body.clone())
                    .unwrap_or_else(|| ev.name().to_owned());
                log.lock().unwrap().push(body);
                Ok::<_, ConsumeError>(Outcome::CONSUMED)
            }
        })
    }

    async fn wait_until(deadline: Duration, mut cond: impl FnMut() -> bool) -> bool {
        let started = Instant::now();
        while started.elapsed() < deadline {
            if cond() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        cond()
    }

    #[tokio::test]
    async fn test_end_to_end_ping() {
        let line = Dispatcher::spawn(Config::default());
        let log = Arc::new(Mutex::new(Vec::new()));
        let ev = Event::new("req").with_payload(Box::new(Text::default()));
        assert!(ev
            .try_acquire(&Target::to(recording(&log)).via(&line), false)
            .unwrap());
        ev.update_payload::<Text, _>(|t| t.body = "ping".into());

        assert!(ev.send().await.unwrap());
        assert!(
            wait_until(Duration::from_millis(100), || !log.lock().unwrap().is_empty()).await,
            "delivery must happen within 100ms"
        );
        assert_eq!(log.lock().unwrap().as_slice(), ["ping"]);
        assert!(
            wait_until(Duration::from_millis(50), || !ev.is_occupied()).await,
            "carrier must be free after delivery"
        );
        assert_eq!(ev.consumed_count(), 1);

        line.close();
        line.join().await;
    }

    #[tokio::test]
    async fn test_fifo_within_one_dispatcher() {
        let line = Dispatcher::spawn(Config::default());
        let log = Arc::new(Mutex::new(Vec::new()));
        let consumer = recording(&log);

        for name in ["a", "b", "c"] {
            let ev = Event::new(name);
            assert!(ev
                .try_acquire(&Target::to(Arc::clone(&consumer)).via(&line), false)
                .unwrap());
            assert!(ev.send().await.unwrap());
        }

        assert!(wait_until(Duration::from_millis(500), || log.lock().unwrap().len() == 3).await);
        assert_eq!(log.lock().unwrap().as_slice(), ["a", "b", "c"]);

        line.close();
        line.join().await;
    }

    #[tokio::test]
    async fn test_recall_supersedes_the_stale_message() {
        let line = Dispatcher::spawn(Config::default());
        let log = Arc::new(Mutex::new(Vec::new()));

        // Keep the loop busy so the target event stays queued.
        let blocker = Event::bound(
            "blocker",
            ConsumeFn::arc("slow", |_ev| async move {
                tokio::time::sleep(Duration::from_millis(120)).await;
                Ok::<_, ConsumeError>(Outcome::CONSUMED)
            }),
            Some(&line),
        );
        blocker.send().await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let ev = Event::new("req").with_payload(Box::new(Text::default()));
        let target = Target::to(recording(&log)).via(&line);
        assert!(ev.try_acquire(&target, false).unwrap());
        ev.update_payload::<Text, _>(|t| t.body = "stale".into());
        assert!(ev.send().await.unwrap());

        // A second owner supersedes the queued message.
        assert!(ev.acquire_or_recall(&target, false).unwrap());
        ev.update_payload::<Text, _>(|t| t.body = "fresh".into());
        assert!(ev.send().await.unwrap());

        assert!(wait_until(Duration::from_millis(500), || !log.lock().unwrap().is_empty()).await);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(
            log.lock().unwrap().as_slice(),
            ["fresh"],
            "only the superseding payload may be delivered"
        );

        line.close();
        line.join().await;
    }

    #[tokio::test]
    async fn test_wake_on_store_reaches_a_waiting_loop_promptly() {
        let line = Dispatcher::spawn(Config::default());
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(line.state(), LineState::Waiting);

        let hits = Arc::new(AtomicUsize::new(0));
        let hits_in = Arc::clone(&hits);
        let consumer = ConsumeFn::arc("fast", move |_ev| {
            let hits = Arc::clone(&hits_in);
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                Ok::<_, ConsumeError>(Outcome::CONSUMED)
            }
        });
        let ev = Event::bound("poke", consumer, Some(&line));

        let started = Instant::now();
        assert!(ev.send().await.unwrap());
        assert!(wait_until(Duration::from_millis(200), || hits.load(Ordering::SeqCst) == 1).await);
        assert!(
            started.elapsed() < Duration::from_millis(100),
            "a waiting loop must wake on store, not sleep out its ceiling"
        );

        line.close();
        line.join().await;
    }

    #[tokio::test]
    async fn test_panicking_consumer_does_not_stop_the_loop() {
        let line = Dispatcher::spawn(Config::default());
        let bomb = Event::bound(
            "bomb",
            ConsumeFn::arc("panicky", |ev: Event| async move {
                if ev.name() == "bomb" {
                    panic!("consumer bug");
                }
                Ok::<_, ConsumeError>(Outcome::CONSUMED)
            }),
            Some(&line),
        );
        bomb.send().await.unwrap();

        let log = Arc::new(Mutex::new(Vec::new()));
        let after = Event::new("after");
        assert!(after
            .try_acquire(&Target::to(recording(&log)).via(&line), false)
            .unwrap());
        assert!(after.send().await.unwrap());

        assert!(
            wait_until(Duration::from_millis(500), || !log.lock().unwrap().is_empty()).await,
            "the loop must survive a panicking consumer"
        );

        line.close();
        line.join().await;
    }

    #[tokio::test]
    async fn test_close_terminates_and_rejects_new_work() {
        let line = Dispatcher::spawn(Config::default());
        line.close();
        line.join().await;
        assert_eq!(line.state(), LineState::Finished);

        let consumer = ConsumeFn::arc("late", |_ev| async move {
            Ok::<_, ConsumeError>(Outcome::CONSUMED)
        });
        let ev = Event::bound("late", consumer, Some(&line));
        assert!(!ev.send().await.unwrap(), "a closed dispatcher rejects sends");
    }

    #[tokio::test]
    async fn test_stats_count_deliveries_and_firings() {
        let line = Dispatcher::spawn(Config::default());
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_in = Arc::clone(&hits);
        let consumer = ConsumeFn::arc("count", move |_ev| {
            let hits = Arc::clone(&hits_in);
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                Ok::<_, ConsumeError>(Outcome::CONSUMED)
            }
        });

        let ev = Event::bound("one", consumer.clone(), Some(&line));
        ev.send().await.unwrap();
        let order = crate::timers::TimeOrder::bound("two", &line, consumer, None);
        order.activate(Duration::from_millis(20));

        assert!(wait_until(Duration::from_millis(500), || hits.load(Ordering::SeqCst) == 2).await);
        let stats = line.stats();
        assert_eq!(stats.delivered, 1);
        assert_eq!(stats.fired, 1);
        assert_eq!(stats.queued, 0);
        assert_eq!(stats.pending, 0);

        line.close();
        line.join().await;
    }
}
