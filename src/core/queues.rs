//! # The dispatcher's two queues.
//!
//! An immediate-event FIFO and a pending-deadline set, both multi-producer
//! safe behind short critical sections. Items are matched for removal by
//! carrier identity ([`Event::same`]/[`TimeOrder::same`]), never by name.
//!
//! ## Rules
//! - Locks are never held across an `.await`; the loop takes the whole
//!   pending set out, fires without the lock, and re-inserts survivors.
//! - Deadline insertion is idempotent — re-activation during a sweep finds
//!   the entry absent, inserts it, and the sweep's re-insert backs off.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::events::Event;
use crate::timers::TimeOrder;
use crate::ERR_POISONED_LOCK;

pub(crate) struct Queues {
    events: Mutex<VecDeque<Event>>,
    orders: Mutex<Vec<TimeOrder>>,
}

impl Queues {
    pub(crate) fn new() -> Self {
        Self {
            events: Mutex::new(VecDeque::new()),
            orders: Mutex::new(Vec::new()),
        }
    }

    // ---- immediate events (FIFO) ----

    pub(crate) fn push_event(&self, event: Event) {
        self.events.lock().expect(ERR_POISONED_LOCK).push_back(event);
    }

    pub(crate) fn pop_event(&self) -> Option<Event> {
        self.events.lock().expect(ERR_POISONED_LOCK).pop_front()
    }

    /// Best-effort removal of a not-yet-delivered event; returns whether it
    /// was found.
    pub(crate) fn remove_event(&self, event: &Event) -> bool {
        let mut q = self.events.lock().expect(ERR_POISONED_LOCK);
        match q.iter().position(|e| e.same(event)) {
            Some(idx) => {
                q.remove(idx);
                true
            }
            None => false,
        }
    }

    pub(crate) fn has_events(&self) -> bool {
        !self.events.lock().expect(ERR_POISONED_LOCK).is_empty()
    }

    pub(crate) fn events_len(&self) -> usize {
        self.events.lock().expect(ERR_POISONED_LOCK).len()
    }

    // ---- pending deadlines ----

    /// Inserts unless the entry is already registered (idempotent).
    pub(crate) fn insert_order(&self, order: TimeOrder) -> bool {
        let mut q = self.orders.lock().expect(ERR_POISONED_LOCK);
        if q.iter().any(|o| o.same(&order)) {
            return false;
        }
        q.push(order);
        true
    }

    pub(crate) fn remove_order(&self, order: &TimeOrder) -> bool {
        let mut q = self.orders.lock().expect(ERR_POISONED_LOCK);
        match q.iter().position(|o| o.same(order)) {
            Some(idx) => {
                q.swap_remove(idx);
                true
            }
            None => false,
        }
    }

    /// Takes the whole pending set for a sweep.
    pub(crate) fn take_orders(&self) -> Vec<TimeOrder> {
        std::mem::take(&mut *self.orders.lock().expect(ERR_POISONED_LOCK))
    }

    /// Earliest registered execution time, skipping entries deactivated in
    /// place.
    pub(crate) fn earliest_order_ms(&self) -> Option<u64> {
        self.orders
            .lock()
            .expect(ERR_POISONED_LOCK)
            .iter()
            .map(TimeOrder::execution_time_ms)
            .filter(|&at| at != 0)
            .min()
    }

    pub(crate) fn orders_len(&self) -> usize {
        self.orders.lock().expect(ERR_POISONED_LOCK).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_are_fifo() {
        let q = Queues::new();
        let (a, b, c) = (Event::new("a"), Event::new("b"), Event::new("c"));
        q.push_event(a.clone());
        q.push_event(b.clone());
        q.push_event(c.clone());

        assert!(q.pop_event().unwrap().same(&a));
        assert!(q.pop_event().unwrap().same(&b));
        assert!(q.pop_event().unwrap().same(&c));
        assert!(q.pop_event().is_none());
    }

    #[test]
    fn test_remove_event_matches_identity_not_name() {
        let q = Queues::new();
        let queued = Event::new("twin");
        let stranger = Event::new("twin");
        q.push_event(queued.clone());

        assert!(!q.remove_event(&stranger), "same name must not match");
        assert!(q.remove_event(&queued));
        assert!(!q.remove_event(&queued), "already removed");
        assert!(!q.has_events());
    }

    #[tokio::test]
    async fn test_order_insert_is_idempotent() {
        let timer = crate::core::Dispatcher::spawn(crate::config::Config::default());
        let q = Queues::new();
        let order = TimeOrder::new("o", &timer);

        assert!(q.insert_order(order.clone()));
        assert!(!q.insert_order(order.clone()), "duplicate registration");
        assert_eq!(q.orders_len(), 1);
        assert!(q.remove_order(&order));
        assert_eq!(q.orders_len(), 0);

        timer.close();
        timer.join().await;
    }
}
