//! Stopped-notification subscribers
//!
//! An ordered list of callbacks. Dispatch runs them in insertion order and
//! isolates each one: a panicking handler is reported, the rest still run.

use parking_lot::RwLock;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::{panic_message, WatchdogError};
use crate::events::StoppedEvent;
use crate::watchdog::Watchdog;

/// Callback invoked when the watchdog decides the task has stopped
pub type StoppedHandler = Arc<dyn Fn(&Watchdog, &StoppedEvent) + Send + Sync>;

/// Handle returned by `subscribe`, used to unsubscribe later
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

pub(crate) struct SubscriberList {
    next_id: AtomicU64,
    handlers: RwLock<Vec<(SubscriptionId, StoppedHandler)>>,
}

impl SubscriberList {
    pub(crate) fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            handlers: RwLock::new(Vec::new()),
        }
    }

    pub(crate) fn register(&self, handler: StoppedHandler) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers.write().push((id, handler));
        id
    }

    pub(crate) fn remove(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.write();
        match handlers.iter().position(|(existing, _)| *existing == id) {
            Some(pos) => {
                handlers.remove(pos);
                true
            }
            None => false,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.handlers.read().len()
    }

    /// Invoke every handler in insertion order.
    ///
    /// The lock is released before any handler runs, so handlers may
    /// subscribe or unsubscribe. Returns one error per panicking handler.
    pub(crate) fn dispatch(
        &self,
        watchdog: &Watchdog,
        event: &StoppedEvent,
    ) -> Vec<WatchdogError> {
        let snapshot: Vec<StoppedHandler> = self
            .handlers
            .read()
            .iter()
            .map(|(_, handler)| handler.clone())
            .collect();

        let mut failures = Vec::new();
        for (index, handler) in snapshot.iter().enumerate() {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| handler(watchdog, event))) {
                failures.push(WatchdogError::SubscriberPanicked {
                    index,
                    message: panic_message(payload.as_ref()),
                });
            }
        }
        failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use parking_lot::Mutex;

    fn event() -> StoppedEvent {
        StoppedEvent {
            last_beat: Utc::now(),
            elapsed_ms: 1500,
        }
    }

    #[test]
    fn test_dispatch_in_insertion_order() {
        let watchdog = Watchdog::new(1000u64).unwrap();
        let list = SubscriberList::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let order = order.clone();
            list.register(Arc::new(move |_: &Watchdog, _: &StoppedEvent| {
                order.lock().push(tag)
            }));
        }

        let failures = list.dispatch(&watchdog, &event());
        assert!(failures.is_empty());
        assert_eq!(*order.lock(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_panicking_handler_does_not_block_others() {
        let watchdog = Watchdog::new(1000u64).unwrap();
        let list = SubscriberList::new();
        let reached = Arc::new(Mutex::new(false));

        list.register(Arc::new(|_: &Watchdog, _: &StoppedEvent| {
            panic!("subscriber exploded")
        }));
        let flag = reached.clone();
        list.register(Arc::new(move |_: &Watchdog, _: &StoppedEvent| {
            *flag.lock() = true
        }));

        let failures = list.dispatch(&watchdog, &event());
        assert!(*reached.lock());
        assert_eq!(failures.len(), 1);
        match &failures[0] {
            WatchdogError::SubscriberPanicked { index, message } => {
                assert_eq!(*index, 0);
                assert_eq!(message, "subscriber exploded");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_remove_by_id() {
        let list = SubscriberList::new();
        let a = list.register(Arc::new(|_: &Watchdog, _: &StoppedEvent| {}));
        let b = list.register(Arc::new(|_: &Watchdog, _: &StoppedEvent| {}));
        assert_ne!(a, b);
        assert_eq!(list.len(), 2);

        assert!(list.remove(a));
        assert!(!list.remove(a));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_handler_may_unsubscribe_during_dispatch() {
        let watchdog = Watchdog::new(1000u64).unwrap();
        let list = Arc::new(SubscriberList::new());
        let slot: Arc<Mutex<Option<SubscriptionId>>> = Arc::new(Mutex::new(None));

        let list_ref = list.clone();
        let slot_ref = slot.clone();
        let id = list.register(Arc::new(move |_: &Watchdog, _: &StoppedEvent| {
            if let Some(id) = slot_ref.lock().take() {
                list_ref.remove(id);
            }
        }));
        *slot.lock() = Some(id);

        list.dispatch(&watchdog, &event());
        assert_eq!(list.len(), 0);
    }
}
