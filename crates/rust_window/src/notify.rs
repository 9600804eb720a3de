//! Event fan-out to subscriber queues
//!
//! Publishing happens on the main thread, so it never waits on a subscriber:
//! a full queue simply misses the event. Size queues for the expected rate; a
//! high report-rate mouse can produce well over 1000 cursor events a second.

use crate::event::{Event, EventMask};
use crossbeam_channel::{Sender, TrySendError};
use parking_lot::RwLock;

struct Subscription {
    mask: EventMask,
    queue: Sender<Event>,
}

/// Subscriber queues and the events each one wants
///
/// A queue may be subscribed several times; each subscription receives its
/// own copy of a matching event.
#[derive(Default)]
pub struct NotificationRegistry {
    subscriptions: RwLock<Vec<Subscription>>,
}

impl NotificationRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Relay events matching `mask` to `queue`
    ///
    /// [`EventMask::NO_EVENTS`] removes every subscription of `queue`.
    pub fn subscribe(&self, queue: &Sender<Event>, mask: EventMask) {
        let mut subscriptions = self.subscriptions.write();
        if mask.is_empty() {
            subscriptions.retain(|sub| !sub.queue.same_channel(queue));
        } else {
            subscriptions.push(Subscription { mask, queue: queue.clone() });
        }
    }

    /// Deliver `event` to every matching subscription without blocking
    ///
    /// Returns how many copies were enqueued.
    pub fn publish(&self, event: &Event) -> usize {
        let kind = event.mask();
        let mut delivered = 0;
        for sub in self.subscriptions.read().iter().filter(|sub| sub.mask.contains(kind)) {
            match sub.queue.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => log::trace!("Subscriber queue full, dropped {kind:?}"),
                Err(TrySendError::Disconnected(_)) => log::trace!("Subscriber queue closed, dropped {kind:?}"),
            }
        }
        delivered
    }

    /// Number of subscriptions
    pub fn len(&self) -> usize {
        self.subscriptions.read().len()
    }

    /// Whether nothing is subscribed
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::{bounded, unbounded};
    use std::time::Instant;

    fn moved(x: i32) -> Event {
        Event::Moved { x, y: 0, t: Instant::now() }
    }

    #[test]
    fn test_duplicate_subscription_delivers_twice() {
        let registry = NotificationRegistry::new();
        let (tx, rx) = unbounded();
        registry.subscribe(&tx, EventMask::MOVED | EventMask::RESIZED);
        registry.subscribe(&tx, EventMask::MOVED);

        assert_eq!(registry.publish(&moved(5)), 2);
        assert_eq!(rx.try_iter().count(), 2);
    }

    #[test]
    fn test_unsubscribe_removes_all_for_queue() {
        let registry = NotificationRegistry::new();
        let (tx, rx) = unbounded();
        let (other_tx, other_rx) = unbounded();
        registry.subscribe(&tx, EventMask::MOVED);
        registry.subscribe(&tx, EventMask::all());
        registry.subscribe(&other_tx, EventMask::MOVED);

        registry.subscribe(&tx.clone(), EventMask::NO_EVENTS);

        assert_eq!(registry.len(), 1);
        registry.publish(&moved(1));
        assert!(rx.try_recv().is_err());
        assert!(other_rx.try_recv().is_ok());
    }

    #[test]
    fn test_full_queue_drops_without_blocking() {
        let registry = NotificationRegistry::new();
        let (tx, rx) = bounded(1);
        registry.subscribe(&tx, EventMask::MOVED);

        assert_eq!(registry.publish(&moved(1)), 1);
        assert_eq!(registry.publish(&moved(2)), 0);

        assert!(matches!(rx.try_recv(), Ok(Event::Moved { x: 1, .. })));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_mask_filters_and_preserves_order() {
        let registry = NotificationRegistry::new();
        let (tx, rx) = unbounded();
        registry.subscribe(&tx, EventMask::MOVED);

        registry.publish(&Event::Damaged { t: Instant::now() });
        for x in 0..5 {
            registry.publish(&moved(x));
        }

        let xs: Vec<i32> = rx
            .try_iter()
            .map(|event| match event {
                Event::Moved { x, .. } => x,
                other => panic!("unexpected event {other:?}"),
            })
            .collect();
        assert_eq!(xs, vec![0, 1, 2, 3, 4]);
    }
}
