//! Fan-out of events to live subscribers.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{mpsc, Mutex};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

use taskpilot_core::{Event, SubscriberId};

/// A subscriber's receiving end.
#[derive(Debug)]
pub struct Subscription {
    pub id: SubscriberId,
    rx: mpsc::Receiver<Event>,
}

impl Subscription {
    /// Next event, or `None` once the hub dropped this subscriber.
    pub async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    pub fn into_stream(self) -> ReceiverStream<Event> {
        ReceiverStream::new(self.rx)
    }
}

/// The live subscriber set.
///
/// Every subscriber has a bounded queue. A publish that finds a queue full
/// or closed removes that subscriber before returning, so one slow or gone
/// observer never holds up the others.
pub struct BroadcastHub {
    subscribers: Mutex<BTreeMap<SubscriberId, mpsc::Sender<Event>>>,
    next_id: AtomicU64,
    buffer: usize,
}

impl BroadcastHub {
    pub fn new(buffer: usize) -> Self {
        Self {
            subscribers: Mutex::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
            buffer: buffer.max(1),
        }
    }

    /// Add a subscriber. `greeting` is queued before any published event.
    pub async fn subscribe(&self, greeting: Option<Event>) -> Subscription {
        let id = SubscriberId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(self.buffer);
        if let Some(event) = greeting {
            // Fresh channel with capacity >= 1.
            let _ = tx.try_send(event);
        }
        self.subscribers.lock().await.insert(id, tx);
        debug!(subscriber_id = %id, "Subscriber added");
        Subscription { id, rx }
    }

    /// Remove a subscriber. Returns whether it was present.
    pub async fn unsubscribe(&self, id: SubscriberId) -> bool {
        let removed = self.subscribers.lock().await.remove(&id).is_some();
        if removed {
            debug!(subscriber_id = %id, "Subscriber removed");
        }
        removed
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.lock().await.len()
    }

    /// Deliver `event` to every subscriber. Returns the number reached.
    pub async fn publish(&self, event: Event) -> usize {
        let mut subscribers = self.subscribers.lock().await;
        let mut failed = Vec::new();

        for (id, tx) in subscribers.iter() {
            if let Err(e) = tx.try_send(event.clone()) {
                let reason = match e {
                    mpsc::error::TrySendError::Full(_) => "queue full",
                    mpsc::error::TrySendError::Closed(_) => "disconnected",
                };
                failed.push((*id, reason));
            }
        }

        for (id, reason) in &failed {
            subscribers.remove(id);
            warn!(subscriber_id = %id, reason = %reason, event_type = %event.type_name(), "Dropping subscriber");
        }

        subscribers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskpilot_core::RunStatus;

    #[tokio::test]
    async fn test_publish_reaches_all_subscribers_in_order() {
        let hub = BroadcastHub::new(8);
        let mut a = hub.subscribe(None).await;
        let mut b = hub.subscribe(None).await;

        assert_eq!(hub.publish(Event::status(RunStatus::Running, None)).await, 2);
        assert_eq!(hub.publish(Event::status(RunStatus::Paused, None)).await, 2);

        for sub in [&mut a, &mut b] {
            assert_eq!(sub.recv().await, Some(Event::status(RunStatus::Running, None)));
            assert_eq!(sub.recv().await, Some(Event::status(RunStatus::Paused, None)));
        }
    }

    #[tokio::test]
    async fn test_greeting_comes_first() {
        let hub = BroadcastHub::new(4);
        let greeting = Event::Connected {
            status: RunStatus::Idle,
        };
        let mut sub = hub.subscribe(Some(greeting.clone())).await;
        hub.publish(Event::status(RunStatus::Running, None)).await;
        assert_eq!(sub.recv().await, Some(greeting));
        assert_eq!(sub.recv().await, Some(Event::status(RunStatus::Running, None)));
    }

    #[tokio::test]
    async fn test_closed_subscriber_is_pruned() {
        let hub = BroadcastHub::new(4);
        let gone = hub.subscribe(None).await;
        let mut alive = hub.subscribe(None).await;
        drop(gone);

        assert_eq!(hub.publish(Event::error(None, "boom")).await, 1);
        assert_eq!(hub.subscriber_count().await, 1);
        assert_eq!(alive.recv().await, Some(Event::error(None, "boom")));
    }

    #[tokio::test]
    async fn test_full_subscriber_is_pruned_without_blocking_others() {
        let hub = BroadcastHub::new(1);
        let _stalled = hub.subscribe(None).await;
        let mut reader = hub.subscribe(None).await;

        assert_eq!(hub.publish(Event::status(RunStatus::Running, None)).await, 2);
        reader.recv().await;
        assert_eq!(hub.publish(Event::status(RunStatus::Completed, None)).await, 1);
        assert_eq!(reader.recv().await, Some(Event::status(RunStatus::Completed, None)));
    }

    #[tokio::test]
    async fn test_unsubscribe() {
        let hub = BroadcastHub::new(4);
        let sub = hub.subscribe(None).await;
        assert!(hub.unsubscribe(sub.id).await);
        assert!(!hub.unsubscribe(sub.id).await);
        assert_eq!(hub.publish(Event::status(RunStatus::Idle, None)).await, 0);
    }
}
