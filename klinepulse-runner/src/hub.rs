//! Distribution hub: topic → subscribers, last-value-wins delivery.
//!
//! Every subscriber owns a `watch` slot. Publishing overwrites the slot, so a
//! slow subscriber only ever sees the newest payload and never holds up the
//! publisher or its peers. A subscriber whose receiver has been dropped is
//! removed from the registry on the next publish or `prune_closed` sweep.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

type Slot<T> = watch::Sender<Option<Arc<T>>>;

/// Receiving end of one subscription.
#[derive(Debug)]
pub struct Subscription<T> {
    pub id: SubscriberId,
    pub topic: String,
    rx: watch::Receiver<Option<Arc<T>>>,
}

impl<T> Subscription<T> {
    /// Wait for the next payload newer than the last one seen.
    /// Returns `None` once the subscriber has been removed from the hub.
    pub async fn recv(&mut self) -> Option<Arc<T>> {
        loop {
            self.rx.changed().await.ok()?;
            if let Some(payload) = self.rx.borrow_and_update().clone() {
                return Some(payload);
            }
        }
    }

    /// Latest payload without waiting, if any has been published.
    pub fn latest(&self) -> Option<Arc<T>> {
        self.rx.borrow().clone()
    }
}

#[derive(Debug)]
pub struct DistributionHub<T> {
    topics: RwLock<HashMap<String, HashMap<SubscriberId, Slot<T>>>>,
    next_id: AtomicU64,
}

impl<T> Default for DistributionHub<T> {
    fn default() -> Self {
        Self {
            topics: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }
}

impl<T: Send + Sync> DistributionHub<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, topic: &str) -> Subscription<T> {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = watch::channel(None);
        self.topics
            .write()
            .entry(topic.to_string())
            .or_default()
            .insert(id, tx);
        debug!(topic, subscriber = %id, "subscribed");
        Subscription {
            id,
            topic: topic.to_string(),
            rx,
        }
    }

    /// Remove a subscriber. Returns the number of subscribers left on the topic.
    pub fn unsubscribe(&self, topic: &str, id: SubscriberId) -> usize {
        let mut topics = self.topics.write();
        let Some(subscribers) = topics.get_mut(topic) else {
            return 0;
        };
        subscribers.remove(&id);
        let remaining = subscribers.len();
        if remaining == 0 {
            topics.remove(topic);
        }
        debug!(topic, subscriber = %id, remaining, "unsubscribed");
        remaining
    }

    /// Deliver `payload` to every live subscriber of `topic`. Returns the
    /// number it reached; closed subscribers are dropped.
    pub fn publish(&self, topic: &str, payload: T) -> usize {
        let payload = Arc::new(payload);
        let mut closed = Vec::new();
        let delivered = {
            let topics = self.topics.read();
            let Some(subscribers) = topics.get(topic) else {
                return 0;
            };
            let mut delivered = 0;
            for (id, slot) in subscribers {
                if slot.send(Some(Arc::clone(&payload))).is_ok() {
                    delivered += 1;
                } else {
                    closed.push(*id);
                }
            }
            delivered
        };

        if !closed.is_empty() {
            let mut topics = self.topics.write();
            if let Some(subscribers) = topics.get_mut(topic) {
                for id in &closed {
                    subscribers.remove(id);
                }
                if subscribers.is_empty() {
                    topics.remove(topic);
                }
            }
            debug!(topic, dropped = closed.len(), "dropped closed subscribers");
        }
        delivered
    }

    /// Drop subscribers of `topic` whose receiver is gone. Returns the number
    /// still attached.
    pub fn prune_closed(&self, topic: &str) -> usize {
        let mut topics = self.topics.write();
        let Some(subscribers) = topics.get_mut(topic) else {
            return 0;
        };
        let before = subscribers.len();
        subscribers.retain(|_, slot| !slot.is_closed());
        let remaining = subscribers.len();
        if remaining == 0 {
            topics.remove(topic);
        }
        if remaining < before {
            debug!(topic, dropped = before - remaining, "dropped closed subscribers");
        }
        remaining
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics.read().get(topic).map_or(0, HashMap::len)
    }

    pub fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.topics.read().keys().cloned().collect();
        topics.sort();
        topics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_reaches_all_subscribers() {
        let hub: DistributionHub<u32> = DistributionHub::new();
        let mut a = hub.subscribe("klines:BTCUSDT:1m");
        let mut b = hub.subscribe("klines:BTCUSDT:1m");
        let mut other = hub.subscribe("klines:ETHUSDT:1m");

        assert_eq!(hub.publish("klines:BTCUSDT:1m", 7), 2);
        assert_eq!(*a.recv().await.unwrap(), 7);
        assert_eq!(*b.recv().await.unwrap(), 7);
        assert!(other.latest().is_none());
        assert_eq!(hub.publish("klines:ETHUSDT:1m", 9), 1);
        assert_eq!(*other.recv().await.unwrap(), 9);
    }

    #[tokio::test]
    async fn slow_subscriber_sees_only_latest() {
        let hub: DistributionHub<u32> = DistributionHub::new();
        let mut sub = hub.subscribe("t");
        for v in 1..=5 {
            hub.publish("t", v);
        }
        assert_eq!(*sub.recv().await.unwrap(), 5);
    }

    #[test]
    fn dropped_subscriber_is_pruned_on_publish() {
        let hub: DistributionHub<u32> = DistributionHub::new();
        let keep = hub.subscribe("t");
        let gone = hub.subscribe("t");
        drop(gone);
        assert_eq!(hub.subscriber_count("t"), 2);
        assert_eq!(hub.publish("t", 1), 1);
        assert_eq!(hub.subscriber_count("t"), 1);
        assert_eq!(keep.latest().as_deref(), Some(&1));
    }

    #[test]
    fn prune_closed_sweeps_without_publishing() {
        let hub: DistributionHub<u32> = DistributionHub::new();
        let keep = hub.subscribe("t");
        drop(hub.subscribe("t"));
        assert_eq!(hub.prune_closed("t"), 1);
        assert_eq!(hub.subscriber_count("t"), 1);

        drop(keep);
        assert_eq!(hub.prune_closed("t"), 0);
        assert!(hub.topics().is_empty());
        assert_eq!(hub.prune_closed("never"), 0);
    }

    #[test]
    fn publish_without_subscribers_is_noop() {
        let hub: DistributionHub<u32> = DistributionHub::new();
        assert_eq!(hub.publish("nobody", 1), 0);
        assert!(hub.topics().is_empty());
    }

    #[tokio::test]
    async fn unsubscribe_closes_subscription() {
        let hub: DistributionHub<u32> = DistributionHub::new();
        let mut sub = hub.subscribe("t");
        let other = hub.subscribe("t");
        assert_eq!(hub.unsubscribe("t", sub.id), 1);
        assert!(sub.recv().await.is_none());
        assert_eq!(hub.unsubscribe("t", other.id), 0);
        assert!(hub.topics().is_empty());
    }
}
