//! Subscription bookkeeping on top of the topic registry.
//!
//! Each `on` call attaches one listener to the topic's shared channel and
//! records it under a fresh [`SubscriptionId`]. Unsubscribing detaches that
//! listener right away. The channel itself is only left once no subscription
//! references it anymore, so subscriptions sharing a topic never tear each
//! other down.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use stream_types::EventType;

use crate::config::LogLevel;
use crate::error::{Result, StreamError};
use crate::registry::{ChannelHandle, TopicRegistry};
use crate::router::{EventCallback, EventRouter};
use crate::topic::Topic;
use crate::transport::{ListenerRef, Transport};

/// Opaque identifier of one (topic, event type, callback) registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

struct SubscriptionRecord {
    topic: Topic,
    event_type: EventType,
    channel: ChannelHandle,
    listener: ListenerRef,
}

struct ManagerInner {
    transport: Arc<dyn Transport>,
    registry: TopicRegistry,
    router: EventRouter,
    records: Mutex<HashMap<SubscriptionId, SubscriptionRecord>>,
    next_id: AtomicU64,
    log_level: LogLevel,
}

/// Attaches callbacks to shared channels and tracks them for teardown.
#[derive(Clone)]
pub struct SubscriptionManager {
    inner: Arc<ManagerInner>,
}

impl SubscriptionManager {
    pub fn new(
        transport: Arc<dyn Transport>,
        registry: TopicRegistry,
        router: EventRouter,
        log_level: LogLevel,
    ) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                transport,
                registry,
                router,
                records: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                log_level,
            }),
        }
    }

    pub fn registry(&self) -> &TopicRegistry {
        &self.inner.registry
    }

    /// Subscribe `callback` to `event_type` messages on `topic`.
    pub fn on(&self, event_type: EventType, topic: &Topic, callback: EventCallback) -> Subscription {
        let inner = &self.inner;
        if !inner.transport.is_connected() {
            inner.transport.connect();
        }

        let channel = inner.registry.get_or_create(topic);
        let listener = inner.router.listener(topic.clone(), event_type, callback);
        let listener = channel.channel().on(event_type.as_str(), listener);
        let id = SubscriptionId(inner.next_id.fetch_add(1, Ordering::Relaxed));

        let count = {
            let mut records = inner.records.lock();
            records.insert(
                id,
                SubscriptionRecord {
                    topic: topic.clone(),
                    event_type,
                    channel: channel.clone(),
                    listener,
                },
            );
            count_for(&records, &channel)
        };

        if inner.log_level.allows(LogLevel::Debug) {
            tracing::debug!(
                "Subscribed {} to {} on \"{}\" ({} -> {} subscriptions)",
                id,
                event_type,
                topic,
                count - 1,
                count
            );
        }

        Subscription::new(Arc::downgrade(&self.inner), vec![id])
    }

    /// Subscribe `callback` to each of `event_types` on `topic`.
    ///
    /// The returned handle unsubscribes every child subscription at once.
    pub fn on_events(
        &self,
        topic: &Topic,
        event_types: &[EventType],
        callback: EventCallback,
    ) -> Subscription {
        let ids = event_types
            .iter()
            .flat_map(|event_type| self.on(*event_type, topic, Arc::clone(&callback)).ids)
            .collect();
        Subscription::new(Arc::downgrade(&self.inner), ids)
    }

    /// Detach one subscription, leaving its channel if it was the last one on it.
    pub fn unsubscribe(&self, id: SubscriptionId) -> Result<()> {
        unsubscribe(&self.inner, id)
    }

    /// Number of live subscriptions on the channel registered for `topic`.
    pub fn subscription_count(&self, topic: &Topic) -> usize {
        let Some(channel) = self.inner.registry.get(topic) else {
            return 0;
        };
        count_for(&self.inner.records.lock(), &channel)
    }

    /// Ids of every live subscription.
    pub fn subscription_ids(&self) -> Vec<SubscriptionId> {
        let mut ids: Vec<_> = self.inner.records.lock().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Forget every subscription and registry entry without leaving channels.
    ///
    /// Used when the whole connection is torn down.
    pub fn clear(&self) {
        self.inner.records.lock().clear();
        self.inner.registry.clear();
    }
}

fn count_for(records: &HashMap<SubscriptionId, SubscriptionRecord>, channel: &ChannelHandle) -> usize {
    records
        .values()
        .filter(|record| record.channel == *channel)
        .count()
}

fn unsubscribe(inner: &ManagerInner, id: SubscriptionId) -> Result<()> {
    let (record, remaining) = {
        let mut records = inner.records.lock();
        let record = records
            .remove(&id)
            .ok_or(StreamError::SubscriptionNotFound(id))?;
        let remaining = count_for(&records, &record.channel);
        (record, remaining)
    };

    record
        .channel
        .channel()
        .off(record.event_type.as_str(), record.listener);

    if inner.log_level.allows(LogLevel::Debug) {
        tracing::debug!(
            "Unsubscribed {} from {} on \"{}\" ({} -> {} subscriptions)",
            id,
            record.event_type,
            record.topic,
            remaining + 1,
            remaining
        );
    }

    if remaining == 0 {
        inner.registry.release(&record.channel);
    }
    Ok(())
}

/// Handle returned by every subscribe call.
///
/// Dropping the handle does not unsubscribe; call [`Subscription::unsubscribe`]
/// or pass its ids to the client.
#[must_use = "a Subscription is the only way to unsubscribe its callbacks"]
pub struct Subscription {
    manager: Weak<ManagerInner>,
    ids: Vec<SubscriptionId>,
}

impl Subscription {
    fn new(manager: Weak<ManagerInner>, ids: Vec<SubscriptionId>) -> Self {
        Self { manager, ids }
    }

    /// Ids of the underlying subscriptions, one per event type.
    pub fn ids(&self) -> &[SubscriptionId] {
        &self.ids
    }

    /// Detach every callback held by this handle.
    ///
    /// All children are attempted; the first failure is returned. Unsubscribing
    /// after the client is gone is a no-op.
    pub fn unsubscribe(self) -> Result<()> {
        let Some(inner) = self.manager.upgrade() else {
            return Ok(());
        };

        let mut first_error = None;
        for id in self.ids {
            if let Err(e) = unsubscribe(&inner, id) {
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("ids", &self.ids).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ChannelState;
    use crate::transport::{MemoryTransport, Reply, ReplyMode};
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;
    use stream_types::StreamEvent;

    fn manager() -> (SubscriptionManager, MemoryTransport) {
        let transport = MemoryTransport::new();
        let shared: Arc<dyn Transport> = Arc::new(transport.clone());
        let registry = TopicRegistry::new(Arc::clone(&shared), LogLevel::Debug);
        let manager =
            SubscriptionManager::new(shared, registry, EventRouter::passthrough(), LogLevel::Debug);
        (manager, transport)
    }

    fn counter() -> (EventCallback, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        let callback: EventCallback = Arc::new(move |_: StreamEvent| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        (callback, count)
    }

    #[test]
    fn test_on_connects_and_joins() {
        let (manager, transport) = manager();
        let topic = Topic::collection("c1");
        let (callback, _) = counter();

        let _subscription = manager.on(EventType::ItemListed, &topic, callback);

        assert!(transport.is_connected());
        assert_eq!(manager.registry().state(&topic), Some(ChannelState::Joined));
        assert_eq!(manager.subscription_count(&topic), 1);
    }

    #[test]
    fn test_shared_channel_is_reference_counted() {
        let (manager, transport) = manager();
        let topic = Topic::collection("c1");
        let (listed, listed_count) = counter();
        let (sold, sold_count) = counter();

        let first = manager.on(EventType::ItemListed, &topic, listed);
        let _second = manager.on(EventType::ItemSold, &topic, sold);
        assert_eq!(transport.channels().len(), 1);
        assert_eq!(manager.subscription_count(&topic), 2);

        first.unsubscribe().unwrap();
        assert_eq!(manager.registry().state(&topic), Some(ChannelState::Joined));

        transport.push(&topic, "item_listed", json!({}));
        transport.push(&topic, "item_sold", json!({}));
        assert_eq!(listed_count.load(Ordering::SeqCst), 0);
        assert_eq!(sold_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_last_unsubscribe_leaves_channel() {
        let (manager, transport) = manager();
        transport.set_leave_mode(ReplyMode::Manual);
        let topic = Topic::collection("c1");
        let (callback, _) = counter();

        let subscription = manager.on(EventType::ItemListed, &topic, callback);
        subscription.unsubscribe().unwrap();
        assert_eq!(manager.registry().state(&topic), Some(ChannelState::Leaving));

        transport.resolve_leaves(Reply::Ok(json!({})));
        assert!(manager.registry().is_empty());
        assert_eq!(manager.subscription_count(&topic), 0);
    }

    #[test]
    fn test_unknown_id_is_rejected() {
        let (manager, _) = manager();
        let err = manager.unsubscribe(SubscriptionId::new(99)).unwrap_err();
        assert!(matches!(err, StreamError::SubscriptionNotFound(id) if id.as_u64() == 99));
    }

    #[test]
    fn test_double_unsubscribe_by_id() {
        let (manager, _) = manager();
        let (callback, _) = counter();
        let subscription = manager.on(EventType::ItemSold, &Topic::collection("c1"), callback);
        let id = subscription.ids()[0];

        manager.unsubscribe(id).unwrap();
        assert!(manager.unsubscribe(id).is_err());
        assert!(subscription.unsubscribe().is_err());
    }

    #[test]
    fn test_on_events_composite_unsubscribe() {
        let (manager, transport) = manager();
        let topic = Topic::collection("c1");
        let (callback, count) = counter();

        let subscription = manager.on_events(
            &topic,
            &[EventType::ItemListed, EventType::ItemSold, EventType::ItemCancelled],
            callback,
        );
        assert_eq!(subscription.ids().len(), 3);
        assert_eq!(transport.channels()[0].listener_count(), 3);

        transport.push(&topic, "item_sold", json!({}));
        subscription.unsubscribe().unwrap();
        transport.push(&topic, "item_sold", json!({}));

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(manager.registry().is_empty());
        assert!(manager.subscription_ids().is_empty());
    }

    #[test]
    fn test_unsubscribe_after_failed_join() {
        let (manager, transport) = manager();
        transport.set_join_mode(ReplyMode::Error);
        let topic = Topic::collection("c1");
        let (callback, _) = counter();

        let subscription = manager.on(EventType::ItemListed, &topic, callback);
        assert!(manager.registry().is_empty());
        assert_eq!(manager.subscription_ids().len(), 1);

        subscription.unsubscribe().unwrap();
        assert!(manager.subscription_ids().is_empty());
        assert_eq!(transport.channels()[0].listener_count(), 0);
    }

    #[test]
    fn test_unsubscribe_after_manager_dropped() {
        let (manager, _) = manager();
        let (callback, _) = counter();
        let subscription = manager.on(EventType::ItemSold, &Topic::collection("c1"), callback);

        drop(manager);
        assert!(subscription.unsubscribe().is_ok());
    }
}
