//! Topic to channel registry.
//!
//! The registry owns at most one channel handle per topic. Channels are created
//! lazily on first use, joined immediately, and dropped from the registry once
//! their leave handshake is acknowledged, their join fails, or the client
//! disconnects.
//!
//! Each created channel gets a generation number. Join and leave replies carry
//! the generation they were issued for, so a late reply for a channel that has
//! since been replaced never touches the newer entry.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::config::LogLevel;
use crate::topic::Topic;
use crate::transport::{Channel, Reply, Transport};

/// Join state of a registered channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelState {
    /// Join requested, no reply yet
    Joining,
    /// Join acknowledged
    Joined,
    /// Leave requested, waiting for the acknowledgment that removes the entry
    Leaving,
}

/// Shared handle to a channel created by the registry.
///
/// Two handles are equal when they refer to the same created channel.
#[derive(Clone)]
pub struct ChannelHandle {
    generation: u64,
    channel: Arc<dyn Channel>,
}

impl ChannelHandle {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn topic(&self) -> &Topic {
        self.channel.topic()
    }

    pub fn channel(&self) -> &Arc<dyn Channel> {
        &self.channel
    }
}

impl PartialEq for ChannelHandle {
    fn eq(&self, other: &Self) -> bool {
        self.generation == other.generation
    }
}

impl Eq for ChannelHandle {}

impl fmt::Debug for ChannelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelHandle")
            .field("topic", self.topic())
            .field("generation", &self.generation)
            .finish()
    }
}

struct ChannelEntry {
    handle: ChannelHandle,
    state: ChannelState,
}

type Entries = Mutex<HashMap<Topic, ChannelEntry>>;

/// Lazily populated mapping from topic to channel handle.
#[derive(Clone)]
pub struct TopicRegistry {
    transport: Arc<dyn Transport>,
    entries: Arc<Entries>,
    next_generation: Arc<AtomicU64>,
    log_level: LogLevel,
}

impl TopicRegistry {
    pub fn new(transport: Arc<dyn Transport>, log_level: LogLevel) -> Self {
        Self {
            transport,
            entries: Arc::new(Mutex::new(HashMap::new())),
            next_generation: Arc::new(AtomicU64::new(1)),
            log_level,
        }
    }

    /// Return the channel registered for `topic`, creating and joining one if needed.
    ///
    /// A topic whose channel is still leaving gets a fresh channel; the pending
    /// leave then completes without affecting the new entry.
    pub fn get_or_create(&self, topic: &Topic) -> ChannelHandle {
        if let Some(handle) = self.live(topic) {
            return handle;
        }

        // Transports may call back into the client from here.
        let channel = self.transport.channel(topic);

        let handle = {
            let mut entries = self.entries.lock();
            if let Some(entry) = entries.get(topic) {
                if entry.state != ChannelState::Leaving {
                    // Lost a race with another subscriber; the spare channel is never joined.
                    return entry.handle.clone();
                }
            }

            let handle = ChannelHandle {
                generation: self.next_generation.fetch_add(1, Ordering::Relaxed),
                channel,
            };
            entries.insert(
                topic.clone(),
                ChannelEntry {
                    handle: handle.clone(),
                    state: ChannelState::Joining,
                },
            );
            handle
        };

        if self.log_level.allows(LogLevel::Debug) {
            tracing::debug!(
                "Created channel \"{}\" (generation {})",
                topic,
                handle.generation
            );
        }

        self.join(&handle);
        handle
    }

    /// Registered handle for `topic` unless it is on its way out.
    fn live(&self, topic: &Topic) -> Option<ChannelHandle> {
        self.entries
            .lock()
            .get(topic)
            .filter(|entry| entry.state != ChannelState::Leaving)
            .map(|entry| entry.handle.clone())
    }

    fn join(&self, handle: &ChannelHandle) {
        let entries = Arc::downgrade(&self.entries);
        let topic = handle.topic().clone();
        let generation = handle.generation;
        let log_level = self.log_level;

        // The reply may arrive before `join` returns, so no lock is held here.
        handle.channel.join(Box::new(move |reply| {
            on_join_reply(&entries, &topic, generation, reply, log_level);
        }));
    }

    /// Leave `handle`'s channel and drop its entry once the leave is acknowledged.
    ///
    /// Handles that are no longer registered (replaced, failed or cleared) are
    /// still left, but never touch the registry.
    pub fn release(&self, handle: &ChannelHandle) {
        let topic = handle.topic().clone();
        let generation = handle.generation;

        {
            let mut entries = self.entries.lock();
            if let Some(entry) = entries.get_mut(&topic) {
                if entry.handle.generation == generation {
                    entry.state = ChannelState::Leaving;
                }
            }
        }

        let entries = Arc::downgrade(&self.entries);
        let log_level = self.log_level;
        handle.channel.leave(Box::new(move |reply| {
            on_leave_reply(&entries, &topic, generation, reply, log_level);
        }));
    }

    /// The registered handle for `topic`, if any.
    pub fn get(&self, topic: &Topic) -> Option<ChannelHandle> {
        self.entries
            .lock()
            .get(topic)
            .map(|entry| entry.handle.clone())
    }

    pub fn state(&self, topic: &Topic) -> Option<ChannelState> {
        self.entries.lock().get(topic).map(|entry| entry.state)
    }

    /// Whether `handle` is the channel currently registered for its topic.
    pub fn is_current(&self, handle: &ChannelHandle) -> bool {
        self.entries
            .lock()
            .get(handle.topic())
            .map_or(false, |entry| entry.handle == *handle)
    }

    /// Delete the entry for `topic` without touching its channel.
    pub fn remove(&self, topic: &Topic) -> Option<ChannelHandle> {
        self.entries.lock().remove(topic).map(|entry| entry.handle)
    }

    /// Delete every entry regardless of state.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Snapshot of registered topics and their states, ordered by topic.
    pub fn channels(&self) -> BTreeMap<Topic, ChannelState> {
        self.entries
            .lock()
            .iter()
            .map(|(topic, entry)| (topic.clone(), entry.state))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

fn on_join_reply(
    entries: &Weak<Entries>,
    topic: &Topic,
    generation: u64,
    reply: Reply,
    log_level: LogLevel,
) {
    let Some(entries) = entries.upgrade() else {
        return;
    };
    let mut entries = entries.lock();
    let current = entries
        .get(topic)
        .map_or(false, |entry| entry.handle.generation == generation);

    match reply {
        Reply::Ok(_) => {
            if let Some(entry) = entries.get_mut(topic).filter(|_| current) {
                if entry.state == ChannelState::Joining {
                    entry.state = ChannelState::Joined;
                }
            }
            if log_level.allows(LogLevel::Info) {
                tracing::info!("Successfully joined channel \"{}\"", topic);
            }
        }
        failure => {
            // Drop the failed entry so the next subscription starts a clean join.
            if current {
                entries.remove(topic);
            }
            if log_level.allows(LogLevel::Error) {
                match failure {
                    Reply::Error(reason) => {
                        tracing::error!("Failed to join channel \"{}\": {}", topic, reason)
                    }
                    _ => tracing::error!("Timed out joining channel \"{}\"", topic),
                }
            }
        }
    }
}

fn on_leave_reply(
    entries: &Weak<Entries>,
    topic: &Topic,
    generation: u64,
    reply: Reply,
    log_level: LogLevel,
) {
    match reply {
        Reply::Ok(_) => {
            if let Some(entries) = entries.upgrade() {
                let mut entries = entries.lock();
                let leaving = entries.get(topic).map_or(false, |entry| {
                    entry.handle.generation == generation && entry.state == ChannelState::Leaving
                });
                if leaving {
                    entries.remove(topic);
                }
            }
            if log_level.allows(LogLevel::Info) {
                tracing::info!("Successfully left channel \"{}\"", topic);
            }
        }
        Reply::Error(reason) => {
            if log_level.allows(LogLevel::Warn) {
                tracing::warn!("Failed to leave channel \"{}\": {}", topic, reason);
            }
        }
        Reply::Timeout => {
            if log_level.allows(LogLevel::Warn) {
                tracing::warn!("Timed out leaving channel \"{}\"", topic);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{ChannelPhase, MemoryTransport, ReplyMode};
    use serde_json::json;

    fn registry() -> (TopicRegistry, MemoryTransport) {
        let transport = MemoryTransport::new();
        let registry = TopicRegistry::new(Arc::new(transport.clone()), LogLevel::Debug);
        (registry, transport)
    }

    #[test]
    fn test_get_or_create_is_idempotent() {
        let (registry, transport) = registry();
        let topic = Topic::collection("c1");

        let first = registry.get_or_create(&topic);
        let second = registry.get_or_create(&topic);

        assert_eq!(first, second);
        assert_eq!(transport.channels().len(), 1);
        assert_eq!(registry.state(&topic), Some(ChannelState::Joined));
    }

    /// Transport that reads the registry back while it builds a channel.
    struct InspectingTransport {
        inner: MemoryTransport,
        registry: Mutex<Option<TopicRegistry>>,
        observed: Mutex<Vec<usize>>,
    }

    impl Transport for InspectingTransport {
        fn connect(&self) {
            self.inner.connect();
        }

        fn disconnect(&self, on_closed: Box<dyn FnOnce() + Send>) {
            self.inner.disconnect(on_closed);
        }

        fn is_connected(&self) -> bool {
            self.inner.is_connected()
        }

        fn on_error(&self, handler: crate::transport::ErrorHandler) {
            self.inner.on_error(handler);
        }

        fn channel(&self, topic: &Topic) -> Arc<dyn Channel> {
            let registry = self.registry.lock().clone();
            if let Some(registry) = registry {
                self.observed.lock().push(registry.len());
            }
            self.inner.channel(topic)
        }
    }

    #[test]
    fn test_transport_may_reenter_while_creating_channel() {
        let transport = Arc::new(InspectingTransport {
            inner: MemoryTransport::new(),
            registry: Mutex::new(None),
            observed: Mutex::new(Vec::new()),
        });
        let shared: Arc<dyn Transport> = transport.clone();
        let registry = TopicRegistry::new(shared, LogLevel::Debug);
        *transport.registry.lock() = Some(registry.clone());
        let topic = Topic::collection("c1");

        let handle = registry.get_or_create(&topic);
        let again = registry.get_or_create(&topic);

        assert_eq!(*transport.observed.lock(), vec![0]);
        assert_eq!(handle, again);
        assert_eq!(registry.state(&topic), Some(ChannelState::Joined));
        transport.registry.lock().take();
    }

    #[test]
    fn test_join_pending_until_reply() {
        let (registry, transport) = registry();
        transport.set_join_mode(ReplyMode::Manual);
        let topic = Topic::collection("c1");

        registry.get_or_create(&topic);
        assert_eq!(registry.state(&topic), Some(ChannelState::Joining));

        transport.resolve_joins(Reply::Ok(json!({})));
        assert_eq!(registry.state(&topic), Some(ChannelState::Joined));
    }

    #[test]
    fn test_failed_join_drops_entry() {
        let (registry, transport) = registry();
        transport.set_join_mode(ReplyMode::Error);
        let topic = Topic::collection("c1");

        let failed = registry.get_or_create(&topic);
        assert!(registry.get(&topic).is_none());
        assert!(!registry.is_current(&failed));

        transport.set_join_mode(ReplyMode::Ok);
        let retried = registry.get_or_create(&topic);
        assert_ne!(failed, retried);
        assert_eq!(registry.state(&topic), Some(ChannelState::Joined));
        assert_eq!(transport.channels_for(&topic).len(), 2);
    }

    #[test]
    fn test_release_removes_on_acknowledgment() {
        let (registry, transport) = registry();
        transport.set_leave_mode(ReplyMode::Manual);
        let topic = Topic::collection("c1");

        let handle = registry.get_or_create(&topic);
        registry.release(&handle);
        assert_eq!(registry.state(&topic), Some(ChannelState::Leaving));

        transport.resolve_leaves(Reply::Ok(json!({})));
        assert!(registry.is_empty());
        assert_eq!(transport.channels()[0].phase(), ChannelPhase::Closed);
    }

    #[test]
    fn test_failed_leave_keeps_entry_leaving() {
        let (registry, transport) = registry();
        transport.set_leave_mode(ReplyMode::Error);
        let topic = Topic::collection("c1");

        let handle = registry.get_or_create(&topic);
        registry.release(&handle);
        assert_eq!(registry.state(&topic), Some(ChannelState::Leaving));
    }

    #[test]
    fn test_recreate_while_leaving_ignores_stale_ack() {
        let (registry, transport) = registry();
        transport.set_leave_mode(ReplyMode::Manual);
        let topic = Topic::collection("c1");

        let old = registry.get_or_create(&topic);
        registry.release(&old);
        let fresh = registry.get_or_create(&topic);
        assert_ne!(old, fresh);
        assert_eq!(registry.state(&topic), Some(ChannelState::Joined));

        transport.resolve_leaves(Reply::Ok(json!({})));
        assert_eq!(registry.get(&topic), Some(fresh));
    }

    #[test]
    fn test_remove_and_clear() {
        let (registry, transport) = registry();
        let c1 = Topic::collection("c1");
        let c2 = Topic::collection("c2");
        registry.get_or_create(&c1);
        registry.get_or_create(&c2);

        assert!(registry.remove(&c1).is_some());
        assert_eq!(registry.channels().keys().collect::<Vec<_>>(), vec![&c2]);
        // Removal leaves the channel itself alone
        assert_eq!(transport.channels()[0].phase(), ChannelPhase::Joined);

        registry.clear();
        assert!(registry.channels().is_empty());
        assert_eq!(registry.len(), 0);
    }
}
