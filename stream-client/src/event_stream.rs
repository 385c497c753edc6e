//! Pull-based consumption of a collection's events.
//!
//! An [`EventStream`] is a subscription whose deliveries are queued instead of
//! handed to a callback. It owns that subscription: closing or dropping the
//! stream unsubscribes, and a client disconnect ends it.

use std::sync::mpsc::Receiver;
use std::time::Duration;

use stream_types::StreamEvent;

use crate::error::Result;
use crate::subscription::{Subscription, SubscriptionId};

/// Queue of raw events for one or more event kinds of a collection.
///
/// Iterating blocks until the next event and ends once the stream can no
/// longer receive anything (unsubscribed, or the client disconnected).
///
/// ```rust
/// use opensea_stream::prelude::*;
///
/// let transport = MemoryTransport::new();
/// let client = StreamClient::new(ClientConfig::new("api-key"), &transport)?;
/// let sales = client.event_stream("doodles-official", &[EventType::ItemSold]);
///
/// transport.push(&Topic::collection("doodles-official"), "item_sold", serde_json::json!({}));
/// assert_eq!(sales.drain().len(), 1);
///
/// let leftover = sales.close()?;
/// assert!(leftover.is_empty());
/// # Ok::<(), StreamError>(())
/// ```
#[must_use = "dropping an EventStream unsubscribes it"]
pub struct EventStream {
    subscription: Option<Subscription>,
    events: Receiver<StreamEvent>,
}

impl EventStream {
    pub(crate) fn new(subscription: Subscription, events: Receiver<StreamEvent>) -> Self {
        Self {
            subscription: Some(subscription),
            events,
        }
    }

    /// Ids of the subscriptions feeding this stream, one per event kind.
    pub fn ids(&self) -> &[SubscriptionId] {
        self.subscription
            .as_ref()
            .map_or(&[][..], |subscription| subscription.ids())
    }

    /// Wait for the next event. `None` once the stream has ended.
    pub fn next_event(&self) -> Option<StreamEvent> {
        self.events.recv().ok()
    }

    /// Wait at most `timeout` for the next event.
    ///
    /// `None` both when nothing arrived in time and when the stream has ended.
    pub fn next_event_timeout(&self, timeout: Duration) -> Option<StreamEvent> {
        self.events.recv_timeout(timeout).ok()
    }

    /// Take every event queued so far without waiting.
    pub fn drain(&self) -> Vec<StreamEvent> {
        self.events.try_iter().collect()
    }

    /// Unsubscribe and return the events still queued.
    ///
    /// Fails like [`Subscription::unsubscribe`] when the client already
    /// dropped the subscription, e.g. after a disconnect.
    pub fn close(mut self) -> Result<Vec<StreamEvent>> {
        let unsubscribed = match self.subscription.take() {
            Some(subscription) => subscription.unsubscribe(),
            None => Ok(()),
        };
        let leftover = self.drain();
        unsubscribed.map(|()| leftover)
    }
}

impl Iterator for EventStream {
    type Item = StreamEvent;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_event()
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            // Already gone after a disconnect; nothing left to release then.
            let _ = subscription.unsubscribe();
        }
    }
}
