//! Event routing from channel listeners to subscriber callbacks.
//!
//! Every subscription attaches one listener to its topic's channel. The
//! `EventRouter` builds those listeners: it turns the raw channel message into
//! a [`StreamEvent`], consults the optional middleware predicate, and only then
//! hands the event to the subscriber's callback.

use std::sync::Arc;

use serde_json::Value;
use stream_types::{EventType, StreamEvent};

use crate::topic::Topic;
use crate::transport::Listener;

/// Global gate consulted before each callback delivery.
///
/// Returning `false` suppresses delivery of that event to that callback only.
pub type Middleware = Arc<dyn Fn(&Topic, EventType, &StreamEvent) -> bool + Send + Sync>;

/// Subscriber callback receiving the undecoded envelope.
pub type EventCallback = Arc<dyn Fn(StreamEvent) + Send + Sync>;

/// Wraps subscriber callbacks with the middleware predicate.
#[derive(Clone, Default)]
pub struct EventRouter {
    middleware: Option<Middleware>,
}

impl EventRouter {
    pub fn new(middleware: Option<Middleware>) -> Self {
        Self { middleware }
    }

    /// Pass-through router.
    pub fn passthrough() -> Self {
        Self::default()
    }

    /// Whether `event` may be delivered. Always `true` without middleware.
    pub fn admits(&self, topic: &Topic, event_type: EventType, event: &StreamEvent) -> bool {
        self.middleware
            .as_ref()
            .map_or(true, |middleware| middleware(topic, event_type, event))
    }

    /// Build the channel listener for one subscription.
    pub(crate) fn listener(
        &self,
        topic: Topic,
        event_type: EventType,
        callback: EventCallback,
    ) -> Listener {
        let router = self.clone();
        Arc::new(move |raw: &Value| {
            let event = StreamEvent::from_wire(event_type.as_str(), raw.clone());
            if router.admits(&topic, event_type, &event) {
                callback(event);
            } else {
                tracing::trace!("Middleware suppressed {} on \"{}\"", event_type, topic);
            }
        })
    }
}
