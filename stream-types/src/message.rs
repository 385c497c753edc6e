//! The envelope shared by every stream event.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, TypesError};
use crate::event_type::EventType;

/// Envelope delivered for every event on a collection channel.
///
/// The SDK never mutates or validates the envelope; it is handed to callbacks
/// exactly as the transport delivered it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamMessage<P> {
    /// Wire name of the event kind, e.g. `item_listed`
    #[serde(default)]
    pub event_type: String,
    /// Server timestamp at which the event was sent
    #[serde(default)]
    pub sent_at: String,
    /// Event-kind specific payload
    #[serde(default)]
    pub payload: P,
}

/// Envelope with an undecoded payload.
pub type StreamEvent = StreamMessage<Value>;

impl<P> StreamMessage<P> {
    /// The event kind, if the wire name is a known one.
    pub fn kind(&self) -> Option<EventType> {
        self.event_type.parse().ok()
    }

    /// `sent_at` parsed as an RFC 3339 timestamp.
    pub fn sent_at_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.sent_at)
            .ok()
            .map(|ts| ts.with_timezone(&Utc))
    }
}

impl StreamEvent {
    /// Build an envelope from a raw channel message.
    ///
    /// Objects are read as envelopes. Anything else is wrapped as the payload
    /// of an envelope named after the channel event, so the value still
    /// reaches the subscriber unchanged.
    pub fn from_wire(event: &str, raw: Value) -> Self {
        let mut message = match raw {
            Value::Object(_) => match serde_json::from_value::<StreamEvent>(raw.clone()) {
                Ok(message) => message,
                Err(_) => StreamEvent::wrap(event, raw),
            },
            other => StreamEvent::wrap(event, other),
        };
        if message.event_type.is_empty() {
            message.event_type = event.to_string();
        }
        message
    }

    fn wrap(event: &str, payload: Value) -> Self {
        Self {
            event_type: event.to_string(),
            sent_at: String::new(),
            payload,
        }
    }

    /// Decode the payload into a typed schema.
    pub fn decode<P: DeserializeOwned>(&self) -> Result<StreamMessage<P>> {
        let payload = serde_json::from_value(self.payload.clone()).map_err(|source| {
            TypesError::Decode {
                event_type: self.event_type.clone(),
                source,
            }
        })?;

        Ok(StreamMessage {
            event_type: self.event_type.clone(),
            sent_at: self.sent_at.clone(),
            payload,
        })
    }
}
