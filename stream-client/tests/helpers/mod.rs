//! Shared helpers for client integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use opensea_stream::{ClientConfig, MemoryTransport, StreamClient};
use parking_lot::Mutex;
use serde_json::{json, Value};

pub const API_URL: &str = "ws://localhost:1234";

/// Client wired to a fresh loopback transport.
pub fn client() -> (StreamClient, MemoryTransport) {
    client_with(ClientConfig::builder("test").with_api_url(API_URL).build().unwrap())
}

pub fn client_with(config: ClientConfig) -> (StreamClient, MemoryTransport) {
    let transport = MemoryTransport::new();
    let client = StreamClient::new(config, &transport).unwrap();
    (client, transport)
}

/// Envelope as the server sends it.
pub fn envelope(event_type: &str, payload: Value) -> Value {
    json!({
        "event_type": event_type,
        "sent_at": "2022-08-03T20:16:06.212451+00:00",
        "payload": payload,
    })
}

/// Serialized `[join_ref, ref, topic, event, payload]` frame.
pub fn encode(topic: &str, event: &str, payload: &Value) -> String {
    serde_json::to_string(&json!([null, null, topic, event, payload])).unwrap()
}

/// Collects everything handed to a callback.
#[derive(Clone, Default)]
pub struct Recorder<T> {
    seen: Arc<Mutex<Vec<T>>>,
}

impl<T: Clone + Send + 'static> Recorder<T> {
    pub fn new() -> Self {
        Self {
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn callback(&self) -> impl Fn(T) + Send + Sync + 'static {
        let seen = Arc::clone(&self.seen);
        move |item| seen.lock().push(item)
    }

    pub fn count(&self) -> usize {
        self.seen.lock().len()
    }

    pub fn items(&self) -> Vec<T> {
        self.seen.lock().clone()
    }
}

/// Install a test subscriber once; repeated calls are ignored.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
