//! The socket transport seam.
//!
//! The SDK does not speak the channel wire protocol itself. Framing, heartbeats,
//! reconnection and backoff belong to a topic-multiplexed socket transport that
//! implements [`Transport`] and [`Channel`]. The client only relies on:
//!
//! - connecting and disconnecting the physical socket
//! - a connection-level error hook
//! - per-topic channels with `join`/`leave` handshakes answered by a [`Reply`]
//! - per-event listener registration on a channel
//!
//! Replies may be delivered synchronously from inside `join`/`leave` or later
//! from the transport's event loop. Callers must not hold locks across these
//! calls.
//!
//! [`MemoryTransport`] is an in-process implementation used by the test suite
//! and for local development without a server.

use std::sync::Arc;

use serde_json::Value;

use crate::config::SocketOptions;
use crate::topic::Topic;

mod memory;

pub use memory::{ChannelPhase, MemoryChannel, MemoryTransport, ReplyMode};

/// Answer to a `join` or `leave` request.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Server acknowledged the request
    Ok(Value),
    /// Server rejected the request, with the reason it gave
    Error(Value),
    /// No answer arrived within the push timeout
    Timeout,
}

impl Reply {
    pub fn is_ok(&self) -> bool {
        matches!(self, Reply::Ok(_))
    }
}

/// Opaque reference to a listener attached with [`Channel::on`].
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub struct ListenerRef(pub u64);

/// Connection-level error reported by the transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ConnectionError {
    /// Human-readable error message
    pub message: String,
}

impl ConnectionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Listener invoked with the raw payload of every matching channel message.
pub type Listener = Arc<dyn Fn(&Value) + Send + Sync>;

/// One-shot handler for a join or leave reply.
pub type ReplyHandler = Box<dyn FnOnce(Reply) + Send>;

/// Handler for connection-level errors.
pub type ErrorHandler = Arc<dyn Fn(&ConnectionError) + Send + Sync>;

/// One physical, topic-multiplexed socket connection.
pub trait Transport: Send + Sync {
    /// Open the connection. Calling this on a connected transport is a no-op.
    fn connect(&self);

    /// Close the connection, invoking `on_closed` once it is closed.
    fn disconnect(&self, on_closed: Box<dyn FnOnce() + Send>);

    fn is_connected(&self) -> bool;

    /// Register a handler for connection-level errors.
    fn on_error(&self, handler: ErrorHandler);

    /// Create a new channel object for `topic`. The channel is not joined.
    fn channel(&self, topic: &Topic) -> Arc<dyn Channel>;
}

/// A logical stream of events for one topic on a [`Transport`].
pub trait Channel: Send + Sync {
    fn topic(&self) -> &Topic;

    /// Start the join handshake; `reply` receives the outcome.
    fn join(&self, reply: ReplyHandler);

    /// Start the leave handshake; `reply` receives the outcome.
    fn leave(&self, reply: ReplyHandler);

    /// Attach a listener for messages named `event`.
    fn on(&self, event: &str, listener: Listener) -> ListenerRef;

    /// Detach a listener previously attached for `event`.
    fn off(&self, event: &str, listener: ListenerRef);
}

/// Builds a transport for the resolved socket options.
pub trait Connector {
    fn open(&self, options: SocketOptions) -> Arc<dyn Transport>;
}

impl<F> Connector for F
where
    F: Fn(SocketOptions) -> Arc<dyn Transport>,
{
    fn open(&self, options: SocketOptions) -> Arc<dyn Transport> {
        self(options)
    }
}
