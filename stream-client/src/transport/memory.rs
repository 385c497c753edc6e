//! In-process loopback transport.
//!
//! `MemoryTransport` implements the transport seam without a network. Tests
//! and demos push channel messages into it directly and decide how join and
//! leave handshakes are answered.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde_json::{json, Value};

use super::{
    Channel, ConnectionError, Connector, ErrorHandler, Listener, ListenerRef, Reply,
    ReplyHandler, Transport,
};
use crate::config::SocketOptions;
use crate::topic::Topic;

/// How the loopback transport answers join and leave requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyMode {
    /// Acknowledge immediately
    Ok,
    /// Reject immediately
    Error,
    /// Hold the reply until `resolve_joins`/`resolve_leaves` is called
    Manual,
}

/// Lifecycle phase of a loopback channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelPhase {
    Created,
    Joining,
    Joined,
    Errored,
    Leaving,
    Closed,
}

struct TransportState {
    connected: bool,
    connect_count: usize,
    options: Option<SocketOptions>,
    join_mode: ReplyMode,
    leave_mode: ReplyMode,
    error_handlers: Vec<ErrorHandler>,
    channels: Vec<Arc<MemoryChannel>>,
}

/// Loopback transport. Clones share the same connection.
#[derive(Clone)]
pub struct MemoryTransport {
    state: Arc<Mutex<TransportState>>,
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTransport {
    /// A transport that acknowledges every join and leave immediately.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(TransportState {
                connected: false,
                connect_count: 0,
                options: None,
                join_mode: ReplyMode::Ok,
                leave_mode: ReplyMode::Ok,
                error_handlers: Vec::new(),
                channels: Vec::new(),
            })),
        }
    }

    pub fn set_join_mode(&self, mode: ReplyMode) {
        self.state.lock().join_mode = mode;
    }

    pub fn set_leave_mode(&self, mode: ReplyMode) {
        self.state.lock().leave_mode = mode;
    }

    /// Options the transport was opened with, if it was opened by a client.
    pub fn options(&self) -> Option<SocketOptions> {
        self.state.lock().options.clone()
    }

    /// Number of times `connect` opened the connection.
    pub fn connect_count(&self) -> usize {
        self.state.lock().connect_count
    }

    /// Every channel created so far, in creation order.
    pub fn channels(&self) -> Vec<Arc<MemoryChannel>> {
        self.state.lock().channels.clone()
    }

    /// Channels created for `topic`, in creation order.
    pub fn channels_for(&self, topic: &Topic) -> Vec<Arc<MemoryChannel>> {
        self.state
            .lock()
            .channels
            .iter()
            .filter(|channel| channel.topic() == topic)
            .cloned()
            .collect()
    }

    /// Deliver a message to every live channel of `topic`.
    ///
    /// Returns the number of listeners invoked. Nothing is delivered while the
    /// transport is disconnected.
    pub fn push(&self, topic: &Topic, event: &str, payload: Value) -> usize {
        let channels = {
            let state = self.state.lock();
            if !state.connected {
                return 0;
            }
            state
                .channels
                .iter()
                .filter(|channel| channel.topic() == topic)
                .cloned()
                .collect::<Vec<_>>()
        };

        channels
            .iter()
            .map(|channel| channel.deliver(event, &payload))
            .sum()
    }

    /// Deliver a serialized `[join_ref, ref, topic, event, payload]` frame.
    pub fn push_frame(&self, frame: &str) -> Result<usize, serde_json::Error> {
        let (_join_ref, _ref, topic, event, payload): (
            Option<String>,
            Option<String>,
            String,
            String,
            Value,
        ) = serde_json::from_str(frame)?;
        Ok(self.push(&Topic::new(topic), &event, payload))
    }

    /// Report a connection-level error to every registered handler.
    pub fn emit_error(&self, message: &str) {
        let handlers = self.state.lock().error_handlers.clone();
        let error = ConnectionError::new(message);
        for handler in handlers {
            handler(&error);
        }
    }

    /// Answer every join held back by [`ReplyMode::Manual`].
    pub fn resolve_joins(&self, reply: Reply) -> usize {
        self.channels()
            .iter()
            .filter(|channel| channel.resolve_join(reply.clone()))
            .count()
    }

    /// Answer every leave held back by [`ReplyMode::Manual`].
    pub fn resolve_leaves(&self, reply: Reply) -> usize {
        self.channels()
            .iter()
            .filter(|channel| channel.resolve_leave(reply.clone()))
            .count()
    }
}

impl Connector for MemoryTransport {
    fn open(&self, options: SocketOptions) -> Arc<dyn Transport> {
        self.state.lock().options = Some(options);
        Arc::new(self.clone())
    }
}

impl Transport for MemoryTransport {
    fn connect(&self) {
        let mut state = self.state.lock();
        if !state.connected {
            state.connected = true;
            state.connect_count += 1;
        }
    }

    fn disconnect(&self, on_closed: Box<dyn FnOnce() + Send>) {
        let channels = {
            let mut state = self.state.lock();
            state.connected = false;
            std::mem::take(&mut state.channels)
        };
        for channel in channels {
            channel.close();
        }
        on_closed();
    }

    fn is_connected(&self) -> bool {
        self.state.lock().connected
    }

    fn on_error(&self, handler: ErrorHandler) {
        self.state.lock().error_handlers.push(handler);
    }

    fn channel(&self, topic: &Topic) -> Arc<dyn Channel> {
        let channel = Arc::new(MemoryChannel::new(topic.clone(), Arc::downgrade(&self.state)));
        self.state.lock().channels.push(Arc::clone(&channel));
        channel
    }
}

struct ChannelState {
    phase: ChannelPhase,
    listeners: Vec<(String, ListenerRef, Listener)>,
    next_ref: u64,
    pending_join: Option<ReplyHandler>,
    pending_leave: Option<ReplyHandler>,
}

/// Channel created by [`MemoryTransport`].
pub struct MemoryChannel {
    topic: Topic,
    transport: Weak<Mutex<TransportState>>,
    state: Mutex<ChannelState>,
}

impl MemoryChannel {
    fn new(topic: Topic, transport: Weak<Mutex<TransportState>>) -> Self {
        Self {
            topic,
            transport,
            state: Mutex::new(ChannelState {
                phase: ChannelPhase::Created,
                listeners: Vec::new(),
                next_ref: 1,
                pending_join: None,
                pending_leave: None,
            }),
        }
    }

    pub fn phase(&self) -> ChannelPhase {
        self.state.lock().phase
    }

    pub fn listener_count(&self) -> usize {
        self.state.lock().listeners.len()
    }

    /// Listeners attached for `event`.
    pub fn listeners_for(&self, event: &str) -> usize {
        self.state
            .lock()
            .listeners
            .iter()
            .filter(|(name, _, _)| name == event)
            .count()
    }

    fn modes(&self) -> (ReplyMode, ReplyMode) {
        match self.transport.upgrade() {
            Some(state) => {
                let state = state.lock();
                (state.join_mode, state.leave_mode)
            }
            None => (ReplyMode::Ok, ReplyMode::Ok),
        }
    }

    fn deliver(&self, event: &str, payload: &Value) -> usize {
        let listeners: Vec<Listener> = {
            let state = self.state.lock();
            if !matches!(state.phase, ChannelPhase::Joining | ChannelPhase::Joined) {
                return 0;
            }
            state
                .listeners
                .iter()
                .filter(|(name, _, _)| name == event)
                .map(|(_, _, listener)| Arc::clone(listener))
                .collect()
        };

        for listener in &listeners {
            listener(payload);
        }
        listeners.len()
    }

    fn resolve_join(&self, reply: Reply) -> bool {
        let handler = {
            let mut state = self.state.lock();
            let Some(handler) = state.pending_join.take() else {
                return false;
            };
            state.phase = if reply.is_ok() {
                ChannelPhase::Joined
            } else {
                ChannelPhase::Errored
            };
            handler
        };
        handler(reply);
        true
    }

    fn resolve_leave(&self, reply: Reply) -> bool {
        let handler = {
            let mut state = self.state.lock();
            let Some(handler) = state.pending_leave.take() else {
                return false;
            };
            state.phase = ChannelPhase::Closed;
            handler
        };
        handler(reply);
        true
    }

    fn close(&self) {
        let mut state = self.state.lock();
        state.phase = ChannelPhase::Closed;
        state.listeners.clear();
        state.pending_join = None;
        state.pending_leave = None;
    }
}

impl Channel for MemoryChannel {
    fn topic(&self) -> &Topic {
        &self.topic
    }

    fn join(&self, reply: ReplyHandler) {
        let (join_mode, _) = self.modes();
        {
            let mut state = self.state.lock();
            match join_mode {
                ReplyMode::Ok => state.phase = ChannelPhase::Joined,
                ReplyMode::Error => state.phase = ChannelPhase::Errored,
                ReplyMode::Manual => {
                    state.phase = ChannelPhase::Joining;
                    state.pending_join = Some(reply);
                    return;
                }
            }
        }

        match join_mode {
            ReplyMode::Ok => reply(Reply::Ok(json!({}))),
            _ => reply(Reply::Error(json!({ "reason": "unauthorized" }))),
        }
    }

    fn leave(&self, reply: ReplyHandler) {
        let (_, leave_mode) = self.modes();
        let joined = {
            let mut state = self.state.lock();
            state.pending_join = None;
            let joined = state.phase == ChannelPhase::Joined;
            if joined && leave_mode == ReplyMode::Manual {
                state.phase = ChannelPhase::Leaving;
                state.pending_leave = Some(reply);
                return;
            }
            state.phase = ChannelPhase::Closed;
            joined
        };

        // A channel that never finished joining has nothing to tell the server.
        if !joined || leave_mode == ReplyMode::Ok {
            reply(Reply::Ok(json!({})));
        } else {
            reply(Reply::Error(json!({ "reason": "leave rejected" })));
        }
    }

    fn on(&self, event: &str, listener: Listener) -> ListenerRef {
        let mut state = self.state.lock();
        let listener_ref = ListenerRef(state.next_ref);
        state.next_ref += 1;
        state.listeners.push((event.to_string(), listener_ref, listener));
        listener_ref
    }

    fn off(&self, event: &str, listener: ListenerRef) {
        self.state
            .lock()
            .listeners
            .retain(|(name, existing, _)| !(name == event && *existing == listener));
    }
}
