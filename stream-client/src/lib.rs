//! # opensea-stream
//!
//! Client for the OpenSea Stream API: subscribe to marketplace events
//! (listings, sales, transfers, offers, bids, cancellations, metadata updates,
//! order validation) per collection and have them routed to your callbacks.
//!
//! ## Overview
//!
//! The stream is a topic-multiplexed socket. Every collection is a topic
//! (`collection:<slug>`) served through a channel that has to be joined before
//! events flow. The client hides that lifecycle:
//!
//! - **Lazy channels**: a collection's channel is created and joined on its first subscription
//! - **Shared channels**: every subscription on a collection reuses the same channel
//! - **Reference counting**: the channel is left when its last subscription unsubscribes
//! - **Middleware**: an optional predicate can veto individual deliveries
//!
//! The socket protocol itself (framing, heartbeats, reconnection) lives behind the
//! [`Transport`] trait. [`MemoryTransport`] is an in-process implementation for
//! tests and local development.
//!
//! ## Usage
//!
//! ```rust
//! use opensea_stream::prelude::*;
//!
//! let transport = MemoryTransport::new();
//! let config = ClientConfig::builder("api-key")
//!     .with_on_event(|_topic, _kind, event| event.payload["item"]["chain"]["name"] == "ethereum")
//!     .build()?;
//! let client = StreamClient::new(config, &transport)?;
//!
//! let sales = client.on_item_sold("boredapeyachtclub", |sale| {
//!     println!("sold for {}", sale.payload.sale_price);
//! });
//! let everything = client.on_events("boredapeyachtclub", &EventType::ALL, |event| {
//!     println!("{}: {}", event.event_type, event.payload);
//! });
//!
//! sales.unsubscribe()?;
//! everything.unsubscribe()?;
//! client.disconnect();
//! # Ok::<(), StreamError>(())
//! ```

mod client;
pub mod config;
mod error;
pub mod event_stream;
pub mod registry;
pub mod router;
pub mod subscription;
mod topic;
pub mod transport;

pub use client::StreamClient;
pub use config::{ClientConfig, ClientConfigBuilder, ConnectOptions, LogLevel, SocketOptions};
pub use error::{Result, StreamError};
pub use event_stream::EventStream;
pub use registry::{ChannelHandle, ChannelState, TopicRegistry};
pub use router::{EventCallback, EventRouter, Middleware};
pub use subscription::{Subscription, SubscriptionId, SubscriptionManager};
pub use topic::Topic;
pub use transport::{
    Channel, ConnectionError, Connector, MemoryTransport, Reply, ReplyMode, Transport,
};

// Re-export the data types so most users need a single dependency
pub use stream_types::{EventType, Network, StreamEvent, StreamMessage};
pub use stream_types as types;

/// Prelude module for convenient imports
///
/// ```rust
/// use opensea_stream::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        ClientConfig, EventStream, EventType, MemoryTransport, Network, StreamClient,
        StreamError, StreamEvent, Subscription, SubscriptionId, Topic,
    };
}
