//! The stream client facade.

use std::collections::BTreeMap;
use std::sync::{mpsc, Arc};

use serde::de::DeserializeOwned;
use stream_types::{
    CollectionOfferEvent, EventType, ItemCancelledEvent, ItemListedEvent, ItemMetadataUpdate,
    ItemReceivedBidEvent, ItemReceivedOfferEvent, ItemSoldEvent, ItemTransferredEvent,
    OrderInvalidateEvent, OrderRevalidateEvent, StreamEvent, StreamMessage, TraitOfferEvent,
};
use url::Url;

use crate::config::{ClientConfig, LogLevel, SocketOptions};
use crate::error::Result;
use crate::event_stream::EventStream;
use crate::registry::{ChannelState, TopicRegistry};
use crate::router::{EventCallback, EventRouter};
use crate::subscription::{Subscription, SubscriptionId, SubscriptionManager};
use crate::topic::Topic;
use crate::transport::{ConnectionError, Connector, ErrorHandler, Transport};

/// Client for the OpenSea Stream API.
///
/// One client wraps one socket connection. Subscribing to a collection joins
/// its channel on first use; all subscriptions for that collection share the
/// channel, and it is left again when the last of them unsubscribes.
///
/// # Example
///
/// ```rust
/// use opensea_stream::{ClientConfig, MemoryTransport, StreamClient};
///
/// let transport = MemoryTransport::new();
/// let config = ClientConfig::builder("api-key")
///     .with_api_url("ws://localhost:4000/socket")
///     .build()?;
/// let client = StreamClient::new(config, &transport)?;
///
/// let subscription = client.on_item_listed("bored-ape", |event| {
///     println!("listed at {}: {}", event.sent_at, event.payload.base_price);
/// });
///
/// subscription.unsubscribe()?;
/// client.disconnect();
/// # Ok::<(), opensea_stream::StreamError>(())
/// ```
pub struct StreamClient {
    transport: Arc<dyn Transport>,
    manager: SubscriptionManager,
    options: SocketOptions,
    log_level: LogLevel,
}

impl StreamClient {
    /// Resolve `config` and open a transport through `connector`.
    ///
    /// The socket is not connected until [`connect`](Self::connect) or the
    /// first subscription.
    pub fn new<C: Connector + ?Sized>(config: ClientConfig, connector: &C) -> Result<Self> {
        let options = config.socket_options()?;
        let log_level = config.log_level;
        let transport = connector.open(options.clone());

        let on_error = config
            .on_error
            .unwrap_or_else(|| default_error_handler(log_level));
        transport.on_error(on_error);

        let registry = TopicRegistry::new(Arc::clone(&transport), log_level);
        let router = EventRouter::new(config.on_event);
        let manager = SubscriptionManager::new(Arc::clone(&transport), registry, router, log_level);

        Ok(Self {
            transport,
            manager,
            options,
            log_level,
        })
    }

    /// Resolved endpoint, including token and protocol version.
    pub fn endpoint(&self) -> &Url {
        &self.options.endpoint
    }

    pub fn connect(&self) {
        self.transport.connect();
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// Drop every channel and subscription, then close the socket.
    pub fn disconnect(&self) {
        let log_level = self.log_level;
        self.disconnect_with(move || {
            if log_level.allows(LogLevel::Info) {
                tracing::info!("Successfully disconnected from socket");
            }
        });
    }

    /// Like [`disconnect`](Self::disconnect), invoking `on_closed` once the socket is closed.
    ///
    /// Registry entries are cleared unconditionally, whatever their join state.
    pub fn disconnect_with<F>(&self, on_closed: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.manager.clear();
        self.transport.disconnect(Box::new(on_closed));
    }

    pub fn on_item_metadata_updated<F>(&self, collection_slug: &str, callback: F) -> Subscription
    where
        F: Fn(ItemMetadataUpdate) + Send + Sync + 'static,
    {
        self.on_typed(EventType::ItemMetadataUpdated, collection_slug, callback)
    }

    pub fn on_item_listed<F>(&self, collection_slug: &str, callback: F) -> Subscription
    where
        F: Fn(ItemListedEvent) + Send + Sync + 'static,
    {
        self.on_typed(EventType::ItemListed, collection_slug, callback)
    }

    pub fn on_item_sold<F>(&self, collection_slug: &str, callback: F) -> Subscription
    where
        F: Fn(ItemSoldEvent) + Send + Sync + 'static,
    {
        self.on_typed(EventType::ItemSold, collection_slug, callback)
    }

    pub fn on_item_transferred<F>(&self, collection_slug: &str, callback: F) -> Subscription
    where
        F: Fn(ItemTransferredEvent) + Send + Sync + 'static,
    {
        self.on_typed(EventType::ItemTransferred, collection_slug, callback)
    }

    pub fn on_item_received_offer<F>(&self, collection_slug: &str, callback: F) -> Subscription
    where
        F: Fn(ItemReceivedOfferEvent) + Send + Sync + 'static,
    {
        self.on_typed(EventType::ItemReceivedOffer, collection_slug, callback)
    }

    pub fn on_item_received_bid<F>(&self, collection_slug: &str, callback: F) -> Subscription
    where
        F: Fn(ItemReceivedBidEvent) + Send + Sync + 'static,
    {
        self.on_typed(EventType::ItemReceivedBid, collection_slug, callback)
    }

    pub fn on_item_cancelled<F>(&self, collection_slug: &str, callback: F) -> Subscription
    where
        F: Fn(ItemCancelledEvent) + Send + Sync + 'static,
    {
        self.on_typed(EventType::ItemCancelled, collection_slug, callback)
    }

    pub fn on_collection_offer<F>(&self, collection_slug: &str, callback: F) -> Subscription
    where
        F: Fn(CollectionOfferEvent) + Send + Sync + 'static,
    {
        self.on_typed(EventType::CollectionOffer, collection_slug, callback)
    }

    pub fn on_trait_offer<F>(&self, collection_slug: &str, callback: F) -> Subscription
    where
        F: Fn(TraitOfferEvent) + Send + Sync + 'static,
    {
        self.on_typed(EventType::TraitOffer, collection_slug, callback)
    }

    pub fn on_order_invalidate<F>(&self, collection_slug: &str, callback: F) -> Subscription
    where
        F: Fn(OrderInvalidateEvent) + Send + Sync + 'static,
    {
        self.on_typed(EventType::OrderInvalidate, collection_slug, callback)
    }

    pub fn on_order_revalidate<F>(&self, collection_slug: &str, callback: F) -> Subscription
    where
        F: Fn(OrderRevalidateEvent) + Send + Sync + 'static,
    {
        self.on_typed(EventType::OrderRevalidate, collection_slug, callback)
    }

    /// Subscribe one callback to several event kinds of a collection.
    ///
    /// The callback receives the envelope exactly as delivered; the payload
    /// is not decoded or validated.
    pub fn on_events<F>(
        &self,
        collection_slug: &str,
        event_types: &[EventType],
        callback: F,
    ) -> Subscription
    where
        F: Fn(StreamEvent) + Send + Sync + 'static,
    {
        self.manager.on_events(
            &Topic::collection(collection_slug),
            event_types,
            Arc::new(callback),
        )
    }

    /// Subscribe to several event kinds and pull them from a queue.
    ///
    /// The stream owns the subscription: closing or dropping it unsubscribes.
    /// It ends when the client disconnects.
    pub fn event_stream(&self, collection_slug: &str, event_types: &[EventType]) -> EventStream {
        let (tx, rx) = mpsc::channel();
        let subscription = self.on_events(collection_slug, event_types, move |event| {
            // The receiver may already be gone; the event is dropped then.
            let _ = tx.send(event);
        });
        EventStream::new(subscription, rx)
    }

    /// Unsubscribe a single subscription by id.
    pub fn unsubscribe(&self, id: SubscriptionId) -> Result<()> {
        self.manager.unsubscribe(id)
    }

    /// Registered topics and the join state of their channels.
    pub fn channels(&self) -> BTreeMap<Topic, ChannelState> {
        self.manager.registry().channels()
    }

    /// Live subscriptions on a collection's current channel.
    pub fn subscription_count(&self, collection_slug: &str) -> usize {
        self.manager
            .subscription_count(&Topic::collection(collection_slug))
    }

    fn on_typed<P, F>(&self, event_type: EventType, collection_slug: &str, callback: F) -> Subscription
    where
        P: DeserializeOwned + 'static,
        F: Fn(StreamMessage<P>) + Send + Sync + 'static,
    {
        let log_level = self.log_level;
        let typed: EventCallback = Arc::new(move |event: StreamEvent| match event.decode::<P>() {
            Ok(message) => callback(message),
            Err(e) => {
                if log_level.allows(LogLevel::Warn) {
                    tracing::warn!("Skipping {} event: {}", event_type, e);
                }
            }
        });
        self.manager
            .on(event_type, &Topic::collection(collection_slug), typed)
    }
}

impl Drop for StreamClient {
    fn drop(&mut self) {
        if self.log_level.allows(LogLevel::Debug) {
            tracing::debug!(
                "StreamClient dropping, {} registered channels",
                self.manager.registry().len()
            );
        }

        if self.transport.is_connected() {
            self.manager.clear();
            self.transport.disconnect(Box::new(|| {}));
        }
    }
}

fn default_error_handler(log_level: LogLevel) -> ErrorHandler {
    Arc::new(move |error: &ConnectionError| {
        if log_level.allows(LogLevel::Error) {
            tracing::error!("Socket error: {}", error);
        }
    })
}
