//! Event kinds published on a collection topic.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypesError;

/// Kind of event delivered on a collection channel.
///
/// The serialized form is the wire name used as the channel event name,
/// e.g. `item_listed`.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// Item metadata (name, image, traits) changed
    ItemMetadataUpdated,
    /// Item was listed for sale
    ItemListed,
    /// Item was sold
    ItemSold,
    /// Item was transferred between accounts
    ItemTransferred,
    /// Item received an offer
    ItemReceivedOffer,
    /// Item received a bid in an auction
    ItemReceivedBid,
    /// Listing or offer on an item was cancelled
    ItemCancelled,
    /// Offer made on every item of a collection
    CollectionOffer,
    /// Offer made on items carrying a specific trait
    TraitOffer,
    /// An order became invalid
    OrderInvalidate,
    /// A previously invalid order became valid again
    OrderRevalidate,
}

impl EventType {
    /// Every event kind, in declaration order.
    pub const ALL: [EventType; 11] = [
        EventType::ItemMetadataUpdated,
        EventType::ItemListed,
        EventType::ItemSold,
        EventType::ItemTransferred,
        EventType::ItemReceivedOffer,
        EventType::ItemReceivedBid,
        EventType::ItemCancelled,
        EventType::CollectionOffer,
        EventType::TraitOffer,
        EventType::OrderInvalidate,
        EventType::OrderRevalidate,
    ];

    /// Wire name of the event kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::ItemMetadataUpdated => "item_metadata_updated",
            EventType::ItemListed => "item_listed",
            EventType::ItemSold => "item_sold",
            EventType::ItemTransferred => "item_transferred",
            EventType::ItemReceivedOffer => "item_received_offer",
            EventType::ItemReceivedBid => "item_received_bid",
            EventType::ItemCancelled => "item_cancelled",
            EventType::CollectionOffer => "collection_offer",
            EventType::TraitOffer => "trait_offer",
            EventType::OrderInvalidate => "order_invalidate",
            EventType::OrderRevalidate => "order_revalidate",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventType::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| TypesError::UnknownEventType(s.to_string()))
    }
}
