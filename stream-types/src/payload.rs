//! Payload schemas for each event kind.
//!
//! Every struct decodes leniently: absent fields take their `Default` value and
//! fields the server adds later are ignored. Numeric fields also accept their
//! quoted form, since the feed is not consistent about it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::lenient;
use crate::message::StreamMessage;

/// Chain an item lives on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Chain {
    pub name: String,
}

/// Reference to a collection by slug.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionRef {
    pub slug: String,
}

/// Display metadata of an item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemMetadata {
    pub name: Option<String>,
    pub image_url: Option<String>,
    pub animation_url: Option<String>,
    pub metadata_url: Option<String>,
}

/// The item an event refers to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaseItem {
    /// `chain/contract/token_id` identifier
    pub nft_id: String,
    pub permalink: String,
    pub metadata: ItemMetadata,
    pub chain: Chain,
}

/// Item trait as reported in metadata updates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Trait {
    pub trait_type: String,
    pub value: Value,
    pub display_type: Option<String>,
    #[serde(deserialize_with = "lenient::optional_number")]
    pub max_value: Option<f64>,
    /// Number of items sharing this trait; sent as text
    #[serde(deserialize_with = "lenient::optional_text")]
    pub trait_count: Option<String>,
    #[serde(deserialize_with = "lenient::optional_number")]
    pub order: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Account {
    pub address: String,
}

/// Token a price is denominated in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentToken {
    pub address: String,
    #[serde(deserialize_with = "lenient::number")]
    pub decimals: u32,
    pub eth_price: String,
    pub name: String,
    pub symbol: String,
    pub usd_price: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Transaction {
    pub hash: String,
    pub timestamp: String,
}

/// Contract targeted by a collection or trait offer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContractCriteria {
    pub address: String,
}

/// Trait targeted by a trait offer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraitCriteria {
    pub trait_type: String,
    pub trait_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemMetadataUpdatePayload {
    pub item: BaseItem,
    pub collection: CollectionRef,
    pub name: Option<String>,
    pub description: Option<String>,
    pub image_preview_url: Option<String>,
    pub animation_url: Option<String>,
    pub background_color: Option<String>,
    pub metadata_url: Option<String>,
    pub traits: Vec<Trait>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemListedEventPayload {
    pub item: BaseItem,
    pub collection: CollectionRef,
    #[serde(deserialize_with = "lenient::number")]
    pub quantity: u64,
    pub listing_type: Option<String>,
    pub listing_date: String,
    pub expiration_date: String,
    pub maker: Account,
    pub taker: Option<Account>,
    pub base_price: String,
    pub payment_token: PaymentToken,
    pub is_private: bool,
    pub order_hash: Option<String>,
    pub event_timestamp: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemSoldEventPayload {
    pub item: BaseItem,
    pub collection: CollectionRef,
    #[serde(deserialize_with = "lenient::number")]
    pub quantity: u64,
    pub listing_type: Option<String>,
    pub closing_date: String,
    pub transaction: Transaction,
    pub maker: Account,
    pub taker: Account,
    pub sale_price: String,
    pub payment_token: PaymentToken,
    pub is_private: bool,
    pub order_hash: Option<String>,
    pub event_timestamp: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemTransferredEventPayload {
    pub item: BaseItem,
    pub collection: CollectionRef,
    pub from_account: Account,
    pub to_account: Account,
    #[serde(deserialize_with = "lenient::number")]
    pub quantity: u64,
    pub transaction: Transaction,
    pub event_timestamp: String,
}

/// Shared by `item_received_bid` and `item_received_offer`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemOfferPayload {
    pub item: BaseItem,
    pub collection: CollectionRef,
    #[serde(deserialize_with = "lenient::number")]
    pub quantity: u64,
    pub created_date: String,
    pub expiration_date: String,
    pub maker: Account,
    pub taker: Option<Account>,
    pub base_price: String,
    pub payment_token: PaymentToken,
    pub order_hash: Option<String>,
    pub event_timestamp: String,
}

pub type ItemReceivedBidEventPayload = ItemOfferPayload;
pub type ItemReceivedOfferEventPayload = ItemOfferPayload;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemCancelledEventPayload {
    pub item: BaseItem,
    pub collection: CollectionRef,
    #[serde(deserialize_with = "lenient::number")]
    pub quantity: u64,
    pub listing_type: Option<String>,
    pub transaction: Option<Transaction>,
    pub payment_token: PaymentToken,
    pub order_hash: Option<String>,
    pub event_timestamp: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionOfferEventPayload {
    pub collection: CollectionRef,
    #[serde(deserialize_with = "lenient::number")]
    pub quantity: u64,
    pub created_date: String,
    pub expiration_date: String,
    pub maker: Account,
    pub taker: Option<Account>,
    pub base_price: String,
    pub payment_token: PaymentToken,
    pub collection_criteria: CollectionRef,
    pub asset_contract_criteria: ContractCriteria,
    pub order_hash: String,
    pub protocol_address: String,
    /// Order parameters as signed by the maker, passed through untouched
    pub protocol_data: Value,
    pub event_timestamp: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraitOfferEventPayload {
    #[serde(flatten)]
    pub offer: CollectionOfferEventPayload,
    pub trait_criteria: TraitCriteria,
}

/// Shared by `order_invalidate` and `order_revalidate`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderValidationEventPayload {
    pub item: BaseItem,
    pub collection: CollectionRef,
    pub chain: Chain,
    pub order_hash: String,
    pub protocol_address: String,
    pub event_timestamp: String,
}

pub type ItemMetadataUpdate = StreamMessage<ItemMetadataUpdatePayload>;
pub type ItemListedEvent = StreamMessage<ItemListedEventPayload>;
pub type ItemSoldEvent = StreamMessage<ItemSoldEventPayload>;
pub type ItemTransferredEvent = StreamMessage<ItemTransferredEventPayload>;
pub type ItemReceivedBidEvent = StreamMessage<ItemReceivedBidEventPayload>;
pub type ItemReceivedOfferEvent = StreamMessage<ItemReceivedOfferEventPayload>;
pub type ItemCancelledEvent = StreamMessage<ItemCancelledEventPayload>;
pub type CollectionOfferEvent = StreamMessage<CollectionOfferEventPayload>;
pub type TraitOfferEvent = StreamMessage<TraitOfferEventPayload>;
pub type OrderInvalidateEvent = StreamMessage<OrderValidationEventPayload>;
pub type OrderRevalidateEvent = StreamMessage<OrderValidationEventPayload>;
