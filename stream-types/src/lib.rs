//! # stream-types
//!
//! Shared data types for the OpenSea Stream API.
//!
//! This crate holds everything that describes *what* travels over the stream,
//! independent of how it is delivered:
//!
//! - [`EventType`]: the closed set of event kinds and their wire names
//! - [`StreamMessage`]: the `{event_type, sent_at, payload}` envelope every event shares
//! - Payload schemas for each event kind (see [`payload`])
//! - [`Network`]: the deployments the stream is served from
//!
//! Payload structs decode leniently. Missing fields fall back to their
//! defaults and unknown fields are ignored, so schema drift on the server side
//! does not break delivery.

mod error;
mod event_type;
mod lenient;
mod message;
mod network;
pub mod payload;

pub use error::{Result, TypesError};
pub use event_type::EventType;
pub use message::{StreamEvent, StreamMessage};
pub use network::Network;
pub use payload::*;
