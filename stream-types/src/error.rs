//! Error types for the stream-types crate.

/// Errors produced while interpreting stream data.
#[derive(Debug, thiserror::Error)]
pub enum TypesError {
    /// The event name is not one of the known event kinds
    #[error("Unknown event type: {0}")]
    UnknownEventType(String),

    /// The network name is not one of the known deployments
    #[error("Unknown network: {0}")]
    UnknownNetwork(String),

    /// The envelope or payload did not match the requested shape
    #[error("Failed to decode {event_type} message: {source}")]
    Decode {
        /// Wire name of the event being decoded
        event_type: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Convenience type alias for Results using TypesError.
pub type Result<T> = std::result::Result<T, TypesError>;
