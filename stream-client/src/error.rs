//! Error types for the opensea-stream crate.

use crate::subscription::SubscriptionId;

/// Errors returned by the stream client.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// Invalid configuration provided
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The endpoint URL could not be parsed
    #[error("Invalid endpoint URL: {0}")]
    InvalidEndpoint(#[from] url::ParseError),

    /// The subscription is unknown, already unsubscribed, or was dropped by a disconnect
    #[error("Subscription not found: {0}")]
    SubscriptionNotFound(SubscriptionId),

    /// An event name or payload could not be interpreted
    #[error(transparent)]
    Types(#[from] stream_types::TypesError),
}

/// Convenience type alias for Results using StreamError.
pub type Result<T> = std::result::Result<T, StreamError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_error_display() {
        let error = StreamError::Configuration("token must not be empty".to_string());
        assert_eq!(error.to_string(), "Configuration error: token must not be empty");

        let error = StreamError::SubscriptionNotFound(SubscriptionId::new(7));
        assert_eq!(error.to_string(), "Subscription not found: sub-7");

        let error: StreamError = url::Url::parse("nope").unwrap_err().into();
        assert!(error.to_string().starts_with("Invalid endpoint URL"));
    }

    #[test]
    fn test_conversion_from_types_error() {
        let error: StreamError =
            stream_types::TypesError::UnknownEventType("item_burned".to_string()).into();
        assert_eq!(error.to_string(), "Unknown event type: item_burned");
    }
}
