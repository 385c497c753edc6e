//! Client configuration.
//!
//! [`ClientConfig`] carries everything needed to build a [`StreamClient`]:
//! the API token, which endpoint to reach, transport connect options, and the
//! optional error hook and event middleware. Use [`ClientConfig::new`] for the
//! defaults or [`ClientConfig::builder`] for a validated, fluent setup.
//!
//! [`StreamClient`]: crate::StreamClient

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use stream_types::Network;
use url::Url;

use crate::error::{Result, StreamError};
use crate::router::Middleware;
use crate::transport::ErrorHandler;

/// Protocol version sent as the `vsn` query parameter.
pub const PROTOCOL_VERSION: &str = "2.0.0";

/// Path segment the socket transport is served under.
const TRANSPORT_PATH: &str = "websocket";

/// Severity threshold for log output produced by the SDK.
#[derive(
    Debug, Clone, Copy, Default, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum LogLevel {
    Debug = 20,
    #[default]
    Info = 30,
    Warn = 40,
    Error = 50,
}

impl LogLevel {
    /// Whether a message of `level` should be emitted under this threshold.
    pub fn allows(self, level: LogLevel) -> bool {
        level >= self
    }
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

/// Options handed to the socket transport.
///
/// The SDK does not act on these itself; heartbeats, push timeouts and
/// reconnection are the transport's job.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectOptions {
    /// Timeout for join/leave pushes
    /// Default: 10 seconds
    pub timeout: Duration,

    /// Interval between heartbeat messages
    /// Default: 30 seconds
    pub heartbeat_interval: Duration,

    /// Reconnect delays by attempt; attempts past the end use `reconnect_max`
    /// Default: 10ms, 50ms, 100ms, 150ms, 200ms, 250ms, 500ms, 1s, 2s
    pub reconnect_backoff: Vec<Duration>,

    /// Delay used once `reconnect_backoff` is exhausted
    /// Default: 5 seconds
    pub reconnect_max: Duration,

    /// Extra query parameters appended to the endpoint
    pub params: Vec<(String, String)>,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            heartbeat_interval: Duration::from_secs(30),
            reconnect_backoff: [10, 50, 100, 150, 200, 250, 500, 1000, 2000]
                .into_iter()
                .map(Duration::from_millis)
                .collect(),
            reconnect_max: Duration::from_secs(5),
            params: Vec::new(),
        }
    }
}

impl ConnectOptions {
    /// Delay before reconnect attempt number `tries` (1-based).
    pub fn reconnect_after(&self, tries: usize) -> Duration {
        tries
            .checked_sub(1)
            .and_then(|index| self.reconnect_backoff.get(index))
            .copied()
            .unwrap_or(self.reconnect_max)
    }
}

/// Fully resolved options used to open the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct SocketOptions {
    /// Endpoint including the transport path, token and protocol version
    pub endpoint: Url,
    pub connect: ConnectOptions,
}

/// Configuration for a [`StreamClient`](crate::StreamClient).
#[derive(Clone)]
pub struct ClientConfig {
    /// API key, sent as the `token` query parameter
    pub token: String,
    /// Base socket URL; overrides the network default when set
    pub api_url: Option<String>,
    /// Deployment used when `api_url` is not set
    pub network: Network,
    pub connect_options: ConnectOptions,
    /// Connection error hook; errors are logged when unset
    pub on_error: Option<ErrorHandler>,
    pub log_level: LogLevel,
    /// Predicate consulted before every callback delivery
    pub on_event: Option<Middleware>,
}

impl ClientConfig {
    /// Configuration with defaults for everything except the token.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            api_url: None,
            network: Network::default(),
            connect_options: ConnectOptions::default(),
            on_error: None,
            log_level: LogLevel::default(),
            on_event: None,
        }
    }

    pub fn builder(token: impl Into<String>) -> ClientConfigBuilder {
        ClientConfigBuilder {
            config: Self::new(token),
        }
    }

    /// The base URL in effect: `api_url` if set, else the network endpoint.
    pub fn base_url(&self) -> &str {
        self.api_url
            .as_deref()
            .unwrap_or_else(|| self.network.endpoint())
    }

    /// Resolve the endpoint and connect options for the transport.
    ///
    /// The endpoint is `<base>/websocket?token=<token>[&params]&vsn=2.0.0`.
    pub fn socket_options(&self) -> Result<SocketOptions> {
        let mut endpoint = Url::parse(self.base_url())?;

        match endpoint.scheme() {
            "ws" | "wss" | "http" | "https" => {}
            other => {
                return Err(StreamError::Configuration(format!(
                    "unsupported endpoint scheme '{}'",
                    other
                )))
            }
        }

        endpoint
            .path_segments_mut()
            .map_err(|_| {
                StreamError::Configuration(format!("endpoint '{}' cannot be a base", self.base_url()))
            })?
            .pop_if_empty()
            .push(TRANSPORT_PATH);

        {
            let mut query = endpoint.query_pairs_mut();
            query.append_pair("token", &self.token);
            for (key, value) in &self.connect_options.params {
                query.append_pair(key, value);
            }
            query.append_pair("vsn", PROTOCOL_VERSION);
        }

        Ok(SocketOptions {
            endpoint,
            connect: self.connect_options.clone(),
        })
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("token", &"<redacted>")
            .field("api_url", &self.api_url)
            .field("network", &self.network)
            .field("connect_options", &self.connect_options)
            .field("on_error", &self.on_error.is_some())
            .field("log_level", &self.log_level)
            .field("on_event", &self.on_event.is_some())
            .finish()
    }
}

/// Fluent builder for [`ClientConfig`].
///
/// # Validation
///
/// `build()` rejects an empty token and endpoints that cannot be resolved.
///
/// # Example
///
/// ```rust
/// use opensea_stream::{ClientConfig, LogLevel, Network};
///
/// let config = ClientConfig::builder("api-key")
///     .with_network(Network::Testnet)
///     .with_log_level(LogLevel::Warn)
///     .build()
///     .unwrap();
/// assert_eq!(config.base_url(), "wss://testnets-stream.openseabeta.com/socket");
/// ```
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.config.api_url = Some(api_url.into());
        self
    }

    pub fn with_network(mut self, network: Network) -> Self {
        self.config.network = network;
        self
    }

    pub fn with_connect_options(mut self, options: ConnectOptions) -> Self {
        self.config.connect_options = options;
        self
    }

    pub fn with_on_error<F>(mut self, handler: F) -> Self
    where
        F: Fn(&crate::transport::ConnectionError) + Send + Sync + 'static,
    {
        self.config.on_error = Some(std::sync::Arc::new(handler));
        self
    }

    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.config.log_level = level;
        self
    }

    /// Install the event middleware; see [`EventRouter`](crate::EventRouter).
    pub fn with_on_event<F>(mut self, middleware: F) -> Self
    where
        F: Fn(&crate::Topic, stream_types::EventType, &stream_types::StreamEvent) -> bool
            + Send
            + Sync
            + 'static,
    {
        self.config.on_event = Some(std::sync::Arc::new(middleware));
        self
    }

    pub fn build(self) -> Result<ClientConfig> {
        if self.config.token.trim().is_empty() {
            return Err(StreamError::Configuration(
                "token must not be empty".to_string(),
            ));
        }
        self.config.socket_options()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_endpoint_for_api_url() {
        let config = ClientConfig::builder("test")
            .with_api_url("ws://localhost:1234")
            .build()
            .unwrap();

        let options = config.socket_options().unwrap();
        assert_eq!(
            options.endpoint.as_str(),
            "ws://localhost:1234/websocket?token=test&vsn=2.0.0"
        );
    }

    #[rstest]
    #[case(Network::Mainnet, "wss://stream.openseabeta.com/socket/websocket?token=key&vsn=2.0.0")]
    #[case(Network::Testnet, "wss://testnets-stream.openseabeta.com/socket/websocket?token=key&vsn=2.0.0")]
    fn test_endpoint_for_network(#[case] network: Network, #[case] expected: &str) {
        let config = ClientConfig::builder("key").with_network(network).build().unwrap();
        assert_eq!(config.socket_options().unwrap().endpoint.as_str(), expected);
    }

    #[test]
    fn test_api_url_overrides_network() {
        let config = ClientConfig::builder("key")
            .with_network(Network::Testnet)
            .with_api_url("wss://proxy.example/socket/")
            .build()
            .unwrap();
        assert_eq!(
            config.socket_options().unwrap().endpoint.as_str(),
            "wss://proxy.example/socket/websocket?token=key&vsn=2.0.0"
        );
    }

    #[test]
    fn test_extra_params_precede_version() {
        let options = ConnectOptions {
            params: vec![("client".to_string(), "rust".to_string())],
            ..ConnectOptions::default()
        };
        let config = ClientConfig::builder("key")
            .with_api_url("ws://localhost:4000/socket")
            .with_connect_options(options)
            .build()
            .unwrap();
        assert_eq!(
            config.socket_options().unwrap().endpoint.query(),
            Some("token=key&client=rust&vsn=2.0.0")
        );
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    fn test_empty_token_rejected(#[case] token: &str) {
        let err = ClientConfig::builder(token).build().unwrap_err();
        assert!(matches!(err, StreamError::Configuration(_)));
    }

    #[rstest]
    #[case("not a url")]
    #[case("ftp://stream.example/socket")]
    #[case("mailto:ops@example.com")]
    fn test_bad_endpoint_rejected(#[case] url: &str) {
        assert!(ClientConfig::builder("key").with_api_url(url).build().is_err());
    }

    #[test]
    fn test_reconnect_schedule() {
        let options = ConnectOptions::default();
        assert_eq!(options.reconnect_after(1), Duration::from_millis(10));
        assert_eq!(options.reconnect_after(9), Duration::from_secs(2));
        assert_eq!(options.reconnect_after(10), Duration::from_secs(5));
        assert_eq!(options.reconnect_after(0), Duration::from_secs(5));
    }

    #[test]
    fn test_log_level_threshold() {
        assert!(LogLevel::Info.allows(LogLevel::Error));
        assert!(LogLevel::Info.allows(LogLevel::Info));
        assert!(!LogLevel::Warn.allows(LogLevel::Info));
        assert_eq!(LogLevel::default(), LogLevel::Info);
        assert_eq!(LogLevel::Warn as u8, 40);
    }

    #[rstest]
    #[case(LogLevel::Debug, tracing::Level::DEBUG)]
    #[case(LogLevel::Info, tracing::Level::INFO)]
    #[case(LogLevel::Warn, tracing::Level::WARN)]
    #[case(LogLevel::Error, tracing::Level::ERROR)]
    fn test_log_level_maps_to_tracing(#[case] level: LogLevel, #[case] expected: tracing::Level) {
        assert_eq!(tracing::Level::from(level), expected);
    }

    #[test]
    fn test_log_level_threshold_agrees_with_tracing_order() {
        // tracing orders levels by verbosity, so a stricter threshold is a smaller Level.
        for threshold in [LogLevel::Debug, LogLevel::Info, LogLevel::Warn, LogLevel::Error] {
            for level in [LogLevel::Debug, LogLevel::Info, LogLevel::Warn, LogLevel::Error] {
                assert_eq!(
                    threshold.allows(level),
                    tracing::Level::from(level) <= tracing::Level::from(threshold)
                );
            }
        }
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = ClientConfig::new("secret-token");
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("secret-token"));
        assert!(rendered.contains("<redacted>"));
    }
}
