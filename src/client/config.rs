//! Client configuration.
//!
//! A [`ClientConfig`] is built once, through [`ClientConfigBuilder`], by
//! overlaying the caller's choices onto the documented defaults. It is
//! immutable afterwards.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use ws_session::ClientConfig;
//!
//! let config = ClientConfig::builder()
//!     .server("127.0.0.1", 8082)
//!     .ping_interval(Duration::from_secs(1))
//!     .timeout_delay(Duration::from_millis(500))
//!     .on_error(|kind, detail| eprintln!("{kind}: {detail:?}"))
//!     .build()?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::error::{Error, Result, SessionErrorKind};
use crate::protocol::{Handshake, Packet};

// ============================================================================
// Constants
// ============================================================================

/// Default server host.
pub const DEFAULT_SERVER_IP: &str = "localhost";

/// Default server port.
pub const DEFAULT_SERVER_PORT: u16 = 49111;

/// Default time between pings.
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(5);

/// Default time allowed in `Connecting` before reporting failure.
pub const DEFAULT_ABORT_DELAY: Duration = Duration::from_secs(10);

/// Default time to wait for a `pong`.
pub const DEFAULT_TIMEOUT_DELAY: Duration = Duration::from_secs(10);

// ============================================================================
// Callback Types
// ============================================================================

/// Called when the transport opens or closes.
pub type LifecycleHandler = Arc<dyn Fn() + Send + Sync>;

/// Called with an error kind and optional detail.
pub type ErrorHandler = Arc<dyn Fn(SessionErrorKind, Option<String>) + Send + Sync>;

/// Called for every packet received from the server.
pub type PacketHandler = Arc<dyn Fn(&Packet) + Send + Sync>;

/// Called with the handshake payload once the server admits the session.
pub type HandshakeHandler = Arc<dyn Fn(&Handshake) + Send + Sync>;

// ============================================================================
// ClientConfig
// ============================================================================

/// Immutable client session configuration.
#[derive(Clone)]
pub struct ClientConfig {
    /// Server host name or address.
    pub server_ip: String,

    /// Server port.
    pub server_port: u16,

    /// Time between pings. `None` never pings.
    pub ping_interval: Option<Duration>,

    /// Time allowed in `Connecting` before `CONNECTION_FAILED` is reported.
    pub abort_delay: Duration,

    /// Time to wait for a `pong`. `None` never times out.
    pub timeout_delay: Option<Duration>,

    /// Log every received packet type at debug level.
    pub log_incoming_packets: bool,

    /// Log every sent packet type at debug level.
    pub log_outgoing_packets: bool,

    pub(crate) on_open: LifecycleHandler,
    pub(crate) on_close: LifecycleHandler,
    pub(crate) on_error: ErrorHandler,
    pub(crate) on_packet: PacketHandler,
    pub(crate) on_connection_successful: HandshakeHandler,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_ip: DEFAULT_SERVER_IP.to_string(),
            server_port: DEFAULT_SERVER_PORT,
            ping_interval: Some(DEFAULT_PING_INTERVAL),
            abort_delay: DEFAULT_ABORT_DELAY,
            timeout_delay: Some(DEFAULT_TIMEOUT_DELAY),
            log_incoming_packets: true,
            log_outgoing_packets: true,
            on_open: Arc::new(|| {}),
            on_close: Arc::new(|| {}),
            on_error: Arc::new(|_, _| {}),
            on_packet: Arc::new(|_| {}),
            on_connection_successful: Arc::new(|_| {}),
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("server_ip", &self.server_ip)
            .field("server_port", &self.server_port)
            .field("ping_interval", &self.ping_interval)
            .field("abort_delay", &self.abort_delay)
            .field("timeout_delay", &self.timeout_delay)
            .field("log_incoming_packets", &self.log_incoming_packets)
            .field("log_outgoing_packets", &self.log_outgoing_packets)
            .finish_non_exhaustive()
    }
}

impl ClientConfig {
    /// Creates a builder starting from the defaults.
    #[inline]
    #[must_use]
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    /// Returns the WebSocket URL of the configured server.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if host and port do not form a valid URL.
    pub fn ws_url(&self) -> Result<Url> {
        let raw = format!("ws://{}:{}", self.server_ip, self.server_port);
        Url::parse(&raw).map_err(|e| Error::config(format!("Invalid server address {raw}: {e}")))
    }
}

// ============================================================================
// ClientConfigBuilder
// ============================================================================

/// Fluent builder for [`ClientConfig`].
#[derive(Debug, Default, Clone)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Creates a builder holding the defaults.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the server host and port.
    #[must_use]
    pub fn server(mut self, ip: impl Into<String>, port: u16) -> Self {
        self.config.server_ip = ip.into();
        self.config.server_port = port;
        self
    }

    /// Sets the time between pings.
    #[inline]
    #[must_use]
    pub fn ping_interval(mut self, interval: Duration) -> Self {
        self.config.ping_interval = Some(interval);
        self
    }

    /// Disables pinging entirely.
    #[inline]
    #[must_use]
    pub fn never_ping(mut self) -> Self {
        self.config.ping_interval = None;
        self
    }

    /// Sets how long to wait in `Connecting` before reporting failure.
    #[inline]
    #[must_use]
    pub fn abort_delay(mut self, delay: Duration) -> Self {
        self.config.abort_delay = delay;
        self
    }

    /// Sets how long to wait for a `pong`.
    #[inline]
    #[must_use]
    pub fn timeout_delay(mut self, delay: Duration) -> Self {
        self.config.timeout_delay = Some(delay);
        self
    }

    /// Disables the pong timeout.
    #[inline]
    #[must_use]
    pub fn no_timeout(mut self) -> Self {
        self.config.timeout_delay = None;
        self
    }

    /// Toggles per-packet logging for received packets.
    #[inline]
    #[must_use]
    pub fn log_incoming_packets(mut self, enabled: bool) -> Self {
        self.config.log_incoming_packets = enabled;
        self
    }

    /// Toggles per-packet logging for sent packets.
    #[inline]
    #[must_use]
    pub fn log_outgoing_packets(mut self, enabled: bool) -> Self {
        self.config.log_outgoing_packets = enabled;
        self
    }

    /// Sets the callback for the transport opening.
    #[must_use]
    pub fn on_open(mut self, handler: impl Fn() + Send + Sync + 'static) -> Self {
        self.config.on_open = Arc::new(handler);
        self
    }

    /// Sets the callback for the transport closing.
    #[must_use]
    pub fn on_close(mut self, handler: impl Fn() + Send + Sync + 'static) -> Self {
        self.config.on_close = Arc::new(handler);
        self
    }

    /// Sets the error callback.
    #[must_use]
    pub fn on_error(
        mut self,
        handler: impl Fn(SessionErrorKind, Option<String>) + Send + Sync + 'static,
    ) -> Self {
        self.config.on_error = Arc::new(handler);
        self
    }

    /// Sets the callback for every received packet.
    #[must_use]
    pub fn on_packet(mut self, handler: impl Fn(&Packet) + Send + Sync + 'static) -> Self {
        self.config.on_packet = Arc::new(handler);
        self
    }

    /// Sets the callback for a successful handshake.
    #[must_use]
    pub fn on_connection_successful(
        mut self,
        handler: impl Fn(&Handshake) + Send + Sync + 'static,
    ) -> Self {
        self.config.on_connection_successful = Arc::new(handler);
        self
    }

    /// Validates and returns the configuration.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if a zero ping interval is set
    /// - [`Error::Config`] if the server address does not form a valid URL
    pub fn build(self) -> Result<ClientConfig> {
        if self.config.ping_interval == Some(Duration::ZERO) {
            return Err(Error::config(
                "ping_interval must be non-zero. Use .never_ping() to disable pinging.",
            ));
        }
        self.config.ws_url()?;

        Ok(self.config)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.server_ip, "localhost");
        assert_eq!(config.server_port, 49111);
        assert_eq!(config.ping_interval, Some(Duration::from_secs(5)));
        assert_eq!(config.abort_delay, Duration::from_secs(10));
        assert_eq!(config.timeout_delay, Some(Duration::from_secs(10)));
        assert!(config.log_incoming_packets);
        assert!(config.log_outgoing_packets);
    }

    #[test]
    fn test_builder_overlays_defaults() {
        let config = ClientConfig::builder()
            .server("10.0.0.2", 9000)
            .never_ping()
            .log_outgoing_packets(false)
            .build()
            .expect("valid config");

        assert_eq!(config.server_ip, "10.0.0.2");
        assert_eq!(config.server_port, 9000);
        assert_eq!(config.ping_interval, None);
        assert_eq!(config.timeout_delay, Some(DEFAULT_TIMEOUT_DELAY));
        assert!(config.log_incoming_packets);
        assert!(!config.log_outgoing_packets);
    }

    #[test]
    fn test_ws_url() {
        let config = ClientConfig::builder()
            .server("127.0.0.1", 8082)
            .build()
            .expect("valid config");
        assert_eq!(config.ws_url().expect("url").as_str(), "ws://127.0.0.1:8082/");
    }

    #[test]
    fn test_build_rejects_bad_host() {
        let result = ClientConfig::builder().server("bad host", 80).build();
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn test_build_rejects_zero_interval() {
        let result = ClientConfig::builder().ping_interval(Duration::ZERO).build();
        let err = result.unwrap_err();
        assert!(err.to_string().contains("ping_interval"));
    }
}
