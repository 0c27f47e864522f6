//! Server configuration.
//!
//! Built once through [`ServerConfigBuilder`] by overlaying the caller's
//! choices onto the defaults below.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::error::{Error, Result};
use crate::protocol::{Admission, Packet};

use super::connection::ServerConnection;

// ============================================================================
// Constants
// ============================================================================

/// Default bind address (all interfaces).
pub const DEFAULT_BIND_IP: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);

/// Default listening port.
pub const DEFAULT_PORT: u16 = 8082;

/// Default time a client may go without pinging.
pub const DEFAULT_TIMEOUT_DELAY: Duration = Duration::from_secs(5);

// ============================================================================
// Callback Types
// ============================================================================

/// Admission hook. Returning `None` keeps the default decision.
pub type AttemptHandler = Arc<dyn Fn(&ServerConnection) -> Option<Admission> + Send + Sync>;

/// Called with an admitted connection.
pub type ConnectionHandler = Arc<dyn Fn(&ServerConnection) + Send + Sync>;

/// Called after a connection is removed, with the removal data.
pub type ClosedHandler = Arc<dyn Fn(&ServerConnection, &Value) + Send + Sync>;

/// Called once the listener is bound.
pub type ReadyHandler = Arc<dyn Fn() + Send + Sync>;

/// Called for every packet from an admitted connection.
pub type ServerPacketHandler = Arc<dyn Fn(&ServerConnection, &Packet) + Send + Sync>;

// ============================================================================
// ServerConfig
// ============================================================================

/// Immutable server configuration.
#[derive(Clone)]
pub struct ServerConfig {
    /// Address to bind the listener to.
    pub bind_ip: IpAddr,

    /// Port to listen on (0 lets the OS choose).
    pub port: u16,

    /// Capacity of the registry. `None` is unlimited.
    pub max_clients: Option<usize>,

    /// Time a client may go without sending a `ping` before eviction.
    /// `None` never evicts.
    pub timeout_delay: Option<Duration>,

    pub(crate) on_connection_attempt: AttemptHandler,
    pub(crate) on_connection: ConnectionHandler,
    pub(crate) on_connection_closed: ClosedHandler,
    pub(crate) on_server_ready: ReadyHandler,
    pub(crate) on_packet: ServerPacketHandler,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_ip: DEFAULT_BIND_IP,
            port: DEFAULT_PORT,
            max_clients: None,
            timeout_delay: Some(DEFAULT_TIMEOUT_DELAY),
            on_connection_attempt: Arc::new(|_| None),
            on_connection: Arc::new(|_| {}),
            on_connection_closed: Arc::new(|_, _| {}),
            on_server_ready: Arc::new(|| {}),
            on_packet: Arc::new(|_, _| {}),
        }
    }
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("bind_ip", &self.bind_ip)
            .field("port", &self.port)
            .field("max_clients", &self.max_clients)
            .field("timeout_delay", &self.timeout_delay)
            .finish_non_exhaustive()
    }
}

impl ServerConfig {
    /// Creates a builder starting from the defaults.
    #[inline]
    #[must_use]
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::new()
    }
}

// ============================================================================
// ServerConfigBuilder
// ============================================================================

/// Fluent builder for [`ServerConfig`].
#[derive(Debug, Default, Clone)]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    /// Creates a builder holding the defaults.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the bind address.
    #[inline]
    #[must_use]
    pub fn bind_ip(mut self, ip: IpAddr) -> Self {
        self.config.bind_ip = ip;
        self
    }

    /// Sets the listening port.
    #[inline]
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Caps the number of simultaneously admitted clients.
    #[inline]
    #[must_use]
    pub fn max_clients(mut self, max: usize) -> Self {
        self.config.max_clients = Some(max);
        self
    }

    /// Removes the client cap.
    #[inline]
    #[must_use]
    pub fn unlimited_clients(mut self) -> Self {
        self.config.max_clients = None;
        self
    }

    /// Sets the ping silence allowed before eviction.
    #[inline]
    #[must_use]
    pub fn timeout_delay(mut self, delay: Duration) -> Self {
        self.config.timeout_delay = Some(delay);
        self
    }

    /// Never evicts silent clients.
    #[inline]
    #[must_use]
    pub fn no_timeout(mut self) -> Self {
        self.config.timeout_delay = None;
        self
    }

    /// Sets the admission hook.
    ///
    /// Runs only when capacity allows. Return `Some` to override the
    /// decision.
    #[must_use]
    pub fn on_connection_attempt(
        mut self,
        handler: impl Fn(&ServerConnection) -> Option<Admission> + Send + Sync + 'static,
    ) -> Self {
        self.config.on_connection_attempt = Arc::new(handler);
        self
    }

    /// Sets the callback for admitted connections.
    #[must_use]
    pub fn on_connection(
        mut self,
        handler: impl Fn(&ServerConnection) + Send + Sync + 'static,
    ) -> Self {
        self.config.on_connection = Arc::new(handler);
        self
    }

    /// Sets the callback for removed connections.
    #[must_use]
    pub fn on_connection_closed(
        mut self,
        handler: impl Fn(&ServerConnection, &Value) + Send + Sync + 'static,
    ) -> Self {
        self.config.on_connection_closed = Arc::new(handler);
        self
    }

    /// Sets the callback for the listener becoming ready.
    #[must_use]
    pub fn on_server_ready(mut self, handler: impl Fn() + Send + Sync + 'static) -> Self {
        self.config.on_server_ready = Arc::new(handler);
        self
    }

    /// Sets the callback for every received packet.
    #[must_use]
    pub fn on_packet(
        mut self,
        handler: impl Fn(&ServerConnection, &Packet) + Send + Sync + 'static,
    ) -> Self {
        self.config.on_packet = Arc::new(handler);
        self
    }

    /// Validates and returns the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a zero timeout delay is set.
    pub fn build(self) -> Result<ServerConfig> {
        if self.config.timeout_delay == Some(Duration::ZERO) {
            return Err(Error::config(
                "timeout_delay must be non-zero. Use .no_timeout() to disable eviction.",
            ));
        }

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
        let config = ServerConfig::default();
        assert_eq!(config.port, 8082);
        assert_eq!(config.max_clients, None);
        assert_eq!(config.timeout_delay, Some(Duration::from_secs(5)));
        assert!(config.bind_ip.is_unspecified());
    }

    #[test]
    fn test_builder_overlays_defaults() {
        let config = ServerConfig::builder()
            .port(0)
            .max_clients(3)
            .build()
            .expect("valid config");

        assert_eq!(config.port, 0);
        assert_eq!(config.max_clients, Some(3));
        assert_eq!(config.timeout_delay, Some(DEFAULT_TIMEOUT_DELAY));
    }

    #[test]
    fn test_unlimited_and_no_timeout() {
        let config = ServerConfig::builder()
            .max_clients(3)
            .unlimited_clients()
            .no_timeout()
            .build()
            .expect("valid config");

        assert_eq!(config.max_clients, None);
        assert_eq!(config.timeout_delay, None);
    }

    #[test]
    fn test_build_rejects_zero_timeout() {
        let result = ServerConfig::builder().timeout_delay(Duration::ZERO).build();
        assert!(matches!(result, Err(Error::Config { .. })));
    }
}
