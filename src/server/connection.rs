//! One accepted client, as seen by the server.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde_json::Value;
use tracing::trace;

use crate::error::Result;
use crate::identifiers::ConnectionId;
use crate::keepalive::KeepaliveTimer;
use crate::protocol::Packet;
use crate::transport::{Transport, TransportState};

// ============================================================================
// ServerConnection
// ============================================================================

struct ConnectionInner {
    id: ConnectionId,
    remote_address: String,
    transport: Arc<dyn Transport>,
    connected: AtomicBool,
    timeout_timer: KeepaliveTimer,
}

/// Handle to an accepted connection.
///
/// Cheap to clone. Two handles are equal when they refer to the same id.
/// The server's registry owns membership; a handle outliving its removal
/// can still be inspected but is no longer `connected`.
#[derive(Clone)]
pub struct ServerConnection {
    inner: Arc<ConnectionInner>,
}

impl fmt::Debug for ServerConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConnection")
            .field("id", &self.inner.id)
            .field("remote_address", &self.inner.remote_address)
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

impl PartialEq for ServerConnection {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for ServerConnection {}

impl ServerConnection {
    pub(crate) fn new(
        id: ConnectionId,
        remote_address: String,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            inner: Arc::new(ConnectionInner {
                id,
                remote_address,
                transport,
                connected: AtomicBool::new(false),
                timeout_timer: KeepaliveTimer::new(),
            }),
        }
    }

    /// Returns the id assigned at connect time.
    #[inline]
    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.inner.id
    }

    /// Returns the peer address.
    #[inline]
    #[must_use]
    pub fn remote_address(&self) -> &str {
        &self.inner.remote_address
    }

    /// Returns `true` while the connection is a registry member.
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    /// Returns the transport state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> TransportState {
        self.inner.transport.state()
    }

    /// Sends a packet to this client.
    ///
    /// # Errors
    ///
    /// - [`Error::Json`](crate::Error::Json) if the payload cannot be serialized
    /// - Any error of [`Transport::send`]
    pub fn send_packet(&self, kind: &str, data: Option<Value>) -> Result<()> {
        let text = Packet::new(kind, data).encode()?;
        trace!(id = %self.inner.id, kind, "[SEND]");
        self.inner.transport.send(text)
    }

    /// Sends an already-encoded packet.
    pub(crate) fn send_text(&self, text: String) -> Result<()> {
        self.inner.transport.send(text)
    }

    pub(crate) fn set_connected(&self, connected: bool) {
        self.inner.connected.store(connected, Ordering::SeqCst);
    }

    pub(crate) fn close_transport(&self) {
        self.inner.transport.close();
    }

    /// Restarts the silence window.
    pub(crate) fn restart_timeout<F>(&self, timeout: Option<Duration>, on_expire: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.inner.timeout_timer.rearm(timeout, on_expire);
    }

    pub(crate) fn cancel_timeout(&self) {
        self.inner.timeout_timer.disarm();
    }

    /// Returns `true` while a silence window is running.
    #[inline]
    #[must_use]
    pub fn is_timeout_armed(&self) -> bool {
        self.inner.timeout_timer.is_armed()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::transport::MemoryTransport;

    #[test]
    fn test_send_packet_reaches_transport() {
        let transport = MemoryTransport::open();
        let connection =
            ServerConnection::new(ConnectionId::from_u64(1), "127.0.0.1".into(), transport.clone());

        connection.send_packet("pong", None).expect("send");
        assert_eq!(transport.sent(), vec![r#"{"type":"pong"}"#.to_string()]);
    }

    #[test]
    fn test_equality_by_id() {
        let a = ServerConnection::new(
            ConnectionId::from_u64(1),
            "a".into(),
            MemoryTransport::open(),
        );
        let b = ServerConnection::new(
            ConnectionId::from_u64(2),
            "b".into(),
            MemoryTransport::open(),
        );

        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn test_starts_disconnected() {
        let connection = ServerConnection::new(
            ConnectionId::from_u64(0),
            "x".into(),
            MemoryTransport::open(),
        );
        assert!(!connection.is_connected());
        assert!(!connection.is_timeout_armed());
    }
}
