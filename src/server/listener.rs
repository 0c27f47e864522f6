//! WebSocket listener feeding accepted sockets into a [`Server`].
//!
//! # Connection Flow
//!
//! ```text
//! TcpListener::accept ─▶ accept_async ─▶ Server::accept ─▶ transport loop
//!                                         (handshake)        │
//!                                                            ├─ text ─▶ Server::handle_message
//!                                                            └─ close ─▶ Server::remove_user("connection-lost")
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Weak};
use std::time::Duration;

use serde_json::json;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::protocol::REASON_CONNECTION_LOST;
use crate::transport::websocket;
use crate::transport::{TransportEvents, TransportState, WebSocketTransport};

use super::config::ServerConfig;
use super::connection::ServerConnection;
use super::core::{Server, ServerShared};

// ============================================================================
// Constants
// ============================================================================

/// How often the accept loop checks the shutdown flag.
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(100);

// ============================================================================
// Server - Listener
// ============================================================================

impl Server {
    /// Binds a WebSocket listener and starts accepting connections.
    ///
    /// The ready callback runs once the socket is bound.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`](crate::Error::Io) if binding fails.
    pub async fn listen(config: ServerConfig) -> Result<Self> {
        let addr = SocketAddr::new(config.bind_ip, config.port);
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;

        debug!(%local_addr, "WebSocket server bound");

        let server = Self::new(config);
        *server.inner.local_addr.lock() = Some(local_addr);

        let accept = server.clone();
        tokio::spawn(async move {
            accept.accept_loop(listener).await;
        });

        info!(port = local_addr.port(), "Server running");
        (server.inner.config.on_server_ready)();

        Ok(server)
    }

    /// Returns the bound address, if the server is listening.
    #[inline]
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.inner.local_addr.lock()
    }

    /// Returns the bound port, if the server is listening.
    #[inline]
    #[must_use]
    pub fn port(&self) -> Option<u16> {
        self.local_addr().map(|addr| addr.port())
    }

    /// Returns a URL clients on this host can connect to.
    ///
    /// Format: `ws://{ip}:{port}`, with an unspecified bind address
    /// replaced by `127.0.0.1`.
    #[must_use]
    pub fn ws_url(&self) -> Option<String> {
        self.local_addr().map(|addr| {
            let ip = if addr.ip().is_unspecified() {
                IpAddr::V4(Ipv4Addr::LOCALHOST)
            } else {
                addr.ip()
            };
            format!("ws://{}", SocketAddr::new(ip, addr.port()))
        })
    }
}

// ============================================================================
// Server - Accept Loop
// ============================================================================

impl Server {
    async fn accept_loop(self, listener: TcpListener) {
        debug!("Accept loop started");

        loop {
            if self.inner.shutdown.load(Ordering::SeqCst) {
                debug!("Accept loop shutting down");
                break;
            }

            // Bounded wait so the shutdown flag is seen
            match timeout(ACCEPT_POLL_INTERVAL, listener.accept()).await {
                Ok(Ok((stream, addr))) => {
                    let server = self.clone();
                    tokio::spawn(async move {
                        if let Err(e) = server.handle_socket(stream, addr).await {
                            warn!(error = %e, ?addr, "Connection handling failed");
                        }
                    });
                }
                Ok(Err(e)) => {
                    error!(error = %e, "Accept failed");
                }
                Err(_) => continue,
            }
        }

        debug!("Accept loop terminated");
    }

    /// # Errors
    ///
    /// Returns [`Error::WebSocket`](crate::Error::WebSocket) if the upgrade
    /// handshake fails.
    async fn handle_socket(&self, stream: TcpStream, addr: SocketAddr) -> Result<()> {
        debug!(?addr, "New TCP connection");

        let ws_stream = tokio_tungstenite::accept_async(stream).await?;

        let (transport, outgoing_rx) = WebSocketTransport::new(TransportState::Open);
        let state = transport.state_cell();

        let connection = self.accept(Arc::new(transport), addr.ip().to_string());
        let events = ConnectionEvents {
            server: Arc::downgrade(&self.inner),
            connection,
        };

        websocket::run(ws_stream, outgoing_rx, state, &events).await;

        debug!(?addr, "Connection finished");
        Ok(())
    }
}

// ============================================================================
// ConnectionEvents
// ============================================================================

/// Routes one socket's events into the server.
///
/// `connection` is `None` for a rejected socket, whose loop only drains
/// the handshake and close.
struct ConnectionEvents {
    server: Weak<ServerShared>,
    connection: Option<ServerConnection>,
}

impl ConnectionEvents {
    fn target(&self) -> Option<(Server, &ServerConnection)> {
        let connection = self.connection.as_ref()?;
        let shared = self.server.upgrade()?;
        Some((Server::from_shared(shared), connection))
    }
}

impl TransportEvents for ConnectionEvents {
    fn on_message(&self, text: &str) {
        if let Some((server, connection)) = self.target() {
            server.handle_message(connection, text);
        }
    }

    fn on_error(&self, message: String) {
        let id = self.connection.as_ref().map(ServerConnection::id);
        debug!(?id, error = %message, "Transport error");
    }

    fn on_close(&self) {
        if let Some((server, connection)) = self.target() {
            server.remove_user(connection, Some(json!({ "reason": REASON_CONNECTION_LOST })));
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
