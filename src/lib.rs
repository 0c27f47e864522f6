//! WS Session - keepalive-monitored WebSocket sessions.
//!
//! One server, many clients, JSON packets over WebSocket text frames.
//!
//! # Architecture
//!
//! Every message is a packet envelope `{ "type": ..., "data": ... }`. Four
//! types are reserved and handled by the session layer; everything else is
//! handed to the application unchanged:
//!
//! - **`handshake`**: the server's admission reply, carrying the client id
//! - **`ping` / `pong`**: client-driven liveness check and reply
//! - **`close-connection`**: either side announcing it is leaving
//!
//! Key design principles:
//!
//! - The server registry is the single source of truth for membership
//! - Admission never lets the registry grow past `max_clients`
//! - Silent clients are evicted after `timeout_delay`
//! - Session logic talks to a [`Transport`] trait, so tests run in memory
//!
//! # Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use ws_session::{Client, ClientConfig, Result, Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let server = Server::listen(
//!         ServerConfig::builder()
//!             .port(8082)
//!             .max_clients(16)
//!             .on_packet(|connection, packet| {
//!                 println!("{} sent {}", connection.id(), packet.kind);
//!             })
//!             .build()?,
//!     )
//!     .await?;
//!
//!     let client = Client::connect(
//!         ClientConfig::builder()
//!             .server("127.0.0.1", 8082)
//!             .ping_interval(Duration::from_secs(1))
//!             .on_connection_successful(|handshake| {
//!                 println!("admitted as {:?}", handshake.id);
//!             })
//!             .build()?,
//!     )?;
//!
//!     tokio::time::sleep(Duration::from_secs(2)).await;
//!     client.send_packet("chat", Some(serde_json::json!("hello")))?;
//!
//!     server.broadcast("news", None, &[], None);
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | Outbound session: [`Client`], [`ClientConfig`] |
//! | [`server`] | Registry and admission: [`Server`], [`ServerConnection`] |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Connection ids |
//! | [`keepalive`] | Restartable expiry timer |
//! | [`protocol`] | Packet envelope and control payloads |
//! | [`transport`] | Transport trait, WebSocket and in-memory transports |

// ============================================================================
// Modules
// ============================================================================

/// Client side of the protocol.
///
/// Use [`ClientConfig::builder()`] then [`Client::connect`].
pub mod client;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Connection identifiers.
pub mod identifiers;

/// Restartable one-shot timer used for ping, timeout and abort windows.
pub mod keepalive;

/// Packet envelope and reserved control payloads.
pub mod protocol;

/// Server side of the protocol.
///
/// Use [`ServerConfig::builder()`] then [`Server::listen`].
pub mod server;

/// Transport abstraction.
///
/// The WebSocket transport is used by default; the in-memory transport
/// backs tests.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Client types
pub use client::{Client, ClientConfig, ClientConfigBuilder};

// Server types
pub use server::{BroadcastOutcome, Server, ServerConfig, ServerConfigBuilder, ServerConnection};

// Error types
pub use error::{Error, Result, SessionErrorKind};

// Identifier types
pub use identifiers::ConnectionId;

// Protocol types
pub use protocol::{Admission, CloseNotice, Handshake, Packet};

// Transport types
pub use transport::{MemoryTransport, Transport, TransportState, WebSocketTransport};
