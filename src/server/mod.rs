//! Server side of the session protocol.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Server`] | Admission, keepalive eviction, removal, broadcast |
//! | [`ServerConnection`] | Handle to one admitted client |
//! | [`ServerConfig`] | Immutable server configuration |
//! | [`BroadcastOutcome`] | Per-recipient result of a broadcast |

// ============================================================================
// Submodules
// ============================================================================

/// Server configuration and callbacks.
pub mod config;

/// Accepted connection handle.
pub mod connection;

mod core;
mod listener;
mod registry;

// ============================================================================
// Re-exports
// ============================================================================

pub use config::{ServerConfig, ServerConfigBuilder};
pub use connection::ServerConnection;
pub use self::core::{BroadcastOutcome, Server};
