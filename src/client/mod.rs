//! Client side of the session protocol.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Client`] | One outbound session: handshake, keepalive, send/receive |
//! | [`ClientConfig`] | Immutable session configuration |
//! | [`ClientConfigBuilder`] | Fluent configuration builder |

// ============================================================================
// Submodules
// ============================================================================

/// Client configuration and callbacks.
pub mod config;

/// Client session state machine.
pub mod session;

// ============================================================================
// Re-exports
// ============================================================================

pub use config::{ClientConfig, ClientConfigBuilder};
pub use session::Client;
