//! Wire-level message types.
//!
//! # Protocol Overview
//!
//! | Type | Direction | Purpose |
//! |------|-----------|---------|
//! | `handshake` | Server → Client | Admit or reject the session |
//! | `ping` | Client → Server | Liveness check |
//! | `pong` | Server → Client | Check reply |
//! | `close-connection` | Either | Announce disconnect |
//!
//! Any other `type` is an application packet, passed through untouched.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `packet` | Packet envelope and control type tags |
//! | `handshake` | Control packet payloads and reasons |

// ============================================================================
// Submodules
// ============================================================================

/// Control packet payloads.
pub mod handshake;

/// Packet envelope.
pub mod packet;

// ============================================================================
// Re-exports
// ============================================================================

pub use handshake::{
    Admission, CloseNotice, Handshake, REASON_CONNECTION_LOST, REASON_SERVER_FULL,
    REASON_SERVER_SHUTDOWN, REASON_TIMEOUT,
};
pub use packet::{CLOSE_CONNECTION, ControlType, HANDSHAKE, PING, PONG, Packet};
