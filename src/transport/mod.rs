//! Transport capability consumed by sessions.
//!
//! The protocol layer needs very little from the underlying message stream:
//! send a text message, close, and report a [`TransportState`]. Inbound
//! events (open, message, error, close) flow the other way, by calling the
//! session's `handle_*` methods.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────┐  Transport::send   ┌──────────────────┐      WebSocket
//! │ Client / Server│───────────────────►│ WebSocketTransport│◄────────────────►
//! │   session      │◄───────────────────│  + socket loop    │
//! └────────────────┘  handle_message    └──────────────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `websocket` | tokio-tungstenite transport and socket event loop |
//! | `memory` | In-memory transport recording outbound messages |

// ============================================================================
// Submodules
// ============================================================================

/// In-memory transport.
pub mod memory;

/// WebSocket transport and event loop.
pub mod websocket;

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use crate::error::Result;

// ============================================================================
// Re-exports
// ============================================================================

pub use memory::MemoryTransport;
pub use websocket::WebSocketTransport;

// ============================================================================
// TransportState
// ============================================================================

/// Transport-level connection state, in WebSocket `readyState` order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TransportState {
    /// Opening, not yet usable.
    Connecting = 0,
    /// Open and able to send.
    Open = 1,
    /// Close requested.
    Closing = 2,
    /// Closed.
    Closed = 3,
}

impl TransportState {
    #[inline]
    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Connecting,
            1 => Self::Open,
            2 => Self::Closing,
            _ => Self::Closed,
        }
    }
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Connecting => "CONNECTING",
            Self::Open => "OPEN",
            Self::Closing => "CLOSING",
            Self::Closed => "CLOSED",
        })
    }
}

// ============================================================================
// AtomicTransportState
// ============================================================================

/// [`TransportState`] shared between a transport handle and its event loop.
#[derive(Debug)]
pub(crate) struct AtomicTransportState(AtomicU8);

impl AtomicTransportState {
    pub(crate) const fn new(state: TransportState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub(crate) fn load(&self) -> TransportState {
        TransportState::from_u8(self.0.load(Ordering::SeqCst))
    }

    pub(crate) fn store(&self, state: TransportState) {
        self.0.store(state as u8, Ordering::SeqCst);
    }

    /// Moves from `current` to `next`, returning `false` if the state was
    /// something else.
    pub(crate) fn transition(&self, current: TransportState, next: TransportState) -> bool {
        self.0
            .compare_exchange(current as u8, next as u8, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

// ============================================================================
// Transport
// ============================================================================

/// Outbound half of a message-oriented, full-duplex connection.
///
/// Implementations must not block: `send` hands the message off and returns.
pub trait Transport: Send + Sync + 'static {
    /// Queues one text message.
    ///
    /// # Errors
    ///
    /// - [`Error::TransportNotOpen`](crate::Error::TransportNotOpen) unless
    ///   the state is [`TransportState::Open`]
    /// - [`Error::ConnectionClosed`](crate::Error::ConnectionClosed) if the
    ///   connection went away
    fn send(&self, message: String) -> Result<()>;

    /// Starts closing the connection. Idempotent.
    fn close(&self);

    /// Returns the current state.
    fn state(&self) -> TransportState;
}

// ============================================================================
// TransportEvents
// ============================================================================

/// Inbound side of a transport, driven by a socket event loop.
pub(crate) trait TransportEvents: Send + Sync {
    /// A text message arrived.
    fn on_message(&self, text: &str);

    /// The transport reported an error. `on_close` follows.
    fn on_error(&self, detail: String);

    /// The transport closed.
    fn on_close(&self);
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_roundtrip_through_atomic() {
        let state = AtomicTransportState::new(TransportState::Connecting);
        assert_eq!(state.load(), TransportState::Connecting);

        assert!(state.transition(TransportState::Connecting, TransportState::Open));
        assert!(!state.transition(TransportState::Connecting, TransportState::Open));
        assert_eq!(state.load(), TransportState::Open);

        state.store(TransportState::Closed);
        assert_eq!(state.load(), TransportState::Closed);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(TransportState::Open.to_string(), "OPEN");
        assert_eq!(TransportState::Connecting.to_string(), "CONNECTING");
    }
}
