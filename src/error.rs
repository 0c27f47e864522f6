//! Error types for WebSocket sessions.
//!
//! This module defines the error types used throughout the crate, plus the
//! [`SessionErrorKind`] taxonomy reported to a client's error callback.
//!
//! # Usage
//!
//! Every fallible send returns [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use ws_session::{Client, Result};
//!
//! fn greet(client: &Client) -> Result<()> {
//!     client.send_packet("chat", Some(serde_json::json!({ "text": "hi" })))?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`] |
//! | Connection | [`Error::Connection`], [`Error::ConnectionClosed`], [`Error::TransportNotOpen`], [`Error::NotConnected`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::WebSocket`] |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::transport::TransportState;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when a client or server configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// WebSocket connection failed.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// The transport's outbound side is gone.
    #[error("Connection closed")]
    ConnectionClosed,

    /// A send was attempted while the transport is not open.
    #[error("Transport is not open (state: {state})")]
    TransportNotOpen {
        /// State the transport was in.
        state: TransportState,
    },

    /// The session has not completed a successful handshake, or was closed.
    #[error("Session is not connected")]
    NotConnected,

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a transport-not-open error.
    #[inline]
    pub fn transport_not_open(state: TransportState) -> Self {
        Self::TransportNotOpen { state }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::ConnectionClosed
                | Self::TransportNotOpen { .. }
                | Self::WebSocket(_)
        )
    }

    /// Returns `true` if a packet could not be handed to the transport.
    ///
    /// These are the expected failures of a best-effort send and never
    /// affect session state.
    #[inline]
    #[must_use]
    pub fn is_send_failure(&self) -> bool {
        matches!(
            self,
            Self::ConnectionClosed
                | Self::TransportNotOpen { .. }
                | Self::NotConnected
                | Self::Json(_)
        )
    }
}

// ============================================================================
// SessionErrorKind
// ============================================================================

/// Error kinds reported to a client's `on_error` callback.
///
/// The protocol never retries on any of these; retry policy belongs to the
/// embedding application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionErrorKind {
    /// No `pong` arrived within `timeout_delay` while still connected.
    Timeout,
    /// Handshake rejected, or the transport never left `Connecting` within
    /// `abort_delay`.
    ConnectionFailed,
    /// Any other transport-level error event.
    Unknown,
}

impl SessionErrorKind {
    /// Returns the canonical upper-case name of this kind.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Timeout => "TIMEOUT",
            Self::ConnectionFailed => "CONNECTION_FAILED",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for SessionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::ErrorKind;

    #[test]
    fn test_error_display() {
        let err = Error::connection("refused");
        assert_eq!(err.to_string(), "Connection failed: refused");
    }

    #[test]
    fn test_transport_not_open_display() {
        let err = Error::transport_not_open(TransportState::Closing);
        assert_eq!(err.to_string(), "Transport is not open (state: CLOSING)");
    }

    #[test]
    fn test_is_connection_error() {
        assert!(Error::connection("test").is_connection_error());
        assert!(Error::ConnectionClosed.is_connection_error());
        assert!(Error::transport_not_open(TransportState::Closed).is_connection_error());
        assert!(!Error::config("test").is_connection_error());
        assert!(!Error::NotConnected.is_connection_error());
    }

    #[test]
    fn test_is_send_failure() {
        assert!(Error::NotConnected.is_send_failure());
        assert!(Error::ConnectionClosed.is_send_failure());
        assert!(!Error::config("bad").is_send_failure());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = IoError::new(ErrorKind::AddrInUse, "address in use");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }

    #[test]
    fn test_session_error_kind_names() {
        assert_eq!(SessionErrorKind::Timeout.to_string(), "TIMEOUT");
        assert_eq!(
            SessionErrorKind::ConnectionFailed.to_string(),
            "CONNECTION_FAILED"
        );
        assert_eq!(SessionErrorKind::Unknown.as_str(), "UNKNOWN");
    }
}
