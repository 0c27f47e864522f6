//! Payloads of the reserved control packets.
//!
//! | Type | Direction | Payload |
//! |------|-----------|---------|
//! | `handshake` | server → client | [`Handshake`] |
//! | `close-connection` | either | [`CloseNotice`] |

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::identifiers::ConnectionId;

// ============================================================================
// Constants
// ============================================================================

/// Rejection reason when the registry is at `max_clients`.
pub const REASON_SERVER_FULL: &str = "server-full";

/// Removal reason when a client stops pinging.
pub const REASON_TIMEOUT: &str = "timeout";

/// Removal reason when the transport closes underneath an admitted client.
pub const REASON_CONNECTION_LOST: &str = "connection-lost";

/// Removal reason used by [`Server::shutdown`](crate::Server::shutdown).
pub const REASON_SERVER_SHUTDOWN: &str = "server-shutdown";

// ============================================================================
// Admission
// ============================================================================

/// Outcome of the server's admission policy for one candidate.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Admission {
    /// Whether the candidate is admitted.
    pub successful: bool,
    /// Human-readable reason, empty on plain acceptance.
    pub reason: String,
}

impl Admission {
    /// Admits the candidate.
    #[inline]
    #[must_use]
    pub fn accept() -> Self {
        Self {
            successful: true,
            reason: String::new(),
        }
    }

    /// Rejects the candidate with a reason.
    #[inline]
    #[must_use]
    pub fn reject(reason: impl Into<String>) -> Self {
        Self {
            successful: false,
            reason: reason.into(),
        }
    }
}

// ============================================================================
// Handshake
// ============================================================================

/// Payload of the `handshake` packet.
///
/// `id` is present only when `successful` is `true`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Handshake {
    /// Whether the server admitted the connection.
    pub successful: bool,

    /// Rejection reason, or whatever the admission hook supplied.
    #[serde(default)]
    pub reason: String,

    /// Id assigned to the client.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ConnectionId>,
}

impl Handshake {
    /// Builds the handshake reply for an admission decision.
    #[must_use]
    pub fn from_admission(admission: Admission, id: ConnectionId) -> Self {
        Self {
            id: admission.successful.then_some(id),
            successful: admission.successful,
            reason: admission.reason,
        }
    }

    /// Reads a handshake out of a packet payload.
    ///
    /// Returns `None` when the payload is missing or malformed.
    #[must_use]
    pub fn from_data(data: Option<&Value>) -> Option<Self> {
        data.and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    /// Converts the handshake to a packet payload.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut value = serde_json::json!({
            "successful": self.successful,
            "reason": self.reason,
        });
        if let Some(id) = self.id {
            value["id"] = Value::from(id.as_u64());
        }
        value
    }
}

// ============================================================================
// CloseNotice
// ============================================================================

/// Payload of the `close-connection` packet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseNotice {
    /// Why the sender is disconnecting.
    pub reason: String,
}

impl CloseNotice {
    /// Creates a notice.
    #[inline]
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// Converts the notice to a packet payload.
    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::json!({ "reason": self.reason })
    }
}

// ============================================================================
// Tests
// ============================================================================
