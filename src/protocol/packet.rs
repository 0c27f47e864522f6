//! The packet envelope.
//!
//! Every message on the wire is one JSON object:
//!
//! ```json
//! { "type": "<string>", "data": <optional any> }
//! ```
//!
//! `type` is always present. `data` is omitted (never `null`) when a packet
//! carries no payload.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

// ============================================================================
// Constants
// ============================================================================

/// Type tag of the server's admission reply.
pub const HANDSHAKE: &str = "handshake";

/// Type tag of a client liveness check.
pub const PING: &str = "ping";

/// Type tag of the server's reply to [`PING`].
pub const PONG: &str = "pong";

/// Type tag of an explicit close notification.
pub const CLOSE_CONNECTION: &str = "close-connection";

// ============================================================================
// Packet
// ============================================================================

/// A typed envelope exchanged between client and server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Packet {
    /// Type tag, either a protocol control type or an application type.
    #[serde(rename = "type")]
    pub kind: String,

    /// Optional payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Packet {
    /// Creates a packet.
    #[inline]
    #[must_use]
    pub fn new(kind: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            kind: kind.into(),
            data,
        }
    }

    /// Parses a packet from its JSON text form.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`](crate::Error::Json) if the text is not a JSON
    /// object with a string `type`.
    pub fn decode(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Parses any JSON text into a packet, tolerating a malformed envelope.
    ///
    /// Used for inbound traffic, where every JSON message reaches the packet
    /// callback. See [`Packet::from_value`] for how a bad envelope is read.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`](crate::Error::Json) only if the text is not JSON.
    pub fn decode_lenient(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        Ok(Self::from_value(value))
    }

    /// Reads a packet out of an arbitrary JSON value.
    ///
    /// A missing `type` becomes an empty tag and a non-string `type` its
    /// JSON text, so neither can match a control type. A value that is not
    /// an object becomes the payload of a packet with an empty tag.
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(mut fields) => {
                let kind = match fields.remove("type") {
                    Some(Value::String(kind)) => kind,
                    Some(other) => other.to_string(),
                    None => String::new(),
                };
                let data = fields.remove("data").filter(|data| !data.is_null());
                Self { kind, data }
            }
            other => Self {
                kind: String::new(),
                data: Some(other),
            },
        }
    }

    /// Serializes the packet to its JSON text form.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`](crate::Error::Json) if the payload cannot be
    /// serialized.
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Returns the protocol control type, or `None` for application packets.
    #[inline]
    #[must_use]
    pub fn control(&self) -> Option<ControlType> {
        ControlType::from_kind(&self.kind)
    }
}

// ============================================================================
// ControlType
// ============================================================================

/// The closed set of packet types the protocol layer acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlType {
    /// Server to client admission reply.
    Handshake,
    /// Client to server liveness check.
    Ping,
    /// Server to client check reply.
    Pong,
    /// Either direction: the sender is going away.
    CloseConnection,
}

impl ControlType {
    /// Maps a type tag to a control type.
    #[must_use]
    pub fn from_kind(kind: &str) -> Option<Self> {
        match kind {
            HANDSHAKE => Some(Self::Handshake),
            PING => Some(Self::Ping),
            PONG => Some(Self::Pong),
            CLOSE_CONNECTION => Some(Self::CloseConnection),
            _ => None,
        }
    }

    /// Returns the wire type tag.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Handshake => HANDSHAKE,
            Self::Ping => PING,
            Self::Pong => PONG,
            Self::CloseConnection => CLOSE_CONNECTION,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
