//! Type-safe connection identifiers.
//!
//! A [`ConnectionId`] is handed out by a server's [`IdAllocator`] the moment
//! a transport connects, before admission runs. Ids are monotonic and never
//! reused for the lifetime of the allocator, even after the connection that
//! held one is removed.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

// ============================================================================
// ConnectionId
// ============================================================================

/// Identifier assigned by the server to one accepted transport connection.
///
/// Serializes as a bare integer, which is how it appears in the `id` field of
/// a successful handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates an identifier from its raw value.
    #[inline]
    #[must_use]
    pub const fn from_u64(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// IdAllocator
// ============================================================================

/// Monotonic source of [`ConnectionId`]s, starting at zero.
#[derive(Debug, Default)]
pub struct IdAllocator {
    next: AtomicU64,
}

impl IdAllocator {
    /// Creates an allocator whose first id is `0`.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next: AtomicU64::new(0),
        }
    }

    /// Returns a fresh id.
    #[inline]
    pub fn next_id(&self) -> ConnectionId {
        ConnectionId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocator_is_monotonic() {
        let allocator = IdAllocator::new();
        let first = allocator.next_id();
        let second = allocator.next_id();
        let third = allocator.next_id();

        assert_eq!(first.as_u64(), 0);
        assert!(first < second && second < third);
    }

    #[test]
    fn test_connection_id_serializes_as_integer() {
        let id = ConnectionId::from_u64(42);
        assert_eq!(serde_json::to_string(&id).expect("serialize"), "42");

        let parsed: ConnectionId = serde_json::from_str("7").expect("parse");
        assert_eq!(parsed, ConnectionId::from_u64(7));
    }

    #[test]
    fn test_display() {
        assert_eq!(ConnectionId::from_u64(3).to_string(), "3");
    }
}
