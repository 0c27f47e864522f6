//! In-memory transport.
//!
//! Records every message handed to it instead of writing to a socket. Useful
//! for driving a [`Client`](crate::Client) or [`Server`](crate::Server)
//! without a network, and for asserting exactly what went out.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::protocol::Packet;

use super::{Transport, TransportState};

// ============================================================================
// MemoryTransport
// ============================================================================

/// Transport that keeps outbound messages in a `Vec`.
#[derive(Debug)]
pub struct MemoryTransport {
    state: Mutex<TransportState>,
    sent: Mutex<Vec<String>>,
    fail_sends: AtomicBool,
}

impl MemoryTransport {
    /// Creates a transport in the given state.
    #[must_use]
    pub fn new(state: TransportState) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(state),
            sent: Mutex::new(Vec::new()),
            fail_sends: AtomicBool::new(false),
        })
    }

    /// Creates an open transport.
    #[inline]
    #[must_use]
    pub fn open() -> Arc<Self> {
        Self::new(TransportState::Open)
    }

    /// Forces the state, e.g. to simulate the socket opening.
    pub fn set_state(&self, state: TransportState) {
        *self.state.lock() = state;
    }

    /// Makes every subsequent send fail with [`Error::ConnectionClosed`].
    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Returns every message sent so far.
    #[must_use]
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }

    /// Returns every message sent so far, parsed as packets.
    ///
    /// Messages that do not parse are skipped.
    #[must_use]
    pub fn sent_packets(&self) -> Vec<Packet> {
        self.sent
            .lock()
            .iter()
            .filter_map(|text| Packet::decode(text).ok())
            .collect()
    }

    /// Returns the type tags of every packet sent so far.
    #[must_use]
    pub fn sent_kinds(&self) -> Vec<String> {
        self.sent_packets().into_iter().map(|p| p.kind).collect()
    }

    /// Drains the recorded messages.
    pub fn take_sent(&self) -> Vec<String> {
        std::mem::take(&mut *self.sent.lock())
    }
}

impl Transport for MemoryTransport {
    fn send(&self, message: String) -> Result<()> {
        let state = *self.state.lock();
        if state != TransportState::Open {
            return Err(Error::transport_not_open(state));
        }
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(Error::ConnectionClosed);
        }

        self.sent.lock().push(message);
        Ok(())
    }

    fn close(&self) {
        *self.state.lock() = TransportState::Closed;
    }

    fn state(&self) -> TransportState {
        *self.state.lock()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_records_messages() {
        let transport = MemoryTransport::open();
        assert_ok!(transport.send(r#"{"type":"ping"}"#.to_string()));
        assert_ok!(transport.send("garbage".to_string()));

        assert_eq!(transport.sent().len(), 2);
        assert_eq!(transport.sent_kinds(), vec!["ping".to_string()]);
        assert_eq!(transport.take_sent().len(), 2);
        assert!(transport.sent().is_empty());
    }

    #[test]
    fn test_closed_transport_rejects_sends() {
        let transport = MemoryTransport::open();
        transport.close();
        assert_eq!(transport.state(), TransportState::Closed);
        assert_err!(transport.send("x".to_string()));
    }

    #[test]
    fn test_fail_sends() {
        let transport = MemoryTransport::open();
        transport.fail_sends(true);
        assert!(matches!(
            transport.send("x".to_string()),
            Err(Error::ConnectionClosed)
        ));
        assert!(transport.sent().is_empty());
    }
}
