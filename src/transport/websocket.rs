//! WebSocket transport and socket event loop.
//!
//! A [`WebSocketTransport`] is a cheap cloneable handle. Sends go into an
//! unbounded queue drained by [`run`], a task that also reads inbound frames
//! and hands them to the session one at a time, so message handling for a
//! given connection is strictly sequential.
//!
//! # Event Loop
//!
//! - Text frames (and binary frames holding UTF-8) go to `on_message`
//! - A read error goes to `on_error`, then the loop ends
//! - Queued messages are written in order; a queued close is sent last
//! - On exit the state becomes `Closed` and `on_close` runs once

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, trace, warn};

use crate::error::{Error, Result};

use super::{AtomicTransportState, Transport, TransportEvents, TransportState};

// ============================================================================
// Types
// ============================================================================

/// Commands queued for the event loop.
#[derive(Debug)]
pub(crate) enum Outgoing {
    /// Write one text frame.
    Text(String),
    /// Send a close frame and stop.
    Close,
}

/// Receiving end of a transport's outbound queue.
pub(crate) type OutgoingReceiver = mpsc::UnboundedReceiver<Outgoing>;

// ============================================================================
// WebSocketTransport
// ============================================================================

/// Handle to one WebSocket connection.
#[derive(Debug, Clone)]
pub struct WebSocketTransport {
    /// Queue drained by the event loop.
    outgoing: mpsc::UnboundedSender<Outgoing>,
    /// State shared with the event loop.
    state: Arc<AtomicTransportState>,
}

impl WebSocketTransport {
    /// Creates a handle in `state` plus the queue its event loop will drain.
    pub(crate) fn new(state: TransportState) -> (Self, OutgoingReceiver) {
        let (outgoing, outgoing_rx) = mpsc::unbounded_channel();
        let transport = Self {
            outgoing,
            state: Arc::new(AtomicTransportState::new(state)),
        };
        (transport, outgoing_rx)
    }

    /// Returns the shared state cell.
    pub(crate) fn state_cell(&self) -> Arc<AtomicTransportState> {
        Arc::clone(&self.state)
    }
}

impl Transport for WebSocketTransport {
    fn send(&self, message: String) -> Result<()> {
        let state = self.state.load();
        if state != TransportState::Open {
            return Err(Error::transport_not_open(state));
        }

        self.outgoing
            .send(Outgoing::Text(message))
            .map_err(|_| Error::ConnectionClosed)
    }

    fn close(&self) {
        let closing = self
            .state
            .transition(TransportState::Open, TransportState::Closing)
            || self
                .state
                .transition(TransportState::Connecting, TransportState::Closing);

        if closing {
            let _ = self.outgoing.send(Outgoing::Close);
        }
    }

    #[inline]
    fn state(&self) -> TransportState {
        self.state.load()
    }
}

// ============================================================================
// Event Loop
// ============================================================================

/// Drives one WebSocket until either side closes it.
pub(crate) async fn run<S, E>(
    ws_stream: WebSocketStream<S>,
    mut outgoing_rx: OutgoingReceiver,
    state: Arc<AtomicTransportState>,
    events: &E,
) where
    S: AsyncRead + AsyncWrite + Unpin,
    E: TransportEvents,
{
    let (mut ws_write, mut ws_read) = ws_stream.split();

    loop {
        tokio::select! {
            // Incoming frames from the peer
            message = ws_read.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        events.on_message(text.as_str());
                    }

                    Some(Ok(Message::Binary(data))) => match std::str::from_utf8(&data) {
                        Ok(text) => events.on_message(text),
                        Err(e) => warn!(error = %e, "Dropping non UTF-8 binary message"),
                    },

                    Some(Ok(Message::Close(_))) => {
                        debug!("WebSocket closed by remote");
                        break;
                    }

                    Some(Err(e)) => {
                        error!(error = %e, "WebSocket error");
                        events.on_error(e.to_string());
                        break;
                    }

                    None => {
                        debug!("WebSocket stream ended");
                        break;
                    }

                    // Ping/Pong frames are answered by tungstenite itself
                    _ => {}
                }
            }

            // Messages queued by the session
            command = outgoing_rx.recv() => {
                match command {
                    Some(Outgoing::Text(text)) => {
                        if let Err(e) = ws_write.send(Message::Text(text.into())).await {
                            warn!(error = %e, "Failed to write message");
                            events.on_error(e.to_string());
                            break;
                        }
                        trace!("Message written");
                    }

                    Some(Outgoing::Close) => {
                        debug!("Close requested locally");
                        let _ = ws_write.close().await;
                        break;
                    }

                    None => {
                        debug!("Outgoing queue closed");
                        let _ = ws_write.close().await;
                        break;
                    }
                }
            }
        }
    }

    state.store(TransportState::Closed);
    events.on_close();

    debug!("Socket event loop terminated");
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_requires_open_state() {
        let (transport, _rx) = WebSocketTransport::new(TransportState::Connecting);
        let result = transport.send("x".to_string());
        assert!(matches!(
            result,
            Err(Error::TransportNotOpen {
                state: TransportState::Connecting
            })
        ));
    }

    #[test]
    fn test_send_queues_in_order() {
        let (transport, mut rx) = WebSocketTransport::new(TransportState::Open);
        transport.send("a".to_string()).expect("send a");
        transport.send("b".to_string()).expect("send b");

        assert!(matches!(rx.try_recv(), Ok(Outgoing::Text(ref t)) if t == "a"));
        assert!(matches!(rx.try_recv(), Ok(Outgoing::Text(ref t)) if t == "b"));
    }

    #[test]
    fn test_close_is_idempotent() {
        let (transport, mut rx) = WebSocketTransport::new(TransportState::Open);
        transport.close();
        transport.close();

        assert_eq!(transport.state(), TransportState::Closing);
        assert!(matches!(rx.try_recv(), Ok(Outgoing::Close)));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_send_after_loop_gone() {
        let (transport, rx) = WebSocketTransport::new(TransportState::Open);
        drop(rx);
        assert!(matches!(
            transport.send("x".to_string()),
            Err(Error::ConnectionClosed)
        ));
    }
}
