//! Client-side session.
//!
//! A [`Client`] owns one outbound connection. It waits passively for the
//! server's `handshake`, and once admitted pings on `ping_interval`, keeping
//! at most one ping outstanding.
//!
//! # State
//!
//! Transport state runs `Connecting → Open → (Closing) → Closed`. The
//! `connected` flag is orthogonal: it only becomes `true` after a successful
//! handshake, so `Open` without `connected` means the handshake is pending
//! or was rejected. A closed or rejected session is not reused; reconnecting
//! means building a new `Client`.
//!
//! # Example
//!
//! ```ignore
//! use ws_session::{Client, ClientConfig};
//!
//! let config = ClientConfig::builder()
//!     .server("127.0.0.1", 8082)
//!     .on_packet(|packet| println!("{}", packet.kind))
//!     .build()?;
//!
//! let client = Client::connect(config)?;
//! // ... once connected:
//! client.send_packet("chat", Some(serde_json::json!({ "text": "hi" })))?;
//! client.close_connection("bye")?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_tungstenite::connect_async;
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::error::{Error, Result, SessionErrorKind};
use crate::identifiers::ConnectionId;
use crate::keepalive::KeepaliveTimer;
use crate::protocol::{CLOSE_CONNECTION, CloseNotice, ControlType, Handshake, PING, Packet};
use crate::transport::websocket::{self, OutgoingReceiver};
use crate::transport::{
    AtomicTransportState, Transport, TransportEvents, TransportState, WebSocketTransport,
};

use super::config::ClientConfig;

// ============================================================================
// ClientInner
// ============================================================================

/// Shared session state.
///
/// Timers and background tasks hold only a `Weak` reference, so dropping the
/// last [`Client`] handle tears the session down.
struct ClientInner {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    /// Set only by a successful handshake.
    connected: AtomicBool,
    client_id: Mutex<Option<ConnectionId>>,
    /// Send time of the outstanding ping.
    pending_ping: Mutex<Option<Instant>>,
    ping_timer: KeepaliveTimer,
    abort_timer: KeepaliveTimer,
    ping_history: Mutex<Vec<Duration>>,
    ping_task: Mutex<Option<JoinHandle<()>>>,
}

// ============================================================================
// Client
// ============================================================================

/// Handle to a client session.
///
/// Cloning yields another handle to the same session.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("state", &self.state())
            .field("connected", &self.is_connected())
            .field("client_id", &self.client_id())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Client - Constructors
// ============================================================================

impl Client {
    /// Opens a WebSocket to the configured server.
    ///
    /// Returns immediately in the `Connecting` state; outcomes arrive through
    /// the configured callbacks. Must be called within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the server address is not a valid URL.
    pub fn connect(config: ClientConfig) -> Result<Self> {
        let url = config.ws_url()?;
        let (transport, outgoing_rx) = WebSocketTransport::new(TransportState::Connecting);
        let state = transport.state_cell();

        let client = Self::with_transport(config, Arc::new(transport));

        info!(url = %url, "Connecting to server");
        tokio::spawn(establish(
            Arc::downgrade(&client.inner),
            url,
            outgoing_rx,
            state,
        ));

        Ok(client)
    }

    /// Runs a session over an arbitrary transport.
    ///
    /// The caller delivers inbound events through [`handle_open`],
    /// [`handle_message`], [`handle_error`] and [`handle_close`]. The abort
    /// timer is armed immediately. Must be called within a tokio runtime.
    ///
    /// [`handle_open`]: Client::handle_open
    /// [`handle_message`]: Client::handle_message
    /// [`handle_error`]: Client::handle_error
    /// [`handle_close`]: Client::handle_close
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        let inner = Arc::new(ClientInner {
            config,
            transport,
            connected: AtomicBool::new(false),
            client_id: Mutex::new(None),
            pending_ping: Mutex::new(None),
            ping_timer: KeepaliveTimer::new(),
            abort_timer: KeepaliveTimer::new(),
            ping_history: Mutex::new(Vec::new()),
            ping_task: Mutex::new(None),
        });

        inner.arm_abort_timer();

        Self { inner }
    }
}

// ============================================================================
// Client - Public API
// ============================================================================

impl Client {
    /// Returns the session configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Returns the transport state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> TransportState {
        self.inner.transport.state()
    }

    /// Returns `true` once the server has admitted the session, until it
    /// closes or errors.
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }

    /// Returns the id the server assigned, if admitted.
    #[inline]
    #[must_use]
    pub fn client_id(&self) -> Option<ConnectionId> {
        *self.inner.client_id.lock()
    }

    /// Returns the round-trip time of every answered ping, oldest first.
    #[must_use]
    pub fn ping_history(&self) -> Vec<Duration> {
        self.inner.ping_history.lock().clone()
    }

    /// Returns the mean round-trip time, if any ping was answered.
    #[must_use]
    pub fn average_ping(&self) -> Option<Duration> {
        let history = self.inner.ping_history.lock();
        let count = u32::try_from(history.len()).ok().filter(|&n| n > 0)?;
        Some(history.iter().sum::<Duration>() / count)
    }

    /// Returns `true` while a ping awaits its `pong`.
    #[inline]
    #[must_use]
    pub fn has_outstanding_ping(&self) -> bool {
        self.inner.pending_ping.lock().is_some()
    }

    /// Sends a `ping` unless one is already outstanding.
    ///
    /// Returns `true` if a ping went out.
    pub fn ping(&self) -> bool {
        self.inner.ping()
    }

    /// Sends a packet to the server.
    ///
    /// # Errors
    ///
    /// - [`Error::TransportNotOpen`] unless the transport is open
    /// - [`Error::NotConnected`] before a successful handshake or after close
    /// - [`Error::Json`] if the payload cannot be serialized
    /// - [`Error::ConnectionClosed`] if the transport went away
    pub fn send_packet(&self, kind: &str, data: Option<Value>) -> Result<()> {
        self.inner.send_packet(kind, data)
    }

    /// Tells the server we are leaving, then marks the session disconnected.
    ///
    /// The notification is best effort: the returned result reports whether
    /// it was handed to the transport, and the session is disconnected
    /// either way.
    ///
    /// # Errors
    ///
    /// Same as [`send_packet`](Client::send_packet).
    pub fn close_connection(&self, reason: &str) -> Result<()> {
        self.inner.close_connection(reason)
    }
}

// ============================================================================
// Client - Transport Events
// ============================================================================

impl Client {
    /// The transport opened.
    pub fn handle_open(&self) {
        self.inner.handle_open();
    }

    /// A message arrived from the server.
    pub fn handle_message(&self, text: &str) {
        self.inner.handle_message(text);
    }

    /// The transport reported an error.
    pub fn handle_error(&self, detail: impl Into<String>) {
        self.inner.handle_error(detail.into());
    }

    /// The transport closed.
    pub fn handle_close(&self) {
        self.inner.handle_close();
    }
}

// ============================================================================
// ClientInner - Protocol
// ============================================================================

impl ClientInner {
    #[inline]
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn emit_error(&self, kind: SessionErrorKind, detail: Option<String>) {
        (self.config.on_error)(kind, detail);
    }

    fn arm_abort_timer(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        self.abort_timer.arm(Some(self.config.abort_delay), move || {
            if let Some(inner) = weak.upgrade()
                && inner.transport.state() == TransportState::Connecting
            {
                warn!(
                    abort_delay = ?inner.config.abort_delay,
                    "Still connecting, giving up"
                );
                inner.emit_error(SessionErrorKind::ConnectionFailed, None);
            }
        });
    }

    fn handle_open(&self) {
        self.abort_timer.disarm();
        debug!("Transport open, awaiting handshake");
        (self.config.on_open)();
    }

    fn handle_message(self: &Arc<Self>, text: &str) {
        let packet = match Packet::decode_lenient(text) {
            Ok(packet) => packet,
            Err(e) => {
                warn!(error = %e, message = %text, "Cannot parse message");
                return;
            }
        };

        if self.config.log_incoming_packets {
            debug!(kind = %packet.kind, "[RECEIVED]");
        }

        match packet.control() {
            Some(ControlType::Handshake) => self.handle_handshake(&packet),
            Some(ControlType::Pong) => self.handle_pong(),
            _ => {}
        }

        (self.config.on_packet)(&packet);
    }

    fn handle_handshake(self: &Arc<Self>, packet: &Packet) {
        let Some(handshake) = Handshake::from_data(packet.data.as_ref()) else {
            warn!("Ignoring malformed handshake");
            return;
        };

        if !handshake.successful {
            info!(reason = %handshake.reason, "Connection rejected by server");
            self.connected.store(false, Ordering::SeqCst);
            self.emit_error(SessionErrorKind::ConnectionFailed, Some(handshake.reason));
            return;
        }

        *self.client_id.lock() = handshake.id;
        self.connected.store(true, Ordering::SeqCst);
        info!(client_id = ?handshake.id, "Connection authorized");

        (self.config.on_connection_successful)(&handshake);

        if let Some(period) = self.config.ping_interval {
            self.start_pinging(period);
        }
    }

    fn start_pinging(self: &Arc<Self>, period: Duration) {
        let weak = Arc::downgrade(self);
        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                if !inner.is_connected() {
                    break;
                }
                inner.ping();
            }
        });

        if let Some(previous) = self.ping_task.lock().replace(task) {
            previous.abort();
        }
    }

    fn ping(self: &Arc<Self>) -> bool {
        // Only an armed timer marks a ping as outstanding. Without a timeout
        // nothing is armed, and a lost pong must not stop later pings.
        let weak = Arc::downgrade(self);
        let armed = self.ping_timer.arm(self.config.timeout_delay, move || {
            if let Some(inner) = weak.upgrade() {
                inner.on_ping_timeout();
            }
        });
        if !armed && self.config.timeout_delay.is_some() {
            trace!("Ping already outstanding");
            return false;
        }

        *self.pending_ping.lock() = Some(Instant::now());

        if let Err(e) = self.send_packet(PING, None) {
            // Nothing went out, so nothing is outstanding.
            debug!(error = %e, "Ping not sent");
            self.ping_timer.disarm();
            self.pending_ping.lock().take();
            return false;
        }

        true
    }

    fn on_ping_timeout(&self) {
        self.pending_ping.lock().take();

        if self.is_connected() {
            warn!(
                timeout_delay = ?self.config.timeout_delay,
                "Ping timed out"
            );
            self.emit_error(SessionErrorKind::Timeout, None);
        }
    }

    fn handle_pong(&self) {
        self.ping_timer.disarm();

        let sent_at = self.pending_ping.lock().take();
        match sent_at {
            Some(sent_at) => {
                let round_trip = sent_at.elapsed();
                self.ping_history.lock().push(round_trip);
                trace!(?round_trip, "Pong received");
            }
            None => trace!("Unmatched pong ignored"),
        }
    }

    fn send_packet(&self, kind: &str, data: Option<Value>) -> Result<()> {
        let state = self.transport.state();
        if state != TransportState::Open {
            return Err(Error::transport_not_open(state));
        }
        if !self.is_connected() {
            return Err(Error::NotConnected);
        }

        let text = Packet::new(kind, data).encode()?;

        if self.config.log_outgoing_packets {
            debug!(kind, "[SEND]");
        }

        self.transport.send(text)
    }

    fn close_connection(&self, reason: &str) -> Result<()> {
        // Send first: clearing `connected` would fail the send guard.
        let result = self.send_packet(CLOSE_CONNECTION, Some(CloseNotice::new(reason).to_value()));

        self.connected.store(false, Ordering::SeqCst);
        self.stop_keepalive();

        info!(reason, "Connection closed locally");
        result
    }

    fn handle_error(&self, detail: String) {
        self.connected.store(false, Ordering::SeqCst);
        self.emit_error(SessionErrorKind::Unknown, Some(detail));
    }

    fn handle_close(&self) {
        self.connected.store(false, Ordering::SeqCst);
        self.abort_timer.disarm();
        self.stop_keepalive();

        debug!("Transport closed");
        (self.config.on_close)();
    }

    /// Stops the ping loop and forgets any outstanding ping.
    fn stop_keepalive(&self) {
        if let Some(task) = self.ping_task.lock().take() {
            task.abort();
        }
        self.ping_timer.disarm();
        self.pending_ping.lock().take();
    }
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        self.stop_keepalive();
        self.abort_timer.disarm();
        self.transport.close();
    }
}

// ============================================================================
// WebSocket Plumbing
// ============================================================================

/// Routes socket events to a session that may already be gone.
struct ClientEvents {
    inner: Weak<ClientInner>,
}

impl TransportEvents for ClientEvents {
    fn on_message(&self, text: &str) {
        if let Some(inner) = self.inner.upgrade() {
            inner.handle_message(text);
        }
    }

    fn on_error(&self, detail: String) {
        if let Some(inner) = self.inner.upgrade() {
            inner.handle_error(detail);
        }
    }

    fn on_close(&self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.handle_close();
        }
    }
}

/// Opens the socket, then runs its event loop.
async fn establish(
    weak: Weak<ClientInner>,
    url: Url,
    outgoing_rx: OutgoingReceiver,
    state: Arc<AtomicTransportState>,
) {
    let result = connect_async(url.as_str()).await;

    let Some(inner) = weak.upgrade() else {
        debug!("Session dropped while connecting");
        return;
    };

    match result {
        Ok((mut ws_stream, _response)) => {
            if !state.transition(TransportState::Connecting, TransportState::Open) {
                debug!("Session closed while connecting");
                let _ = ws_stream.close(None).await;
                state.store(TransportState::Closed);
                inner.handle_close();
                return;
            }

            info!(url = %url, "WebSocket connection established");
            inner.handle_open();
            drop(inner);

            let events = ClientEvents { inner: weak };
            websocket::run(ws_stream, outgoing_rx, state, &events).await;
        }
        Err(e) => {
            let error = Error::from(e);
            warn!(%error, url = %url, "WebSocket connection failed");
            state.store(TransportState::Closed);
            inner.handle_error(error.to_string());
            inner.handle_close();
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
