//! Server session logic: admission, keepalive eviction, removal, broadcast.
//!
//! Everything here is transport-agnostic. The listener feeds it WebSocket
//! connections; tests feed it [`MemoryTransport`](crate::transport::MemoryTransport)s.
//!
//! # Membership
//!
//! A connection is in the registry exactly while its `connected` flag is
//! set. [`Server::remove_user`] is the single exit path and is idempotent,
//! so the closed callback fires at most once per connection however many
//! removal triggers race (timeout, close packet, transport loss, shutdown).

// ============================================================================
// Imports
// ============================================================================

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use serde_json::{Value, json};
use tracing::{debug, info, trace, warn};

use crate::identifiers::{ConnectionId, IdAllocator};
use crate::protocol::{
    Admission, ControlType, HANDSHAKE, Handshake, PONG, Packet, REASON_SERVER_FULL,
    REASON_SERVER_SHUTDOWN, REASON_TIMEOUT,
};
use crate::transport::Transport;

use super::config::ServerConfig;
use super::connection::ServerConnection;
use super::registry::Registry;

// ============================================================================
// BroadcastOutcome
// ============================================================================

/// Per-recipient result of a [`Server::broadcast`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastOutcome {
    /// Recipients whose transport accepted the packet, in send order.
    pub delivered: Vec<ConnectionId>,
    /// Recipients whose send failed, in send order.
    pub failed: Vec<ConnectionId>,
}

impl BroadcastOutcome {
    /// Returns `true` if no send failed.
    #[inline]
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

// ============================================================================
// Server
// ============================================================================

pub(crate) struct ServerShared {
    pub(crate) config: ServerConfig,
    registry: Mutex<Registry>,
    ids: IdAllocator,
    pub(crate) local_addr: Mutex<Option<SocketAddr>>,
    pub(crate) shutdown: AtomicBool,
}

/// Session server.
///
/// Cheap to clone; clones share the registry.
#[derive(Clone)]
pub struct Server {
    pub(crate) inner: Arc<ServerShared>,
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("local_addr", &*self.inner.local_addr.lock())
            .field("connections", &self.connection_count())
            .finish_non_exhaustive()
    }
}

impl Server {
    /// Creates a server that is not bound to any socket.
    ///
    /// Connections are handed to it through [`Server::accept`]. Use
    /// [`Server::listen`] for a WebSocket listener.
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        Self {
            inner: Arc::new(ServerShared {
                config,
                registry: Mutex::new(Registry::default()),
                ids: IdAllocator::new(),
                local_addr: Mutex::new(None),
                shutdown: AtomicBool::new(false),
            }),
        }
    }

    #[inline]
    pub(crate) fn from_shared(inner: Arc<ServerShared>) -> Self {
        Self { inner }
    }

    /// Returns the configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    /// Returns the number of admitted connections.
    #[inline]
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.inner.registry.lock().len()
    }

    /// Returns the admitted connections in admission order.
    #[must_use]
    pub fn connections(&self) -> Vec<ServerConnection> {
        self.inner.registry.lock().snapshot()
    }

    /// Looks up an admitted connection.
    #[must_use]
    pub fn connection(&self, id: ConnectionId) -> Option<ServerConnection> {
        self.inner.registry.lock().get(id).cloned()
    }
}

// ============================================================================
// Server - Admission
// ============================================================================

impl Server {
    /// Runs admission for a newly opened transport.
    ///
    /// Always sends a `handshake` packet. Returns the connection if it was
    /// admitted; a rejected transport is closed after its handshake.
    ///
    /// The id is allocated before the decision, so rejected attempts
    /// consume ids too.
    pub fn accept(
        &self,
        transport: Arc<dyn Transport>,
        remote_address: impl Into<String>,
    ) -> Option<ServerConnection> {
        let config = &self.inner.config;
        let connection =
            ServerConnection::new(self.inner.ids.next_id(), remote_address.into(), transport);

        info!(
            id = %connection.id(),
            remote_address = connection.remote_address(),
            "New connection attempt"
        );

        let mut admission = match self.refusal(&self.inner.registry.lock()) {
            Some(reason) => Admission::reject(reason),
            None => Admission::accept(),
        };

        if admission.successful
            && let Some(decision) = (config.on_connection_attempt)(&connection)
        {
            admission = decision;
        }

        // The hook ran unlocked, so the refusal checks run again on insert.
        if admission.successful {
            let mut registry = self.inner.registry.lock();
            match self.refusal(&registry) {
                Some(reason) => admission = Admission::reject(reason),
                None => {
                    connection.set_connected(true);
                    registry.insert(connection.clone());
                }
            }
        }

        let successful = admission.successful;
        let handshake = Handshake::from_admission(admission, connection.id());

        if successful {
            info!(id = %connection.id(), "Connection admitted");
            (config.on_connection)(&connection);
        } else {
            info!(
                id = %connection.id(),
                reason = %handshake.reason,
                "Connection rejected"
            );
        }

        if let Err(e) = connection.send_packet(HANDSHAKE, Some(handshake.to_value())) {
            warn!(id = %connection.id(), error = %e, "Failed to send handshake");
        }

        if successful {
            Some(connection)
        } else {
            connection.close_transport();
            None
        }
    }

    /// Returns why a new member cannot be admitted right now, if anything.
    ///
    /// Must be called with the registry lock held: [`Server::shutdown`]
    /// sets its flag before taking the lock to drain the registry.
    fn refusal(&self, registry: &Registry) -> Option<&'static str> {
        if self.inner.shutdown.load(Ordering::SeqCst) {
            Some(REASON_SERVER_SHUTDOWN)
        } else if !registry.has_room(self.inner.config.max_clients) {
            Some(REASON_SERVER_FULL)
        } else {
            None
        }
    }
}

// ============================================================================
// Server - Messages
// ============================================================================

impl Server {
    /// Handles one inbound text message from `connection`.
    ///
    /// Text that is not JSON is logged and dropped. Any other message is
    /// passed to the packet callback first, malformed envelopes included;
    /// the reserved types are then handled only while the connection is
    /// still a member.
    pub fn handle_message(&self, connection: &ServerConnection, text: &str) {
        let packet = match Packet::decode_lenient(text) {
            Ok(packet) => packet,
            Err(e) => {
                warn!(id = %connection.id(), error = %e, "Dropping unparseable message");
                return;
            }
        };

        trace!(id = %connection.id(), kind = %packet.kind, "[RECEIVED]");

        (self.inner.config.on_packet)(connection, &packet);

        if !connection.is_connected() {
            return;
        }

        match packet.control() {
            Some(ControlType::CloseConnection) => {
                self.remove_user(connection, packet.data);
            }
            Some(ControlType::Ping) => {
                if let Err(e) = connection.send_packet(PONG, None) {
                    debug!(id = %connection.id(), error = %e, "Failed to send pong");
                }
                self.watch_timeout(connection);
            }
            _ => {}
        }
    }

    /// Restarts the silence window for `connection`.
    fn watch_timeout(&self, connection: &ServerConnection) {
        let server = Arc::downgrade(&self.inner);
        let id = connection.id();

        connection.restart_timeout(self.inner.config.timeout_delay, move || {
            if let Some(shared) = server.upgrade() {
                Server::from_shared(shared).evict(id, REASON_TIMEOUT);
            }
        });
    }

    fn evict(&self, id: ConnectionId, reason: &str) {
        let Some(connection) = self.connection(id) else {
            return;
        };

        info!(id = %id, reason, "Evicting connection");
        self.remove_user(&connection, Some(json!({ "reason": reason })));
    }
}

// ============================================================================
// Server - Removal
// ============================================================================

impl Server {
    /// Removes `connection` from the registry and closes its transport.
    ///
    /// `data` is handed to the closed callback; `None` becomes `{}`.
    /// Returns `false`, without invoking the callback, if the connection
    /// was not a member.
    pub fn remove_user(&self, connection: &ServerConnection, data: Option<Value>) -> bool {
        let removed = self.inner.registry.lock().remove(connection.id()).is_some();

        connection.set_connected(false);
        connection.cancel_timeout();
        connection.close_transport();

        if !removed {
            debug!(id = %connection.id(), "Connection already removed");
            return false;
        }

        info!(id = %connection.id(), "Connection removed");

        let data = data.unwrap_or_else(|| json!({}));
        (self.inner.config.on_connection_closed)(connection, &data);

        true
    }

    /// Removes every connection with reason `server-shutdown` and stops the
    /// listener, if any.
    ///
    /// Later admission attempts are rejected with the same reason.
    pub fn shutdown(&self) {
        self.inner.shutdown.store(true, Ordering::SeqCst);

        let connections = self.connections();
        let count = connections.len();
        for connection in &connections {
            self.remove_user(
                connection,
                Some(json!({ "reason": REASON_SERVER_SHUTDOWN })),
            );
        }

        info!(connections = count, "Server shutdown complete");
    }
}

// ============================================================================
// Server - Broadcast
// ============================================================================

impl Server {
    /// Sends one packet to many connections.
    ///
    /// Recipients are `targets` (or every member, in admission order)
    /// minus anyone in `excluded`. The packet is encoded once. A failed
    /// send is recorded and the fan-out continues.
    pub fn broadcast(
        &self,
        kind: &str,
        data: Option<Value>,
        excluded: &[ServerConnection],
        targets: Option<&[ServerConnection]>,
    ) -> BroadcastOutcome {
        let targets = match targets {
            Some(targets) => targets.to_vec(),
            None => self.connections(),
        };
        let excluded: FxHashSet<ConnectionId> =
            excluded.iter().map(ServerConnection::id).collect();
        let recipients = targets
            .iter()
            .filter(|connection| !excluded.contains(&connection.id()));

        let mut outcome = BroadcastOutcome::default();

        let text = match Packet::new(kind, data).encode() {
            Ok(text) => text,
            Err(e) => {
                warn!(kind, error = %e, "Cannot encode broadcast packet");
                outcome.failed = recipients.map(ServerConnection::id).collect();
                return outcome;
            }
        };

        for connection in recipients {
            match connection.send_text(text.clone()) {
                Ok(()) => outcome.delivered.push(connection.id()),
                Err(e) => {
                    debug!(id = %connection.id(), error = %e, "Broadcast send failed");
                    outcome.failed.push(connection.id());
                }
            }
        }

        trace!(
            kind,
            delivered = outcome.delivered.len(),
            failed = outcome.failed.len(),
            "Broadcast sent"
        );

        outcome
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use proptest::prelude::*;
    use tokio::time::sleep;

    use crate::protocol::{CLOSE_CONNECTION, PING, REASON_CONNECTION_LOST};
    use crate::transport::{MemoryTransport, TransportState};

    #[derive(Default)]
    struct Recorder {
        attempts: Mutex<Vec<ConnectionId>>,
        opened: Mutex<Vec<ConnectionId>>,
        closed: Mutex<Vec<(ConnectionId, Value)>>,
        packets: Mutex<Vec<(ConnectionId, String)>>,
    }

    fn server_with(
        builder: crate::server::ServerConfigBuilder,
    ) -> (Server, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());

        let r1 = Arc::clone(&recorder);
        let r2 = Arc::clone(&recorder);
        let r3 = Arc::clone(&recorder);
        let r4 = Arc::clone(&recorder);

        let config = builder
            .on_connection_attempt(move |c| {
                r1.attempts.lock().push(c.id());
                None
            })
            .on_connection(move |c| r2.opened.lock().push(c.id()))
            .on_connection_closed(move |c, data| r3.closed.lock().push((c.id(), data.clone())))
            .on_packet(move |c, p| r4.packets.lock().push((c.id(), p.kind.clone())))
            .build()
            .expect("valid config");

        (Server::new(config), recorder)
    }

    fn server() -> (Server, Arc<Recorder>) {
        server_with(ServerConfig::builder())
    }

    fn handshake_of(transport: &MemoryTransport) -> Handshake {
        let packets = transport.sent_packets();
        let packet = packets.first().expect("a handshake was sent");
        assert_eq!(packet.kind, HANDSHAKE);
        Handshake::from_data(packet.data.as_ref()).expect("valid handshake")
    }

    fn ping() -> String {
        Packet::new(PING, None).encode().expect("encode")
    }

    // ------------------------------------------------------------------------
    // Admission
    // ------------------------------------------------------------------------

    #[test]
    fn test_accept_sends_successful_handshake() {
        let (server, recorder) = server();
        let transport = MemoryTransport::open();

        let connection = server
            .accept(transport.clone(), "127.0.0.1")
            .expect("admitted");

        assert!(connection.is_connected());
        assert_eq!(connection.remote_address(), "127.0.0.1");
        assert_eq!(server.connection_count(), 1);
        assert_eq!(*recorder.opened.lock(), vec![connection.id()]);
        assert_eq!(*recorder.attempts.lock(), vec![connection.id()]);

        let handshake = handshake_of(&transport);
        assert!(handshake.successful);
        assert_eq!(handshake.reason, "");
        assert_eq!(handshake.id, Some(connection.id()));
        assert!(!connection.is_timeout_armed());
    }

    #[test]
    fn test_server_full_rejects_without_consulting_hook() {
        let (server, recorder) = server_with(ServerConfig::builder().max_clients(1));
        let first = MemoryTransport::open();
        let second = MemoryTransport::open();

        let admitted = server.accept(first, "a").expect("admitted");
        assert!(server.accept(second.clone(), "b").is_none());

        let handshake = handshake_of(&second);
        assert!(!handshake.successful);
        assert_eq!(handshake.reason, REASON_SERVER_FULL);
        assert_eq!(handshake.id, None);
        assert_eq!(second.state(), TransportState::Closed);

        assert_eq!(server.connection_count(), 1);
        assert_eq!(*recorder.attempts.lock(), vec![admitted.id()]);
        assert_eq!(recorder.opened.lock().len(), 1);
    }

    #[test]
    fn test_hook_can_reject_with_reason() {
        let config = ServerConfig::builder()
            .on_connection_attempt(|c| {
                (c.remote_address() == "10.0.0.9").then(|| Admission::reject("banned"))
            })
            .build()
            .expect("valid config");
        let server = Server::new(config);

        let banned = MemoryTransport::open();
        assert!(server.accept(banned.clone(), "10.0.0.9").is_none());
        let handshake = handshake_of(&banned);
        assert!(!handshake.successful);
        assert_eq!(handshake.reason, "banned");

        assert!(server.accept(MemoryTransport::open(), "10.0.0.1").is_some());
        assert_eq!(server.connection_count(), 1);
    }

    #[test]
    fn test_ids_are_never_reused() {
        let (server, _) = server_with(ServerConfig::builder().max_clients(1));

        let first = server.accept(MemoryTransport::open(), "a").expect("admitted");
        assert!(server.accept(MemoryTransport::open(), "b").is_none());
        server.remove_user(&first, None);
        let third = server.accept(MemoryTransport::open(), "c").expect("admitted");

        assert_eq!(first.id().as_u64(), 0);
        assert_eq!(third.id().as_u64(), 2);
    }

    proptest! {
        #[test]
        fn prop_registry_never_exceeds_capacity(max in 0usize..6, attempts in 0usize..15) {
            let (server, recorder) = server_with(ServerConfig::builder().max_clients(max));

            let admitted = (0..attempts)
                .filter_map(|_| server.accept(MemoryTransport::open(), "peer"))
                .count();

            prop_assert_eq!(admitted, attempts.min(max));
            prop_assert_eq!(server.connection_count(), admitted);
            prop_assert_eq!(recorder.opened.lock().len(), admitted);
        }
    }

    // ------------------------------------------------------------------------
    // Messages
    // ------------------------------------------------------------------------

    #[test]
    fn test_non_json_message_is_dropped() {
        let (server, recorder) = server();
        let connection = server.accept(MemoryTransport::open(), "a").expect("admitted");

        server.handle_message(&connection, "not json");
        server.handle_message(&connection, "{\"type\":");

        assert!(connection.is_connected());
        assert!(recorder.packets.lock().is_empty());
    }

    #[test]
    fn test_malformed_envelopes_reach_callback_only() {
        let (server, recorder) = server();
        let transport = MemoryTransport::open();
        let connection = server.accept(transport.clone(), "a").expect("admitted");
        transport.take_sent();

        server.handle_message(&connection, r#"{"type":5,"data":{"x":1}}"#);
        server.handle_message(&connection, r#"{"data":{"x":1}}"#);
        server.handle_message(&connection, r#"{"type":["close-connection"]}"#);
        server.handle_message(&connection, r#"{"type":"chat"}"#);

        let kinds: Vec<String> = recorder
            .packets
            .lock()
            .iter()
            .map(|(_, kind)| kind.clone())
            .collect();
        assert_eq!(kinds, vec!["5", "", r#"["close-connection"]"#, "chat"]);

        assert!(connection.is_connected());
        assert!(transport.sent().is_empty());
        assert!(recorder.closed.lock().is_empty());
    }

    #[test]
    fn test_application_packets_reach_callback() {
        let (server, recorder) = server();
        let transport = MemoryTransport::open();
        let connection = server.accept(transport.clone(), "a").expect("admitted");
        transport.take_sent();

        server.handle_message(&connection, r#"{"type":"chat","data":"hi"}"#);

        assert_eq!(
            *recorder.packets.lock(),
            vec![(connection.id(), "chat".to_string())]
        );
        assert!(transport.sent().is_empty());
    }

    #[test]
    fn test_close_connection_packet_removes_with_payload() {
        let (server, recorder) = server();
        let transport = MemoryTransport::open();
        let connection = server.accept(transport.clone(), "a").expect("admitted");

        server.handle_message(
            &connection,
            r#"{"type":"close-connection","data":{"reason":"page-exit"}}"#,
        );

        assert!(!connection.is_connected());
        assert_eq!(server.connection_count(), 0);
        assert_eq!(transport.state(), TransportState::Closed);
        assert_eq!(
            *recorder.closed.lock(),
            vec![(connection.id(), json!({ "reason": "page-exit" }))]
        );
        assert_eq!(
            *recorder.packets.lock(),
            vec![(connection.id(), CLOSE_CONNECTION.to_string())]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_ping_is_answered_and_arms_timeout() {
        let (server, recorder) = server();
        let transport = MemoryTransport::open();
        let connection = server.accept(transport.clone(), "a").expect("admitted");
        transport.take_sent();

        server.handle_message(&connection, &ping());

        assert_eq!(transport.sent_kinds(), vec![PONG.to_string()]);
        assert!(connection.is_timeout_armed());
        assert_eq!(
            *recorder.packets.lock(),
            vec![(connection.id(), PING.to_string())]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_client_is_evicted_once() {
        let (server, recorder) =
            server_with(ServerConfig::builder().timeout_delay(Duration::from_millis(500)));
        let transport = MemoryTransport::open();
        let connection = server.accept(transport.clone(), "a").expect("admitted");

        server.handle_message(&connection, &ping());

        sleep(Duration::from_millis(490)).await;
        assert!(connection.is_connected());

        sleep(Duration::from_millis(20)).await;
        assert!(!connection.is_connected());
        assert_eq!(server.connection_count(), 0);
        assert_eq!(transport.state(), TransportState::Closed);

        sleep(Duration::from_secs(5)).await;
        assert_eq!(
            *recorder.closed.lock(),
            vec![(connection.id(), json!({ "reason": REASON_TIMEOUT }))]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_regular_pings_keep_client() {
        let (server, recorder) =
            server_with(ServerConfig::builder().timeout_delay(Duration::from_millis(500)));
        let connection = server.accept(MemoryTransport::open(), "a").expect("admitted");

        for _ in 0..6 {
            server.handle_message(&connection, &ping());
            sleep(Duration::from_millis(400)).await;
        }

        assert!(connection.is_connected());
        assert!(recorder.closed.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_timeout_never_evicts() {
        let (server, _) = server_with(ServerConfig::builder().no_timeout());
        let connection = server.accept(MemoryTransport::open(), "a").expect("admitted");

        server.handle_message(&connection, &ping());
        assert!(!connection.is_timeout_armed());

        sleep(Duration::from_secs(60)).await;
        assert!(connection.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_removed_connection_ignores_ping() {
        let (server, recorder) = server();
        let transport = MemoryTransport::open();
        let connection = server.accept(transport.clone(), "a").expect("admitted");
        server.remove_user(&connection, None);
        transport.take_sent();

        server.handle_message(&connection, &ping());

        assert!(transport.sent().is_empty());
        assert!(!connection.is_timeout_armed());
        assert_eq!(recorder.packets.lock().len(), 1);
    }

    // ------------------------------------------------------------------------
    // Removal
    // ------------------------------------------------------------------------

    #[test]
    fn test_remove_user_is_idempotent() {
        let (server, recorder) = server();
        let connection = server.accept(MemoryTransport::open(), "a").expect("admitted");

        assert!(server.remove_user(&connection, None));
        assert!(!server.remove_user(
            &connection,
            Some(json!({ "reason": REASON_CONNECTION_LOST }))
        ));

        assert_eq!(*recorder.closed.lock(), vec![(connection.id(), json!({}))]);
    }

    #[test]
    fn test_shutdown_removes_everyone() {
        let (server, recorder) = server();
        for peer in ["a", "b", "c"] {
            server.accept(MemoryTransport::open(), peer).expect("admitted");
        }

        server.shutdown();

        assert_eq!(server.connection_count(), 0);
        let closed = recorder.closed.lock();
        assert_eq!(closed.len(), 3);
        assert!(
            closed
                .iter()
                .all(|(_, data)| *data == json!({ "reason": REASON_SERVER_SHUTDOWN }))
        );
    }

    #[test]
    fn test_accept_after_shutdown_is_refused() {
        let (server, recorder) = server();
        server.shutdown();

        let transport = MemoryTransport::open();
        assert!(server.accept(transport.clone(), "late").is_none());

        let handshake = handshake_of(&transport);
        assert!(!handshake.successful);
        assert_eq!(handshake.reason, REASON_SERVER_SHUTDOWN);
        assert_eq!(transport.state(), TransportState::Closed);

        assert_eq!(server.connection_count(), 0);
        assert!(recorder.attempts.lock().is_empty());
        assert!(recorder.opened.lock().is_empty());
    }

    #[test]
    fn test_shutdown_during_admission_hook_refuses_insert() {
        let slot: Arc<Mutex<Option<Server>>> = Arc::new(Mutex::new(None));
        let hook_slot = Arc::clone(&slot);

        let config = ServerConfig::builder()
            .on_connection_attempt(move |_| {
                if let Some(server) = hook_slot.lock().as_ref() {
                    server.shutdown();
                }
                None
            })
            .build()
            .expect("valid config");
        let server = Server::new(config);
        *slot.lock() = Some(server.clone());

        let transport = MemoryTransport::open();
        assert!(server.accept(transport.clone(), "racing").is_none());

        assert_eq!(handshake_of(&transport).reason, REASON_SERVER_SHUTDOWN);
        assert_eq!(server.connection_count(), 0);

        // Break the server -> config -> hook -> server cycle.
        slot.lock().take();
    }

    // ------------------------------------------------------------------------
    // Broadcast
    // ------------------------------------------------------------------------

    #[test]
    fn test_broadcast_defaults_to_registry_order() {
        let (server, _) = server();
        let a = server.accept(MemoryTransport::open(), "a").expect("admitted");
        let b = server.accept(MemoryTransport::open(), "b").expect("admitted");

        let outcome = server.broadcast("news", Some(json!(1)), &[], None);

        assert_eq!(outcome.delivered, vec![a.id(), b.id()]);
        assert!(outcome.is_complete());
    }

    #[test]
    fn test_broadcast_honours_exclude_and_target_order() {
        let (server, _) = server();
        let ta = MemoryTransport::open();
        let tb = MemoryTransport::open();
        let tc = MemoryTransport::open();
        let a = server.accept(ta.clone(), "a").expect("admitted");
        let b = server.accept(tb.clone(), "b").expect("admitted");
        let c = server.accept(tc.clone(), "c").expect("admitted");
        for t in [&ta, &tb, &tc] {
            t.take_sent();
        }

        let outcome = server.broadcast(
            "news",
            Some(json!({ "n": 1 })),
            std::slice::from_ref(&b),
            Some(&[c.clone(), b.clone(), a.clone()][..]),
        );

        assert_eq!(outcome.delivered, vec![c.id(), a.id()]);
        assert_eq!(ta.sent(), vec![r#"{"type":"news","data":{"n":1}}"#.to_string()]);
        assert!(tb.sent().is_empty());
        assert_eq!(tc.sent_kinds(), vec!["news".to_string()]);
    }

    #[test]
    fn test_broadcast_continues_past_failures() {
        let (server, _) = server();
        let ta = MemoryTransport::open();
        let a = server.accept(ta.clone(), "a").expect("admitted");
        let b = server.accept(MemoryTransport::open(), "b").expect("admitted");

        ta.fail_sends(true);
        let outcome = server.broadcast("news", None, &[], None);

        assert_eq!(outcome.failed, vec![a.id()]);
        assert_eq!(outcome.delivered, vec![b.id()]);
        assert!(!outcome.is_complete());
        assert!(a.is_connected());
    }

    #[test]
    fn test_broadcast_with_everyone_excluded() {
        let (server, _) = server();
        let a = server.accept(MemoryTransport::open(), "a").expect("admitted");

        let outcome = server.broadcast("news", None, &[a], None);
        assert_eq!(outcome, BroadcastOutcome::default());
    }
}
