//! Authoritative set of admitted connections.
//!
//! Keyed by [`ConnectionId`]. Ids are allocated monotonically, so iteration
//! order is admission order, which is the order a default broadcast uses.

// ============================================================================
// Imports
// ============================================================================

use std::collections::BTreeMap;

use crate::identifiers::ConnectionId;

use super::connection::ServerConnection;

// ============================================================================
// Registry
// ============================================================================

/// Admitted connections, by id.
#[derive(Debug, Default)]
pub(crate) struct Registry {
    members: BTreeMap<ConnectionId, ServerConnection>,
}

impl Registry {
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.members.len()
    }

    /// Returns `true` if one more member fits under `max_clients`.
    #[inline]
    pub(crate) fn has_room(&self, max_clients: Option<usize>) -> bool {
        max_clients.is_none_or(|max| self.members.len() < max)
    }

    /// Adds a member. Returns `false` if the id was already present.
    pub(crate) fn insert(&mut self, connection: ServerConnection) -> bool {
        let id = connection.id();
        if self.members.contains_key(&id) {
            return false;
        }
        self.members.insert(id, connection);
        true
    }

    pub(crate) fn remove(&mut self, id: ConnectionId) -> Option<ServerConnection> {
        self.members.remove(&id)
    }

    pub(crate) fn get(&self, id: ConnectionId) -> Option<&ServerConnection> {
        self.members.get(&id)
    }

    /// Returns the members in admission order.
    pub(crate) fn snapshot(&self) -> Vec<ServerConnection> {
        self.members.values().cloned().collect()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::transport::MemoryTransport;

    fn connection(id: u64) -> ServerConnection {
        ServerConnection::new(
            ConnectionId::from_u64(id),
            "127.0.0.1".into(),
            MemoryTransport::open(),
        )
    }

    #[test]
    fn test_has_room() {
        let mut registry = Registry::default();
        assert!(registry.has_room(None));
        assert!(registry.has_room(Some(1)));
        assert!(!registry.has_room(Some(0)));

        registry.insert(connection(0));
        assert!(!registry.has_room(Some(1)));
        assert!(registry.has_room(Some(2)));
        assert!(registry.has_room(None));
    }

    #[test]
    fn test_insert_rejects_duplicate_id() {
        let mut registry = Registry::default();
        assert!(registry.insert(connection(5)));
        assert!(!registry.insert(connection(5)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_snapshot_in_id_order() {
        let mut registry = Registry::default();
        registry.insert(connection(2));
        registry.insert(connection(0));
        registry.insert(connection(1));

        let ids: Vec<u64> = registry.snapshot().iter().map(|c| c.id().as_u64()).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn test_remove() {
        let mut registry = Registry::default();
        registry.insert(connection(0));

        assert!(registry.get(ConnectionId::from_u64(0)).is_some());
        assert!(registry.remove(ConnectionId::from_u64(0)).is_some());
        assert!(registry.remove(ConnectionId::from_u64(0)).is_none());
        assert_eq!(registry.len(), 0);
    }
}
