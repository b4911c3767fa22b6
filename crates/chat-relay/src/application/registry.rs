//! The live membership set of the chat channel.
//!
//! The registry is the only owner of membership: connections enter through
//! [`ConnectionRegistry::admit`] and leave through
//! [`ConnectionRegistry::remove`].  The relay engine only ever receives
//! `&ConnectionRegistry`, so it can enumerate members but cannot change them.
//!
//! The registry has no interior locking.  It is owned by a single task (see
//! `infrastructure::relay_loop`) that handles one event at a time; sharing it
//! across threads would need an outer mutex.

use std::collections::BTreeMap;

use chat_core::ConnectionId;
use tracing::debug;

/// Set of open connections, each paired with its outbound sink.
///
/// Keyed by [`ConnectionId`]; identities are allocated in increasing order,
/// so [`members`](Self::members) yields connections in admission order.
#[derive(Debug)]
pub struct ConnectionRegistry<S> {
    members: BTreeMap<ConnectionId, S>,
}

impl<S> ConnectionRegistry<S> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            members: BTreeMap::new(),
        }
    }

    /// Adds a connection to the live set, making it a broadcast target.
    ///
    /// Admitting an id that is already present replaces its sink; the member
    /// count does not change.
    pub fn admit(&mut self, id: ConnectionId, sink: S) {
        if self.members.insert(id, sink).is_some() {
            debug!(connection = %id, "re-admitted; sink replaced");
        }
    }

    /// Removes a connection if present.
    ///
    /// Returns `true` if the connection was a member.  Removing an absent
    /// connection (already removed, or never admitted) is a no-op, so the close
    /// path and the error path may both call this for the same connection.
    pub fn remove(&mut self, id: ConnectionId) -> bool {
        self.members.remove(&id).is_some()
    }

    /// Current members in admission order.
    pub fn members(&self) -> impl Iterator<Item = (ConnectionId, &S)> + '_ {
        self.members.iter().map(|(id, sink)| (*id, sink))
    }

    /// Whether `id` is currently a member.
    pub fn contains(&self, id: ConnectionId) -> bool {
        self.members.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Removes every member (process shutdown).  Returns how many were removed.
    ///
    /// Dropping the sinks is what tells each connection's writer to stop.
    pub fn clear(&mut self) -> usize {
        let removed = self.members.len();
        self.members.clear();
        removed
    }
}

impl<S> Default for ConnectionRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u64) -> ConnectionId {
        ConnectionId::from_raw(n)
    }

    #[test]
    fn test_new_registry_is_empty() {
        let registry: ConnectionRegistry<()> = ConnectionRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.members().count(), 0);
    }

    #[test]
    fn test_admit_makes_connection_a_member() {
        // Arrange
        let mut registry = ConnectionRegistry::new();

        // Act
        registry.admit(id(1), "a");

        // Assert
        assert!(registry.contains(id(1)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_members_yields_admission_order() {
        let mut registry = ConnectionRegistry::new();
        registry.admit(id(1), "a");
        registry.admit(id(2), "b");
        registry.admit(id(3), "c");

        let order: Vec<_> = registry.members().map(|(_, s)| *s).collect();

        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_remove_present_connection_returns_true() {
        let mut registry = ConnectionRegistry::new();
        registry.admit(id(1), ());
        assert!(registry.remove(id(1)));
        assert!(!registry.contains(id(1)));
    }

    #[test]
    fn test_remove_twice_is_idempotent() {
        // Arrange: two members, one of which closes and then errors
        let mut registry = ConnectionRegistry::new();
        registry.admit(id(1), ());
        registry.admit(id(2), ());

        // Act
        let first = registry.remove(id(1));
        let second = registry.remove(id(1));

        // Assert: second removal is a no-op and the count dropped by one only
        assert!(first);
        assert!(!second);
        assert_eq!(registry.len(), 1);
        assert!(registry.contains(id(2)));
    }

    #[test]
    fn test_remove_never_admitted_is_noop() {
        let mut registry: ConnectionRegistry<()> = ConnectionRegistry::new();
        assert!(!registry.remove(id(99)));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_readmit_replaces_sink_without_growing() {
        let mut registry = ConnectionRegistry::new();
        registry.admit(id(1), "old");
        registry.admit(id(1), "new");

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.members().next(), Some((id(1), &"new")));
    }

    #[test]
    fn test_clear_removes_everyone() {
        let mut registry = ConnectionRegistry::new();
        for n in 1..=5 {
            registry.admit(id(n), ());
        }

        assert_eq!(registry.clear(), 5);
        assert!(registry.is_empty());
        assert_eq!(registry.clear(), 0);
    }
}
