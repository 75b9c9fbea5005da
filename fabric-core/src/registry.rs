//! Concurrent registries mapping connection ids and dpids to their live
//! objects.
//!
//! Mutated from multiple tasks at once (the acceptor, dispatcher loops,
//! NApp load/unload); a `DashMap` gives each a consistent, independently
//! lockable view instead of a single global lock, the same concurrent-map
//! idiom this crate already uses for its peer tables.

use dashmap::DashMap;
use std::sync::Arc;

use crate::connection::Connection;
use crate::switch::Switch;

/// Registry of live connections keyed by connection id (`ip:port`).
///
/// Invariant: for any id, at most one `Connection` is registered at a time.
#[derive(Default)]
pub struct ConnectionRegistry {
    inner: DashMap<Arc<str>, Connection>,
}

impl ConnectionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<Connection> {
        self.inner.get(id).map(|r| r.clone())
    }

    /// Insert a connection, replacing (and returning) any previous one at
    /// the same id.
    pub fn insert(&self, conn: Connection) -> Option<Connection> {
        self.inner.insert(Arc::from(conn.id()), conn)
    }

    /// Remove a connection, returning whether one was present.
    pub fn remove(&self, id: &str) -> bool {
        self.inner.remove(id).is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// Registry of logical switches keyed by dpid.
///
/// Invariant: for any dpid, at most one `Switch` is registered at a time.
#[derive(Default)]
pub struct SwitchRegistry {
    inner: DashMap<Arc<str>, Arc<Switch>>,
}

impl SwitchRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, dpid: &str) -> Option<Arc<Switch>> {
        self.inner.get(dpid).map(|r| r.clone())
    }

    pub fn insert(&self, switch: Arc<Switch>) -> Option<Arc<Switch>> {
        self.inner.insert(Arc::from(switch.dpid()), switch)
    }

    pub fn remove(&self, dpid: &str) -> bool {
        self.inner.remove(dpid).is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Disconnect the (at most one) switch whose current connection is
    /// `connection_id`, returning its dpid if one was found.
    ///
    /// Used when a connection is lost: the dpid that owned it, if any, needs
    /// its current-connection handle cleared rather than left pointing at a
    /// dead peer.
    pub fn disconnect_by_connection_id(&self, connection_id: &str) -> Option<Arc<str>> {
        for entry in &self.inner {
            if entry.value().current_connection().is_some_and(|c| c.id() == connection_id) {
                entry.value().disconnect();
                return Some(entry.key().clone());
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_connection(id: &str) -> Connection {
        let (tx, _rx) = flume::unbounded();
        Connection::new(id, tx)
    }

    #[test]
    fn insert_replaces_prior_connection_at_same_id() {
        let reg = ConnectionRegistry::new();
        let a = test_connection("10.0.0.1:1");
        let b = test_connection("10.0.0.1:1");
        reg.insert(a);
        let replaced = reg.insert(b.clone());
        assert!(replaced.is_some());
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.get("10.0.0.1:1").unwrap().id(), b.id());
    }

    #[test]
    fn remove_reports_presence() {
        let reg = ConnectionRegistry::new();
        assert!(!reg.remove("none"));
        reg.insert(test_connection("10.0.0.1:1"));
        assert!(reg.remove("10.0.0.1:1"));
        assert!(!reg.remove("10.0.0.1:1"));
    }
}
