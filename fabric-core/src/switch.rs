//! The logical entity identified by a dpid, served by a sequence of
//! [`Connection`]s over its lifetime.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;

use crate::connection::Connection;

/// A switch referenced by its datapath id.
///
/// `Switch` does not own a `Connection`; it holds the current connection's
/// id and looks it up through the registry on use. This breaks the
/// otherwise-cyclic Switch → Connection → buffers → Controller → registries
/// reference, and matches the fact that a Switch outlives any single
/// Connection across reconnects.
pub struct Switch {
    dpid: Arc<str>,
    current_connection: Mutex<Option<Connection>>,
    /// Opaque NApp-managed side table (features, flow tables, anything a
    /// NApp wants to stash against this switch). The core never interprets
    /// these values.
    attrs: DashMap<Arc<str>, Arc<str>>,
}

impl Switch {
    #[must_use]
    pub fn new(dpid: impl Into<Arc<str>>, connection: Connection) -> Self {
        Self {
            dpid: dpid.into(),
            current_connection: Mutex::new(Some(connection)),
            attrs: DashMap::new(),
        }
    }

    #[must_use]
    pub fn dpid(&self) -> &str {
        &self.dpid
    }

    #[must_use]
    pub fn current_connection(&self) -> Option<Connection> {
        self.current_connection.lock().clone()
    }

    /// Replace the current connection, disconnecting the previous one.
    pub fn supersede_connection(&self, new_conn: Connection) {
        let previous = self.current_connection.lock().replace(new_conn);
        if let Some(prev) = previous {
            prev.disconnect();
        }
    }

    /// Disconnect whatever connection this switch currently holds, if any.
    pub fn disconnect(&self) {
        if let Some(conn) = self.current_connection.lock().take() {
            conn.disconnect();
        }
    }

    #[must_use]
    pub fn attr(&self, key: &str) -> Option<Arc<str>> {
        self.attrs.get(key).map(|v| v.clone())
    }

    pub fn set_attr(&self, key: impl Into<Arc<str>>, value: impl Into<Arc<str>>) {
        self.attrs.insert(key.into(), value.into());
    }
}
