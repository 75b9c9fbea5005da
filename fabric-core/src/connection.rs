//! A single TCP peer: identity, send-half, and lifecycle state.
//!
//! The socket itself is owned exclusively by the per-connection task spawned
//! by the acceptor (see [`crate::acceptor`]); nothing else ever touches it.
//! Everything else in the controller — `send_to`, registries, NApps — talks
//! to that task over [`Connection::send_half`], a cloneable channel handle.
//! This is the split-pump shape: one task drives the real socket, and every
//! other piece of code only ever holds the write side of a channel into it.

use flume::Sender;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use crate::error::{CoreError, Result};

/// Commands accepted by a connection's per-connection task over its
/// command channel.
#[derive(Debug, Clone)]
pub enum ConnectionCommand {
    /// Write these bytes to the socket, in order.
    Send(bytes::Bytes),
    /// Close the socket and terminate the task.
    Close,
}

/// Lifecycle state of a [`Connection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    New = 0,
    Handshaking = 1,
    Established = 2,
    Closing = 3,
    Closed = 4,
}

impl ConnectionState {
    const fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::New,
            1 => Self::Handshaking,
            2 => Self::Established,
            3 => Self::Closing,
            _ => Self::Closed,
        }
    }
}

/// A registry-visible handle to one TCP peer.
///
/// `Connection` never holds the socket. It holds `id` (the peer address),
/// an optional `dpid` once the switch identifies itself, an atomic lifecycle
/// state, and a send-half: a channel to the task that actually owns the
/// socket. Cloning a `Connection` is cheap and shares the same underlying
/// task and state.
#[derive(Clone)]
pub struct Connection {
    id: Arc<str>,
    send_half: Sender<ConnectionCommand>,
    dpid: Arc<Mutex<Option<Arc<str>>>>,
    state: Arc<AtomicU8>,
}

impl Connection {
    #[must_use]
    pub fn new(id: impl Into<Arc<str>>, send_half: Sender<ConnectionCommand>) -> Self {
        Self {
            id: id.into(),
            send_half,
            dpid: Arc::new(Mutex::new(None)),
            state: Arc::new(AtomicU8::new(ConnectionState::New as u8)),
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn dpid(&self) -> Option<Arc<str>> {
        self.dpid.lock().clone()
    }

    pub fn set_dpid(&self, dpid: impl Into<Arc<str>>) {
        *self.dpid.lock() = Some(dpid.into());
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn set_state(&self, state: ConnectionState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Write bytes to this connection's socket.
    ///
    /// A send failure means the per-connection task has already exited
    /// (its command channel is closed); this is mapped to
    /// [`CoreError::ChannelClosed`] rather than surfaced as a panic, since
    /// the write can legitimately race the peer disconnecting.
    pub fn send(&self, bytes: bytes::Bytes) -> Result<()> {
        self.send_half
            .send(ConnectionCommand::Send(bytes))
            .map_err(|_| CoreError::ChannelClosed(self.id.to_string()))
    }

    /// Ask the per-connection task to close the socket.
    pub fn disconnect(&self) {
        self.set_state(ConnectionState::Closing);
        let _ = self.send_half.send(ConnectionCommand::Close);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_after_task_exit_reports_channel_closed() {
        let (tx, rx) = flume::unbounded();
        let conn = Connection::new("10.0.0.1:6633", tx);
        drop(rx);
        let err = conn.send(bytes::Bytes::from_static(b"hi")).unwrap_err();
        assert!(err.is_connection_error());
    }

    #[test]
    fn state_defaults_to_new() {
        let (tx, _rx) = flume::unbounded();
        let conn = Connection::new("10.0.0.1:6633", tx);
        assert_eq!(conn.state(), ConnectionState::New);
    }
}
