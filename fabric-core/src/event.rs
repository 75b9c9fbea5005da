//! The single message type carried by buffers and delivered to listeners.

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use crate::connection::Connection;

/// Reserved event name emitted by the acceptor for each newly accepted peer.
pub const CONNECTION_NEW: &str = "fabric/core.connection.new";

/// Reserved event name emitted when a per-connection task terminates.
pub const CONNECTION_LOST: &str = "fabric/core.connection.lost";

/// Reserved sentinel. A dispatcher loop that receives an event with this name
/// notifies any remaining listeners and then terminates.
pub const SHUTDOWN: &str = "fabric/core.shutdown";

/// Reserved event name used to surface a failure to the application layer.
pub const CORE_ERROR: &str = "fabric/core.error";

/// Structured payload carried by an [`Event`].
///
/// Most content is plain data. `NewConnection` is the one variant that is
/// consumed rather than read: the built-in connection-registration listener
/// takes the `Connection` out of it exactly once. Wrapping it in a take-once
/// cell lets `Event` stay immutable (its name, timestamp, dpid and
/// connection_id never change) while still letting that one listener move
/// an owned value out of a shared event.
#[derive(Clone)]
pub enum EventContent {
    /// No payload.
    Empty,
    /// Carries the connection for `fabric/core.connection.new`. Wrapped in a
    /// `Mutex<Option<_>>` so it can be taken exactly once.
    NewConnection(Arc<Mutex<Option<Connection>>>),
    /// Carries the reason a connection was lost, for `fabric/core.connection.lost`.
    ConnectionLost { reason: Arc<str> },
    /// Raw decoded bytes/message content from the codec boundary.
    Message(bytes::Bytes),
    /// `fabric/core.error` payload: the event that failed, the cause, and the
    /// destination that was being addressed when it failed.
    Error {
        event_name: Arc<str>,
        exception: Arc<str>,
        destination: Arc<str>,
    },
}

impl fmt::Debug for EventContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "Empty"),
            Self::NewConnection(_) => write!(f, "NewConnection(..)"),
            Self::ConnectionLost { reason } => write!(f, "ConnectionLost({reason})"),
            Self::Message(b) => write!(f, "Message({} bytes)", b.len()),
            Self::Error {
                event_name,
                exception,
                destination,
            } => write!(
                f,
                "Error(event={event_name}, cause={exception}, dest={destination})"
            ),
        }
    }
}

impl EventContent {
    /// Build the payload for a `connection.new` event, wrapping the
    /// connection in a take-once cell.
    #[must_use]
    pub fn new_connection(conn: Connection) -> Self {
        Self::NewConnection(Arc::new(Mutex::new(Some(conn))))
    }

    /// Take the connection out of a `NewConnection` payload.
    ///
    /// Returns `None` if this isn't a `NewConnection` payload or if it has
    /// already been taken.
    pub fn take_connection(&self) -> Option<Connection> {
        match self {
            Self::NewConnection(cell) => cell.lock().take(),
            _ => None,
        }
    }
}

/// An immutable message passed through buffers to listeners.
///
/// `name`, `timestamp`, `dpid` and `connection_id` never change after
/// construction. The payload in `content` may itself be a take-once cell
/// (see [`EventContent::NewConnection`]), but that does not make the event
/// as a whole mutable: every other attribute is plain data.
#[derive(Clone, Debug)]
pub struct Event {
    name: Arc<str>,
    timestamp: SystemTime,
    content: EventContent,
    dpid: Option<Arc<str>>,
    connection_id: Option<Arc<str>>,
}

impl Event {
    /// Construct a new event with the given name and content.
    #[must_use]
    pub fn new(name: impl Into<Arc<str>>, content: EventContent) -> Self {
        Self {
            name: name.into(),
            timestamp: SystemTime::now(),
            content,
            dpid: None,
            connection_id: None,
        }
    }

    /// Attach a dpid to this event (builder-style).
    #[must_use]
    pub fn with_dpid(mut self, dpid: impl Into<Arc<str>>) -> Self {
        self.dpid = Some(dpid.into());
        self
    }

    /// Attach a connection id to this event (builder-style).
    #[must_use]
    pub fn with_connection_id(mut self, id: impl Into<Arc<str>>) -> Self {
        self.connection_id = Some(id.into());
        self
    }

    /// The shutdown sentinel event.
    #[must_use]
    pub fn shutdown() -> Self {
        Self::new(SHUTDOWN, EventContent::Empty)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    #[must_use]
    pub const fn content(&self) -> &EventContent {
        &self.content
    }

    #[must_use]
    pub fn dpid(&self) -> Option<&str> {
        self.dpid.as_deref()
    }

    #[must_use]
    pub fn connection_id(&self) -> Option<&str> {
        self.connection_id.as_deref()
    }

    /// Is this the shutdown sentinel?
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.name.as_ref() == SHUTDOWN
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shutdown_event_is_recognized() {
        let ev = Event::shutdown();
        assert!(ev.is_shutdown());
        assert_eq!(ev.name(), SHUTDOWN);
    }

    #[test]
    fn builder_attaches_routing_keys() {
        let ev = Event::new("x", EventContent::Empty)
            .with_dpid("00:00:00:00:00:00:00:01")
            .with_connection_id("10.0.0.1:6633");
        assert_eq!(ev.dpid(), Some("00:00:00:00:00:00:00:01"));
        assert_eq!(ev.connection_id(), Some("10.0.0.1:6633"));
    }
}
