//! Named event buffers (dispatch core)
//!
//! Each buffer is an unbounded FIFO of [`Event`]s with a single dispatcher
//! consumer. `get` blocks the calling thread until an event is available;
//! `put` never blocks. The whole set is shut down by enqueuing the shutdown
//! sentinel onto every buffer exactly once.

use flume::{Receiver, Sender};

use crate::event::Event;

/// One named FIFO queue of events.
///
/// `Buffer` is cheap to clone: cloning shares the same underlying channel,
/// so every clone's `put` enqueues onto the same queue a single dispatcher
/// drains with `get`.
#[derive(Clone)]
pub struct Buffer {
    name: &'static str,
    tx: Sender<Event>,
    rx: Receiver<Event>,
}

impl Buffer {
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        let (tx, rx) = flume::unbounded();
        Self { name, tx, rx }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Enqueue an event. Never blocks.
    pub fn put(&self, event: Event) {
        // The only way this can fail is if every Receiver has been dropped,
        // which only happens once the dispatcher loop that owns this buffer
        // has already terminated; there is nothing useful left to do.
        let _ = self.tx.send(event);
    }

    /// Block the calling thread until an event is available.
    ///
    /// Returns `None` once the buffer is closed and drained (no live sender
    /// remains and the queue is empty); in normal operation the shutdown
    /// sentinel is always observed first.
    pub fn get(&self) -> Option<Event> {
        self.rx.recv().ok()
    }

    /// The async counterpart to [`Buffer::get`], for callers already inside
    /// an async runtime (acceptor/per-connection-task tests) that must not
    /// block their executor's thread with a synchronous channel receive.
    pub async fn get_async(&self) -> Option<Event> {
        self.rx.recv_async().await.ok()
    }

    /// A sender handle that can be cloned and handed to producers
    /// (the acceptor, per-connection tasks, NApps) without exposing `get`.
    #[must_use]
    pub fn sender(&self) -> Sender<Event> {
        self.tx.clone()
    }
}

/// The fixed set of named buffers the controller owns.
///
/// `raw` carries events straight from the wire (via the acceptor and
/// per-connection tasks); `app` carries events produced by NApps and core
/// listeners for further fan-out. `msg_in`/`msg_out` are an optional split
/// for NApps that need independent inbound/outbound backpressure.
pub struct BufferSet {
    pub raw: Buffer,
    pub app: Buffer,
    pub msg_in: Buffer,
    pub msg_out: Buffer,
}

impl BufferSet {
    #[must_use]
    pub fn new() -> Self {
        Self {
            raw: Buffer::new("raw"),
            app: Buffer::new("app"),
            msg_in: Buffer::new("msg_in"),
            msg_out: Buffer::new("msg_out"),
        }
    }

    /// Enqueue the shutdown sentinel onto every buffer exactly once.
    pub fn send_stop_signal(&self) {
        for buf in self.all() {
            buf.put(Event::shutdown());
        }
    }

    #[must_use]
    pub fn all(&self) -> [&Buffer; 4] {
        [&self.raw, &self.app, &self.msg_in, &self.msg_out]
    }
}

impl Default for BufferSet {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventContent;

    #[test]
    fn put_then_get_preserves_order() {
        let buf = Buffer::new("raw");
        buf.put(Event::new("a.1", EventContent::Empty));
        buf.put(Event::new("a.2", EventContent::Empty));
        assert_eq!(buf.get().unwrap().name(), "a.1");
        assert_eq!(buf.get().unwrap().name(), "a.2");
    }

    #[test]
    fn send_stop_signal_reaches_every_buffer() {
        let set = BufferSet::new();
        set.send_stop_signal();
        for buf in set.all() {
            assert!(buf.get().unwrap().is_shutdown());
        }
    }
}
