//! Dispatcher loops: one OS thread per buffer, each draining its buffer
//! with a blocking `get` and handing every event to the listener table.
//!
//! `Buffer::get` is a genuinely blocking synchronous channel receive, so a
//! dispatcher loop needs no async runtime of its own — unlike the acceptor
//! and per-connection tasks, which are I/O-bound and run inside a compio
//! runtime on their own thread.

use std::io;
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{info, info_span};

use crate::buffer::Buffer;
use crate::listener::ListenerTable;

/// Spawn a dispatcher loop for `buffer`. Terminates once it observes the
/// shutdown sentinel (after notifying any listeners registered for it) or
/// once the buffer's channel closes.
pub fn spawn(buffer: Buffer, listeners: Arc<ListenerTable>) -> io::Result<JoinHandle<()>> {
    let name = buffer.name();
    std::thread::Builder::new()
        .name(format!("dispatcher-{name}"))
        .spawn(move || {
            let span = info_span!("dispatcher", buffer = name);
            let _enter = span.enter();
            loop {
                let Some(event) = buffer.get() else {
                    break;
                };
                let is_shutdown = event.is_shutdown();
                listeners.notify_listeners(&event);
                if is_shutdown {
                    info!("dispatcher terminating on shutdown sentinel");
                    break;
                }
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Event, EventContent};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn shutdown_sentinel_terminates_the_loop_after_delivery() {
        let buffer = Buffer::new("raw");
        let listeners = Arc::new(ListenerTable::new());
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        listeners
            .subscribe("a.", Arc::new(move |_: &Event| {
                c.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();

        buffer.put(Event::new("a.b", EventContent::Empty));
        buffer.put(Event::shutdown());
        buffer.put(Event::new("a.b", EventContent::Empty));

        let handle = spawn(buffer, listeners).unwrap();
        handle.join().unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
