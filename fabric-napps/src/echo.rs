//! A minimal demonstration NApp: echoes every non-`HELLO` line back to the
//! connection it arrived on, prefixed with `ECHO: `.
//!
//! Exists to exercise the publish half of the NApp contract — subscribing
//! to a pattern and calling `send_to` — the way a real flow-mod-issuing
//! NApp would react to a parsed OpenFlow event instead of a demonstration
//! line.

use bytes::Bytes;
use fabric_core::prelude::{Controller, Destination, Event, EventContent, ListenerFn, NApp, Result, WeakController};
use std::sync::Arc;
use tracing::warn;

use crate::DEMO_LINE_EVENT;

pub struct EchoNApp {
    controller: WeakController,
}

impl EchoNApp {
    #[must_use]
    pub fn new(controller: Controller) -> Arc<dyn NApp> {
        Arc::new(Self {
            controller: controller.downgrade(),
        })
    }

    fn on_line(controller: &Controller, event: &Event) {
        let EventContent::Message(bytes) = event.content() else {
            return;
        };
        let Ok(line) = std::str::from_utf8(bytes) else {
            return;
        };
        if line.starts_with("HELLO ") {
            return;
        }
        let Some(conn_id) = event.connection_id() else {
            return;
        };
        let reply = Bytes::from(format!("ECHO: {line}\n"));
        if let Err(e) = controller.send_to(Destination::Connection(conn_id.to_string()), reply) {
            warn!(connection = conn_id, error = %e, "failed to echo line back");
        }
    }
}

impl NApp for EchoNApp {
    fn name(&self) -> &str {
        "fabric/echo"
    }

    fn listeners(&self) -> Vec<(String, ListenerFn)> {
        let weak = self.controller.clone();
        vec![(
            DEMO_LINE_EVENT.to_string(),
            Arc::new(move |event: &Event| {
                if let Some(controller) = weak.upgrade() {
                    Self::on_line(&controller, event);
                }
            }) as ListenerFn,
        )]
    }

    fn start(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fabric_core::connection::Connection;
    use fabric_core::connection::ConnectionCommand;
    use fabric_core::event::EventContent;
    use fabric_core::prelude::{CodecFactory, ControllerConfig};

    fn test_controller() -> Controller {
        let config = ControllerConfig::new("127.0.0.1", 0);
        let factory: CodecFactory = Arc::new(|| Box::new(fabric_core::codec::LineCodec::new("test/line")));
        Controller::new(config, factory)
    }

    #[test]
    fn non_hello_line_is_echoed_back_to_its_connection() {
        let controller = test_controller();
        let (tx, rx) = flume::unbounded();
        let conn = Connection::new("10.0.0.1:6633", tx);
        controller.connections().insert(conn.clone());

        let event = Event::new(DEMO_LINE_EVENT, EventContent::Message(Bytes::from_static(b"ping")))
            .with_connection_id(conn.id());
        EchoNApp::on_line(&controller, &event);

        match rx.try_recv().unwrap() {
            ConnectionCommand::Send(bytes) => assert_eq!(&bytes[..], b"ECHO: ping\n"),
            other => panic!("expected a Send command, got {other:?}"),
        }
    }

    #[test]
    fn hello_line_is_not_echoed() {
        let controller = test_controller();
        let (tx, rx) = flume::unbounded();
        let conn = Connection::new("10.0.0.1:6633", tx);
        controller.connections().insert(conn.clone());

        let event = Event::new(
            DEMO_LINE_EVENT,
            EventContent::Message(Bytes::from_static(b"HELLO 00:00:00:00:00:00:00:01")),
        )
        .with_connection_id(conn.id());
        EchoNApp::on_line(&controller, &event);

        assert!(rx.try_recv().is_err());
    }
}
