//! A stand-in for a real OpenFlow handshake NApp.
//!
//! Real handshake negotiation (feature requests, version agreement) is out
//! of scope for this crate — it's the same non-goal `fabric-core` leaves to
//! collaborator code. This NApp only needs to exercise the switch-learning
//! path: a line of the form `HELLO <dpid>` on the demonstration line
//! protocol stands in for "the peer identified itself as this dpid", and is
//! handled exactly the way a real handshake NApp would call back into the
//! controller once it parsed a real `OFPT_FEATURES_REPLY`.

use fabric_core::prelude::{Controller, Event, EventContent, ListenerFn, NApp, Result, WeakController};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::DEMO_LINE_EVENT;

/// Learns a connection's dpid from a `HELLO <dpid>` line and registers (or
/// supersedes) the corresponding switch.
pub struct HandshakeNApp {
    controller: WeakController,
}

impl HandshakeNApp {
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
        let Some(dpid) = line.strip_prefix("HELLO ") else {
            return;
        };
        let Some(conn_id) = event.connection_id() else {
            return;
        };
        let Some(conn) = controller.get_connection_by_id(conn_id) else {
            warn!(connection = conn_id, "HELLO from an unregistered connection");
            return;
        };
        conn.set_dpid(dpid);
        debug!(connection = conn_id, dpid, "switch identified");
        controller.register_switch(dpid, conn);
    }
}

impl NApp for HandshakeNApp {
    fn name(&self) -> &str {
        "fabric/handshake"
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
    use fabric_core::event::EventContent;
    use fabric_core::prelude::{CodecFactory, ControllerConfig};
    use bytes::Bytes;

    fn test_controller() -> Controller {
        let config = ControllerConfig::new("127.0.0.1", 0);
        let factory: CodecFactory = Arc::new(|| Box::new(fabric_core::codec::LineCodec::new("test/line")));
        Controller::new(config, factory)
    }

    #[test]
    fn hello_line_registers_the_switch() {
        let controller = test_controller();
        let (tx, _rx) = flume::unbounded();
        let conn = Connection::new("10.0.0.1:6633", tx);
        controller.connections().insert(conn.clone());

        let event = Event::new(
            DEMO_LINE_EVENT,
            EventContent::Message(Bytes::from_static(b"HELLO 00:00:00:00:00:00:00:01")),
        )
        .with_connection_id(conn.id());
        HandshakeNApp::on_line(&controller, &event);

        assert_eq!(conn.dpid().as_deref(), Some("00:00:00:00:00:00:00:01"));
        assert!(controller
            .get_switch_by_dpid("00:00:00:00:00:00:00:01")
            .is_some());
    }

    #[test]
    fn non_hello_line_is_ignored() {
        let controller = test_controller();
        let (tx, _rx) = flume::unbounded();
        let conn = Connection::new("10.0.0.1:6633", tx);
        controller.connections().insert(conn.clone());

        let event = Event::new(DEMO_LINE_EVENT, EventContent::Message(Bytes::from_static(b"ECHO: hi")))
            .with_connection_id(conn.id());
        HandshakeNApp::on_line(&controller, &event);

        assert!(conn.dpid().is_none());
    }

    #[test]
    fn hello_from_an_unregistered_connection_does_not_panic() {
        let controller = test_controller();
        let event = Event::new(
            DEMO_LINE_EVENT,
            EventContent::Message(Bytes::from_static(b"HELLO 00:00:00:00:00:00:00:01")),
        )
        .with_connection_id("10.0.0.1:6633");
        HandshakeNApp::on_line(&controller, &event);

        assert!(controller
            .get_switch_by_dpid("00:00:00:00:00:00:00:01")
            .is_none());
    }
}
