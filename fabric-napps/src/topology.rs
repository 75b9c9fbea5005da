//! The core NApp that keeps the switch and connection registries in sync
//! with connection loss.
//!
//! `fabric-core` emits `fabric/core.connection.lost` from the per-connection
//! task on EOF/error but deliberately registers no built-in handler for it
//! (see the core crate's design notes) — that reaction belongs to a core
//! NApp, and this is it.

use fabric_core::event::CONNECTION_LOST;
use fabric_core::prelude::{Controller, Event, ListenerFn, NApp, Result, WeakController};
use std::sync::Arc;
use tracing::debug;

/// Removes the lost connection from the connection registry and, if it was
/// a switch's current connection, clears that switch's connection handle
/// too. Protected from automatic unload (`is_core` returns `true`): if this
/// NApp goes away, nothing else keeps the registries consistent.
pub struct TopologyNApp {
    controller: WeakController,
}

impl TopologyNApp {
    #[must_use]
    pub fn new(controller: Controller) -> Arc<dyn NApp> {
        Arc::new(Self {
            controller: controller.downgrade(),
        })
    }

    fn on_connection_lost(controller: &Controller, event: &Event) {
        let Some(id) = event.connection_id() else {
            return;
        };
        if let Some(dpid) = controller.switches().disconnect_by_connection_id(id) {
            debug!(connection = id, dpid = %dpid, "switch connection cleared");
        }
        controller.remove_connection(id);
    }
}

impl NApp for TopologyNApp {
    fn name(&self) -> &str {
        "fabric/topology"
    }

    fn listeners(&self) -> Vec<(String, ListenerFn)> {
        let weak = self.controller.clone();
        vec![(
            CONNECTION_LOST.to_string(),
            Arc::new(move |event: &Event| {
                if let Some(controller) = weak.upgrade() {
                    Self::on_connection_lost(&controller, event);
                }
            }) as ListenerFn,
        )]
    }

    fn start(&self) -> Result<()> {
        Ok(())
    }

    fn is_core(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fabric_core::connection::{Connection, ConnectionState};
    use fabric_core::event::EventContent;
    use fabric_core::prelude::{CodecFactory, ControllerConfig};

    fn test_controller() -> Controller {
        let config = ControllerConfig::new("127.0.0.1", 0);
        let factory: CodecFactory = Arc::new(|| Box::new(fabric_core::codec::LineCodec::new("test/line")));
        Controller::new(config, factory)
    }

    #[test]
    fn connection_loss_clears_switch_and_connection_registries() {
        let controller = test_controller();
        let (tx, _rx) = flume::unbounded();
        let conn = Connection::new("10.0.0.1:6633", tx);
        conn.set_dpid("00:00:00:00:00:00:00:01");
        controller.connections().insert(conn.clone());
        controller.register_switch("00:00:00:00:00:00:00:01", conn.clone());

        let event = Event::new(
            CONNECTION_LOST,
            EventContent::ConnectionLost {
                reason: "eof".into(),
            },
        )
        .with_connection_id(conn.id());
        TopologyNApp::on_connection_lost(&controller, &event);

        assert!(controller.get_connection_by_id(conn.id()).is_none());
        let switch = controller.get_switch_by_dpid("00:00:00:00:00:00:00:01").unwrap();
        assert!(switch.current_connection().is_none());
        assert_eq!(conn.state(), ConnectionState::Closing);
    }

    #[test]
    fn connection_loss_without_a_connection_id_is_a_noop() {
        let controller = test_controller();
        let event = Event::new(
            CONNECTION_LOST,
            EventContent::ConnectionLost {
                reason: "eof".into(),
            },
        );
        TopologyNApp::on_connection_lost(&controller, &event);
    }

    #[test]
    fn is_marked_core() {
        let controller = test_controller();
        let napp = TopologyNApp::new(controller);
        assert!(napp.is_core());
        assert_eq!(napp.name(), "fabric/topology");
    }
}
