//! The controller facade: owns every registry and buffer, and is the single
//! entry point embedding code and NApps talk to.
//!
//! `Controller` is a cheap `Clone` handle (an `Arc` around the real state).
//! NApps and the built-in connection-registration listener need a way to
//! call back into it without creating a reference cycle through the
//! listener table they're registered in, so the cycle is broken the way
//! the design notes describe: the listener closure captures a
//! [`WeakController`], not a `Controller`, and upgrades it on each
//! invocation.

use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;
use tracing::{info, warn};

use crate::acceptor::{Acceptor, CodecFactory};
use crate::buffer::BufferSet;
use crate::config::ControllerConfig;
use crate::connection::{Connection, ConnectionState};
use crate::dispatcher;
use crate::error::{CoreError, Result};
use crate::event::{Event, EventContent, CONNECTION_NEW};
use crate::listener::{ListenerFn, ListenerTable};
use crate::napp::NAppManager;
use crate::registry::{ConnectionRegistry, SwitchRegistry};
use crate::switch::Switch;

/// Where `send_to` should deliver a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// A specific TCP peer, addressed by its `(ip, port)` connection id.
    Connection(String),
    /// A logical switch, addressed by its dpid. Resolved through the
    /// switch's *current* connection at the time of the call.
    Dpid(String),
}

struct RunningTasks {
    dispatchers: Vec<JoinHandle<()>>,
    acceptor: Option<JoinHandle<()>>,
    acceptor_shutdown: Option<flume::Sender<()>>,
}

struct ControllerInner {
    config: ControllerConfig,
    codec_factory: CodecFactory,
    buffers: BufferSet,
    listeners: Arc<ListenerTable>,
    connections: ConnectionRegistry,
    switches: SwitchRegistry,
    napps: NAppManager,
    tasks: Mutex<RunningTasks>,
}

/// Owns the buffer set, listener table, switch/connection registries, and
/// NApp registry for one controller instance. Exposes `start`/`stop`,
/// `send_to`, and the lookup/registration operations NApps use.
#[derive(Clone)]
pub struct Controller(Arc<ControllerInner>);

/// A non-owning handle to a [`Controller`], used by callbacks (the built-in
/// connection-registration listener) that must not hold a strong reference
/// back into the object that owns the table they're registered in.
#[derive(Clone)]
pub struct WeakController(Weak<ControllerInner>);

impl WeakController {
    #[must_use]
    pub fn upgrade(&self) -> Option<Controller> {
        self.0.upgrade().map(Controller)
    }
}

impl Controller {
    /// Construct a controller that has not yet been started.
    #[must_use]
    pub fn new(config: ControllerConfig, codec_factory: CodecFactory) -> Self {
        Self(Arc::new(ControllerInner {
            config,
            codec_factory,
            buffers: BufferSet::new(),
            listeners: Arc::new(ListenerTable::new()),
            connections: ConnectionRegistry::new(),
            switches: SwitchRegistry::new(),
            napps: NAppManager::new(),
            tasks: Mutex::new(RunningTasks {
                dispatchers: Vec::new(),
                acceptor: None,
                acceptor_shutdown: None,
            }),
        }))
    }

    #[must_use]
    pub fn downgrade(&self) -> WeakController {
        WeakController(Arc::downgrade(&self.0))
    }

    #[must_use]
    pub fn config(&self) -> &ControllerConfig {
        &self.0.config
    }

    #[must_use]
    pub fn buffers(&self) -> &BufferSet {
        &self.0.buffers
    }

    #[must_use]
    pub fn listeners(&self) -> &ListenerTable {
        &self.0.listeners
    }

    #[must_use]
    pub fn connections(&self) -> &ConnectionRegistry {
        &self.0.connections
    }

    #[must_use]
    pub fn switches(&self) -> &SwitchRegistry {
        &self.0.switches
    }

    /// Register a `(name, factory)` pair to be loaded by `start()`.
    pub fn register_napp(&self, name: impl Into<String>, factory: crate::napp::NAppFactory) {
        self.0.napps.register(name, factory);
    }

    /// Register a newly-learned switch, or (if its dpid is already known)
    /// supersede the existing switch's current connection.
    ///
    /// This is the operation a handshake NApp calls once it has learned a
    /// connection's dpid; the core has no handshake logic of its own.
    pub fn register_switch(&self, dpid: impl Into<Arc<str>>, connection: Connection) {
        let dpid: Arc<str> = dpid.into();
        if let Some(existing) = self.0.switches.get(&dpid) {
            existing.supersede_connection(connection);
        } else {
            self.0.switches.insert(Arc::new(Switch::new(dpid, connection)));
        }
    }

    #[must_use]
    pub fn get_switch_by_dpid(&self, dpid: &str) -> Option<Arc<Switch>> {
        self.0.switches.get(dpid)
    }

    #[must_use]
    pub fn get_connection_by_id(&self, id: &str) -> Option<Connection> {
        self.0.connections.get(id)
    }

    pub fn remove_connection(&self, id: &str) -> bool {
        self.0.connections.remove(id)
    }

    pub fn remove_switch(&self, dpid: &str) -> bool {
        self.0.switches.remove(dpid)
    }

    /// Invoke every listener whose pattern matches `event.name()`.
    pub fn notify_listeners(&self, event: &Event) {
        self.0.listeners.notify_listeners(event);
    }

    /// Write `bytes` to the connection or switch identified by `dest`.
    ///
    /// # Errors
    /// `unknown-destination` if `dest` names no registered connection or
    /// switch; `switch-offline` if the dpid is known but its current
    /// connection is not `ESTABLISHED`; `io-error`/`ChannelClosed` if the
    /// write itself fails.
    pub fn send_to(&self, dest: Destination, bytes: Bytes) -> Result<()> {
        match dest {
            Destination::Connection(id) => {
                let conn = self
                    .0
                    .connections
                    .get(&id)
                    .ok_or_else(|| CoreError::unknown_destination(id.clone()))?;
                conn.send(bytes)
            }
            Destination::Dpid(dpid) => {
                let switch = self
                    .0
                    .switches
                    .get(&dpid)
                    .ok_or_else(|| CoreError::unknown_destination(dpid.clone()))?;
                let conn = switch
                    .current_connection()
                    .ok_or_else(|| CoreError::switch_offline(dpid.clone()))?;
                if conn.state() != ConnectionState::Established {
                    return Err(CoreError::switch_offline(dpid));
                }
                conn.send(bytes)
            }
        }
    }

    /// The built-in listener for `fabric/core.connection.new`: replaces any
    /// prior connection at the same id (disconnecting it), and supersedes
    /// the current connection of the switch the new connection already
    /// identifies as, if any.
    fn on_connection_new(&self, event: &Event) {
        let Some(conn) = event.content().take_connection() else {
            return;
        };
        if let Some(previous) = self.0.connections.insert(conn.clone()) {
            previous.disconnect();
        }
        if let Some(dpid) = conn.dpid() {
            if let Some(switch) = self.0.switches.get(&dpid) {
                switch.supersede_connection(conn);
            }
        }
    }

    fn builtin_listener(&self) -> ListenerFn {
        let weak = self.downgrade();
        Arc::new(move |event: &Event| {
            if let Some(controller) = weak.upgrade() {
                controller.on_connection_new(event);
            }
        })
    }

    /// Launch the acceptor and all dispatcher loops, then load every
    /// registered NApp.
    ///
    /// # Errors
    /// Fails only if the acceptor cannot bind its listening socket; in that
    /// case `stop()` is invoked on whatever already started before the
    /// error is returned.
    pub fn start(&self) -> Result<()> {
        self.0
            .listeners
            .subscribe(CONNECTION_NEW, self.builtin_listener())?;

        let mut tasks = self.0.tasks.lock();
        for buffer in self.0.buffers.all() {
            let handle = dispatcher::spawn(buffer.clone(), self.0.listeners.clone())
                .map_err(CoreError::Io)?;
            tasks.dispatchers.push(handle);
        }
        drop(tasks);

        self.spawn_acceptor()?;
        self.0.napps.load_napps(self);
        Ok(())
    }

    fn spawn_acceptor(&self) -> Result<()> {
        let (shutdown_tx, shutdown_rx) = flume::bounded(1);
        let (ready_tx, ready_rx) = flume::bounded(1);
        let acceptor = Acceptor::new(
            self.0.config.bind_address(),
            self.0.config.backlog(),
            self.0.buffers.raw.clone(),
            self.0.codec_factory.clone(),
            shutdown_rx,
        );

        let handle = std::thread::Builder::new()
            .name("acceptor".to_string())
            .spawn(move || match compio::runtime::Runtime::new() {
                Ok(runtime) => runtime.block_on(acceptor.run(ready_tx)),
                Err(e) => {
                    let _ = ready_tx.send(Err(CoreError::Io(e)));
                }
            })
            .map_err(CoreError::Io)?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                let mut tasks = self.0.tasks.lock();
                tasks.acceptor = Some(handle);
                tasks.acceptor_shutdown = Some(shutdown_tx);
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                // The acceptor thread died before reporting readiness.
                let _ = handle.join();
                Err(CoreError::BindFailure(std::io::Error::other(
                    "acceptor thread exited before binding",
                )))
            }
        }
    }

    /// Close the acceptor socket, enqueue the shutdown sentinel on every
    /// buffer, unload every non-core NApp, join every spawned thread, then
    /// unload every core NApp.
    pub fn stop(&self) {
        let (acceptor_shutdown, acceptor_handle) = {
            let mut tasks = self.0.tasks.lock();
            (tasks.acceptor_shutdown.take(), tasks.acceptor.take())
        };
        if let Some(tx) = acceptor_shutdown {
            let _ = tx.send(());
        }
        if let Some(handle) = acceptor_handle {
            if handle.join().is_err() {
                warn!("acceptor thread panicked");
            }
        }

        self.0.buffers.send_stop_signal();
        self.0.napps.unload_all(self);

        let dispatchers = std::mem::take(&mut self.0.tasks.lock().dispatchers);
        for handle in dispatchers {
            if handle.join().is_err() {
                warn!("dispatcher thread panicked");
            }
        }

        self.0.napps.unload_core(self);
        info!("controller stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::LineCodec;
    use std::time::Duration;

    fn test_controller(port: u16) -> Controller {
        let config = ControllerConfig::new("127.0.0.1", port);
        let factory: CodecFactory = Arc::new(|| Box::new(LineCodec::new("test/line")));
        Controller::new(config, factory)
    }

    #[test]
    fn unknown_destination_fails_without_writing_anywhere() {
        let controller = test_controller(0);
        let err = controller
            .send_to(Destination::Dpid("0xff".into()), Bytes::from_static(b"hi"))
            .unwrap_err();
        assert!(matches!(err, CoreError::UnknownDestination(_)));
    }

    #[test]
    fn send_to_a_known_but_not_established_switch_reports_switch_offline() {
        let controller = test_controller(0);
        let (tx, _rx) = flume::unbounded();
        let conn = Connection::new("10.0.0.1:6633", tx);
        // Freshly constructed connections start in `New`, not `Established`.
        controller.register_switch("0x01", conn);

        let err = controller
            .send_to(Destination::Dpid("0x01".into()), Bytes::from_static(b"hi"))
            .unwrap_err();
        assert!(matches!(err, CoreError::SwitchOffline(d) if d == "0x01"));
    }

    #[test]
    fn connection_replacement_disconnects_the_old_connection() {
        let controller = test_controller(0);

        let (tx_a, _rx_a) = flume::unbounded();
        let conn_a = Connection::new("10.0.0.1:6633", tx_a);
        controller.on_connection_new(&Event::new(
            CONNECTION_NEW,
            EventContent::new_connection(conn_a.clone()),
        ));

        let (tx_b, _rx_b) = flume::unbounded();
        let conn_b = Connection::new("10.0.0.1:6633", tx_b);
        controller.on_connection_new(&Event::new(
            CONNECTION_NEW,
            EventContent::new_connection(conn_b.clone()),
        ));

        assert_eq!(conn_a.state(), ConnectionState::Closing);
        assert_eq!(
            controller.get_connection_by_id("10.0.0.1:6633").unwrap().id(),
            conn_b.id()
        );
    }

    #[test]
    fn stop_joins_every_dispatcher_thread() {
        let controller = test_controller(18080);
        controller.start().unwrap();
        std::thread::sleep(Duration::from_millis(20));
        controller.stop();
        assert!(controller.0.tasks.lock().dispatchers.is_empty());
    }
}
