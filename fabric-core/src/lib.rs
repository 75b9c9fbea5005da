//! Fabric Core
//!
//! The event-driven dispatch core of the fabric SDN controller: it owns
//! many concurrent TCP connections from switches, demultiplexes inbound
//! wire frames into typed [`Event`](event::Event)s, routes them to
//! dynamically registered listeners via pattern subscription, and serves as
//! the home for dynamically loaded/unloaded application modules ("NApps").
//!
//! OpenFlow parsing, NApp packaging/discovery, and REST administration are
//! explicit non-goals; this crate only provides the plumbing they run on.
//!
//! Module map:
//! - [`event`] — the immutable message type carried by buffers.
//! - [`buffer`] — named FIFO queues with a uniform shutdown sentinel.
//! - [`connection`] — one TCP peer's identity, send-half, and lifecycle.
//! - [`switch`] — the logical entity served by a sequence of connections.
//! - [`registry`] — concurrent connection-id and dpid lookup tables.
//! - [`listener`] — pattern-based event subscription and dispatch.
//! - [`dispatcher`] — the per-buffer thread that drains events to listeners.
//! - [`acceptor`] — the TCP listener and per-connection I/O tasks.
//! - [`codec`] — the opaque wire-protocol boundary.
//! - [`napp`] — NApp lifecycle: load, start, stop, unload.
//! - [`controller`] — the facade tying all of the above together.
//! - [`config`] — typed controller configuration.
//! - [`error`] — the caller-facing error taxonomy.

#![deny(unsafe_code)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::needless_pass_by_value)]

pub mod acceptor;
pub mod buffer;
pub mod codec;
pub mod config;
pub mod connection;
pub mod controller;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod listener;
pub mod napp;
pub mod registry;
pub mod switch;
mod tcp;

/// Convenience re-exports for embedding binaries and NApp crates.
pub mod prelude {
    pub use crate::acceptor::CodecFactory;
    pub use crate::codec::{Codec, ErasedCodec, LineCodec};
    pub use crate::config::ControllerConfig;
    pub use crate::connection::{Connection, ConnectionState};
    pub use crate::controller::{Controller, Destination, WeakController};
    pub use crate::error::{CoreError, Result};
    pub use crate::event::{Event, EventContent, CONNECTION_LOST, CONNECTION_NEW, CORE_ERROR, SHUTDOWN};
    pub use crate::listener::{ListenerFn, ListenerHandle, ListenerTable};
    pub use crate::napp::{NApp, NAppFactory};
    pub use crate::registry::{ConnectionRegistry, SwitchRegistry};
    pub use crate::switch::Switch;
}
