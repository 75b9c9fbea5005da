//! Demonstration NApps (Network Applications) for the fabric controller.
//!
//! These are not OpenFlow NApps — OpenFlow handshake and flow-table
//! semantics are out of scope for this crate, same as for `fabric-core`.
//! They exercise the controller's plumbing (listener dispatch, switch
//! registration, `send_to`) over a trivial line-oriented demonstration
//! protocol, the same demonstration codec `fabric-core` ships for its own
//! tests: each line is one message, classified under [`DEMO_LINE_EVENT`].
//!
//! A line of the form `HELLO <dpid>` is a simulated handshake: it tells
//! [`handshake::HandshakeNApp`] to associate the sending connection with
//! that dpid. Every other line is echoed back by [`echo::EchoNApp`].
//! [`topology::TopologyNApp`] is the one NApp marked as core: it reacts to
//! `fabric/core.connection.lost` by tearing down the switch and connection
//! registry entries for the peer that disconnected, the handler the core
//! itself deliberately leaves unregistered (see `fabric-core`'s design
//! notes on reserved-but-unhandled event names).

pub mod echo;
pub mod handshake;
pub mod topology;

use std::sync::Arc;

use fabric_core::codec::LineCodec;
use fabric_core::prelude::CodecFactory;

/// Event name every decoded line of the demonstration protocol is
/// dispatched under.
pub const DEMO_LINE_EVENT: &str = "fabric/demo.line";

/// A [`CodecFactory`] producing one fresh [`LineCodec`] per connection,
/// classifying every decoded line under [`DEMO_LINE_EVENT`].
#[must_use]
pub fn demo_codec_factory() -> CodecFactory {
    Arc::new(|| Box::new(LineCodec::new(DEMO_LINE_EVENT)))
}
