//! The fabric SDN controller binary.
//!
//! Wires a [`fabric_core::controller::Controller`] to the demonstration
//! line protocol and NApps shipped in `fabric-napps`, starts it, and runs
//! until interrupted. Parsing a real configuration file, loading NApps from
//! a package index, and exposing a REST administration surface are all
//! explicit non-goals of the core this binary embeds — this `main` is
//! deliberately the simplest possible embedding of it.

use fabric_core::config::ControllerConfig;
use fabric_core::controller::Controller;
use fabric_napps::{demo_codec_factory, echo::EchoNApp, handshake::HandshakeNApp, topology::TopologyNApp};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ControllerConfig::new("0.0.0.0", 6653);
    let controller = Controller::new(config, demo_codec_factory());

    controller.register_napp("fabric/topology", std::sync::Arc::new(TopologyNApp::new));
    controller.register_napp("fabric/handshake", std::sync::Arc::new(HandshakeNApp::new));
    controller.register_napp("fabric/echo", std::sync::Arc::new(EchoNApp::new));

    if let Err(e) = controller.start() {
        eprintln!("controller failed to start: {e}");
        std::process::exit(1);
    }
    info!(addr = %controller.config().bind_address(), "controller started");

    // No CLI/signal-handling layer is in scope for the core this binary
    // embeds; block on stdin so `stop()`'s shutdown path is exercised by
    // an interactive run without pulling in a signal-handling dependency.
    let mut line = String::new();
    info!("press enter to stop the controller");
    let _ = std::io::stdin().read_line(&mut line);

    info!("shutting down");
    controller.stop();
}
