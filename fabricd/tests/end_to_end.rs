//! Drives the controller end to end over a real TCP loopback socket: a
//! plain blocking client sends a `HELLO` line (the demonstration
//! handshake), then a second line, and expects the demo echo NApp's reply.

use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use fabric_core::config::ControllerConfig;
use fabric_core::controller::Controller;
use fabric_napps::{demo_codec_factory, echo::EchoNApp, handshake::HandshakeNApp, topology::TopologyNApp};

#[test]
fn hello_then_echo_over_a_real_socket() {
    let port = portpicker::pick_unused_port().expect("no free port for the test controller");
    let config = ControllerConfig::new("127.0.0.1", port);
    let controller = Controller::new(config, demo_codec_factory());

    controller.register_napp("fabric/topology", Arc::new(TopologyNApp::new));
    controller.register_napp("fabric/handshake", Arc::new(HandshakeNApp::new));
    controller.register_napp("fabric/echo", Arc::new(EchoNApp::new));

    controller.start().expect("controller failed to start");

    let stream = TcpStream::connect(("127.0.0.1", port)).expect("failed to connect to controller");
    stream.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
    let mut writer = stream.try_clone().unwrap();
    let mut reader = BufReader::new(stream);

    writer.write_all(b"HELLO 00:00:00:00:00:00:00:2a\n").unwrap();
    writer.write_all(b"ping\n").unwrap();

    // The per-connection task only checks for queued replies between reads
    // (see the core's design notes on the write-drain-before-read loop), so
    // give the dispatcher time to run the echo NApp, then prod the socket
    // with one more line so the task wakes up and flushes the reply it
    // already has queued.
    std::thread::sleep(Duration::from_millis(100));
    writer.write_all(b"flush\n").unwrap();

    let mut reply = String::new();
    reader.read_line(&mut reply).expect("no reply from the controller");
    assert_eq!(reply, "ECHO: ping\n");

    std::thread::sleep(Duration::from_millis(50));
    assert!(controller
        .get_switch_by_dpid("00:00:00:00:00:00:00:2a")
        .is_some());

    drop(reader);
    controller.stop();
}
