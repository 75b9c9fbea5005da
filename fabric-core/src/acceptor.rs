//! Listens on a configured address and spawns one task per accepted
//! connection, exactly as described by the split-pump design this crate's
//! socket actor already uses: a single task owns the real socket end to
//! end, reading bytes and draining queued writes, while everything else
//! talks to it only through a command channel.

use bytes::BytesMut;
use compio::buf::BufResult;
use compio::io::{AsyncReadExt, AsyncWriteExt};
use compio::net::{TcpListener, TcpStream};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::buffer::Buffer;
use crate::codec::ErasedCodec;
use crate::connection::{Connection, ConnectionCommand, ConnectionState};
use crate::error::{CoreError, Result};
use crate::event::{Event, EventContent, CONNECTION_LOST, CONNECTION_NEW};
use crate::tcp::{bind_with_backlog, enable_tcp_nodelay};

const READ_CHUNK: usize = 8192;

/// Factory for one fresh (stateful) codec instance per accepted connection.
pub type CodecFactory = Arc<dyn Fn() -> Box<dyn ErasedCodec> + Send + Sync>;

/// Owns the listening socket for one configured address.
pub struct Acceptor {
    listen: String,
    backlog: u32,
    raw: Buffer,
    factory: CodecFactory,
    shutdown_rx: flume::Receiver<()>,
}

impl Acceptor {
    #[must_use]
    pub fn new(
        listen: impl Into<String>,
        backlog: u32,
        raw: Buffer,
        factory: CodecFactory,
        shutdown_rx: flume::Receiver<()>,
    ) -> Self {
        Self {
            listen: listen.into(),
            backlog,
            raw,
            factory,
            shutdown_rx,
        }
    }

    /// Bind the listening socket, reporting the outcome on `ready`, then (on
    /// success) accept connections until the shutdown channel fires or the
    /// listening socket errors out.
    ///
    /// Reporting the bind outcome before entering the accept loop lets the
    /// caller treat bind failure as a synchronous, fatal `start()` error
    /// (per the acceptor's failure semantics) even though binding itself
    /// happens on this task's own runtime thread.
    pub async fn run(self, ready: flume::Sender<Result<()>>) {
        let listener = match bind_with_backlog(&self.listen, self.backlog)
            .and_then(TcpListener::from_std)
        {
            Ok(listener) => {
                let _ = ready.send(Ok(()));
                listener
            }
            Err(e) => {
                let _ = ready.send(Err(CoreError::BindFailure(e)));
                return;
            }
        };
        info!(addr = %self.listen, backlog = self.backlog, "acceptor listening");

        loop {
            use futures::{select, FutureExt};

            select! {
                _ = self.shutdown_rx.recv_async().fuse() => {
                    info!("acceptor shutting down");
                    break;
                }
                accepted = listener.accept().fuse() => {
                    match accepted {
                        Ok((stream, addr)) => self.spawn_connection(stream, addr.to_string()),
                        Err(e) => {
                            warn!(error = %e, "acceptor accept failed; stopping");
                            break;
                        }
                    }
                }
            }
        }
    }

    fn spawn_connection(&self, stream: TcpStream, peer_id: String) {
        if let Err(e) = enable_tcp_nodelay(&stream) {
            debug!(error = %e, "failed to set TCP_NODELAY");
        }

        let (cmd_tx, cmd_rx) = flume::unbounded();
        let id: Arc<str> = Arc::from(peer_id);
        let conn = Connection::new(id.clone(), cmd_tx);

        self.raw.put(
            Event::new(CONNECTION_NEW, EventContent::new_connection(conn.clone()))
                .with_connection_id(id.clone()),
        );

        let raw = self.raw.clone();
        let codec = (self.factory)();
        compio::runtime::spawn(run_connection(stream, conn, cmd_rx, raw, codec)).detach();
    }
}

/// The per-connection task: drains queued writes, reads and frames bytes,
/// and emits one event per decoded message until the socket closes or a
/// `Close` command arrives.
async fn run_connection(
    mut stream: TcpStream,
    conn: Connection,
    cmd_rx: flume::Receiver<ConnectionCommand>,
    raw: Buffer,
    mut codec: Box<dyn ErasedCodec>,
) {
    conn.set_state(ConnectionState::Established);
    let mut staging = BytesMut::with_capacity(READ_CHUNK);
    let reason: Arc<str> = 'conn: loop {
        while let Ok(cmd) = cmd_rx.try_recv() {
            match cmd {
                ConnectionCommand::Send(bytes) => {
                    let BufResult(res, _) = stream.write_all(bytes.to_vec()).await;
                    if let Err(e) = res {
                        break 'conn Arc::from(e.to_string());
                    }
                }
                ConnectionCommand::Close => break 'conn Arc::from("closed"),
            }
        }

        let buf = vec![0u8; READ_CHUNK];
        let BufResult(res, buf) = stream.read(buf).await;
        let n = match res {
            Ok(0) => break 'conn Arc::from("eof"),
            Ok(n) => n,
            Err(e) => break 'conn Arc::from(e.to_string()),
        };
        staging.extend_from_slice(&buf[..n]);

        loop {
            match codec.decode_next(&mut staging) {
                Ok(Some((name, bytes))) => {
                    let mut event = Event::new(name, EventContent::Message(bytes))
                        .with_connection_id(conn.id());
                    if let Some(dpid) = conn.dpid() {
                        event = event.with_dpid(dpid);
                    }
                    raw.put(event);
                }
                Ok(None) => break,
                Err(e) => break 'conn Arc::from(e.to_string()),
            }
        }
    };

    conn.set_state(ConnectionState::Closed);
    debug!(id = conn.id(), %reason, "connection lost");
    raw.put(
        Event::new(CONNECTION_LOST, EventContent::ConnectionLost { reason })
            .with_connection_id(conn.id()),
    );
}
