//! The wire-protocol boundary.
//!
//! The core never parses OpenFlow (or any other wire format) itself; it
//! consumes whatever a `Codec` implementation decodes and hands back
//! whatever it is asked to encode. [`LineCodec`] is a minimal
//! newline-delimited demonstration implementation used by this crate's own
//! tests and examples; it is not a stand-in for a real OpenFlow parser.

use bytes::{Buf, Bytes, BytesMut};
use std::io;
use std::sync::Arc;

/// Turns bytes from the wire into typed messages and back, and classifies
/// each decoded message into the event name it should be dispatched under.
pub trait Codec: Send + 'static {
    /// The decoded message type this codec produces.
    type Message: Send + 'static;

    /// Attempt to decode one message from the front of `src`, removing the
    /// consumed bytes. Returns `Ok(None)` if `src` does not yet hold a
    /// complete message.
    fn decode(&mut self, src: &mut BytesMut) -> io::Result<Option<Self::Message>>;

    /// Encode a message for writing to the wire.
    fn encode(&self, message: &Self::Message) -> Bytes;

    /// The event name a decoded message should be dispatched under.
    fn event_name_for(&self, message: &Self::Message) -> Arc<str>;
}

/// A type-erased view of [`Codec`] that the acceptor talks to.
///
/// The acceptor never needs a decoded `Codec::Message` itself — it only
/// needs the (event name, encoded bytes) pair for each frame, so it can
/// stay generic-free and let each connection's codec be picked at runtime
/// via a boxed factory instead of monomorphizing the whole accept loop
/// over one wire format.
pub trait ErasedCodec: Send + 'static {
    /// Decode and immediately re-encode the next complete frame in `src`,
    /// returning its classification and wire bytes. `Ok(None)` means `src`
    /// does not yet hold a complete frame.
    fn decode_next(&mut self, src: &mut BytesMut) -> io::Result<Option<(Arc<str>, Bytes)>>;
}

impl<C: Codec> ErasedCodec for C {
    fn decode_next(&mut self, src: &mut BytesMut) -> io::Result<Option<(Arc<str>, Bytes)>> {
        match self.decode(src)? {
            Some(message) => {
                let name = self.event_name_for(&message);
                let bytes = self.encode(&message);
                Ok(Some((name, bytes)))
            }
            None => Ok(None),
        }
    }
}

/// A trivial newline-delimited codec: each message is one UTF-8 line.
///
/// Used by this crate's own tests and examples to exercise the acceptor and
/// dispatcher without depending on an external protocol implementation.
#[derive(Default)]
pub struct LineCodec {
    event_name: Arc<str>,
}

impl LineCodec {
    /// Every decoded line is classified under `event_name`.
    #[must_use]
    pub fn new(event_name: impl Into<Arc<str>>) -> Self {
        Self {
            event_name: event_name.into(),
        }
    }
}

impl Codec for LineCodec {
    type Message = String;

    fn decode(&mut self, src: &mut BytesMut) -> std::io::Result<Option<String>> {
        let Some(pos) = src.iter().position(|&b| b == b'\n') else {
            return Ok(None);
        };
        let mut line = src.split_to(pos + 1);
        line.truncate(pos); // drop the newline itself
        let text = String::from_utf8(line.to_vec())
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        Ok(Some(text))
    }

    fn encode(&self, message: &String) -> Bytes {
        let mut out = BytesMut::with_capacity(message.len() + 1);
        out.extend_from_slice(message.as_bytes());
        out.extend_from_slice(b"\n");
        out.freeze()
    }

    fn event_name_for(&self, _message: &String) -> Arc<str> {
        self.event_name.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_waits_for_a_full_line() {
        let mut codec = LineCodec::new("test/line");
        let mut buf = BytesMut::from(&b"hel"[..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        buf.extend_from_slice(b"lo\n");
        assert_eq!(codec.decode(&mut buf).unwrap().unwrap(), "hello");
        assert!(buf.is_empty());
    }

    #[test]
    fn encode_appends_newline() {
        let codec = LineCodec::new("test/line");
        let out = codec.encode(&"hi".to_string());
        assert_eq!(out.chunk(), b"hi\n");
    }
}
