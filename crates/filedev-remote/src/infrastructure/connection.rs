//! The single shared TCP session to a filedev server.
//!
//! Architecture:
//! - `Connection` owns the byte stream behind one mutex.
//! - An *exchange* (request bytes out, matching response in) runs entirely
//!   inside that mutex, so two threads can never interleave their bytes or
//!   read each other's responses.
//! - Any I/O or protocol failure drops the stream.  From then on every call
//!   fails with [`ConnectionError::Closed`] without touching the network:
//!   the protocol carries no tags, so a stream that lost sync can never be
//!   trusted again.
//!
//! There is no timeout: a server that stops answering blocks the
//! calling thread until the socket itself errors.

use std::io::{self, BufReader, Read, Write};
use std::net::TcpStream;
use std::sync::{Mutex, MutexGuard};

use filedev_core::protocol::{Decoder, Opcode, ProtocolError, Request, WireError};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Port the reference file server listens on by default.
pub const DEFAULT_PORT: u16 = 10001;

/// Errors that can occur on the connection to the file server.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// TCP connection to the server failed.
    #[error("failed to connect to file server at {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },
    /// An I/O error occurred on the established connection.
    #[error("connection I/O error: {0}")]
    Io(#[from] io::Error),
    /// The server sent bytes that do not fit the expected response layout.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    /// The connection was already lost or disconnected.
    #[error("connection closed")]
    Closed,
}

impl From<WireError> for ConnectionError {
    fn from(err: WireError) -> Self {
        match err {
            WireError::Io(e) => ConnectionError::Io(e),
            WireError::Protocol(e) => ConnectionError::Protocol(e),
        }
    }
}

/// Where to find the file server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    pub host: String,
    pub port: u16,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
        }
    }
}

/// Any blocking byte stream a connection can run over.
pub trait Transport: Read + Write + Send {}

impl<T: Read + Write + Send> Transport for T {}

type Stream = BufReader<Box<dyn Transport>>;

/// Decoder handed to response closures; reads straight off the locked stream.
pub type ReplyDecoder<'a> = Decoder<&'a mut Stream>;

/// A request/response session with one file server.
///
/// Shared by every handle of a remote device through an `Arc`.
pub struct Connection {
    peer: String,
    stream: Mutex<Option<Stream>>,
}

impl Connection {
    /// Opens a TCP connection to `host:port`.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::Connect`] if the endpoint is unreachable.
    pub fn connect(host: &str, port: u16) -> Result<Self, ConnectionError> {
        let addr = format!("{host}:{port}");
        let stream = TcpStream::connect((host, port)).map_err(|source| ConnectionError::Connect {
            addr: addr.clone(),
            source,
        })?;
        stream.set_nodelay(true)?;
        info!("connected to file server at {addr}");
        Ok(Self::from_stream(addr, stream))
    }

    /// Wraps an already established stream.
    pub fn from_stream(peer: impl Into<String>, stream: impl Transport + 'static) -> Self {
        let boxed: Box<dyn Transport> = Box::new(stream);
        Self {
            peer: peer.into(),
            stream: Mutex::new(Some(BufReader::new(boxed))),
        }
    }

    /// Human-readable address of the server.
    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// `false` once the connection has failed or been disconnected.
    pub fn is_open(&self) -> bool {
        self.lock().is_some()
    }

    /// Sends `request` and decodes the matching response with `respond`, all
    /// under the connection lock.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::Closed`] immediately if the connection is
    /// already dead.  Any failure during the exchange kills the connection and
    /// is returned as [`ConnectionError::Io`] or [`ConnectionError::Protocol`].
    pub fn exchange<T>(
        &self,
        opcode: Opcode,
        request: &[u8],
        respond: impl FnOnce(&mut ReplyDecoder<'_>) -> Result<T, WireError>,
    ) -> Result<T, ConnectionError> {
        let mut guard = self.lock();
        let stream = guard.as_mut().ok_or(ConnectionError::Closed)?;

        let result = send(stream, request).and_then(|()| {
            let mut dec = Decoder::new(&mut *stream);
            respond(&mut dec)
        });

        match result {
            Ok(value) => {
                debug!(?opcode, bytes = request.len(), "exchange complete");
                Ok(value)
            }
            Err(e) => {
                warn!(peer = %self.peer, ?opcode, "connection lost: {e}");
                *guard = None;
                Err(e.into())
            }
        }
    }

    /// Sends a request that has no response.
    ///
    /// # Errors
    ///
    /// Same as [`Connection::exchange`].
    pub fn notify(&self, opcode: Opcode, request: &[u8]) -> Result<(), ConnectionError> {
        self.exchange(opcode, request, |_| Ok(()))
    }

    /// Tells the server the session is over and releases the socket.
    ///
    /// Calling this on a closed connection is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::Io`] if the notification could not be sent;
    /// the socket is released regardless.
    pub fn disconnect(&self) -> Result<(), ConnectionError> {
        let mut guard = self.lock();
        let Some(mut stream) = guard.take() else {
            return Ok(());
        };
        info!("disconnecting from file server at {}", self.peer);
        send_disconnect(&mut stream)?;
        Ok(())
    }

    /// Acquires the stream lock.  A poisoned lock means some thread panicked
    /// mid-exchange, so the stream is dropped as if it had failed.
    fn lock(&self) -> MutexGuard<'_, Option<Stream>> {
        match self.stream.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                let mut guard = poisoned.into_inner();
                *guard = None;
                guard
            }
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        let stream = match self.stream.get_mut() {
            Ok(stream) => stream,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(mut stream) = stream.take() {
            if let Err(e) = send_disconnect(&mut stream) {
                debug!(peer = %self.peer, "disconnect on drop failed: {e}");
            }
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("peer", &self.peer)
            .field("open", &self.is_open())
            .finish()
    }
}

fn send(stream: &mut Stream, request: &[u8]) -> Result<(), WireError> {
    let writer = stream.get_mut();
    writer.write_all(request)?;
    writer.flush()?;
    Ok(())
}

fn send_disconnect(stream: &mut Stream) -> Result<(), ConnectionError> {
    // Disconnect has no fields that could fail to encode.
    let bytes = Request::Disconnect.encode()?;
    send(stream, &bytes)?;
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedStream;
    use std::sync::Arc;

    #[test]
    fn test_remote_config_default_port() {
        let cfg = RemoteConfig::default();
        assert_eq!(cfg.port, DEFAULT_PORT);
        assert_eq!(cfg.host, "127.0.0.1");
    }

    #[test]
    fn test_exchange_writes_request_and_decodes_reply() {
        // Arrange
        let stream = ScriptedStream::new(7i32.to_le_bytes().to_vec());
        let sent = stream.sent();
        let conn = Connection::from_stream("test", stream);

        // Act
        let reply = conn
            .exchange(Opcode::Size, &[4, 0, 0, 0, 1, 0, 0, 0], |dec| dec.get_i32())
            .unwrap();

        // Assert
        assert_eq!(reply, 7);
        assert_eq!(*sent.lock().unwrap(), vec![4, 0, 0, 0, 1, 0, 0, 0]);
        assert!(conn.is_open());
    }

    #[test]
    fn test_short_reply_kills_connection() {
        // Only two of the four reply bytes arrive before EOF.
        let conn = Connection::from_stream("test", ScriptedStream::new(vec![1, 2]));

        let err = conn
            .exchange(Opcode::Size, &[4, 0, 0, 0], |dec| dec.get_u32())
            .unwrap_err();

        assert!(matches!(err, ConnectionError::Io(_)));
        assert!(!conn.is_open());
    }

    #[test]
    fn test_calls_after_failure_do_no_io() {
        // Arrange: first exchange fails on EOF.
        let stream = ScriptedStream::new(Vec::new());
        let sent = stream.sent();
        let conn = Connection::from_stream("test", stream);
        let _ = conn.exchange(Opcode::Size, &[4, 0, 0, 0], |dec| dec.get_u32());
        let written_before = sent.lock().unwrap().len();

        // Act
        let err = conn
            .exchange(Opcode::Size, &[4, 0, 0, 0], |dec| dec.get_u32())
            .unwrap_err();

        // Assert
        assert!(matches!(err, ConnectionError::Closed));
        assert_eq!(sent.lock().unwrap().len(), written_before);
    }

    #[test]
    fn test_write_failure_kills_connection() {
        let conn = Connection::from_stream("test", ScriptedStream::broken());
        let err = conn.notify(Opcode::Close, &[1, 0, 0, 0]).unwrap_err();
        assert!(matches!(err, ConnectionError::Io(_)));
        assert!(!conn.is_open());
    }

    #[test]
    fn test_malformed_reply_is_protocol_error_and_fatal() {
        let conn = Connection::from_stream("test", ScriptedStream::new(vec![7]));
        let err = conn
            .exchange(Opcode::Write, &[3, 0, 0, 0], |dec| dec.get_bool())
            .unwrap_err();
        assert!(matches!(
            err,
            ConnectionError::Protocol(ProtocolError::InvalidBool(7))
        ));
        assert!(!conn.is_open());
    }

    #[test]
    fn test_disconnect_sends_opcode_and_closes() {
        // Arrange
        let stream = ScriptedStream::new(Vec::new());
        let sent = stream.sent();
        let conn = Connection::from_stream("test", stream);

        // Act
        conn.disconnect().unwrap();
        conn.disconnect().unwrap(); // second call is a no-op

        // Assert
        assert_eq!(*sent.lock().unwrap(), vec![6, 0, 0, 0]);
        assert!(!conn.is_open());
        assert!(matches!(
            conn.notify(Opcode::Close, &[1, 0, 0, 0]),
            Err(ConnectionError::Closed)
        ));
    }

    #[test]
    fn test_drop_sends_disconnect_once() {
        let stream = ScriptedStream::new(Vec::new());
        let sent = stream.sent();
        let conn = Arc::new(Connection::from_stream("test", stream));
        let other = Arc::clone(&conn);

        drop(conn);
        assert!(sent.lock().unwrap().is_empty(), "still referenced");
        drop(other);

        assert_eq!(*sent.lock().unwrap(), vec![6, 0, 0, 0]);
    }

    #[test]
    fn test_connect_to_closed_port_fails() {
        // Bind then drop a listener so the port is very likely unused.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let err = Connection::connect("127.0.0.1", port).unwrap_err();
        assert!(matches!(err, ConnectionError::Connect { .. }));
    }
}
