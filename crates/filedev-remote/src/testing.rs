//! In-memory transports for unit tests.

use std::io::{self, Cursor, Read, Write};
use std::sync::{Arc, Mutex};

/// Replays canned server bytes and records everything the client writes.
pub(crate) struct ScriptedStream {
    input: Cursor<Vec<u8>>,
    sent: Arc<Mutex<Vec<u8>>>,
    broken: bool,
}

impl ScriptedStream {
    pub(crate) fn new(replies: Vec<u8>) -> Self {
        Self {
            input: Cursor::new(replies),
            sent: Arc::new(Mutex::new(Vec::new())),
            broken: false,
        }
    }

    /// A stream whose every write fails as if the peer had gone away.
    pub(crate) fn broken() -> Self {
        Self {
            broken: true,
            ..Self::new(Vec::new())
        }
    }

    /// Shared view of the bytes written so far.
    pub(crate) fn sent(&self) -> Arc<Mutex<Vec<u8>>> {
        Arc::clone(&self.sent)
    }
}

impl Read for ScriptedStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.input.read(buf)
    }
}

impl Write for ScriptedStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.broken {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "peer gone"));
        }
        self.sent.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
