//! A file handle served by a remote file server.
//!
//! Each operation is one request/response exchange on the device's shared
//! [`Connection`].  The handle itself only remembers the server-assigned
//! descriptor; the server keeps the actual file.
//!
//! Two flavours of every operation exist:
//!
//! - `try_*` methods return a [`RemoteError`] describing exactly what went
//!   wrong.
//! - The [`FileHandle`] impl collapses those into `false` / `None`, which is
//!   what callers going through a [`filedev_core::DeviceChain`] expect.

use std::sync::Arc;

use filedev_core::path::normalize;
use filedev_core::protocol::commands::{
    decode_opened, decode_position, decode_read, decode_size, decode_written,
};
use filedev_core::protocol::{Descriptor, ProtocolError, Request};
use filedev_core::{FileHandle, Mode, SeekBase};
use thiserror::Error;
use tracing::{debug, warn};

use crate::infrastructure::{Connection, ConnectionError};

/// Errors reported by [`RemoteFile`] operations.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The connection failed or was already closed.
    #[error(transparent)]
    Connection(#[from] ConnectionError),
    /// The server answered the open request with an invalid descriptor.
    #[error("server could not open {path}")]
    OpenFailed { path: String },
    /// The operation needs an open file.
    #[error("file is not open")]
    NotOpen,
    /// `open` was called on a handle that is already open.
    #[error("file is already open")]
    AlreadyOpen,
    /// The request could not be encoded; nothing was sent.
    #[error("request rejected: {0}")]
    Protocol(#[from] ProtocolError),
}

/// A handle to one file on the server.
#[derive(Debug)]
pub struct RemoteFile {
    connection: Arc<Connection>,
    descriptor: Descriptor,
}

impl RemoteFile {
    /// Creates an unopened handle on `connection`.
    pub fn new(connection: Arc<Connection>) -> Self {
        Self {
            connection,
            descriptor: Descriptor::INVALID,
        }
    }

    /// The server-assigned descriptor, or [`Descriptor::INVALID`].
    pub fn descriptor(&self) -> Descriptor {
        self.descriptor
    }

    pub fn is_open(&self) -> bool {
        self.descriptor.is_valid()
    }

    /// Asks the server to open `path` with `mode`.
    ///
    /// The path is normalized before it is sent.
    ///
    /// # Errors
    ///
    /// - [`RemoteError::AlreadyOpen`] if this handle already holds a file.
    /// - [`RemoteError::Protocol`] if the path is too long or contains NUL.
    /// - [`RemoteError::OpenFailed`] if the server refused.
    /// - [`RemoteError::Connection`] if the connection failed.
    pub fn try_open(&mut self, path: &str, mode: Mode) -> Result<(), RemoteError> {
        if self.is_open() {
            return Err(RemoteError::AlreadyOpen);
        }
        let path = normalize(path);
        let request = Request::OpenFile { mode, path: &path };
        let bytes = request.encode()?;

        let descriptor = self
            .connection
            .exchange(request.opcode(), &bytes, |dec| decode_opened(dec))?;
        if !descriptor.is_valid() {
            return Err(RemoteError::OpenFailed { path });
        }
        debug!(%path, %descriptor, ?mode, "remote file opened");
        self.descriptor = descriptor;
        Ok(())
    }

    /// Tells the server to release the file.
    ///
    /// The handle is unopened afterwards even if the notification failed.
    /// Closing an unopened handle sends nothing.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::Connection`] if the close could not be sent.
    pub fn try_close(&mut self) -> Result<(), RemoteError> {
        if !self.is_open() {
            return Ok(());
        }
        let descriptor = std::mem::replace(&mut self.descriptor, Descriptor::INVALID);
        let request = Request::Close { descriptor };
        self.connection.notify(request.opcode(), &request.encode()?)?;
        debug!(%descriptor, "remote file closed");
        Ok(())
    }

    /// Reads exactly `buf.len()` bytes.
    ///
    /// `buf` is overwritten with whatever the server sent even when the
    /// returned flag is `false`.
    ///
    /// # Errors
    ///
    /// [`RemoteError::NotOpen`], [`RemoteError::Protocol`] for oversize reads,
    /// or [`RemoteError::Connection`].
    pub fn try_read(&mut self, buf: &mut [u8]) -> Result<bool, RemoteError> {
        let descriptor = self.require_open()?;
        let request = Request::Read {
            descriptor,
            size: buf.len() as u64,
        };
        let bytes = request.encode()?;
        Ok(self
            .connection
            .exchange(request.opcode(), &bytes, |dec| decode_read(dec, buf))?)
    }

    /// Writes all of `data`, returning the server's success flag.
    ///
    /// # Errors
    ///
    /// [`RemoteError::NotOpen`], [`RemoteError::Protocol`] for oversize
    /// writes, or [`RemoteError::Connection`].
    pub fn try_write(&mut self, data: &[u8]) -> Result<bool, RemoteError> {
        let descriptor = self.require_open()?;
        let request = Request::Write { descriptor, data };
        let bytes = request.encode()?;
        Ok(self
            .connection
            .exchange(request.opcode(), &bytes, |dec| decode_written(dec))?)
    }

    /// File size in bytes as reported by the server.
    ///
    /// # Errors
    ///
    /// [`RemoteError::NotOpen`] or [`RemoteError::Connection`].
    pub fn try_size(&mut self) -> Result<u64, RemoteError> {
        let descriptor = self.require_open()?;
        let request = Request::Size { descriptor };
        let bytes = request.encode()?;
        let size = self
            .connection
            .exchange(request.opcode(), &bytes, |dec| decode_size(dec))?;
        Ok(u64::from(size))
    }

    /// Moves the file position; `Ok(None)` means the server refused.
    ///
    /// # Errors
    ///
    /// [`RemoteError::NotOpen`] or [`RemoteError::Connection`].
    pub fn try_seek(&mut self, base: SeekBase, offset: i64) -> Result<Option<u64>, RemoteError> {
        let descriptor = self.require_open()?;
        let request = Request::Seek {
            descriptor,
            base,
            offset,
        };
        let bytes = request.encode()?;
        let position = self
            .connection
            .exchange(request.opcode(), &bytes, |dec| decode_position(dec))?;
        Ok(u64::try_from(position).ok())
    }

    /// Current file position; `Ok(None)` means the server refused.
    ///
    /// # Errors
    ///
    /// [`RemoteError::NotOpen`] or [`RemoteError::Connection`].
    pub fn try_position(&mut self) -> Result<Option<u64>, RemoteError> {
        let descriptor = self.require_open()?;
        let request = Request::Position { descriptor };
        let bytes = request.encode()?;
        let position = self
            .connection
            .exchange(request.opcode(), &bytes, |dec| decode_position(dec))?;
        Ok(u64::try_from(position).ok())
    }

    fn require_open(&self) -> Result<Descriptor, RemoteError> {
        if self.is_open() {
            Ok(self.descriptor)
        } else {
            Err(RemoteError::NotOpen)
        }
    }

    /// Logs a failed operation and drops the error detail.
    fn settle<T>(&self, op: &'static str, result: Result<T, RemoteError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e @ (RemoteError::OpenFailed { .. } | RemoteError::NotOpen)) => {
                debug!(op, "{e}");
                None
            }
            Err(e) => {
                warn!(op, descriptor = %self.descriptor, "{e}");
                None
            }
        }
    }
}

impl FileHandle for RemoteFile {
    fn open(&mut self, path: &str, mode: Mode) -> bool {
        let result = self.try_open(path, mode);
        self.settle("open", result).is_some()
    }

    fn close(&mut self) {
        let result = self.try_close();
        self.settle("close", result);
    }

    fn read(&mut self, buf: &mut [u8]) -> bool {
        let result = self.try_read(buf);
        self.settle("read", result).unwrap_or(false)
    }

    fn write(&mut self, buf: &[u8]) -> bool {
        let result = self.try_write(buf);
        self.settle("write", result).unwrap_or(false)
    }

    fn size(&mut self) -> Option<u64> {
        let result = self.try_size();
        self.settle("size", result)
    }

    fn seek(&mut self, base: SeekBase, offset: i64) -> Option<u64> {
        let result = self.try_seek(base, offset);
        self.settle("seek", result).flatten()
    }

    fn position(&mut self) -> Option<u64> {
        let result = self.try_position();
        self.settle("position", result).flatten()
    }
}

impl Drop for RemoteFile {
    fn drop(&mut self) {
        if self.is_open() {
            let result = self.try_close();
            self.settle("close on drop", result);
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
