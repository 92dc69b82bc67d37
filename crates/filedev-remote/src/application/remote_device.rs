//! The remote file device: a factory for [`RemoteFile`]s sharing one
//! connection.

use std::sync::Arc;

use filedev_core::{FileDevice, FileHandle};

use crate::application::remote_file::RemoteFile;
use crate::infrastructure::{Connection, ConnectionError, RemoteConfig, Transport};

/// A [`FileDevice`] backed by a filedev server.
///
/// Handles keep the connection alive through an `Arc`; the socket closes when
/// the device and every handle it created are gone, or earlier on
/// [`RemoteDevice::disconnect`].
#[derive(Debug)]
pub struct RemoteDevice {
    connection: Arc<Connection>,
}

impl RemoteDevice {
    /// Connects to the server at `host:port`.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::Connect`] if the server is unreachable.
    pub fn connect(host: &str, port: u16) -> Result<Self, ConnectionError> {
        Ok(Self {
            connection: Arc::new(Connection::connect(host, port)?),
        })
    }

    /// Connects using a [`RemoteConfig`].
    ///
    /// # Errors
    ///
    /// Same as [`RemoteDevice::connect`].
    pub fn from_config(config: &RemoteConfig) -> Result<Self, ConnectionError> {
        Self::connect(&config.host, config.port)
    }

    /// Runs the device over an already established stream.
    pub fn from_stream(peer: impl Into<String>, stream: impl Transport + 'static) -> Self {
        Self {
            connection: Arc::new(Connection::from_stream(peer, stream)),
        }
    }

    /// Sends the disconnect notification and releases the socket.
    ///
    /// Every handle still alive fails its next operation afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::Io`] if the notification could not be sent.
    pub fn disconnect(&self) -> Result<(), ConnectionError> {
        self.connection.disconnect()
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_open()
    }

    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    /// Concrete-typed variant of [`FileDevice::create_file`].
    pub fn create_remote_file(&self) -> RemoteFile {
        RemoteFile::new(Arc::clone(&self.connection))
    }
}

impl FileDevice for RemoteDevice {
    fn name(&self) -> &'static str {
        "tcp"
    }

    fn create_file(&self) -> Box<dyn FileHandle> {
        Box::new(self.create_remote_file())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
