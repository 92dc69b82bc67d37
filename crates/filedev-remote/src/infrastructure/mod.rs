//! Infrastructure layer: the socket session to the file server.

pub mod connection;

pub use connection::{Connection, ConnectionError, RemoteConfig, Transport, DEFAULT_PORT};
