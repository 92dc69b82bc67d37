//! Network layer for the file server.

pub mod listener;

pub use listener::{serve_connection, FileServer, ServerError};
