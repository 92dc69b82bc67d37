//! # filedev-server
//!
//! Reference file server for the filedev remote file protocol.
//!
//! A client opens one TCP connection and sends commands (`OpenFile`, `Read`,
//! `Write`, ...) one at a time; the server runs each against a directory on
//! its local disk and answers in order.
//!
//! # Layers
//!
//! - **`application`** – [`Session`]: the per-client descriptor table and
//!   request dispatch.  Synchronous and generic over the byte stream, so it
//!   is tested with in-memory buffers.
//! - **`infrastructure::network`** – [`FileServer`]: the tokio accept loop
//!   that hands every connection to a blocking session.
//! - **`infrastructure::storage`** – TOML configuration.

pub mod application;
pub mod infrastructure;

pub use application::{Session, SessionEnd};
pub use infrastructure::network::{FileServer, ServerError};
pub use infrastructure::storage::{AppConfig, ConfigError, ServerConfig};
