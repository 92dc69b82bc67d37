//! # filedev-remote
//!
//! A file device whose files live on a filedev server.
//!
//! # Architecture overview
//!
//! One [`RemoteDevice`] owns one TCP [`Connection`].  Every [`RemoteFile`] it
//! creates shares that connection and translates each file operation into a
//! single request/response exchange.  Because the protocol has no request
//! tags, the connection serializes exchanges: while one thread waits for its
//! answer, no other thread may send.
//!
//! - **`application`** – [`RemoteDevice`] and [`RemoteFile`], implementing the
//!   generic [`filedev_core::FileDevice`] / [`filedev_core::FileHandle`]
//!   interface, plus [`copy_to`] for chunked downloads.
//! - **`infrastructure`** – [`Connection`]: the locked stream, connect and
//!   disconnect, and the "dead after any error" rule.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use filedev_core::{FileHandle, Mode};
//! use filedev_remote::RemoteDevice;
//!
//! let device = RemoteDevice::connect("127.0.0.1", 10001)?;
//! let mut file = device.create_remote_file();
//! if file.open("maps/level1.map", Mode::read()) {
//!     let mut header = [0u8; 16];
//!     file.read(&mut header);
//! }
//! # Ok::<(), filedev_remote::ConnectionError>(())
//! ```

pub mod application;
pub mod infrastructure;

#[cfg(test)]
pub(crate) mod testing;

pub use application::{copy_to, RemoteDevice, RemoteError, RemoteFile, TransferError, DEFAULT_CHUNK};
pub use infrastructure::{Connection, ConnectionError, RemoteConfig, DEFAULT_PORT};
