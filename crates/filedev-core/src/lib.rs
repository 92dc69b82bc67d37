//! # filedev-core
//!
//! Shared library for filedev containing the remote file protocol, the
//! generic file interface, and the local-disk backing store.
//!
//! This crate is used by both the remote client and the file server.  It has
//! no dependency on sockets; the protocol code works over any
//! `std::io::Read`.
//!
//! # Architecture overview
//!
//! filedev lets a program read and write files without knowing where they
//! live.  Every backing store ("device") hands out handles implementing the
//! same small interface: open, close, read, write, size, seek, position.
//!
//! - **`file`** – The [`FileHandle`] / [`FileDevice`] traits, the local
//!   [`DiskDevice`](file::disk::DiskDevice), and the
//!   [`DeviceChain`](file::chain::DeviceChain) that tries several devices in
//!   order.
//!
//! - **`protocol`** – How a remote device talks to a file server: a strict
//!   sequence of little-endian fields per command, no framing.
//!
//! - **`path`** – One canonical spelling for paths on both ends of the wire.

pub mod file;
pub mod path;
pub mod protocol;

pub use file::chain::DeviceChain;
pub use file::disk::{DiskDevice, DiskFile};
pub use file::{FileDevice, FileHandle, Mode, SeekBase};
pub use protocol::codec::{ProtocolError, WireError};
pub use protocol::commands::{Descriptor, Opcode};
