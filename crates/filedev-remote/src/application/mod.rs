//! Application layer: the remote file device and its handles.

pub mod remote_device;
pub mod remote_file;
pub mod transfer;

pub use remote_device::RemoteDevice;
pub use remote_file::{RemoteError, RemoteFile};
pub use transfer::{copy_to, TransferError, DEFAULT_CHUNK};
