//! Remote file protocol: primitive codec and command set.

pub mod codec;
pub mod commands;

pub use codec::{Decoder, Encoder, ProtocolError, WireError, MAX_PATH_LEN, MAX_TRANSFER};
pub use commands::{Descriptor, IncomingRequest, Opcode, Reply, Request};
