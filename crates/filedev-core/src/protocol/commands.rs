//! The fixed command set of the remote file protocol.
//!
//! Every exchange starts with a `u32` opcode followed by that opcode's request
//! fields; the server answers with that opcode's response fields (if any).
//! There are no headers, lengths or tags beyond that, so both sides must agree
//! on every layout below:
//!
//! ```text
//! opcode       request                                   response
//! OpenFile=0   mode:u32  path:string                     descriptor:i32 (-1 = failed)
//! Close=1      descriptor:i32                            -
//! Read=2       descriptor:i32  size:u64                  data[size]  success:bool
//! Write=3      descriptor:i32  size:u64  data[size]      success:bool
//! Size=4       descriptor:i32                            size:u32
//! Seek=5       descriptor:i32  base:u32  offset:i64      position:i32 (-1 = failed)
//! Disconnect=6 -                                         -
//! Position=7   descriptor:i32                            position:i32 (-1 = failed)
//! ```

use std::io::Read;

use crate::file::{Mode, SeekBase};
use crate::protocol::codec::{
    Decoder, Encoder, ProtocolError, WireError, MAX_PATH_LEN, MAX_TRANSFER,
};

// ── Opcodes ───────────────────────────────────────────────────────────────────

/// Operation codes, in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Opcode {
    OpenFile = 0,
    Close = 1,
    Read = 2,
    Write = 3,
    Size = 4,
    Seek = 5,
    Disconnect = 6,
    Position = 7,
}

impl TryFrom<u32> for Opcode {
    type Error = ProtocolError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Opcode::OpenFile),
            1 => Ok(Opcode::Close),
            2 => Ok(Opcode::Read),
            3 => Ok(Opcode::Write),
            4 => Ok(Opcode::Size),
            5 => Ok(Opcode::Seek),
            6 => Ok(Opcode::Disconnect),
            7 => Ok(Opcode::Position),
            other => Err(ProtocolError::UnknownOpcode(other)),
        }
    }
}

// ── Descriptor ────────────────────────────────────────────────────────────────

/// Server-assigned identifier of one open remote file.
///
/// The client never interprets the number; it only echoes it back.  It is
/// meaningful for the lifetime of one connection only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Descriptor(pub i32);

impl Descriptor {
    /// "No open file".
    pub const INVALID: Descriptor = Descriptor(-1);

    pub const fn is_valid(self) -> bool {
        self.0 != Self::INVALID.0
    }
}

impl std::fmt::Display for Descriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ── Client → server ───────────────────────────────────────────────────────────

/// One request, borrowed from the caller for the duration of an exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request<'a> {
    OpenFile { mode: Mode, path: &'a str },
    Close { descriptor: Descriptor },
    Read { descriptor: Descriptor, size: u64 },
    Write { descriptor: Descriptor, data: &'a [u8] },
    Size { descriptor: Descriptor },
    Seek { descriptor: Descriptor, base: SeekBase, offset: i64 },
    Position { descriptor: Descriptor },
    Disconnect,
}

impl Request<'_> {
    pub fn opcode(&self) -> Opcode {
        match self {
            Request::OpenFile { .. } => Opcode::OpenFile,
            Request::Close { .. } => Opcode::Close,
            Request::Read { .. } => Opcode::Read,
            Request::Write { .. } => Opcode::Write,
            Request::Size { .. } => Opcode::Size,
            Request::Seek { .. } => Opcode::Seek,
            Request::Position { .. } => Opcode::Position,
            Request::Disconnect => Opcode::Disconnect,
        }
    }

    /// Whether the server answers this request.  `Close` and `Disconnect` are
    /// one-way notifications.
    pub fn expects_reply(&self) -> bool {
        !matches!(self, Request::Close { .. } | Request::Disconnect)
    }

    /// Encodes the opcode and request fields.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError`] if the path is too long or contains NUL, or if
    /// a transfer exceeds [`MAX_TRANSFER`].  Nothing has been sent in that case.
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let payload = match self {
            Request::Write { data, .. } => data.len(),
            _ => 0,
        };
        let mut enc = Encoder::with_capacity(32 + payload);
        enc.put_u32(self.opcode() as u32);

        match *self {
            Request::OpenFile { mode, path } => {
                enc.put_u32(mode.0);
                enc.put_string(path, MAX_PATH_LEN)?;
            }
            Request::Close { descriptor }
            | Request::Size { descriptor }
            | Request::Position { descriptor } => enc.put_i32(descriptor.0),
            Request::Read { descriptor, size } => {
                check_transfer(size)?;
                enc.put_i32(descriptor.0);
                enc.put_u64(size);
            }
            Request::Write { descriptor, data } => {
                let size = data.len() as u64;
                check_transfer(size)?;
                enc.put_i32(descriptor.0);
                enc.put_u64(size);
                enc.put_bytes(data);
            }
            Request::Seek {
                descriptor,
                base,
                offset,
            } => {
                enc.put_i32(descriptor.0);
                enc.put_u32(base as u32);
                enc.put_i64(offset);
            }
            Request::Disconnect => {}
        }
        Ok(enc.into_bytes())
    }
}

/// A request as received by the server, owning its path and payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IncomingRequest {
    OpenFile { mode: Mode, path: String },
    Close { descriptor: Descriptor },
    Read { descriptor: Descriptor, size: u64 },
    Write { descriptor: Descriptor, data: Vec<u8> },
    Size { descriptor: Descriptor },
    Seek { descriptor: Descriptor, base: SeekBase, offset: i64 },
    Position { descriptor: Descriptor },
    Disconnect,
}

impl IncomingRequest {
    /// Reads one complete request (opcode included) from `dec`.
    ///
    /// Transfer sizes are checked before any payload buffer is allocated.
    pub fn decode<R: Read>(dec: &mut Decoder<R>) -> Result<Self, WireError> {
        let opcode = Opcode::try_from(dec.get_u32()?)?;
        Self::decode_body(opcode, dec)
    }

    /// Reads the next request, or `None` if the stream ended between
    /// requests.  Truncation inside a request is an error.
    pub fn decode_next<R: Read>(dec: &mut Decoder<R>) -> Result<Option<Self>, WireError> {
        match dec.get_u32_or_end()? {
            Some(raw) => Ok(Some(Self::decode_body(Opcode::try_from(raw)?, dec)?)),
            None => Ok(None),
        }
    }

    fn decode_body<R: Read>(opcode: Opcode, dec: &mut Decoder<R>) -> Result<Self, WireError> {
        let request = match opcode {
            Opcode::OpenFile => {
                let mode = Mode(dec.get_u32()?);
                let path = dec.get_string(MAX_PATH_LEN)?;
                IncomingRequest::OpenFile { mode, path }
            }
            Opcode::Close => IncomingRequest::Close {
                descriptor: Descriptor(dec.get_i32()?),
            },
            Opcode::Read => {
                let descriptor = Descriptor(dec.get_i32()?);
                let size = dec.get_u64()?;
                check_transfer(size)?;
                IncomingRequest::Read { descriptor, size }
            }
            Opcode::Write => {
                let descriptor = Descriptor(dec.get_i32()?);
                let size = dec.get_u64()?;
                check_transfer(size)?;
                let mut data = vec![0u8; size as usize];
                dec.get_bytes(&mut data)?;
                IncomingRequest::Write { descriptor, data }
            }
            Opcode::Size => IncomingRequest::Size {
                descriptor: Descriptor(dec.get_i32()?),
            },
            Opcode::Seek => {
                let descriptor = Descriptor(dec.get_i32()?);
                let raw_base = dec.get_u32()?;
                let base =
                    SeekBase::try_from(raw_base).map_err(ProtocolError::UnknownSeekBase)?;
                let offset = dec.get_i64()?;
                IncomingRequest::Seek {
                    descriptor,
                    base,
                    offset,
                }
            }
            Opcode::Position => IncomingRequest::Position {
                descriptor: Descriptor(dec.get_i32()?),
            },
            Opcode::Disconnect => IncomingRequest::Disconnect,
        };
        Ok(request)
    }

    pub fn opcode(&self) -> Opcode {
        match self {
            IncomingRequest::OpenFile { .. } => Opcode::OpenFile,
            IncomingRequest::Close { .. } => Opcode::Close,
            IncomingRequest::Read { .. } => Opcode::Read,
            IncomingRequest::Write { .. } => Opcode::Write,
            IncomingRequest::Size { .. } => Opcode::Size,
            IncomingRequest::Seek { .. } => Opcode::Seek,
            IncomingRequest::Position { .. } => Opcode::Position,
            IncomingRequest::Disconnect => Opcode::Disconnect,
        }
    }
}

// ── Server → client ───────────────────────────────────────────────────────────

/// A response, as produced by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Answer to `OpenFile`.
    Opened(Descriptor),
    /// Answer to `Read`.  `data` must be exactly the requested size even when
    /// `success` is false, or the stream loses sync.
    Read { data: Vec<u8>, success: bool },
    /// Answer to `Write`.
    Written(bool),
    /// Answer to `Size`.
    Size(u32),
    /// Answer to `Seek` and `Position`.
    Position(i32),
}

impl Reply {
    pub fn encode(&self) -> Vec<u8> {
        let mut enc = match self {
            Reply::Read { data, .. } => Encoder::with_capacity(data.len() + 1),
            _ => Encoder::with_capacity(4),
        };
        match self {
            Reply::Opened(descriptor) => enc.put_i32(descriptor.0),
            Reply::Read { data, success } => {
                enc.put_bytes(data);
                enc.put_bool(*success);
            }
            Reply::Written(success) => enc.put_bool(*success),
            Reply::Size(size) => enc.put_u32(*size),
            Reply::Position(position) => enc.put_i32(*position),
        }
        enc.into_bytes()
    }
}

/// Reads an `OpenFile` response.
pub fn decode_opened<R: Read>(dec: &mut Decoder<R>) -> Result<Descriptor, WireError> {
    Ok(Descriptor(dec.get_i32()?))
}

/// Reads a `Read` response into `buf`, returning the server's success flag.
///
/// `buf` is always filled from the wire, whatever the flag says.
pub fn decode_read<R: Read>(dec: &mut Decoder<R>, buf: &mut [u8]) -> Result<bool, WireError> {
    dec.get_bytes(buf)?;
    dec.get_bool()
}

/// Reads a `Write` response.
pub fn decode_written<R: Read>(dec: &mut Decoder<R>) -> Result<bool, WireError> {
    dec.get_bool()
}

/// Reads a `Size` response.
pub fn decode_size<R: Read>(dec: &mut Decoder<R>) -> Result<u32, WireError> {
    dec.get_u32()
}

/// Reads a `Seek` or `Position` response.
pub fn decode_position<R: Read>(dec: &mut Decoder<R>) -> Result<i32, WireError> {
    dec.get_i32()
}

fn check_transfer(size: u64) -> Result<(), ProtocolError> {
    if size > MAX_TRANSFER {
        return Err(ProtocolError::TransferTooLarge {
            requested: size,
            max: MAX_TRANSFER,
        });
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
