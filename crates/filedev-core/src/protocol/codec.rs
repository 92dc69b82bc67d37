//! Primitive value codec for the remote file protocol.
//!
//! The protocol has no message framing: every command is a strict sequence of
//! typed fields, so the codec only needs to know how to put and get single
//! values.
//!
//! Wire encoding:
//! ```text
//! u8 / bool   1 byte (bool is 0x00 or 0x01)
//! i32 / u32   4 bytes, little-endian
//! i64 / u64   8 bytes, little-endian
//! string      [len:u32][bytes][0x00]   (len counts the trailing NUL)
//! bytes       raw, length known to both sides beforehand
//! ```
//!
//! # Byte order
//!
//! Existing file servers write their in-memory integers straight onto the
//! socket, which on every supported target means little-endian.

use std::io::{self, Read};

use thiserror::Error;

/// Longest path (in bytes, without the trailing NUL) accepted on the wire.
pub const MAX_PATH_LEN: usize = 260;

/// Largest single `Read` or `Write` payload (16 MiB).
pub const MAX_TRANSFER: u64 = 16 * 1024 * 1024;

/// Errors raised when a value on the wire is malformed.
///
/// Any of these means the byte stream can no longer be trusted; callers treat
/// them exactly like a broken connection.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// A string's declared length exceeds the sanity bound.
    #[error("string of {len} bytes exceeds limit of {max}")]
    StringTooLong { len: usize, max: usize },

    /// A string was not NUL-terminated (or declared a zero length).
    #[error("string is missing its NUL terminator")]
    MissingTerminator,

    /// A string to be encoded contains a NUL byte before its end.
    #[error("string contains an interior NUL byte")]
    InteriorNul,

    /// A string's bytes are not valid UTF-8.
    #[error("invalid UTF-8 in string: {0}")]
    InvalidUtf8(String),

    /// A boolean byte was neither 0 nor 1.
    #[error("invalid boolean byte: 0x{0:02X}")]
    InvalidBool(u8),

    /// The opcode preceding a request is not part of the command set.
    #[error("unknown opcode: {0}")]
    UnknownOpcode(u32),

    /// A seek base outside begin/current/end.
    #[error("unknown seek base: {0}")]
    UnknownSeekBase(u32),

    /// A read or write payload larger than [`MAX_TRANSFER`].
    #[error("transfer of {requested} bytes exceeds limit of {max}")]
    TransferTooLarge { requested: u64, max: u64 },
}

/// Failure while decoding from a live byte stream.
#[derive(Debug, Error)]
pub enum WireError {
    /// The underlying stream failed or hit EOF mid-value.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The bytes arrived but do not form a valid value.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

impl WireError {
    /// Returns `true` when the peer closed the stream cleanly.
    pub fn is_eof(&self) -> bool {
        matches!(self, WireError::Io(e) if e.kind() == io::ErrorKind::UnexpectedEof)
    }
}

// ── Encoder ───────────────────────────────────────────────────────────────────

/// Accumulates one request or reply in memory so it can hit the socket with a
/// single `write_all`.
#[derive(Debug, Default, Clone)]
pub struct Encoder {
    buf: Vec<u8>,
}

impl Encoder {
    /// Creates an empty encoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an encoder with room for `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn put_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn put_bool(&mut self, value: bool) {
        self.buf.push(u8::from(value));
    }

    pub fn put_i32(&mut self, value: i32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn put_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn put_i64(&mut self, value: i64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn put_u64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes a NUL-terminated string with a `u32` length prefix.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::StringTooLong`] if `s` is longer than `max_len`
    /// bytes, or [`ProtocolError::InteriorNul`] if it contains a NUL byte.
    pub fn put_string(&mut self, s: &str, max_len: usize) -> Result<(), ProtocolError> {
        let bytes = s.as_bytes();
        if bytes.len() > max_len {
            return Err(ProtocolError::StringTooLong {
                len: bytes.len(),
                max: max_len,
            });
        }
        if bytes.contains(&0) {
            return Err(ProtocolError::InteriorNul);
        }
        // max_len is far below u32::MAX for every caller, so this cannot truncate.
        self.put_u32((bytes.len() + 1) as u32);
        self.buf.extend_from_slice(bytes);
        self.buf.push(0);
        Ok(())
    }

    /// Appends raw bytes with no prefix.
    pub fn put_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// The bytes encoded so far.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consumes the encoder, returning the encoded bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

// ── Decoder ───────────────────────────────────────────────────────────────────

/// Pulls typed values off a byte stream.
///
/// Every getter blocks until the whole value has arrived; a stream that ends
/// mid-value yields [`WireError::Io`] with `UnexpectedEof`.
#[derive(Debug)]
pub struct Decoder<R> {
    reader: R,
}

impl<R: Read> Decoder<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    pub fn get_u8(&mut self) -> Result<u8, WireError> {
        Ok(self.array::<1>()?[0])
    }

    pub fn get_bool(&mut self) -> Result<bool, WireError> {
        match self.get_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(ProtocolError::InvalidBool(other).into()),
        }
    }

    pub fn get_i32(&mut self) -> Result<i32, WireError> {
        Ok(i32::from_le_bytes(self.array()?))
    }

    pub fn get_u32(&mut self) -> Result<u32, WireError> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    /// Like [`get_u32`](Self::get_u32), but returns `None` when the stream
    /// ends cleanly before the first byte.  A stream that ends after some of
    /// the bytes is still an `UnexpectedEof` error.
    pub fn get_u32_or_end(&mut self) -> Result<Option<u32>, WireError> {
        let mut bytes = [0u8; 4];
        loop {
            match self.reader.read(&mut bytes[..1]) {
                Ok(0) => return Ok(None),
                Ok(_) => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        self.reader.read_exact(&mut bytes[1..])?;
        Ok(Some(u32::from_le_bytes(bytes)))
    }

    pub fn get_i64(&mut self) -> Result<i64, WireError> {
        Ok(i64::from_le_bytes(self.array()?))
    }

    pub fn get_u64(&mut self) -> Result<u64, WireError> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    /// Reads a length-prefixed, NUL-terminated string of at most `max_len`
    /// bytes (not counting the terminator).
    ///
    /// The length is validated before anything is allocated, so a hostile
    /// prefix cannot trigger a huge allocation.
    pub fn get_string(&mut self, max_len: usize) -> Result<String, WireError> {
        let declared = self.get_u32()? as usize;
        if declared == 0 {
            return Err(ProtocolError::MissingTerminator.into());
        }
        if declared - 1 > max_len {
            return Err(ProtocolError::StringTooLong {
                len: declared - 1,
                max: max_len,
            }
            .into());
        }

        let mut bytes = vec![0u8; declared];
        self.reader.read_exact(&mut bytes)?;
        if bytes.pop() != Some(0) {
            return Err(ProtocolError::MissingTerminator.into());
        }
        String::from_utf8(bytes)
            .map_err(|e| ProtocolError::InvalidUtf8(e.to_string()).into())
    }

    /// Fills `buf` completely from the stream.
    pub fn get_bytes(&mut self, buf: &mut [u8]) -> Result<(), WireError> {
        self.reader.read_exact(buf)?;
        Ok(())
    }

    /// Reads and discards exactly `len` bytes.
    pub fn skip(&mut self, len: u64) -> Result<(), WireError> {
        let copied = io::copy(&mut (&mut self.reader).take(len), &mut io::sink())?;
        if copied < len {
            return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
        }
        Ok(())
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    pub fn into_inner(self) -> R {
        self.reader
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], WireError> {
        let mut bytes = [0u8; N];
        self.reader.read_exact(&mut bytes)?;
        Ok(bytes)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
