//! The generic file interface shared by every backing store.
//!
//! Callers only ever see [`FileHandle`] and [`FileDevice`]; whether the bytes
//! come from the local disk or from a machine across the network is invisible
//! to them.  Failures surface through the same narrow channel for every
//! backend: `false` from `open`/`read`/`write`, `None` from the queries.

pub mod chain;
pub mod disk;

use std::fmt;

/// How a file is opened.  A set of flags, encoded on the wire as a `u32`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Mode(pub u32);

impl Mode {
    pub const READ: u32 = 0x1;
    pub const WRITE: u32 = 0x2;
    /// Open an existing file; fail if it is missing.
    pub const OPEN: u32 = 0x4;
    /// Create the file, truncating any existing contents.
    pub const CREATE: u32 = 0x8;
    /// Open the file if it exists, otherwise create it.
    pub const OPEN_OR_CREATE: u32 = 0x10;

    /// Read-only access to an existing file.
    pub const fn read() -> Self {
        Self(Self::READ | Self::OPEN)
    }

    /// Write access to a fresh (created or truncated) file.
    pub const fn write() -> Self {
        Self(Self::WRITE | Self::CREATE)
    }

    pub const fn contains(self, flag: u32) -> bool {
        self.0 & flag == flag
    }

    pub const fn readable(self) -> bool {
        self.contains(Self::READ)
    }

    pub const fn writable(self) -> bool {
        self.contains(Self::WRITE)
    }
}

impl fmt::Debug for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (Self::READ, "READ"),
            (Self::WRITE, "WRITE"),
            (Self::OPEN, "OPEN"),
            (Self::CREATE, "CREATE"),
            (Self::OPEN_OR_CREATE, "OPEN_OR_CREATE"),
        ];
        let set: Vec<&str> = names
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        write!(f, "Mode({})", set.join("|"))
    }
}

/// Reference point for [`FileHandle::seek`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum SeekBase {
    Begin = 0,
    Current = 1,
    End = 2,
}

impl TryFrom<u32> for SeekBase {
    type Error = u32;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(SeekBase::Begin),
            1 => Ok(SeekBase::Current),
            2 => Ok(SeekBase::End),
            other => Err(other),
        }
    }
}

/// One open (or openable) file on some backing store.
///
/// A handle maps to at most one open file at a time.  `close` is idempotent,
/// and every other operation fails when nothing is open.
#[cfg_attr(test, mockall::automock)]
pub trait FileHandle: Send {
    /// Opens `path`; returns whether the backing store accepted it.
    fn open(&mut self, path: &str, mode: Mode) -> bool;

    /// Releases the open file, if any.
    fn close(&mut self);

    /// Fills `buf` entirely from the current position.
    fn read(&mut self, buf: &mut [u8]) -> bool;

    /// Writes all of `buf` at the current position.
    fn write(&mut self, buf: &[u8]) -> bool;

    /// Total size of the file in bytes.
    fn size(&mut self) -> Option<u64>;

    /// Moves the cursor and returns the new absolute position.
    fn seek(&mut self, base: SeekBase, offset: i64) -> Option<u64>;

    /// Current absolute cursor position.
    fn position(&mut self) -> Option<u64>;
}

/// A backing store that hands out [`FileHandle`]s.
#[cfg_attr(test, mockall::automock)]
pub trait FileDevice: Send + Sync {
    /// Short identifier used in logs and device-chain results (`"disk"`, `"tcp"`).
    fn name(&self) -> &'static str;

    /// Creates a new, not yet opened, handle.
    fn create_file(&self) -> Box<dyn FileHandle>;
}

// ── Tests ─────────────────────────────────────────────────────────────────────
