//! Chunked copy from any open [`FileHandle`] into a byte sink.

use std::io::{self, Write};

use filedev_core::FileHandle;
use thiserror::Error;

/// Chunk size used by the fetch tool.
pub const DEFAULT_CHUNK: usize = 64 * 1024;

/// Errors that can occur while copying a file out.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("file size unavailable")]
    SizeUnavailable,
    #[error("read of {len} bytes at offset {offset} failed")]
    ReadFailed { offset: u64, len: usize },
    #[error("output error: {0}")]
    Output(#[from] io::Error),
}

/// Copies the whole of `file` into `out`, `chunk` bytes at a time.
///
/// The handle's size is queried once up front; each read asks for exactly the
/// bytes still outstanding, capped at `chunk`.  Returns the byte count.
///
/// # Errors
///
/// Returns [`TransferError`] if the size or any chunk cannot be read, or if
/// writing to `out` fails.
pub fn copy_to<W: Write>(
    file: &mut dyn FileHandle,
    out: &mut W,
    chunk: usize,
) -> Result<u64, TransferError> {
    let total = file.size().ok_or(TransferError::SizeUnavailable)?;
    let mut buf = vec![0u8; chunk.max(1)];
    let mut offset = 0u64;

    while offset < total {
        let len = usize::try_from(total - offset).map_or(buf.len(), |left| left.min(buf.len()));
        if !file.read(&mut buf[..len]) {
            return Err(TransferError::ReadFailed { offset, len });
        }
        out.write_all(&buf[..len])?;
        offset += len as u64;
    }
    out.flush()?;
    Ok(total)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
