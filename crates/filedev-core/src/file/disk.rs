//! Local-disk backing store.
//!
//! Every path is resolved beneath the device root; anything that would climb
//! out of it simply fails to open.  The remote file server executes its
//! commands through this same device, so the remote and local backends share
//! one definition of what `open`/`read`/`seek` mean.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::file::{FileDevice, FileHandle, Mode, SeekBase};
use crate::path::resolve_under;

/// Hands out [`DiskFile`]s rooted at one directory.
#[derive(Debug, Clone)]
pub struct DiskDevice {
    root: Arc<Path>,
}

impl DiskDevice {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root: PathBuf = root.into();
        Self {
            root: Arc::from(root),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Concrete-typed variant of [`FileDevice::create_file`].
    pub fn create_disk_file(&self) -> DiskFile {
        DiskFile {
            root: Arc::clone(&self.root),
            file: None,
        }
    }
}

impl FileDevice for DiskDevice {
    fn name(&self) -> &'static str {
        "disk"
    }

    fn create_file(&self) -> Box<dyn FileHandle> {
        Box::new(self.create_disk_file())
    }
}

/// A file on the local disk.
#[derive(Debug)]
pub struct DiskFile {
    root: Arc<Path>,
    file: Option<File>,
}

impl DiskFile {
    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    fn options(mode: Mode) -> Option<OpenOptions> {
        if !mode.readable() && !mode.writable() {
            return None;
        }
        let mut options = OpenOptions::new();
        options.read(mode.readable()).write(mode.writable());
        if mode.contains(Mode::CREATE) {
            options.create(true).truncate(true);
        } else if mode.contains(Mode::OPEN_OR_CREATE) {
            options.create(true);
        }
        Some(options)
    }
}

impl FileHandle for DiskFile {
    fn open(&mut self, path: &str, mode: Mode) -> bool {
        if self.file.is_some() {
            debug!(path, "disk open rejected: handle already open");
            return false;
        }
        let Some(full) = resolve_under(&self.root, path) else {
            debug!(path, "disk open rejected: path outside root");
            return false;
        };
        let Some(options) = Self::options(mode) else {
            debug!(path, ?mode, "disk open rejected: mode has neither READ nor WRITE");
            return false;
        };
        match options.open(&full) {
            Ok(file) if file.metadata().is_ok_and(|m| m.is_file()) => {
                self.file = Some(file);
                true
            }
            Ok(_) => {
                debug!(path = %full.display(), "disk open rejected: not a regular file");
                false
            }
            Err(e) => {
                debug!(path = %full.display(), "disk open failed: {e}");
                false
            }
        }
    }

    fn close(&mut self) {
        self.file = None;
    }

    fn read(&mut self, buf: &mut [u8]) -> bool {
        self.file
            .as_mut()
            .is_some_and(|f| f.read_exact(buf).is_ok())
    }

    fn write(&mut self, buf: &[u8]) -> bool {
        self.file.as_mut().is_some_and(|f| f.write_all(buf).is_ok())
    }

    fn size(&mut self) -> Option<u64> {
        self.file.as_ref()?.metadata().ok().map(|m| m.len())
    }

    fn seek(&mut self, base: SeekBase, offset: i64) -> Option<u64> {
        let target = match base {
            SeekBase::Begin => SeekFrom::Start(u64::try_from(offset).ok()?),
            SeekBase::Current => SeekFrom::Current(offset),
            SeekBase::End => SeekFrom::End(offset),
        };
        self.file.as_mut()?.seek(target).ok()
    }

    fn position(&mut self) -> Option<u64> {
        self.file.as_mut()?.stream_position().ok()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
