//! Ordered list of backing stores tried in turn.

use std::sync::Arc;

use tracing::debug;

use crate::file::{FileDevice, FileHandle, Mode};

/// A path resolver over several [`FileDevice`]s.
///
/// `open` asks each device in insertion order and keeps the first handle that
/// opens.  A device that cannot serve the path (missing file, dead
/// connection) is skipped, which is how a remote mount falls back to a local
/// copy.
#[derive(Default, Clone)]
pub struct DeviceChain {
    devices: Vec<Arc<dyn FileDevice>>,
}

impl DeviceChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `device` to the end of the chain.
    pub fn with(mut self, device: Arc<dyn FileDevice>) -> Self {
        self.devices.push(device);
        self
    }

    pub fn push(&mut self, device: Arc<dyn FileDevice>) {
        self.devices.push(device);
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Opens `path` on the first device that accepts it.
    ///
    /// Returns the serving device's name alongside the open handle.
    pub fn open(&self, path: &str, mode: Mode) -> Option<(&'static str, Box<dyn FileHandle>)> {
        for device in &self.devices {
            let mut file = device.create_file();
            if file.open(path, mode) {
                debug!(device = device.name(), path, "opened");
                return Some((device.name(), file));
            }
            debug!(device = device.name(), path, "device cannot serve path");
        }
        None
    }
}

impl std::fmt::Debug for DeviceChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.devices.iter().map(|d| d.name()))
            .finish()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
