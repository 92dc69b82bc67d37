//! One client session: decode a request, run it against the disk, reply.
//!
//! # Descriptor table (for beginners)
//!
//! The client never sees a server-side file object.  When it opens a file the
//! session stores the [`DiskFile`] in a table and hands back a small integer,
//! the *descriptor*.  Every later request carries that number so the session
//! can find the file again.  Numbers come from a counter that only ever goes
//! up, so a stale descriptor from a closed file can never alias a newer one.
//!
//! # Failure replies
//!
//! A request naming a descriptor the table does not hold is still read in
//! full and still answered, with the failure value for its opcode (`-1`,
//! `false`, or `0`).  Skipping the reply would leave the client blocked
//! forever waiting for it.

use std::collections::HashMap;
use std::io::{Read, Write};

use filedev_core::protocol::{Decoder, Descriptor, IncomingRequest, Reply, WireError};
use filedev_core::{DiskDevice, DiskFile, FileHandle, Mode};
use tracing::{debug, info, warn};

/// Why a session loop returned normally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The client sent `Disconnect`.
    Disconnected,
    /// The stream ended without a `Disconnect`.
    PeerClosed,
}

/// Serves one client stream against one [`DiskDevice`].
pub struct Session<R: Read, W: Write> {
    input: Decoder<R>,
    output: W,
    device: DiskDevice,
    files: HashMap<i32, DiskFile>,
    next_descriptor: i32,
    requests: u64,
}

impl<R: Read, W: Write> Session<R, W> {
    pub fn new(input: R, output: W, device: DiskDevice) -> Self {
        Self {
            input: Decoder::new(input),
            output,
            device,
            files: HashMap::new(),
            next_descriptor: 0,
            requests: 0,
        }
    }

    /// Number of files currently open in this session.
    pub fn open_files(&self) -> usize {
        self.files.len()
    }

    /// Number of requests handled so far.
    pub fn requests(&self) -> u64 {
        self.requests
    }

    /// Serves requests until the client disconnects or the stream ends.
    ///
    /// Every file still open when the loop exits is closed.
    ///
    /// # Errors
    ///
    /// Returns [`WireError`] if the stream fails or carries a malformed
    /// request; the session cannot resynchronize after either.
    pub fn run(&mut self) -> Result<SessionEnd, WireError> {
        let result = self.serve_requests();
        if !self.files.is_empty() {
            info!(count = self.files.len(), "closing files left open by client");
            self.files.clear();
        }
        result
    }

    fn serve_requests(&mut self) -> Result<SessionEnd, WireError> {
        loop {
            let Some(request) = IncomingRequest::decode_next(&mut self.input)? else {
                return Ok(SessionEnd::PeerClosed);
            };
            self.requests += 1;
            debug!(opcode = ?request.opcode(), "request");

            if matches!(request, IncomingRequest::Disconnect) {
                return Ok(SessionEnd::Disconnected);
            }
            if let Some(reply) = self.handle(request) {
                self.output.write_all(&reply.encode())?;
                self.output.flush()?;
            }
        }
    }

    /// Executes one request and returns its reply, if the opcode has one.
    pub fn handle(&mut self, request: IncomingRequest) -> Option<Reply> {
        match request {
            IncomingRequest::OpenFile { mode, path } => Some(Reply::Opened(self.open(&path, mode))),
            IncomingRequest::Close { descriptor } => {
                if self.files.remove(&descriptor.0).is_some() {
                    debug!(%descriptor, "closed");
                } else {
                    debug!(%descriptor, "close of unknown descriptor ignored");
                }
                None
            }
            IncomingRequest::Read { descriptor, size } => {
                // `size` was bounded by the decoder.
                let mut data = vec![0u8; size as usize];
                let success = self
                    .file(descriptor)
                    .is_some_and(|file| file.read(&mut data));
                Some(Reply::Read { data, success })
            }
            IncomingRequest::Write { descriptor, data } => Some(Reply::Written(
                self.file(descriptor).is_some_and(|file| file.write(&data)),
            )),
            IncomingRequest::Size { descriptor } => {
                // The reply is a bare u32: an unknown descriptor reads as an
                // empty file and sizes past 4 GiB saturate.
                let size = self.file(descriptor).and_then(|file| file.size()).unwrap_or(0);
                Some(Reply::Size(u32::try_from(size).unwrap_or(u32::MAX)))
            }
            IncomingRequest::Seek {
                descriptor,
                base,
                offset,
            } => {
                let position = self.file(descriptor).and_then(|file| file.seek(base, offset));
                Some(Reply::Position(wire_position(position)))
            }
            IncomingRequest::Position { descriptor } => {
                let position = self.file(descriptor).and_then(|file| file.position());
                Some(Reply::Position(wire_position(position)))
            }
            IncomingRequest::Disconnect => None,
        }
    }

    fn open(&mut self, path: &str, mode: Mode) -> Descriptor {
        if self.next_descriptor < 0 {
            warn!(path, "descriptor space exhausted");
            return Descriptor::INVALID;
        }
        let mut file = self.device.create_disk_file();
        if !file.open(path, mode) {
            debug!(path, ?mode, "open refused");
            return Descriptor::INVALID;
        }
        let descriptor = self.next_descriptor;
        self.next_descriptor = descriptor.checked_add(1).unwrap_or(-1);
        self.files.insert(descriptor, file);
        debug!(path, ?mode, descriptor, "opened");
        Descriptor(descriptor)
    }

    fn file(&mut self, descriptor: Descriptor) -> Option<&mut DiskFile> {
        self.files.get_mut(&descriptor.0)
    }
}

/// Positions that do not fit the wire's `i32` are reported as failures.
fn wire_position(position: Option<u64>) -> i32 {
    position.and_then(|p| i32::try_from(p).ok()).unwrap_or(-1)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use filedev_core::protocol::Request;
    use filedev_core::SeekBase;
    use std::io::Cursor;
    use std::path::PathBuf;
    use uuid::Uuid;

    fn scratch() -> (DiskDevice, PathBuf) {
        let dir = std::env::temp_dir().join(format!("filedev_session_{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        (DiskDevice::new(&dir), dir)
    }

    fn session(device: DiskDevice) -> Session<Cursor<Vec<u8>>, Vec<u8>> {
        Session::new(Cursor::new(Vec::new()), Vec::new(), device)
    }

    #[test]
    fn test_descriptors_count_up_from_zero() {
        // Arrange
        let (device, dir) = scratch();
        let mut s = session(device);

        // Act
        let a = s.handle(IncomingRequest::OpenFile {
            mode: Mode::write(),
            path: "a.txt".into(),
        });
        let b = s.handle(IncomingRequest::OpenFile {
            mode: Mode::write(),
            path: "b.txt".into(),
        });

        // Assert
        assert_eq!(a, Some(Reply::Opened(Descriptor(0))));
        assert_eq!(b, Some(Reply::Opened(Descriptor(1))));
        assert_eq!(s.open_files(), 2);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_refused_open_does_not_consume_a_descriptor() {
        let (device, dir) = scratch();
        let mut s = session(device);

        let missing = s.handle(IncomingRequest::OpenFile {
            mode: Mode::read(),
            path: "missing.txt".into(),
        });
        let created = s.handle(IncomingRequest::OpenFile {
            mode: Mode::write(),
            path: "new.txt".into(),
        });

        assert_eq!(missing, Some(Reply::Opened(Descriptor::INVALID)));
        assert_eq!(created, Some(Reply::Opened(Descriptor(0))));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_unknown_descriptor_gets_failure_replies() {
        let (device, dir) = scratch();
        let mut s = session(device);
        let bogus = Descriptor(42);

        assert_eq!(
            s.handle(IncomingRequest::Read {
                descriptor: bogus,
                size: 3
            }),
            Some(Reply::Read {
                data: vec![0; 3],
                success: false
            })
        );
        assert_eq!(
            s.handle(IncomingRequest::Write {
                descriptor: bogus,
                data: b"x".to_vec()
            }),
            Some(Reply::Written(false))
        );
        assert_eq!(s.handle(IncomingRequest::Size { descriptor: bogus }), Some(Reply::Size(0)));
        assert_eq!(
            s.handle(IncomingRequest::Seek {
                descriptor: bogus,
                base: SeekBase::Begin,
                offset: 0
            }),
            Some(Reply::Position(-1))
        );
        assert_eq!(
            s.handle(IncomingRequest::Position { descriptor: bogus }),
            Some(Reply::Position(-1))
        );
        assert_eq!(s.handle(IncomingRequest::Close { descriptor: bogus }), None);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_run_replays_write_then_read_session() {
        // Arrange: a write-then-read-back session as a client would send it.
        let (device, dir) = scratch();
        let mut input = Vec::new();
        for request in [
            Request::OpenFile {
                mode: Mode::write(),
                path: "foo.txt",
            },
            Request::Write {
                descriptor: Descriptor(0),
                data: b"abc",
            },
            Request::Close {
                descriptor: Descriptor(0),
            },
            Request::OpenFile {
                mode: Mode::read(),
                path: "foo.txt",
            },
            Request::Size {
                descriptor: Descriptor(1),
            },
            Request::Read {
                descriptor: Descriptor(1),
                size: 3,
            },
            Request::Disconnect,
        ] {
            input.extend(request.encode().unwrap());
        }
        let mut s = Session::new(Cursor::new(input), Vec::new(), device);

        // Act
        let end = s.run().unwrap();

        // Assert
        let mut expected = Vec::new();
        for reply in [
            Reply::Opened(Descriptor(0)),
            Reply::Written(true),
            Reply::Opened(Descriptor(1)),
            Reply::Size(3),
            Reply::Read {
                data: b"abc".to_vec(),
                success: true,
            },
        ] {
            expected.extend(reply.encode());
        }
        assert_eq!(end, SessionEnd::Disconnected);
        assert_eq!(s.output, expected);
        assert_eq!(s.requests(), 7);
        assert_eq!(s.open_files(), 0, "open files are closed at session end");
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_eof_at_request_boundary_is_peer_closed() {
        let (device, dir) = scratch();
        let mut s = session(device);
        assert_eq!(s.run().unwrap(), SessionEnd::PeerClosed);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_stream_cut_inside_request_is_an_error() {
        // Arrange: the client died halfway through a Write payload.
        let (device, dir) = scratch();
        let mut input = Request::Write {
            descriptor: Descriptor(0),
            data: b"abcdef",
        }
        .encode()
        .unwrap();
        input.truncate(input.len() - 3);
        let mut s = Session::new(Cursor::new(input), Vec::new(), device);

        // Act
        let err = s.run().unwrap_err();

        // Assert
        assert!(err.is_eof());
        assert_eq!(s.requests(), 0);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_unknown_opcode_ends_session_with_error() {
        let (device, dir) = scratch();
        let mut s = Session::new(Cursor::new(99u32.to_le_bytes().to_vec()), Vec::new(), device);
        let err = s.run().unwrap_err();
        assert!(matches!(err, WireError::Protocol(_)));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_seek_and_position_report_offsets() {
        // Arrange
        let (device, dir) = scratch();
        std::fs::write(dir.join("ten.bin"), [7u8; 10]).unwrap();
        let mut s = session(device);
        s.handle(IncomingRequest::OpenFile {
            mode: Mode::read(),
            path: "ten.bin".into(),
        });
        let d = Descriptor(0);

        // Act / Assert
        assert_eq!(
            s.handle(IncomingRequest::Seek {
                descriptor: d,
                base: SeekBase::End,
                offset: -2
            }),
            Some(Reply::Position(8))
        );
        assert_eq!(s.handle(IncomingRequest::Position { descriptor: d }), Some(Reply::Position(8)));
        assert_eq!(
            s.handle(IncomingRequest::Seek {
                descriptor: d,
                base: SeekBase::Begin,
                offset: -1
            }),
            Some(Reply::Position(-1))
        );
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_wire_position_rejects_values_beyond_i32() {
        assert_eq!(wire_position(Some(5)), 5);
        assert_eq!(wire_position(Some(u64::from(u32::MAX))), -1);
        assert_eq!(wire_position(None), -1);
    }
}
