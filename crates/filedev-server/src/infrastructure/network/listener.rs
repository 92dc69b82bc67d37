//! TCP accept loop.
//!
//! Sessions are plain blocking code (one request, one reply, in order), so
//! each accepted socket is converted back to a `std::net::TcpStream` and
//! served on its own named thread.  A session lives as long as its client
//! stays connected, so sessions are kept off tokio's blocking pool, which is
//! sized for short jobs.  The async side only accepts connections, collects
//! finished sessions, and waits for shutdown.
//!
//! On shutdown every live socket is shut down, which makes its session see
//! end-of-stream and return; the loop then joins every session thread.

use std::collections::HashMap;
use std::future::Future;
use std::io::{BufReader, BufWriter};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::thread::{self, JoinHandle};

use filedev_core::DiskDevice;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::application::session::Session;

/// Error type for the listener.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("bind failed on {addr}: {source}")]
    BindFailed {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("listener I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A bound, not yet running, file server.
pub struct FileServer {
    listener: TcpListener,
    device: DiskDevice,
}

impl FileServer {
    /// Binds `addr` and serves files from `device`.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::BindFailed`] if the address is unavailable.
    pub async fn bind(addr: SocketAddr, device: DiskDevice) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::BindFailed { addr, source })?;
        Ok(Self { listener, device })
    }

    /// The bound address; useful when binding port 0.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Io`] if the socket address cannot be read.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts clients until `shutdown` resolves, then closes all sessions.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Io`] only if the listener address cannot be
    /// read; per-connection failures are logged and the loop continues.
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> Result<(), ServerError> {
        let local = self.local_addr()?;
        info!(
            "file server listening on {local}, root {}",
            self.device.root().display()
        );

        let (done_tx, mut done_rx) = mpsc::unbounded_channel::<u64>();
        let mut live: HashMap<u64, (TcpStream, JoinHandle<()>)> = HashMap::new();
        let mut next_id = 0u64;

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("shutdown requested; closing {} session(s)", live.len());
                    break;
                }
                Some(id) = done_rx.recv() => {
                    // The thread has returned from its session; dropping the
                    // handle detaches what is left of it.
                    live.remove(&id);
                }
                accepted = self.listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(pair) => pair,
                        Err(e) => {
                            warn!("accept failed: {e}");
                            continue;
                        }
                    };
                    let (stream, handle) = match into_blocking(stream) {
                        Ok(pair) => pair,
                        Err(e) => {
                            warn!(%peer, "could not prepare connection: {e}");
                            continue;
                        }
                    };
                    let id = next_id;
                    next_id += 1;
                    let device = self.device.clone();
                    let done = done_tx.clone();
                    let spawned = thread::Builder::new()
                        .name(format!("filedev-session-{id}"))
                        .spawn(move || {
                            serve_connection(stream, peer, device);
                            let _ = done.send(id);
                        });
                    match spawned {
                        Ok(thread) => {
                            live.insert(id, (handle, thread));
                        }
                        Err(e) => error!(%peer, "could not start session thread: {e}"),
                    }
                }
            }
        }

        let threads: Vec<JoinHandle<()>> = live
            .into_values()
            .map(|(stream, thread)| {
                if let Err(e) = stream.shutdown(Shutdown::Both) {
                    debug!("socket shutdown: {e}");
                }
                thread
            })
            .collect();
        let joined = tokio::task::spawn_blocking(move || {
            threads
                .into_iter()
                .map(JoinHandle::join)
                .filter(Result::is_err)
                .count()
        })
        .await;
        match joined {
            Ok(0) => {}
            Ok(panicked) => error!("{panicked} session thread(s) panicked"),
            Err(e) => error!("joining sessions failed: {e}"),
        }
        info!("file server stopped");
        Ok(())
    }
}

/// Converts an accepted tokio socket into a blocking std socket, plus a
/// second handle the accept loop keeps for force-closing it.
fn into_blocking(stream: tokio::net::TcpStream) -> std::io::Result<(TcpStream, TcpStream)> {
    let stream = stream.into_std()?;
    stream.set_nonblocking(false)?;
    stream.set_nodelay(true)?;
    let handle = stream.try_clone()?;
    Ok((stream, handle))
}

/// Runs one client session to completion, logging how it ended.
pub fn serve_connection(stream: TcpStream, peer: SocketAddr, device: DiskDevice) {
    info!(%peer, "client connected");
    let reader = match stream.try_clone() {
        Ok(reader) => reader,
        Err(e) => {
            error!(%peer, "could not split stream: {e}");
            return;
        }
    };

    let mut session = Session::new(BufReader::new(reader), BufWriter::new(stream), device);
    match session.run() {
        Ok(end) => info!(%peer, ?end, requests = session.requests(), "client disconnected"),
        Err(e) => error!(%peer, requests = session.requests(), "session failed: {e}"),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use filedev_core::protocol::commands::decode_opened;
    use filedev_core::protocol::{Decoder, Descriptor, Request};
    use filedev_core::Mode;
    use std::io::Write;
    use std::path::PathBuf;
    use std::time::Duration;
    use uuid::Uuid;

    fn scratch() -> (DiskDevice, PathBuf) {
        let dir = std::env::temp_dir().join(format!("filedev_listener_{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        (DiskDevice::new(&dir), dir)
    }

    /// Opens `hello.txt` for reading and returns the server's descriptor.
    fn open_hello(client: &mut TcpStream) -> Descriptor {
        let request = Request::OpenFile {
            mode: Mode::read(),
            path: "hello.txt",
        };
        client.write_all(&request.encode().unwrap()).unwrap();
        decode_opened(&mut Decoder::new(client)).unwrap()
    }

    #[tokio::test]
    async fn test_bind_reports_local_addr() {
        let (device, dir) = scratch();
        let server = FileServer::bind("127.0.0.1:0".parse().unwrap(), device)
            .await
            .unwrap();
        assert_ne!(server.local_addr().unwrap().port(), 0);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_bind_conflict_is_bind_failed() {
        let (device, dir) = scratch();
        let first = FileServer::bind("127.0.0.1:0".parse().unwrap(), device.clone())
            .await
            .unwrap();
        let taken = first.local_addr().unwrap();

        let err = FileServer::bind(taken, device).await.err().unwrap();

        assert!(matches!(err, ServerError::BindFailed { .. }));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_serves_open_then_shuts_down_with_client_attached() {
        // Arrange
        let (device, dir) = scratch();
        std::fs::write(dir.join("hello.txt"), b"hi").unwrap();
        let server = FileServer::bind("127.0.0.1:0".parse().unwrap(), device)
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let running = tokio::spawn(server.run(async move {
            let _ = stop_rx.await;
        }));

        // Act: open a file and keep the connection attached.
        let (descriptor, client) = tokio::task::spawn_blocking(move || {
            let mut client = TcpStream::connect(addr).unwrap();
            let descriptor = open_hello(&mut client);
            (descriptor, client)
        })
        .await
        .unwrap();
        stop_tx.send(()).unwrap();

        // Assert
        assert_eq!(descriptor, Descriptor(0));
        running.await.unwrap().unwrap();
        drop(client);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_attached_clients_are_served_beyond_blocking_pool_size() {
        // Arrange: a runtime whose blocking pool holds only two threads.
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .max_blocking_threads(2)
            .enable_all()
            .build()
            .unwrap();
        let (device, dir) = scratch();
        std::fs::write(dir.join("hello.txt"), b"hi").unwrap();
        let (addr, stop_tx, running) = runtime.block_on(async {
            let server = FileServer::bind("127.0.0.1:0".parse().unwrap(), device)
                .await
                .unwrap();
            let addr = server.local_addr().unwrap();
            let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
            let running = tokio::spawn(server.run(async move {
                let _ = stop_rx.await;
            }));
            (addr, stop_tx, running)
        });

        // Act: four clients open a file and stay connected.
        let clients: Vec<(TcpStream, Descriptor)> = (0..4)
            .map(|_| {
                let mut client = TcpStream::connect(addr).unwrap();
                client
                    .set_read_timeout(Some(Duration::from_secs(5)))
                    .unwrap();
                let descriptor = open_hello(&mut client);
                (client, descriptor)
            })
            .collect();
        stop_tx.send(()).unwrap();
        runtime.block_on(running).unwrap().unwrap();

        // Assert
        for (_, descriptor) in &clients {
            assert_eq!(*descriptor, Descriptor(0));
        }
        drop(clients);
        std::fs::remove_dir_all(&dir).ok();
    }
}
