//! Byte-stream channels between one worker and the coordinator.
//!
//! A channel carries exactly one unframed payload from the worker to the
//! coordinator. The reader only knows the payload is complete when the
//! worker closes its end, so every read loops until a zero-length read.
//!
//! Two transports are supported:
//!
//! - **Pair**: a connected `socketpair(2)` created before the fork. Each side
//!   drops the end it does not own.
//! - **Rendezvous**: the coordinator binds a named Unix socket before the fork
//!   and the worker connects to it, retrying until its connect timeout.

use super::config::Transport;
use crate::error::{PoolError, Result};
use crate::paths;
use std::io::{self, Read, Write};
use std::net::Shutdown;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Size of each read from the socket (64KB).
const READ_CHUNK_SIZE: usize = 64 * 1024;

/// Delay between worker connection attempts on a rendezvous socket.
pub const CONNECT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Whether the peer has closed its end of the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// More data may still arrive.
    Open,
    /// The peer closed its end (zero-length read).
    Closed,
}

/// A connected stream endpoint with EINTR-safe writes and reads.
#[derive(Debug)]
pub struct Endpoint {
    stream: UnixStream,
}

impl Endpoint {
    fn new(stream: UnixStream) -> Self {
        Self { stream }
    }

    /// Write the whole payload, re-submitting the unwritten remainder after
    /// each partial write.
    ///
    /// Returns the number of bytes written, which equals `payload.len()`.
    pub fn write_payload(&mut self, payload: &[u8]) -> io::Result<usize> {
        let mut written = 0;
        while written < payload.len() {
            match self.stream.write(&payload[written..]) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        format!("channel closed after {} of {} bytes", written, payload.len()),
                    ));
                }
                Ok(n) => written += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(written)
    }

    /// Read until the peer closes, appending to `buf`. Blocks.
    pub fn read_to_close(&mut self, buf: &mut Vec<u8>) -> io::Result<usize> {
        self.stream.set_nonblocking(false)?;
        let mut chunk = vec![0u8; READ_CHUNK_SIZE];
        let mut total = 0;
        loop {
            match self.stream.read(&mut chunk) {
                Ok(0) => return Ok(total),
                Ok(n) => {
                    buf.extend_from_slice(&chunk[..n]);
                    total += n;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    /// Read whatever is buffered right now without blocking.
    fn read_available(&mut self, buf: &mut Vec<u8>) -> io::Result<StreamState> {
        let mut chunk = vec![0u8; READ_CHUNK_SIZE];
        loop {
            match self.stream.read(&mut chunk) {
                Ok(0) => return Ok(StreamState::Closed),
                Ok(n) => buf.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(StreamState::Open),
                Err(e) => return Err(e),
            }
        }
    }

    /// Signal end-of-stream to the peer.
    pub fn close(self) {
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}

/// Removes a rendezvous socket file when dropped.
#[derive(Debug)]
struct SocketFile {
    path: Option<PathBuf>,
}

impl SocketFile {
    /// Bind a listener at `path`, clearing a stale file left by a crashed run.
    fn bind(path: PathBuf) -> io::Result<(UnixListener, Self)> {
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
        let listener = UnixListener::bind(&path)?;
        Ok((listener, Self { path: Some(path) }))
    }

    fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Give up ownership of the file without removing it.
    fn release(mut self) -> PathBuf {
        self.path.take().unwrap_or_default()
    }
}

impl Drop for SocketFile {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            let _ = std::fs::remove_file(path);
        }
    }
}

enum Pending {
    Pair {
        coordinator: UnixStream,
        worker: UnixStream,
    },
    Rendezvous {
        listener: UnixListener,
        socket: SocketFile,
        connect_timeout: Duration,
    },
}

/// A channel created before the fork, not yet split between the two sides.
pub struct PendingChannel {
    unit: usize,
    inner: Pending,
}

/// Open a channel for `unit` using the configured transport.
pub fn open(transport: &Transport, unit: usize) -> Result<PendingChannel> {
    let inner = match transport {
        Transport::Pair => {
            let (coordinator, worker) = UnixStream::pair()
                .map_err(|e| PoolError::Channel(format!("socketpair failed: {}", e)))?;
            Pending::Pair {
                coordinator,
                worker,
            }
        }
        Transport::Rendezvous {
            dir,
            connect_timeout,
        } => {
            let path = paths::socket_path(dir, std::process::id(), unit);
            let (listener, socket) = SocketFile::bind(path.clone()).map_err(|e| {
                PoolError::Channel(format!("Cannot bind socket {}: {}", path.display(), e))
            })?;
            listener.set_nonblocking(true).map_err(|e| {
                PoolError::Channel(format!("Cannot make listener non-blocking: {}", e))
            })?;
            Pending::Rendezvous {
                listener,
                socket,
                connect_timeout: *connect_timeout,
            }
        }
    };
    Ok(PendingChannel { unit, inner })
}

impl PendingChannel {
    pub fn unit(&self) -> usize {
        self.unit
    }

    /// Keep the coordinator side, closing the worker's end in this process.
    pub fn into_coordinator(self) -> Result<CoordinatorEnd> {
        match self.inner {
            Pending::Pair {
                coordinator,
                worker,
            } => {
                drop(worker);
                CoordinatorEnd::connected(coordinator)
            }
            Pending::Rendezvous {
                listener, socket, ..
            } => Ok(CoordinatorEnd::listening(listener, socket)),
        }
    }

    /// Keep the worker side, closing the coordinator's end in this process.
    ///
    /// For a rendezvous channel the socket file is left in place; only the
    /// coordinator removes it.
    pub fn into_worker(self) -> WorkerEnd {
        match self.inner {
            Pending::Pair {
                coordinator,
                worker,
            } => {
                drop(coordinator);
                WorkerEnd::Connected(Endpoint::new(worker))
            }
            Pending::Rendezvous {
                listener,
                socket,
                connect_timeout,
            } => {
                drop(listener);
                WorkerEnd::Connect {
                    path: socket.release(),
                    timeout: connect_timeout,
                }
            }
        }
    }

    /// Split into both ends inside one process.
    pub fn split(self) -> Result<(CoordinatorEnd, WorkerEnd)> {
        match self.inner {
            Pending::Pair {
                coordinator,
                worker,
            } => Ok((
                CoordinatorEnd::connected(coordinator)?,
                WorkerEnd::Connected(Endpoint::new(worker)),
            )),
            Pending::Rendezvous {
                listener,
                socket,
                connect_timeout,
            } => {
                let path = socket.path().map(Path::to_path_buf).unwrap_or_default();
                Ok((
                    CoordinatorEnd::listening(listener, socket),
                    WorkerEnd::Connect {
                        path,
                        timeout: connect_timeout,
                    },
                ))
            }
        }
    }
}

/// The coordinator's end of a channel.
///
/// Non-blocking until [`finish`](Self::finish) so the drain loop can keep
/// ticking; data received early is buffered so a worker writing more than the
/// socket buffer holds is never stalled.
pub struct CoordinatorEnd {
    endpoint: Option<Endpoint>,
    listener: Option<UnixListener>,
    socket: Option<SocketFile>,
    received: Vec<u8>,
    state: StreamState,
}

impl CoordinatorEnd {
    fn connected(stream: UnixStream) -> Result<Self> {
        stream
            .set_nonblocking(true)
            .map_err(|e| PoolError::Channel(format!("Cannot make channel non-blocking: {}", e)))?;
        Ok(Self {
            endpoint: Some(Endpoint::new(stream)),
            listener: None,
            socket: None,
            received: Vec::new(),
            state: StreamState::Open,
        })
    }

    fn listening(listener: UnixListener, socket: SocketFile) -> Self {
        Self {
            endpoint: None,
            listener: Some(listener),
            socket: Some(socket),
            received: Vec::new(),
            state: StreamState::Open,
        }
    }

    /// Whether a worker connection is established.
    pub fn is_connected(&self) -> bool {
        self.endpoint.is_some()
    }

    /// Bytes received so far.
    pub fn received_len(&self) -> usize {
        self.received.len()
    }

    /// Path of the rendezvous socket, if this channel has one.
    pub fn socket_path(&self) -> Option<&Path> {
        self.socket.as_ref().and_then(SocketFile::path)
    }

    /// Accept a pending connection without blocking.
    ///
    /// Returns `true` when a connection is (now) established.
    pub fn try_accept(&mut self) -> io::Result<bool> {
        if self.endpoint.is_some() {
            return Ok(true);
        }
        let Some(listener) = self.listener.as_ref() else {
            return Ok(false);
        };
        match listener.accept() {
            Ok((stream, _)) => {
                stream.set_nonblocking(true)?;
                self.endpoint = Some(Endpoint::new(stream));
                self.listener = None;
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Accept if needed and buffer any data that has arrived, without blocking.
    pub fn pump(&mut self) -> io::Result<StreamState> {
        if self.state == StreamState::Closed || !self.try_accept()? {
            return Ok(self.state);
        }
        if let Some(endpoint) = self.endpoint.as_mut() {
            self.state = endpoint.read_available(&mut self.received)?;
        }
        Ok(self.state)
    }

    /// Read the rest of the payload and close the channel.
    ///
    /// Call only after the worker has exited; this blocks until end-of-stream.
    pub fn finish(mut self) -> io::Result<Vec<u8>> {
        if !self.try_accept()? {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "worker never connected to its channel",
            ));
        }
        if self.state == StreamState::Open
            && let Some(endpoint) = self.endpoint.as_mut()
        {
            endpoint.read_to_close(&mut self.received)?;
            self.state = StreamState::Closed;
        }
        Ok(std::mem::take(&mut self.received))
    }

    /// Close without reading, discarding anything already received.
    pub fn discard(self) -> usize {
        let discarded = self.received.len();
        if let Some(endpoint) = self.endpoint {
            endpoint.close();
        }
        discarded
    }
}

/// The worker's end of a channel.
#[derive(Debug)]
pub enum WorkerEnd {
    /// Already connected (socket pair).
    Connected(Endpoint),
    /// Must connect to the coordinator's rendezvous socket first.
    Connect { path: PathBuf, timeout: Duration },
}

impl WorkerEnd {
    /// Establish the connection, retrying a rendezvous socket every
    /// [`CONNECT_POLL_INTERVAL`] until the timeout elapses.
    pub fn connect(self) -> Result<Endpoint> {
        match self {
            Self::Connected(endpoint) => Ok(endpoint),
            Self::Connect { path, timeout } => {
                let started = Instant::now();
                loop {
                    match UnixStream::connect(&path) {
                        Ok(stream) => return Ok(Endpoint::new(stream)),
                        Err(e) if started.elapsed() >= timeout => {
                            tracing::debug!(path = %path.display(), error = %e, "Giving up on rendezvous socket");
                            return Err(PoolError::ConnectTimeout {
                                path,
                                waited: started.elapsed(),
                            });
                        }
                        Err(_) => std::thread::sleep(CONNECT_POLL_INTERVAL),
                    }
                }
            }
        }
    }

    /// Connect, write the whole payload and close.
    pub fn send(self, payload: &[u8]) -> Result<usize> {
        let mut endpoint = self.connect()?;
        let written = endpoint.write_payload(payload)?;
        endpoint.close();
        Ok(written)
    }
}
