//! TCP connection to the word server.
//!
//! A [`Connection`] owns one socket and moves through a small state machine:
//!
//! ```text
//! Unconnected --connect ok--> Active --(send/receive failure | close)--> Stopped
//! ```
//!
//! Stopped is terminal. The socket is closed exactly once, by whichever
//! caller wins the transition into Stopped.
//!
//! # Exchanges
//!
//! [`Connection::exchange`] holds the stream lock for the whole
//! send-then-receive, so several tasks may share one connection without
//! interleaving frames. [`Connection::send`] and [`Connection::receive`]
//! are the unpaired halves for single-user callers.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, trace};

use crate::error::{Error, Result, TransportFailure};
use crate::identifiers::ConnectionId;
use crate::protocol::{Command, FrameCodec};

use super::ExchangeBuffer;

// ============================================================================
// Constants
// ============================================================================

const STATE_UNCONNECTED: u8 = 0;
const STATE_ACTIVE: u8 = 1;
const STATE_STOPPED: u8 = 2;

/// Message recorded when the peer closes cleanly in the middle of a frame.
const CLOSED_BY_PEER: &str = "CONNECTION CLOSED BY REMOTE HOST";

// ============================================================================
// ConnectionState
// ============================================================================

/// Lifecycle state of a [`Connection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not yet connected (or the connect attempt failed).
    Unconnected,
    /// Connected; sends and receives are allowed.
    Active,
    /// Closed. Terminal.
    Stopped,
}

impl ConnectionState {
    const fn from_u8(value: u8) -> Self {
        match value {
            STATE_UNCONNECTED => Self::Unconnected,
            STATE_ACTIVE => Self::Active,
            _ => Self::Stopped,
        }
    }
}

// ============================================================================
// Frame Reader
// ============================================================================

/// Reads one sentinel-terminated frame from `reader`.
///
/// Each transport read fills at most one chunk of `buffer`'s receive area.
/// Chunks accumulate until the sentinel appears; everything before it is
/// decoded and returned. Bytes after the sentinel in the same chunk are
/// dropped. There is no size limit: a peer that never sends the sentinel
/// keeps this future pending.
///
/// # Errors
///
/// Returns the [`TransportFailure`] recorded into `buffer` when the read
/// fails or the peer closes before the sentinel arrives.
pub async fn read_frame<R>(
    reader: &mut R,
    codec: &FrameCodec,
    buffer: &mut ExchangeBuffer,
) -> std::result::Result<String, TransportFailure>
where
    R: AsyncRead + Unpin + ?Sized,
{
    buffer.begin_frame(codec.chunk_size());

    loop {
        let read = reader.read(buffer.scratch_mut()).await;
        let count = match read {
            Ok(0) => return Err(buffer.record_failure(TransportFailure::other(CLOSED_BY_PEER))),
            Ok(count) => count,
            Err(e) => return Err(buffer.record_failure(TransportFailure::from_io(&e))),
        };

        let searched = buffer.absorb(count);
        trace!(count, pending = buffer.pending().len(), "Chunk received");

        if let Some(end) = codec.find_sentinel(buffer.pending(), searched) {
            let trailing = buffer.pending().len() - end - codec.sentinel().len();
            if trailing > 0 {
                debug!(trailing, "Discarding bytes after frame sentinel");
            }

            let text = codec.decode(&buffer.pending()[..end]);
            buffer.finish_frame(&text);
            return Ok(text);
        }
    }
}

// ============================================================================
// Connection
// ============================================================================

/// Shared state behind a [`Connection`] handle.
struct ConnectionInner {
    /// Process-local id.
    id: ConnectionId,
    /// Frame codec for this socket.
    codec: FrameCodec,
    /// Remote endpoint, known once connected.
    endpoint: Mutex<Option<SocketAddr>>,
    /// Lifecycle state.
    state: AtomicU8,
    /// The socket. `None` before connect and after close.
    stream: AsyncMutex<Option<TcpStream>>,
}

/// Connection to the word server.
///
/// Cloning yields another handle to the same socket.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.inner.id)
            .field("endpoint", &self.endpoint())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Connection - Constructors
// ============================================================================

impl Connection {
    /// Creates an unconnected connection.
    #[must_use]
    pub fn new(codec: FrameCodec) -> Self {
        Self {
            inner: Arc::new(ConnectionInner {
                id: ConnectionId::generate(),
                codec,
                endpoint: Mutex::new(None),
                state: AtomicU8::new(STATE_UNCONNECTED),
                stream: AsyncMutex::new(None),
            }),
        }
    }

    /// Creates a connection and connects it to `host:port`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the connect fails.
    pub async fn open(host: &str, port: u16, codec: FrameCodec) -> Result<Self> {
        let connection = Self::new(codec);
        let mut buffer = ExchangeBuffer::for_codec(&connection.inner.codec);
        connection.connect(host, port, &mut buffer).await?;
        Ok(connection)
    }
}

// ============================================================================
// Connection - Accessors
// ============================================================================

impl Connection {
    /// Returns the process-local id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.inner.id
    }

    /// Returns the frame codec.
    #[inline]
    #[must_use]
    pub fn codec(&self) -> &FrameCodec {
        &self.inner.codec
    }

    /// Returns the remote endpoint, if connected at some point.
    #[inline]
    #[must_use]
    pub fn endpoint(&self) -> Option<SocketAddr> {
        *self.inner.endpoint.lock()
    }

    /// Returns the lifecycle state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.inner.state.load(Ordering::Acquire))
    }

    /// Returns `true` if sends and receives are allowed.
    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state() == ConnectionState::Active
    }
}

// ============================================================================
// Connection - Lifecycle
// ============================================================================

impl Connection {
    /// Connects to `host:port`, resolving the host name if needed.
    ///
    /// On success a status line is appended to `buffer`. On failure the
    /// failure is recorded in `buffer` and the connection stays
    /// [`ConnectionState::Unconnected`]; no retry is attempted.
    ///
    /// # Errors
    ///
    /// - [`Error::Transport`] if the connect fails
    /// - [`Error::ConnectionStopped`] if the connection was closed
    pub async fn connect(&self, host: &str, port: u16, buffer: &mut ExchangeBuffer) -> Result<()> {
        let mut slot = self.inner.stream.lock().await;
        self.ensure_unconnected(buffer)?;
        let result = TcpStream::connect((host, port)).await;
        self.establish(&mut slot, result, buffer)
    }

    /// Connects to a resolved socket address.
    ///
    /// # Errors
    ///
    /// Same as [`connect`](Self::connect).
    pub async fn connect_addr(&self, addr: SocketAddr, buffer: &mut ExchangeBuffer) -> Result<()> {
        let mut slot = self.inner.stream.lock().await;
        self.ensure_unconnected(buffer)?;
        let result = TcpStream::connect(addr).await;
        self.establish(&mut slot, result, buffer)
    }

    /// Closes the connection.
    ///
    /// Idempotent: only the first call (or the first failed send/receive)
    /// closes the socket. Waits for an in-flight exchange to finish.
    pub async fn close(&self) {
        if !self.mark_stopped() {
            return;
        }

        let mut slot = self.inner.stream.lock().await;
        if let Some(mut stream) = slot.take() {
            let _ = stream.shutdown().await;
            debug!(connection_id = %self.inner.id, "Connection closed");
        }
    }

    fn ensure_unconnected(&self, buffer: &mut ExchangeBuffer) -> Result<()> {
        match self.state() {
            ConnectionState::Unconnected => Ok(()),
            ConnectionState::Active => Err(buffer
                .record_failure(TransportFailure::other("CONNECTION ALREADY ESTABLISHED"))
                .into()),
            ConnectionState::Stopped => Err(Error::ConnectionStopped),
        }
    }

    fn establish(
        &self,
        slot: &mut Option<TcpStream>,
        result: std::io::Result<TcpStream>,
        buffer: &mut ExchangeBuffer,
    ) -> Result<()> {
        let stream = match result {
            Ok(stream) => stream,
            Err(e) => {
                let failure = buffer.record_failure(TransportFailure::from_io(&e));
                debug!(connection_id = %self.inner.id, error = %failure, "Connect failed");
                return Err(failure.into());
            }
        };

        let peer = stream.peer_addr()?;

        if self
            .inner
            .state
            .compare_exchange(
                STATE_UNCONNECTED,
                STATE_ACTIVE,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            return Err(Error::ConnectionStopped);
        }

        *self.inner.endpoint.lock() = Some(peer);
        *slot = Some(stream);
        buffer.append_message(&format!("SUCCESSFULLY CONNECTED TO: {peer}"));
        debug!(connection_id = %self.inner.id, %peer, "Connection established");

        Ok(())
    }

    /// Moves to Stopped. Returns `true` if this call made the transition.
    fn mark_stopped(&self) -> bool {
        self.inner
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |state| {
                (state != STATE_STOPPED).then_some(STATE_STOPPED)
            })
            .is_ok()
    }

    /// Stops the connection after a transport failure, with the stream
    /// lock already held.
    fn fail_locked(&self, slot: &mut Option<TcpStream>) {
        self.mark_stopped();
        if slot.take().is_some() {
            debug!(connection_id = %self.inner.id, "Connection stopped after transport failure");
        }
    }
}

// ============================================================================
// Connection - I/O
// ============================================================================

impl Connection {
    /// Sends `command` as one frame.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionStopped`] if the connection is not active
    /// - [`Error::Transport`] if the write fails; the connection is stopped
    pub async fn send(&self, command: &str, buffer: &mut ExchangeBuffer) -> Result<()> {
        let mut slot = self.inner.stream.lock().await;
        self.send_locked(&mut slot, command, buffer).await
    }

    /// Receives one frame.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionStopped`] if the connection is not active
    /// - [`Error::Transport`] if the read fails or the peer closes
    ///   mid-frame; the connection is stopped
    pub async fn receive(&self, buffer: &mut ExchangeBuffer) -> Result<String> {
        let mut slot = self.inner.stream.lock().await;
        self.receive_locked(&mut slot, buffer).await
    }

    /// Sends a command and waits for its reply.
    ///
    /// # Errors
    ///
    /// Same as [`send`](Self::send) and [`receive`](Self::receive).
    pub async fn exchange(&self, command: &Command) -> Result<String> {
        let mut buffer = ExchangeBuffer::for_codec(&self.inner.codec);
        self.exchange_with(command, &mut buffer).await
    }

    /// Sends a command and waits for its reply, recording into `buffer`.
    ///
    /// # Errors
    ///
    /// Same as [`send`](Self::send) and [`receive`](Self::receive).
    pub async fn exchange_with(
        &self,
        command: &Command,
        buffer: &mut ExchangeBuffer,
    ) -> Result<String> {
        let mut slot = self.inner.stream.lock().await;
        self.send_locked(&mut slot, &command.to_string(), buffer)
            .await?;
        self.receive_locked(&mut slot, buffer).await
    }

    async fn send_locked(
        &self,
        slot: &mut Option<TcpStream>,
        command: &str,
        buffer: &mut ExchangeBuffer,
    ) -> Result<()> {
        if !self.is_active() {
            return Err(Error::ConnectionStopped);
        }
        let Some(stream) = slot.as_mut() else {
            return Err(Error::ConnectionStopped);
        };

        let frame = self.inner.codec.encode_frame(command);
        let result = stream.write_all(&frame).await;

        if let Err(e) = result {
            let failure = buffer.record_failure(TransportFailure::from_io(&e));
            self.fail_locked(slot);
            return Err(failure.into());
        }

        trace!(connection_id = %self.inner.id, command, "Frame sent");
        Ok(())
    }

    async fn receive_locked(
        &self,
        slot: &mut Option<TcpStream>,
        buffer: &mut ExchangeBuffer,
    ) -> Result<String> {
        if !self.is_active() {
            return Err(Error::ConnectionStopped);
        }
        let Some(stream) = slot.as_mut() else {
            return Err(Error::ConnectionStopped);
        };

        let result = read_frame(stream, &self.inner.codec, buffer).await;

        match result {
            Ok(text) => Ok(text),
            Err(failure) => {
                self.fail_locked(slot);
                Err(failure.into())
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
