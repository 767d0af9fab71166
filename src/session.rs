//! Asynchronous TCP session engine.
//!
//! A [`Session`] owns one socket at a time and runs two loops over it: a
//! receive loop that reads into a growable [`ByteBuffer`] and hands the
//! unconsumed bytes to [`SessionHandler::on_received`], and a send loop that
//! drains a double-buffered queue. [`Session::send`] appends to the main
//! buffer under a short lock; the send loop swaps the main buffer with its
//! private flush buffer and writes the flush buffer out, so producers never
//! wait on the socket and at most one write is in flight.
//!
//! The same session object may connect, disconnect and connect again; each
//! connection receives a fresh [`SessionId`].

use std::{
    fmt,
    future::Future,
    net::SocketAddr,
    panic::AssertUnwindSafe,
    sync::{
        Arc,
        Mutex,
        MutexGuard,
        PoisonError,
        atomic::{AtomicU64, AtomicUsize, Ordering},
    },
};

use bytes::BytesMut;
use futures::FutureExt;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{
        TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    sync::{Notify, watch},
    time::timeout,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    buffer::ByteBuffer,
    byte_order::LENGTH_FIELD_SIZE,
    codec,
    message::Message,
    metrics::{self, Direction},
};

mod config;
mod error;
mod handler;
mod state;

pub use config::{
    DEFAULT_CONNECT_TIMEOUT,
    DEFAULT_RECEIVE_BUFFER_SIZE,
    DEFAULT_SEND_BUFFER_SIZE,
    SessionConfig,
};
pub use error::SessionError;
pub use handler::SessionHandler;
pub use state::SessionState;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of one connection made by a [`Session`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    fn next() -> Self { Self(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed)) }

    /// Return the inner `u64` representation.
    #[must_use]
    pub fn as_u64(&self) -> u64 { self.0 }
}

impl From<u64> for SessionId {
    fn from(value: u64) -> Self { Self(value) }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "SessionId({})", self.0) }
}

/// Lock a mutex, recovering the guard if a callback panicked while holding it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn as_count(bytes: usize) -> u64 { u64::try_from(bytes).unwrap_or(u64::MAX) }

#[derive(Default)]
struct SendQueue {
    main: ByteBuffer,
    sending: bool,
}

/// One TCP peer with asynchronous, buffered I/O.
///
/// Construct with [`Session::new`], then either [`connect`](Session::connect)
/// outbound or hand an accepted stream to [`accept`](Session::accept).
pub struct Session {
    id: AtomicU64,
    config: SessionConfig,
    handler: Arc<dyn SessionHandler>,
    state: watch::Sender<SessionState>,
    control: Mutex<CancellationToken>,
    peer: Mutex<Option<SocketAddr>>,
    queue: Mutex<SendQueue>,
    send_ready: Notify,
    flush: Mutex<ByteBuffer>,
    receive: Mutex<ByteBuffer>,
    in_flight: AtomicUsize,
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id())
            .field("state", &self.state())
            .field("peer", &self.peer_addr())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Create a disconnected session.
    #[must_use]
    pub fn new(config: SessionConfig, handler: Arc<dyn SessionHandler>) -> Arc<Self> {
        Arc::new(Self {
            id: AtomicU64::new(SessionId::next().as_u64()),
            config,
            handler,
            state: watch::Sender::new(SessionState::Disconnected),
            control: Mutex::new(CancellationToken::new()),
            peer: Mutex::new(None),
            queue: Mutex::new(SendQueue::default()),
            send_ready: Notify::new(),
            flush: Mutex::new(ByteBuffer::new()),
            receive: Mutex::new(ByteBuffer::new()),
            in_flight: AtomicUsize::new(0),
            bytes_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
        })
    }

    /// Identifier of the current or most recent connection.
    #[must_use]
    pub fn id(&self) -> SessionId { SessionId(self.id.load(Ordering::Relaxed)) }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState { *self.state.borrow() }

    /// Returns `true` while both I/O loops are running.
    #[must_use]
    pub fn is_connected(&self) -> bool { self.state() == SessionState::Connected }

    /// Address of the connected peer.
    #[must_use]
    pub fn peer_addr(&self) -> Option<SocketAddr> { *lock(&self.peer) }

    /// Configuration applied to each connection.
    #[must_use]
    pub fn config(&self) -> &SessionConfig { &self.config }

    /// Bytes written to the socket since the last connect.
    #[must_use]
    pub fn bytes_sent(&self) -> u64 { self.bytes_sent.load(Ordering::Relaxed) }

    /// Bytes read from the socket since the last connect.
    #[must_use]
    pub fn bytes_received(&self) -> u64 { self.bytes_received.load(Ordering::Relaxed) }

    /// Bytes queued or in flight but not yet written.
    #[must_use]
    pub fn bytes_pending(&self) -> usize {
        lock(&self.queue).main.len() + self.in_flight.load(Ordering::Relaxed)
    }

    /// Connect to `addr` and start the I/O loops on the current runtime.
    ///
    /// A failed or cancelled attempt fires
    /// [`on_disconnected`](SessionHandler::on_disconnected) before returning,
    /// so owners that reconnect from that callback see every failure.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidState`] unless the session is
    /// disconnected, [`SessionError::ConnectTimeout`] when the configured
    /// timeout elapses, and [`SessionError::Io`] for socket failures or when
    /// [`disconnect`](Self::disconnect) cancels the attempt.
    pub async fn connect(self: &Arc<Self>, addr: SocketAddr) -> Result<(), SessionError> {
        let token = self.begin_connecting()?;
        debug!(session = %self.id(), %addr, "connecting");
        let limit = self.config.connect_timeout_duration();
        let connected = tokio::select! {
            biased;
            () = token.cancelled() => Err(SessionError::aborted()),
            res = timeout(limit, TcpStream::connect(addr)) => match res {
                Ok(Ok(stream)) => Ok(stream),
                Ok(Err(e)) => Err(SessionError::Io(e)),
                Err(_) => Err(SessionError::ConnectTimeout(limit)),
            },
        };
        match connected.and_then(|stream| self.attach(stream, token)) {
            Ok(driver) => {
                tokio::spawn(driver);
                Ok(())
            }
            Err(e) => {
                self.connect_failed(&e);
                Err(e)
            }
        }
    }

    /// Adopt an accepted stream.
    ///
    /// On success the session is connected,
    /// [`on_connected`](SessionHandler::on_connected) has fired, and the
    /// returned future drives both I/O loops until the session disconnects.
    /// The caller decides where to spawn it.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidState`] unless the session is
    /// disconnected, or [`SessionError::Io`] if socket options cannot be set.
    pub fn accept(
        self: &Arc<Self>,
        stream: TcpStream,
    ) -> Result<impl Future<Output = ()> + Send + 'static, SessionError> {
        let token = self.begin_connecting()?;
        self.attach(stream, token).inspect_err(|e| self.connect_failed(e))
    }

    /// Begin teardown.
    ///
    /// A connected session fires
    /// [`on_disconnecting`](SessionHandler::on_disconnecting) and stops its
    /// I/O loops; [`on_disconnected`](SessionHandler::on_disconnected) follows
    /// once the socket is closed. A connecting session has its attempt
    /// cancelled. Returns `false` if there was nothing to tear down.
    pub fn disconnect(self: &Arc<Self>) -> bool {
        let token = {
            let control = lock(&self.control);
            match self.state() {
                SessionState::Connecting => {
                    control.cancel();
                    return true;
                }
                SessionState::Connected => {
                    self.state.send_replace(SessionState::Disconnecting);
                    control.clone()
                }
                SessionState::Disconnecting | SessionState::Disconnected => return false,
            }
        };
        debug!(session = %self.id(), "disconnecting");
        self.handler.on_disconnecting(self);
        token.cancel();
        true
    }

    /// Wait until the session reaches [`SessionState::Disconnected`].
    pub async fn wait_disconnected(&self) {
        let mut states = self.state.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = states
            .wait_for(|state| *state == SessionState::Disconnected)
            .await;
    }

    /// Queue `data` for sending.
    ///
    /// Returns the number of bytes queued: `0` when `data` is empty, when the
    /// session is not connected, or when the send buffer limit would be
    /// exceeded. The last case also reports
    /// [`SessionError::SendBufferFull`] through
    /// [`on_error`](SessionHandler::on_error).
    pub fn send(self: &Arc<Self>, data: &[u8]) -> usize {
        if data.is_empty() || !self.is_connected() {
            return 0;
        }
        let mut queue = lock(&self.queue);
        let pending = queue.main.len();
        if let Some(limit) = self.config.send_buffer_limit_bytes()
            && pending + data.len() > limit
        {
            drop(queue);
            self.report(&SessionError::SendBufferFull {
                pending,
                len: data.len(),
                limit,
            });
            return 0;
        }
        queue.main.append(data);
        let wake = !queue.sending;
        queue.sending = true;
        drop(queue);
        if wake {
            self.send_ready.notify_one();
        }
        data.len()
    }

    /// Encode `msg` and queue it. Returns the number of bytes queued.
    pub fn send_message(self: &Arc<Self>, msg: &Message) -> usize {
        if !self.is_connected() {
            return 0;
        }
        let mut wire = BytesMut::with_capacity(codec::encoded_len(msg));
        if let Err(e) = codec::encode(msg, &mut wire) {
            self.report(&SessionError::Codec(e));
            return 0;
        }
        let queued = self.send(&wire);
        if queued > 0 {
            metrics::inc_frames(Direction::Outbound);
        }
        queued
    }

    /// Decode every complete frame at the start of `data`, passing each to
    /// `on_frame`, and return the bytes consumed.
    ///
    /// Intended for use inside [`SessionHandler::on_received`]. An incomplete
    /// trailing frame is left unconsumed. A malformed frame is reported and
    /// the session disconnected.
    pub fn receive_frames(self: &Arc<Self>, data: &[u8], mut on_frame: impl FnMut(Message)) -> usize {
        let mut frames = codec::frames(data);
        if let Some(limit) = self.config.receive_buffer_limit_bytes() {
            frames = frames.with_max_frame_length(limit.saturating_sub(LENGTH_FIELD_SIZE));
        }
        for frame in frames.by_ref() {
            match frame {
                Ok(msg) => {
                    metrics::inc_frames(Direction::Inbound);
                    on_frame(msg);
                }
                Err(e) => {
                    self.abort_with(&SessionError::Codec(e));
                    return data.len();
                }
            }
        }
        frames.consumed()
    }

    /// Report `err` unless it is disconnect noise, then disconnect.
    pub fn abort_with(self: &Arc<Self>, err: &SessionError) {
        self.report(err);
        self.disconnect();
    }

    fn report(self: &Arc<Self>, err: &SessionError) {
        if err.is_disconnect_noise() {
            debug!(session = %self.id(), error = %err, "connection closed");
            return;
        }
        warn!(session = %self.id(), kind = err.kind(), error = %err, "session error");
        metrics::inc_errors(err.kind());
        self.handler.on_error(self, err);
    }

    fn begin_connecting(&self) -> Result<CancellationToken, SessionError> {
        let mut control = lock(&self.control);
        let current = self.state();
        if current != SessionState::Disconnected {
            return Err(SessionError::InvalidState(current));
        }
        *control = CancellationToken::new();
        self.id.store(SessionId::next().as_u64(), Ordering::Relaxed);
        self.state.send_replace(SessionState::Connecting);
        Ok(control.clone())
    }

    fn connect_failed(self: &Arc<Self>, err: &SessionError) {
        self.report(err);
        {
            let _control = lock(&self.control);
            self.state.send_replace(SessionState::Disconnected);
        }
        self.handler.on_disconnected(self);
    }

    fn attach(
        self: &Arc<Self>,
        stream: TcpStream,
        token: CancellationToken,
    ) -> Result<impl Future<Output = ()> + Send + 'static, SessionError> {
        stream.set_nodelay(self.config.is_nodelay())?;
        *lock(&self.peer) = stream.peer_addr().ok();
        {
            let mut queue = lock(&self.queue);
            queue.main.clear();
            queue.main.reserve(self.config.send_buffer_size_bytes());
            queue.sending = false;
        }
        self.in_flight.store(0, Ordering::Relaxed);
        self.bytes_sent.store(0, Ordering::Relaxed);
        self.bytes_received.store(0, Ordering::Relaxed);
        {
            let _control = lock(&self.control);
            if token.is_cancelled() {
                return Err(SessionError::aborted());
            }
            self.state.send_replace(SessionState::Connected);
        }
        metrics::inc_sessions();
        info!(session = %self.id(), peer = ?self.peer_addr(), "session connected");
        self.handler.on_connected(self);
        Ok(Arc::clone(self).drive(stream, token))
    }

    async fn drive(self: Arc<Self>, stream: TcpStream, token: CancellationToken) {
        let (reader, writer) = stream.into_split();
        tokio::join!(
            self.supervise(self.receive_loop(reader, &token)),
            self.supervise(self.send_loop(writer, &token)),
        );
        self.finish_disconnect();
    }

    /// Run one I/O loop and make sure its end tears the whole session down.
    async fn supervise<F>(self: &Arc<Self>, io_loop: F)
    where
        F: Future<Output = Result<(), SessionError>>,
    {
        let outcome = AssertUnwindSafe(io_loop)
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(SessionError::from_panic(&*panic)));
        match outcome {
            Ok(()) => {
                self.disconnect();
            }
            Err(e) => self.abort_with(&e),
        }
    }

    fn finish_disconnect(self: &Arc<Self>) {
        {
            let mut queue = lock(&self.queue);
            queue.main.clear();
            queue.sending = false;
        }
        self.in_flight.store(0, Ordering::Relaxed);
        {
            let _control = lock(&self.control);
            self.state.send_replace(SessionState::Disconnected);
        }
        metrics::dec_sessions();
        info!(
            session = %self.id(),
            sent = self.bytes_sent(),
            received = self.bytes_received(),
            "session disconnected"
        );
        self.handler.on_disconnected(self);
    }

    async fn receive_loop(
        self: &Arc<Self>,
        mut reader: OwnedReadHalf,
        token: &CancellationToken,
    ) -> Result<(), SessionError> {
        let mut buffer = std::mem::take(&mut *lock(&self.receive));
        buffer.clear();
        buffer.reserve(self.config.receive_buffer_size_bytes());
        let result = self.read_until_closed(&mut buffer, &mut reader, token).await;
        buffer.clear();
        *lock(&self.receive) = buffer;
        result
    }

    async fn read_until_closed(
        self: &Arc<Self>,
        buffer: &mut ByteBuffer,
        reader: &mut OwnedReadHalf,
        token: &CancellationToken,
    ) -> Result<(), SessionError> {
        loop {
            if buffer.spare_mut().is_empty() {
                self.grow_receive_buffer(buffer)?;
            }
            let read = tokio::select! {
                biased;
                () = token.cancelled() => return Ok(()),
                res = reader.read(buffer.spare_mut()) => res?,
            };
            if read == 0 {
                debug!(session = %self.id(), "peer closed the connection");
                return Ok(());
            }
            buffer.commit(read);
            self.bytes_received.fetch_add(as_count(read), Ordering::Relaxed);
            let consumed = self.handler.on_received(self, buffer.as_slice()).min(buffer.len());
            if consumed > 0 {
                buffer.remove(0, consumed)?;
            }
        }
    }

    fn grow_receive_buffer(&self, buffer: &mut ByteBuffer) -> Result<(), SessionError> {
        let requested = buffer.capacity().saturating_mul(2).max(1);
        if let Some(limit) = self.config.receive_buffer_limit_bytes()
            && requested > limit
        {
            return Err(SessionError::ReceiveBufferFull { requested, limit });
        }
        debug!(session = %self.id(), capacity = requested, "growing receive buffer");
        buffer.reserve(requested);
        Ok(())
    }

    async fn send_loop(
        self: &Arc<Self>,
        mut writer: OwnedWriteHalf,
        token: &CancellationToken,
    ) -> Result<(), SessionError> {
        let mut flush = std::mem::take(&mut *lock(&self.flush));
        flush.clear();
        flush.reserve(self.config.send_buffer_size_bytes());
        let result = self.write_until_cancelled(&mut flush, &mut writer, token).await;
        if result.is_ok() {
            // The peer may already be gone; the socket closes on drop either way.
            let _ = writer.shutdown().await;
        }
        flush.clear();
        *lock(&self.flush) = flush;
        result
    }

    async fn write_until_cancelled(
        self: &Arc<Self>,
        flush: &mut ByteBuffer,
        writer: &mut OwnedWriteHalf,
        token: &CancellationToken,
    ) -> Result<(), SessionError> {
        loop {
            tokio::select! {
                biased;
                () = token.cancelled() => return Ok(()),
                () = self.send_ready.notified() => {}
            }
            let mut wrote = false;
            while self.swap_send_buffers(flush) {
                self.in_flight.store(flush.len(), Ordering::Relaxed);
                while !flush.as_slice().is_empty() {
                    let written = tokio::select! {
                        biased;
                        () = token.cancelled() => return Ok(()),
                        res = writer.write(flush.as_slice()) => res?,
                    };
                    if written == 0 {
                        return Err(std::io::Error::from(std::io::ErrorKind::WriteZero).into());
                    }
                    flush.shift(written);
                    self.in_flight.fetch_sub(written, Ordering::Relaxed);
                    self.bytes_sent.fetch_add(as_count(written), Ordering::Relaxed);
                    self.handler.on_sent(self, written, self.bytes_pending());
                }
                flush.clear();
                wrote = true;
            }
            if wrote {
                self.handler.on_empty(self);
            }
        }
    }

    /// Move queued bytes into `flush`. Returns `false`, clearing the sending
    /// flag, when nothing is queued.
    fn swap_send_buffers(&self, flush: &mut ByteBuffer) -> bool {
        let mut queue = lock(&self.queue);
        if queue.main.is_empty() {
            queue.sending = false;
            return false;
        }
        std::mem::swap(&mut queue.main, flush);
        true
    }
}
