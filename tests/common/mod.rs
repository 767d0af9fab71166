//! Shared utilities for integration tests.
//!
//! Starts a [`LanServer`] on an ephemeral port, records client and server
//! callbacks into channels, and opens raw framed connections that speak the
//! wire protocol directly.

// Items in this shared module may not be used by all test binaries that import it.
#![allow(
    dead_code,
    reason = "shared test utilities are not used by all test binaries"
)]

use std::{
    net::{Ipv4Addr, SocketAddr, TcpListener as StdTcpListener},
    time::Duration,
};

use futures::{SinkExt, StreamExt};
use lanwire::{
    client::{ClientEvents, Immediate, LanClient},
    codec::MessageCodec,
    message::Message,
    server::{LanServer, ServerEvents, ServerHandle},
    session::SessionError,
    tag::Tag,
};
use tokio::{
    net::TcpStream,
    sync::{mpsc, oneshot},
    task::JoinHandle,
    time::timeout,
};
use tokio_util::codec::Framed;

pub type TestResult<T = ()> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Upper bound for any single wait in a test.
pub const WAIT: Duration = Duration::from_secs(5);

/// Raw connection speaking the frame format.
pub type RawPeer = Framed<TcpStream, MessageCodec>;

/// Create a TCP listener bound to a free local port.
pub fn unused_listener() -> StdTcpListener {
    let addr = SocketAddr::new(Ipv4Addr::LOCALHOST.into(), 0);
    StdTcpListener::bind(addr).expect("failed to bind port")
}

/// Server-side callback observed by a test.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerSeen {
    Joined(u8, String),
    Left(u8, Option<String>),
    Received(u8, String),
    Rejected,
    Error(u8),
}

pub struct ServerRecorder(pub mpsc::UnboundedSender<ServerSeen>);

impl ServerEvents for ServerRecorder {
    fn on_client_connect(&self, _server: &ServerHandle, id: u8, nickname: &str) {
        let _ = self.0.send(ServerSeen::Joined(id, nickname.to_owned()));
    }

    fn on_client_disconnect(&self, _server: &ServerHandle, id: u8, nickname: Option<&str>) {
        let _ = self.0.send(ServerSeen::Left(id, nickname.map(str::to_owned)));
    }

    fn on_receive(&self, _server: &ServerHandle, from: u8, message: &Message) {
        let _ = self.0.send(ServerSeen::Received(from, message.text.clone()));
    }

    fn on_rejected(&self, _server: &ServerHandle, _peer: Option<SocketAddr>) {
        let _ = self.0.send(ServerSeen::Rejected);
    }

    fn on_error(&self, _server: &ServerHandle, client: Option<u8>, _error: &SessionError) {
        let _ = self.0.send(ServerSeen::Error(client.unwrap_or_default()));
    }
}

/// A running server plus the means to stop it.
pub struct TestServer {
    pub addr: SocketAddr,
    pub handle: ServerHandle,
    pub events: mpsc::UnboundedReceiver<ServerSeen>,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl TestServer {
    /// Bind on a free port and wait until the accept loop is running.
    pub async fn start() -> Self { Self::start_on(unused_listener()).await }

    /// Serve on `listener` and wait until the accept loop is running.
    pub async fn start_on(listener: StdTcpListener) -> Self {
        let (tx, events) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = oneshot::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let server = LanServer::new()
            .events(ServerRecorder(tx))
            .ready_signal(ready_tx)
            .bind_listener(listener)
            .expect("bind server");
        let addr = server.local_addr().expect("server address");
        let handle = server.handle();
        let task = tokio::spawn(async move {
            server
                .run_with_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .expect("server run");
        });
        timeout(WAIT, ready_rx)
            .await
            .expect("server ready timed out")
            .expect("server ready signal");
        Self {
            addr,
            handle,
            events,
            shutdown: Some(shutdown_tx),
            task,
        }
    }

    /// Next server callback.
    pub async fn next_event(&mut self) -> ServerSeen {
        timeout(WAIT, self.events.recv())
            .await
            .expect("server event timed out")
            .expect("server event channel closed")
    }

    /// Stop the server and wait for it to finish.
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        timeout(WAIT, self.task)
            .await
            .expect("server stop timed out")
            .expect("server task panicked");
    }
}

/// Client-side callback observed by a test.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientSeen {
    Connected,
    Joined(String),
    Left(String),
    Lost,
    Retrying,
    Received(String, Message),
}

pub struct ClientRecorder(pub mpsc::UnboundedSender<ClientSeen>);

impl ClientEvents for ClientRecorder {
    fn on_connected(&self) { let _ = self.0.send(ClientSeen::Connected); }

    fn on_client_connect(&self, nickname: &str) {
        let _ = self.0.send(ClientSeen::Joined(nickname.to_owned()));
    }

    fn on_client_disconnect(&self, nickname: &str) {
        let _ = self.0.send(ClientSeen::Left(nickname.to_owned()));
    }

    fn on_lost_connection(&self) { let _ = self.0.send(ClientSeen::Lost); }

    fn on_reconnection_attempt(&self) { let _ = self.0.send(ClientSeen::Retrying); }

    fn on_receive(&self, from: &str, message: &Message) {
        let _ = self
            .0
            .send(ClientSeen::Received(from.to_owned(), message.clone()));
    }
}

/// Connect a recording client with immediate retries.
pub async fn join(
    addr: SocketAddr,
    nickname: &str,
) -> (LanClient, mpsc::UnboundedReceiver<ClientSeen>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let client = LanClient::builder()
        .retry_policy(Immediate)
        .events(ClientRecorder(tx))
        .connect(addr, nickname)
        .await
        .expect("client connect");
    (client, rx)
}

/// Wait until `rx` yields an event matching `pred`, returning it.
pub async fn wait_for<T: std::fmt::Debug>(
    rx: &mut mpsc::UnboundedReceiver<T>,
    mut pred: impl FnMut(&T) -> bool,
) -> T {
    timeout(WAIT, async {
        loop {
            let event = rx.recv().await.expect("event channel closed");
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("expected event never arrived")
}

/// Wait until `check` holds, polling every few milliseconds.
pub async fn eventually(mut check: impl FnMut() -> bool) {
    timeout(WAIT, async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition never held");
}

/// Open a raw framed connection to `addr`.
pub async fn raw_peer(addr: SocketAddr) -> RawPeer {
    let stream = TcpStream::connect(addr).await.expect("raw connect");
    Framed::new(stream, MessageCodec::default())
}

/// Read the next frame from a raw peer.
pub async fn read_frame(peer: &mut RawPeer) -> Message {
    timeout(WAIT, peer.next())
        .await
        .expect("frame timed out")
        .expect("peer closed")
        .expect("frame decodes")
}

/// Send one frame from a raw peer.
pub async fn write_frame(peer: &mut RawPeer, message: Message) {
    peer.send(message).await.expect("frame sent");
}

/// Raw peer that completes the join handshake as `nickname`; returns its id.
pub async fn raw_join(addr: SocketAddr, nickname: &str) -> (RawPeer, u8) {
    let mut peer = raw_peer(addr).await;
    let id_frame = read_frame(&mut peer).await;
    assert_eq!(id_frame.system_tag, Tag::Id);
    let id = id_frame.from_id;
    write_frame(
        &mut peer,
        Message::new(Tag::NicknameAsk).with_from(id).with_text(nickname),
    )
    .await;
    (peer, id)
}
