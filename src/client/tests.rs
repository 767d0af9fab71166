//! Unit tests for the reconnecting client against a scripted server peer.

use std::{net::SocketAddr, time::Duration};

use futures::{SinkExt, StreamExt};
use tokio::{
    net::{TcpListener, TcpStream},
    sync::mpsc,
    time::timeout,
};
use tokio_util::codec::Framed;

use super::*;
use crate::{
    codec::MessageCodec,
    message::Message,
    session::{SessionError, SessionState},
    tag::Tag,
};

const WAIT: Duration = Duration::from_secs(5);

type Peer = Framed<TcpStream, MessageCodec>;

#[derive(Debug, PartialEq)]
enum Seen {
    Connected,
    Joined(String),
    Left(String),
    Lost,
    Retrying,
    Received(String, String),
    Error,
}

struct Recorder(mpsc::UnboundedSender<Seen>);

impl ClientEvents for Recorder {
    fn on_connected(&self) { let _ = self.0.send(Seen::Connected); }

    fn on_client_connect(&self, nickname: &str) { let _ = self.0.send(Seen::Joined(nickname.into())); }

    fn on_client_disconnect(&self, nickname: &str) { let _ = self.0.send(Seen::Left(nickname.into())); }

    fn on_lost_connection(&self) { let _ = self.0.send(Seen::Lost); }

    fn on_reconnection_attempt(&self) { let _ = self.0.send(Seen::Retrying); }

    fn on_receive(&self, from: &str, message: &Message) {
        let _ = self.0.send(Seen::Received(from.into(), message.text.clone()));
    }

    fn on_error(&self, _error: &SessionError) { let _ = self.0.send(Seen::Error); }
}

async fn next(rx: &mut mpsc::UnboundedReceiver<Seen>) -> Seen {
    timeout(WAIT, rx.recv())
        .await
        .expect("event timed out")
        .expect("event channel closed")
}

async fn listener() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    (listener, addr)
}

async fn accept_peer(listener: &TcpListener) -> Peer {
    let (stream, _) = timeout(WAIT, listener.accept())
        .await
        .expect("accept timed out")
        .expect("accept");
    Framed::new(stream, MessageCodec::default())
}

async fn read_frame(peer: &mut Peer) -> Message {
    timeout(WAIT, peer.next())
        .await
        .expect("frame timed out")
        .expect("peer stream ended")
        .expect("decode")
}

/// Connect a client with `Immediate` retries and hand back the server side.
async fn connected_client(
    nickname: &str,
) -> (LanClient, Peer, TcpListener, mpsc::UnboundedReceiver<Seen>) {
    let (listener, addr) = listener().await;
    let (tx, rx) = mpsc::unbounded_channel();
    let builder = LanClient::builder()
        .retry_policy(Immediate)
        .events(Recorder(tx));
    let (client, peer) = tokio::join!(builder.connect(addr, nickname), accept_peer(&listener));
    (client.expect("connect"), peer, listener, rx)
}

/// Play the server's side of admitting a client under `id`.
async fn admit(peer: &mut Peer, id: u8, nickname: &str) {
    peer.send(Message::new(Tag::Id).with_from(id))
        .await
        .expect("send id");
    let ask = read_frame(peer).await;
    assert_eq!(ask.system_tag, Tag::NicknameAsk);
    assert_eq!(ask.text, nickname);
    peer.send(Message::new(Tag::Nickname).with_from(id).with_text(nickname))
        .await
        .expect("send nickname");
}

#[tokio::test]
async fn first_id_frame_identifies_the_client() {
    let (client, mut peer, _listener, mut rx) = connected_client("Alice").await;
    assert!(!client.is_connected());
    assert!(matches!(
        client.send_to_all(&Message::new(Tag::ClientToAll)),
        Err(ClientError::NotConnected)
    ));

    admit(&mut peer, 3, "Alice").await;
    assert_eq!(next(&mut rx).await, Seen::Connected);
    assert_eq!(next(&mut rx).await, Seen::Joined("Alice".into()));
    assert_eq!(client.id(), Some(3));
    assert_eq!(client.nickname().as_deref(), Some("Alice"));

    // Later ID frames announce peers without changing our identity.
    peer.send(Message::new(Tag::Id).with_from(4))
        .await
        .expect("send peer id");
    peer.send(Message::new(Tag::Nickname).with_from(4).with_text("Bob"))
        .await
        .expect("send peer nickname");
    assert_eq!(next(&mut rx).await, Seen::Joined("Bob".into()));
    assert_eq!(client.id(), Some(3));
    assert_eq!(client.roster().len(), 2);
    client.disconnect_and_stop().await;
}

#[tokio::test]
async fn sends_are_stamped_with_routing_ids() {
    let (client, mut peer, _listener, mut rx) = connected_client("Alice").await;
    admit(&mut peer, 1, "Alice").await;
    peer.send(Message::new(Tag::Nickname).with_from(2).with_text("Bob"))
        .await
        .expect("send nickname");
    assert_eq!(next(&mut rx).await, Seen::Connected);
    assert_eq!(next(&mut rx).await, Seen::Joined("Alice".into()));
    assert_eq!(next(&mut rx).await, Seen::Joined("Bob".into()));

    client
        .send_to("Bob", &Message::new(Tag::ServerToAll).with_text("psst"))
        .expect("unicast");
    let frame = read_frame(&mut peer).await;
    assert_eq!(
        (frame.system_tag, frame.from_id, frame.to_id),
        (Tag::ClientToClient, 1, 2)
    );

    client
        .send_to_server(&Message::new(Tag::ClientToAll).with_user_tag(9))
        .expect("to server");
    let frame = read_frame(&mut peer).await;
    assert_eq!((frame.system_tag, frame.user_tag), (Tag::ClientToServer, 9));

    assert!(matches!(
        client.send_to("Carol", &Message::new(Tag::ClientToClient)),
        Err(ClientError::UnknownPeer(name)) if name == "Carol"
    ));
    client.disconnect_and_stop().await;
}

#[tokio::test]
async fn incoming_frames_carry_sender_nicknames() {
    let (client, mut peer, _listener, mut rx) = connected_client("Alice").await;
    admit(&mut peer, 1, "Alice").await;
    peer.send(Message::new(Tag::Nickname).with_from(2).with_text("Bob"))
        .await
        .expect("send nickname");
    peer.send(Message::new(Tag::ServerToAll).with_from(2).with_text("hi"))
        .await
        .expect("relay");
    peer.send(Message::new(Tag::ServerToClient).with_text("welcome"))
        .await
        .expect("server unicast");
    peer.send(Message::new(Tag::ServerToAll).with_from(7).with_text("anon"))
        .await
        .expect("unnamed sender");
    peer.send(Message::new(Tag::Disconnect).with_from(2))
        .await
        .expect("peer left");

    let mut seen = Vec::new();
    for _ in 0..7 {
        seen.push(next(&mut rx).await);
    }
    assert!(seen.contains(&Seen::Received("Bob".into(), "hi".into())));
    assert!(seen.contains(&Seen::Received(SERVER_NICKNAME.into(), "welcome".into())));
    assert!(seen.contains(&Seen::Received("#7".into(), "anon".into())));
    assert_eq!(seen.last(), Some(&Seen::Left("Bob".into())));
    assert_eq!(client.roster().len(), 1);
    client.disconnect_and_stop().await;
}

#[tokio::test]
async fn reconnects_after_the_server_drops_it() {
    let (client, mut peer, listener, mut rx) = connected_client("Alice").await;
    admit(&mut peer, 1, "Alice").await;
    assert_eq!(next(&mut rx).await, Seen::Connected);
    assert_eq!(next(&mut rx).await, Seen::Joined("Alice".into()));

    drop(peer);
    assert_eq!(next(&mut rx).await, Seen::Left("Alice".into()));
    assert_eq!(next(&mut rx).await, Seen::Lost);
    assert_eq!(next(&mut rx).await, Seen::Retrying);
    assert!(client.roster().is_empty());

    let mut peer = accept_peer(&listener).await;
    admit(&mut peer, 2, "Alice").await;
    assert_eq!(next(&mut rx).await, Seen::Connected);
    assert_eq!(client.id(), Some(2));
    client.disconnect_and_stop().await;
}

#[tokio::test]
async fn disconnect_and_stop_prevents_reconnects() {
    let (client, mut peer, listener, mut rx) = connected_client("Alice").await;
    admit(&mut peer, 1, "Alice").await;
    assert_eq!(next(&mut rx).await, Seen::Connected);
    assert_eq!(next(&mut rx).await, Seen::Joined("Alice".into()));

    client.disconnect_and_stop().await;
    assert!(!client.is_connected());
    assert_eq!(next(&mut rx).await, Seen::Left("Alice".into()));
    assert!(
        timeout(Duration::from_millis(200), listener.accept())
            .await
            .is_err(),
        "client reconnected after stop"
    );
    assert!(rx.try_recv().is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stop_racing_a_scheduled_reconnect_stays_disconnected() {
    for _ in 0..50 {
        let (client, mut peer, listener, mut rx) = connected_client("Alice").await;
        admit(&mut peer, 1, "Alice").await;
        assert_eq!(next(&mut rx).await, Seen::Joined("Alice".into()));
        // Accept every reconnect so a stray one would succeed.
        let acceptor = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });

        drop(peer);
        client.disconnect_and_stop().await;
        assert_eq!(client.session().state(), SessionState::Disconnected);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(client.session().state(), SessionState::Disconnected);
        assert!(!client.is_connected());
        acceptor.abort();
    }
}

#[tokio::test]
async fn failed_first_connect_does_not_retry() {
    let (listener, addr) = listener().await;
    drop(listener);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let err = LanClient::builder()
        .retry_policy(Immediate)
        .events(Recorder(tx))
        .connect(addr, "Alice")
        .await
        .expect_err("nothing listens");
    assert!(matches!(err, ClientError::Session(_)));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn started_client_keeps_trying_until_a_server_appears() {
    let (listener, addr) = listener().await;
    drop(listener);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let client = LanClient::builder()
        .retry_policy(FixedInterval(Duration::from_millis(20)))
        .events(Recorder(tx))
        .start(addr, "Alice");
    assert_eq!(next(&mut rx).await, Seen::Lost);
    assert_eq!(next(&mut rx).await, Seen::Retrying);
    client.disconnect_and_stop().await;
}

#[tokio::test]
async fn connects_with_custom_session_config() {
    let (listener, addr) = listener().await;
    let builder = LanClient::builder()
        .session_config(crate::session::SessionConfig::default().nodelay(true));
    let (client, _peer) = tokio::join!(builder.connect(addr, "Alice"), accept_peer(&listener));
    let client = client.expect("connect");
    assert!(client.session().is_connected());
    client.disconnect_and_stop().await;
}
