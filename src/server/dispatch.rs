//! Tag routing for frames arriving at the server.
//!
//! [`ServerCore`] is the [`SessionHandler`] shared by every accepted session.
//! It admits new sessions into the registry, relays client frames according
//! to their system tag and announces roster changes.

use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use super::{ServerEvents, ServerHandle};
use crate::{
    message::Message,
    session::{Session, SessionError, SessionHandler, lock},
    tag::Tag,
};

pub(crate) struct ServerCore {
    handle: ServerHandle,
    events: Arc<dyn ServerEvents>,
    // Serialises roster changes so every client sees its own `ID` first and
    // never misses a nickname announced while it joined. Holds `true` once
    // the server has started shutting down.
    roster: Mutex<bool>,
}

impl ServerCore {
    pub(crate) fn new(handle: ServerHandle, events: Arc<dyn ServerEvents>) -> Self {
        Self {
            handle,
            events,
            roster: Mutex::new(false),
        }
    }

    #[cfg(test)]
    pub(crate) fn handle(&self) -> &ServerHandle { &self.handle }

    /// Refuse every later session and disconnect the admitted ones.
    ///
    /// A session admitted concurrently is either already registered, and so
    /// disconnected here, or sees the closed roster and is turned away.
    pub(crate) fn close(&self) {
        *lock(&self.roster) = true;
        self.handle.disconnect_all();
    }

    fn admit(&self, session: &Arc<Session>) {
        let guard = lock(&self.roster);
        if *guard {
            drop(guard);
            debug!(session = %session.id(), peer = ?session.peer_addr(), "server closing, refusing connection");
            session.disconnect();
            return;
        }
        let registry = self.handle.registry();
        let Some(id) = registry.insert(Arc::clone(session)) else {
            drop(guard);
            warn!(session = %session.id(), peer = ?session.peer_addr(), "client ids exhausted, rejecting connection");
            self.events.on_rejected(&self.handle, session.peer_addr());
            session.disconnect();
            return;
        };
        info!(session = %session.id(), client = id, peer = ?session.peer_addr(), "client admitted");
        self.handle.broadcast(&Message::new(Tag::Id).with_from(id), None);
        for (peer, nickname) in registry.named() {
            session.send_message(&Message::new(Tag::Nickname).with_from(peer).with_text(nickname));
        }
    }

    fn dispatch(&self, session: &Arc<Session>, msg: Message) {
        let Some(from) = self.handle.registry().id_of(session.id()) else {
            debug!(session = %session.id(), tag = ?msg.system_tag, "dropping frame from unregistered session");
            return;
        };
        if !msg.system_tag.is_client_originated() {
            debug!(client = from, tag = ?msg.system_tag, "ignoring server-only tag sent by client");
            return;
        }
        match msg.system_tag {
            Tag::NicknameAsk => self.assign_nickname(from, &msg.text),
            Tag::ClientToAll => {
                let relayed = msg.restamped(Tag::ServerToAll).with_from(from);
                self.handle.broadcast(&relayed, Some(from));
            }
            Tag::ClientToClient => match self.handle.registry().session(msg.to_id) {
                Some(target) => {
                    target.send_message(&msg.restamped(Tag::ServerToClient).with_from(from));
                }
                None => debug!(client = from, to = msg.to_id, "dropping unicast to unknown client"),
            },
            // CLIENT_TO_SERVER
            _ => self.events.on_receive(&self.handle, from, &msg),
        }
    }

    fn assign_nickname(&self, id: u8, requested: &str) {
        let guard = lock(&self.roster);
        let Some(nickname) = self.handle.registry().assign_nickname(id, requested) else {
            return;
        };
        info!(client = id, %nickname, "nickname assigned");
        self.handle.broadcast(
            &Message::new(Tag::Nickname).with_from(id).with_text(nickname.as_str()),
            None,
        );
        drop(guard);
        self.events.on_client_connect(&self.handle, id, &nickname);
    }
}

impl SessionHandler for ServerCore {
    fn on_connected(&self, session: &Arc<Session>) { self.admit(session); }

    fn on_received(&self, session: &Arc<Session>, data: &[u8]) -> usize {
        session.receive_frames(data, |msg| self.dispatch(session, msg))
    }

    fn on_disconnected(&self, session: &Arc<Session>) {
        let guard = lock(&self.roster);
        let Some((id, nickname)) = self.handle.registry().remove(session.id()) else {
            return;
        };
        info!(client = id, nickname = nickname.as_deref(), "client left");
        self.handle.broadcast(&Message::new(Tag::Disconnect).with_from(id), None);
        drop(guard);
        self.events
            .on_client_disconnect(&self.handle, id, nickname.as_deref());
    }

    fn on_error(&self, session: &Arc<Session>, error: &SessionError) {
        let client = self.handle.registry().id_of(session.id());
        self.events.on_error(&self.handle, client, error);
    }
}

#[cfg(test)]
mod tests {
    use std::{
        net::{SocketAddr, TcpListener as StdTcpListener},
        time::Duration,
    };

    use futures::{SinkExt, StreamExt};
    use rstest::rstest;
    use tokio::{
        net::{TcpListener, TcpStream},
        sync::mpsc,
        time::timeout,
    };
    use tokio_util::{codec::Framed, task::TaskTracker};
    use tracing_test::traced_test;

    use super::*;
    use crate::{
        codec::MessageCodec,
        server::{connection::spawn_session, test_util::free_listener},
        session::SessionConfig,
    };

    #[derive(Debug, PartialEq)]
    enum Seen {
        Rejected,
        Received(u8, Tag, String),
    }

    struct Recorder(mpsc::UnboundedSender<Seen>);

    impl ServerEvents for Recorder {
        fn on_rejected(&self, _server: &ServerHandle, _peer: Option<SocketAddr>) {
            let _ = self.0.send(Seen::Rejected);
        }

        fn on_receive(&self, _server: &ServerHandle, from: u8, message: &Message) {
            let _ = self
                .0
                .send(Seen::Received(from, message.system_tag, message.text.clone()));
        }
    }

    fn recording_core() -> (Arc<ServerCore>, mpsc::UnboundedReceiver<Seen>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let core = Arc::new(ServerCore::new(ServerHandle::default(), Arc::new(Recorder(tx))));
        (core, rx)
    }

    /// Accept one connection on `listener` into `core` and return the peer.
    async fn connect_peer(
        listener: StdTcpListener,
        core: &Arc<ServerCore>,
        tracker: &TaskTracker,
    ) -> Framed<TcpStream, MessageCodec> {
        listener.set_nonblocking(true).expect("nonblocking");
        let listener = TcpListener::from_std(listener).expect("listener");
        let addr = listener.local_addr().expect("addr");
        let (client, accepted) = tokio::join!(TcpStream::connect(addr), listener.accept());
        let (stream, _) = accepted.expect("accept");
        spawn_session(stream, core, &SessionConfig::default(), tracker);
        Framed::new(client.expect("connect"), MessageCodec::default())
    }

    async fn assert_closed(peer: &mut Framed<TcpStream, MessageCodec>) {
        let next = timeout(Duration::from_secs(5), peer.next())
            .await
            .expect("session was not torn down");
        assert!(!matches!(next, Some(Ok(_))), "unexpected frame {next:?}");
    }

    #[rstest]
    #[traced_test]
    #[tokio::test]
    async fn client_past_the_id_space_is_rejected(free_listener: StdTcpListener) {
        let (core, mut seen) = recording_core();
        let handler = Arc::clone(&core) as Arc<dyn SessionHandler>;
        for _ in 1..=u8::MAX {
            let filler = Session::new(SessionConfig::default(), Arc::clone(&handler));
            assert!(core.handle().registry().insert(filler).is_some());
        }
        let tracker = TaskTracker::new();

        let mut peer = connect_peer(free_listener, &core, &tracker).await;

        assert_closed(&mut peer).await;
        assert_eq!(seen.recv().await, Some(Seen::Rejected));
        tracker.close();
        timeout(Duration::from_secs(5), tracker.wait())
            .await
            .expect("rejected session finished");
        assert_eq!(core.handle().session_count(), usize::from(u8::MAX));
        assert!(logs_contain("client ids exhausted"));
    }

    #[rstest]
    #[tokio::test]
    async fn closed_core_turns_new_sessions_away(free_listener: StdTcpListener) {
        let (core, mut seen) = recording_core();
        core.close();
        let tracker = TaskTracker::new();

        let mut peer = connect_peer(free_listener, &core, &tracker).await;

        assert_closed(&mut peer).await;
        tracker.close();
        timeout(Duration::from_secs(5), tracker.wait())
            .await
            .expect("refused session finished");
        assert_eq!(core.handle().session_count(), 0);
        assert!(seen.try_recv().is_err(), "shutdown refusal is not an id rejection");
    }

    #[rstest]
    #[traced_test]
    #[tokio::test]
    async fn server_only_tags_from_clients_are_ignored(free_listener: StdTcpListener) {
        let (core, mut seen) = recording_core();
        let tracker = TaskTracker::new();
        let mut peer = connect_peer(free_listener, &core, &tracker).await;
        let greeting = peer.next().await.expect("frame").expect("decode");
        assert_eq!((greeting.system_tag, greeting.from_id), (Tag::Id, 1));

        for tag in [Tag::ServerToAll, Tag::Id, Tag::Disconnect, Tag::ClientToServer] {
            peer.send(Message::new(tag).with_from(1).with_text(format!("{tag:?}")))
                .await
                .expect("send");
        }

        let received = timeout(Duration::from_secs(5), seen.recv())
            .await
            .expect("server message delivered");
        assert_eq!(
            received,
            Some(Seen::Received(1, Tag::ClientToServer, "ClientToServer".into()))
        );
        assert!(seen.try_recv().is_err());
        assert_eq!(core.handle().session_count(), 1);
        assert!(logs_contain("ignoring server-only tag sent by client"));

        drop(peer);
        tracker.close();
        tracker.wait().await;
    }
}
