//! Reconnecting client runtime.

use std::{
    collections::BTreeMap,
    net::SocketAddr,
    sync::{
        Arc,
        Mutex,
        Weak,
        atomic::{AtomicBool, AtomicU32, Ordering},
    },
};

use tokio::{task::JoinHandle, time::sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{ClientError, ClientEvents, LanClientBuilder, RetryPolicy, Roster};
use crate::{
    message::{Message, SERVER_ID},
    metrics,
    session::{Session, SessionError, SessionHandler, lock},
    tag::Tag,
};

/// Sender name reported for frames the server itself originated.
pub const SERVER_NICKNAME: &str = "Server";

#[derive(Default)]
struct Identity {
    id: Option<u8>,
    nickname: Option<String>,
    roster: Roster,
}

/// Session callbacks for one client: identity tracking, roster upkeep and
/// the reconnect loop.
pub(super) struct ClientCore {
    me: Weak<ClientCore>,
    addr: SocketAddr,
    desired_nickname: String,
    events: Arc<dyn ClientEvents>,
    retry: Arc<dyn RetryPolicy>,
    identity: Mutex<Identity>,
    should_disconnect: AtomicBool,
    // Reconnects start only after the first socket was attached, unless the
    // client was started in the background.
    armed: AtomicBool,
    stop: CancellationToken,
    reconnect: Mutex<Option<JoinHandle<()>>>,
    attempts: AtomicU32,
}

impl ClientCore {
    pub(super) fn new(
        addr: SocketAddr,
        desired_nickname: String,
        events: Arc<dyn ClientEvents>,
        retry: Arc<dyn RetryPolicy>,
        armed: bool,
    ) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            addr,
            desired_nickname,
            events,
            retry,
            identity: Mutex::new(Identity::default()),
            should_disconnect: AtomicBool::new(false),
            armed: AtomicBool::new(armed),
            stop: CancellationToken::new(),
            reconnect: Mutex::new(None),
            attempts: AtomicU32::new(0),
        })
    }

    /// Keep connecting in the background until the first success or a stop.
    pub(super) fn spawn_initial_connect(&self, session: &Arc<Session>) {
        let session = Arc::clone(session);
        let addr = self.addr;
        let mut slot = lock(&self.reconnect);
        *slot = Some(tokio::spawn(async move {
            // Failures reach `on_disconnected`, which schedules the retry.
            let _ = session.connect(addr).await;
        }));
    }

    /// Stop reconnecting; the current connection, if any, is left alone.
    pub(super) fn halt(&self) {
        self.should_disconnect.store(true, Ordering::SeqCst);
        self.stop.cancel();
    }

    fn take_reconnect_task(&self) -> Option<JoinHandle<()>> { lock(&self.reconnect).take() }

    fn handle_frame(&self, session: &Arc<Session>, msg: Message) {
        match msg.system_tag {
            Tag::Id => self.on_id(session, msg.from_id),
            Tag::Nickname => {
                let changed = {
                    let mut identity = lock(&self.identity);
                    if identity.id == Some(msg.from_id) {
                        identity.nickname = Some(msg.text.clone());
                    }
                    identity.roster.insert(msg.from_id, &msg.text)
                };
                if changed {
                    debug!(client = msg.from_id, nickname = %msg.text, "peer named");
                    self.events.on_client_connect(&msg.text);
                }
            }
            Tag::Disconnect => {
                let left = lock(&self.identity).roster.remove(msg.from_id);
                if let Some(nickname) = left {
                    debug!(client = msg.from_id, %nickname, "peer left");
                    self.events.on_client_disconnect(&nickname);
                }
            }
            Tag::ServerToAll | Tag::ServerToClient => {
                let from = self.sender_name(msg.from_id);
                self.events.on_receive(&from, &msg);
            }
            tag => debug!(?tag, "ignoring client-only tag sent by server"),
        }
    }

    /// The first `ID` frame of a connection names this client; later ones
    /// announce peers.
    fn on_id(&self, session: &Arc<Session>, id: u8) {
        let own = {
            let mut identity = lock(&self.identity);
            if identity.id.is_some() {
                false
            } else {
                identity.id = Some(id);
                true
            }
        };
        if !own {
            debug!(client = id, "peer joined");
            return;
        }
        info!(client = id, addr = %self.addr, "connected to server");
        self.attempts.store(0, Ordering::Relaxed);
        self.events.on_connected();
        session.send_message(
            &Message::new(Tag::NicknameAsk)
                .with_from(id)
                .with_text(self.desired_nickname.as_str()),
        );
    }

    fn sender_name(&self, id: u8) -> String {
        if id == SERVER_ID {
            return SERVER_NICKNAME.to_owned();
        }
        lock(&self.identity)
            .roster
            .nickname(id)
            .map_or_else(|| format!("#{id}"), str::to_owned)
    }

    fn schedule_reconnect(&self, session: &Arc<Session>) {
        let Some(core) = self.me.upgrade() else {
            return;
        };
        let session = Arc::clone(session);
        let attempt = self.attempts.fetch_add(1, Ordering::Relaxed).saturating_add(1);
        let delay = self.retry.delay(attempt);
        // Spawned under the lock so a concurrent stop either takes this task
        // or has already cancelled `stop` before it first runs.
        let mut slot = lock(&self.reconnect);
        if self.stop.is_cancelled() {
            return;
        }
        debug!(attempt, ?delay, "scheduling reconnect");
        *slot = Some(tokio::spawn(async move {
            tokio::select! {
                biased;
                () = core.stop.cancelled() => return,
                () = sleep(delay) => {}
            }
            if core.should_disconnect.load(Ordering::SeqCst) {
                return;
            }
            metrics::inc_reconnects();
            info!(attempt, addr = %core.addr, "reconnecting");
            core.events.on_reconnection_attempt();
            // Failures come back through `on_disconnected`.
            let _ = session.connect(core.addr).await;
        }));
    }
}

impl SessionHandler for ClientCore {
    fn on_connected(&self, session: &Arc<Session>) {
        self.armed.store(true, Ordering::SeqCst);
        if self.should_disconnect.load(Ordering::SeqCst) {
            session.disconnect();
        }
    }

    fn on_received(&self, session: &Arc<Session>, data: &[u8]) -> usize {
        session.receive_frames(data, |msg| self.handle_frame(session, msg))
    }

    fn on_disconnected(&self, session: &Arc<Session>) {
        let own_nickname = {
            let mut identity = lock(&self.identity);
            identity.roster.clear();
            let nickname = identity.nickname.take();
            identity
                .id
                .take()
                .map(|_| nickname.unwrap_or_else(|| self.desired_nickname.clone()))
        };
        if let Some(nickname) = own_nickname {
            info!(%nickname, "disconnected from server");
            self.events.on_client_disconnect(&nickname);
        }
        if self.should_disconnect.load(Ordering::SeqCst) || !self.armed.load(Ordering::SeqCst) {
            return;
        }
        self.events.on_lost_connection();
        self.schedule_reconnect(session);
    }

    fn on_error(&self, _session: &Arc<Session>, error: &SessionError) { self.events.on_error(error); }
}

/// Chat client that keeps reconnecting to a [`LanServer`](crate::server::LanServer)
/// until told to stop.
///
/// # Examples
///
/// ```no_run
/// use lanwire::{client::LanClient, message::Message, tag::Tag};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), lanwire::client::ClientError> {
/// let client = LanClient::builder()
///     .connect("127.0.0.1:7777".parse().expect("address"), "Alice")
///     .await?;
/// client.send_to_all(&Message::new(Tag::ClientToAll).with_text("hello"))?;
/// client.disconnect_and_stop().await;
/// # Ok(())
/// # }
/// ```
pub struct LanClient {
    pub(super) session: Arc<Session>,
    pub(super) core: Arc<ClientCore>,
}

impl std::fmt::Debug for LanClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LanClient")
            .field("server", &self.core.addr)
            .field("id", &self.id())
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl LanClient {
    /// Start configuring a client.
    #[must_use]
    pub fn builder() -> LanClientBuilder { LanClientBuilder::new() }

    /// Returns `true` once the server has assigned this connection an id.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.session.is_connected() && lock(&self.core.identity).id.is_some()
    }

    /// Id assigned by the server for the current connection.
    #[must_use]
    pub fn id(&self) -> Option<u8> { lock(&self.core.identity).id }

    /// Nickname confirmed by the server for the current connection.
    #[must_use]
    pub fn nickname(&self) -> Option<String> { lock(&self.core.identity).nickname.clone() }

    /// Nicknames of every known client, this one included, by id.
    #[must_use]
    pub fn roster(&self) -> BTreeMap<u8, String> { lock(&self.core.identity).roster.to_map() }

    /// The underlying session.
    #[must_use]
    pub fn session(&self) -> &Arc<Session> { &self.session }

    /// Broadcast `message` to every other client.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotConnected`] before the server assigned an id
    /// and [`ClientError::SendRejected`] if the session refused the frame.
    pub fn send_to_all(&self, message: &Message) -> Result<usize, ClientError> {
        let id = self.require_id()?;
        self.queue(&message.restamped(Tag::ClientToAll).with_from(id))
    }

    /// Send `message` to the peer called `nickname`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::UnknownPeer`] if nobody on the roster has that
    /// nickname, plus the errors of [`send_to_all`](Self::send_to_all).
    pub fn send_to(&self, nickname: &str, message: &Message) -> Result<usize, ClientError> {
        let id = self.require_id()?;
        let to = lock(&self.core.identity)
            .roster
            .id_of(nickname)
            .ok_or_else(|| ClientError::UnknownPeer(nickname.to_owned()))?;
        self.queue(
            &message
                .restamped(Tag::ClientToClient)
                .with_from(id)
                .with_to(to),
        )
    }

    /// Send `message` to the server application.
    ///
    /// # Errors
    ///
    /// See [`send_to_all`](Self::send_to_all).
    pub fn send_to_server(&self, message: &Message) -> Result<usize, ClientError> {
        let id = self.require_id()?;
        self.queue(
            &message
                .restamped(Tag::ClientToServer)
                .with_from(id)
                .with_to(SERVER_ID),
        )
    }

    /// Stop reconnecting, disconnect, and wait until the session is down.
    pub async fn disconnect_and_stop(&self) {
        self.core.halt();
        self.session.disconnect();
        if let Some(task) = self.core.take_reconnect_task() {
            // A cancelled or finished task is equally fine here.
            let _ = task.await;
        }
        // A reconnect may have completed before it observed the stop.
        self.session.disconnect();
        self.session.wait_disconnected().await;
        info!(addr = %self.core.addr, "client stopped");
    }

    fn require_id(&self) -> Result<u8, ClientError> {
        match self.id() {
            Some(id) if self.session.is_connected() => Ok(id),
            _ => Err(ClientError::NotConnected),
        }
    }

    fn queue(&self, message: &Message) -> Result<usize, ClientError> {
        match self.session.send_message(message) {
            0 => Err(ClientError::SendRejected),
            sent => Ok(sent),
        }
    }
}

impl Drop for LanClient {
    fn drop(&mut self) {
        self.core.halt();
        self.session.disconnect();
    }
}
