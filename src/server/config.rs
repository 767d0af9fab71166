//! Builder methods and listener binding for [`LanServer`].

use std::{
    net::{SocketAddr, TcpListener as StdTcpListener},
    sync::Arc,
};

use tokio::{net::TcpListener, sync::oneshot};

use super::{
    BackoffConfig,
    Bound,
    LanServer,
    NoEvents,
    ServerError,
    ServerEvents,
    ServerHandle,
    ServerState,
    Unbound,
};
use crate::session::SessionConfig;

impl LanServer<Unbound> {
    /// Create an unbound server with default session settings and no event
    /// hooks.
    #[must_use]
    pub fn new() -> Self {
        Self {
            session_config: SessionConfig::default(),
            backoff: BackoffConfig::default(),
            events: Arc::new(NoEvents),
            handle: ServerHandle::default(),
            ready_tx: None,
            state: Unbound,
        }
    }

    /// Return `None` as the server is not bound.
    #[must_use]
    pub const fn local_addr(&self) -> Option<SocketAddr> { None }
}

impl Default for LanServer<Unbound> {
    fn default() -> Self { Self::new() }
}

impl<S: ServerState> LanServer<S> {
    /// Settings applied to every accepted session.
    #[must_use]
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    /// Accept-error back-off.
    #[must_use]
    pub fn backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }

    /// Application hooks for roster changes and `CLIENT_TO_SERVER` frames.
    #[must_use]
    pub fn events(mut self, events: impl ServerEvents) -> Self {
        self.events = Arc::new(events);
        self
    }

    /// Configure a channel signalled once the server accepts connections.
    #[must_use]
    pub fn ready_signal(mut self, tx: oneshot::Sender<()>) -> Self {
        self.ready_tx = Some(tx);
        self
    }

    /// Handle for addressing clients; valid before and while the server runs.
    #[must_use]
    pub fn handle(&self) -> ServerHandle { self.handle.clone() }

    /// Bind to a fresh address.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::net::{Ipv4Addr, SocketAddr};
    ///
    /// use lanwire::server::LanServer;
    ///
    /// # #[tokio::main]
    /// # async fn main() {
    /// let server = LanServer::new()
    ///     .bind(SocketAddr::from((Ipv4Addr::LOCALHOST, 0)))
    ///     .expect("bind failed");
    /// assert!(server.local_addr().is_some());
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if binding or configuring the listener
    /// fails.
    pub fn bind(self, addr: SocketAddr) -> Result<LanServer<Bound>, ServerError> {
        let std_listener = StdTcpListener::bind(addr).map_err(ServerError::Bind)?;
        self.bind_listener(std_listener)
    }

    /// Bind to an existing standard listener.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if configuring the listener fails.
    pub fn bind_listener(self, std_listener: StdTcpListener) -> Result<LanServer<Bound>, ServerError> {
        std_listener
            .set_nonblocking(true)
            .map_err(ServerError::Bind)?;
        let listener = TcpListener::from_std(std_listener).map_err(ServerError::Bind)?;
        let LanServer {
            session_config,
            backoff,
            events,
            handle,
            ready_tx,
            ..
        } = self;
        Ok(LanServer {
            session_config,
            backoff,
            events,
            handle,
            ready_tx,
            state: Bound {
                listener: Arc::new(listener),
            },
        })
    }
}

impl LanServer<Bound> {
    /// Returns the bound address, or `None` if retrieving it fails.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> { self.state.listener.local_addr().ok() }
}
