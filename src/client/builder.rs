//! Builder for configuring and connecting a [`LanClient`].

use std::{net::SocketAddr, sync::Arc};

use super::{
    ClientError,
    ClientEvents,
    FixedInterval,
    LanClient,
    NoClientEvents,
    RetryPolicy,
    runtime::ClientCore,
};
use crate::session::{Session, SessionConfig};

/// Builder for [`LanClient`].
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use lanwire::{
///     client::{FixedInterval, LanClientBuilder},
///     session::SessionConfig,
/// };
///
/// let builder = LanClientBuilder::new()
///     .session_config(SessionConfig::default().send_buffer_limit(1 << 20))
///     .retry_policy(FixedInterval(Duration::from_millis(250)));
/// let _ = builder;
/// ```
pub struct LanClientBuilder {
    session_config: SessionConfig,
    retry: Arc<dyn RetryPolicy>,
    events: Arc<dyn ClientEvents>,
}

impl std::fmt::Debug for LanClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LanClientBuilder")
            .field("session_config", &self.session_config)
            .finish_non_exhaustive()
    }
}

impl Default for LanClientBuilder {
    fn default() -> Self { Self::new() }
}

impl LanClientBuilder {
    /// Create a builder with default session settings, a one-second retry
    /// interval and no event hooks.
    #[must_use]
    pub fn new() -> Self {
        Self {
            session_config: SessionConfig::default(),
            retry: Arc::new(FixedInterval::default()),
            events: Arc::new(NoClientEvents),
        }
    }

    /// Session settings used for every connection attempt.
    #[must_use]
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    /// Delay policy between reconnect attempts.
    #[must_use]
    pub fn retry_policy(mut self, policy: impl RetryPolicy) -> Self {
        self.retry = Arc::new(policy);
        self
    }

    /// Application callbacks.
    #[must_use]
    pub fn events(mut self, events: impl ClientEvents) -> Self {
        self.events = Arc::new(events);
        self
    }

    /// Connect to `addr` and ask for `nickname`.
    ///
    /// The first attempt must succeed; after that the client reconnects on
    /// its own whenever the connection drops, until
    /// [`LanClient::disconnect_and_stop`].
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Session`] if the first connect fails.
    pub async fn connect(
        self,
        addr: SocketAddr,
        nickname: impl Into<String>,
    ) -> Result<LanClient, ClientError> {
        let client = self.build(addr, nickname.into(), false);
        if let Err(e) = client.session.connect(addr).await {
            client.core.halt();
            return Err(e.into());
        }
        Ok(client)
    }

    /// Return a client immediately and keep trying to reach `addr` in the
    /// background, following the retry policy, until the first success or
    /// [`LanClient::disconnect_and_stop`].
    #[must_use]
    pub fn start(self, addr: SocketAddr, nickname: impl Into<String>) -> LanClient {
        let client = self.build(addr, nickname.into(), true);
        client.core.spawn_initial_connect(&client.session);
        client
    }

    fn build(self, addr: SocketAddr, nickname: String, retry_first_attempt: bool) -> LanClient {
        let core = ClientCore::new(addr, nickname, self.events, self.retry, retry_first_attempt);
        let handler: Arc<ClientCore> = Arc::clone(&core);
        let session = Session::new(self.session_config, handler);
        LanClient { session, core }
    }
}
