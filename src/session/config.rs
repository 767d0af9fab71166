//! Per-session buffer and socket configuration.

use std::time::Duration;

/// Default initial capacity of the receive buffer.
pub const DEFAULT_RECEIVE_BUFFER_SIZE: usize = 8 * 1024;
/// Default initial capacity of each send buffer.
pub const DEFAULT_SEND_BUFFER_SIZE: usize = 8 * 1024;
/// Default time allowed for an outbound TCP connect.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Buffer sizes, limits and socket options applied to every connection of a
/// session.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use lanwire::session::SessionConfig;
///
/// let config = SessionConfig::default()
///     .receive_buffer_size(1024)
///     .receive_buffer_limit(64 * 1024)
///     .connect_timeout(Duration::from_millis(250));
/// assert_eq!(config.receive_buffer_limit_bytes(), Some(64 * 1024));
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    receive_buffer_size: usize,
    send_buffer_size: usize,
    receive_buffer_limit: Option<usize>,
    send_buffer_limit: Option<usize>,
    nodelay: bool,
    connect_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            receive_buffer_size: DEFAULT_RECEIVE_BUFFER_SIZE,
            send_buffer_size: DEFAULT_SEND_BUFFER_SIZE,
            receive_buffer_limit: None,
            send_buffer_limit: None,
            nodelay: true,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl SessionConfig {
    /// Initial receive buffer capacity. Values below one byte are raised to one.
    #[must_use]
    pub fn receive_buffer_size(mut self, bytes: usize) -> Self {
        self.receive_buffer_size = bytes.max(1);
        self
    }

    /// Initial send buffer capacity.
    #[must_use]
    pub fn send_buffer_size(mut self, bytes: usize) -> Self {
        self.send_buffer_size = bytes;
        self
    }

    /// Cap on receive buffer growth. A read that would need more disconnects
    /// the session.
    #[must_use]
    pub fn receive_buffer_limit(mut self, bytes: usize) -> Self {
        self.receive_buffer_limit = Some(bytes);
        self
    }

    /// Cap on bytes queued but not yet handed to the socket. Sends that would
    /// exceed it are rejected.
    #[must_use]
    pub fn send_buffer_limit(mut self, bytes: usize) -> Self {
        self.send_buffer_limit = Some(bytes);
        self
    }

    /// Enable or disable `TCP_NODELAY`.
    #[must_use]
    pub fn nodelay(mut self, enabled: bool) -> Self {
        self.nodelay = enabled;
        self
    }

    /// Time allowed for an outbound connect.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Initial receive buffer capacity in bytes.
    #[must_use]
    pub fn receive_buffer_size_bytes(&self) -> usize { self.receive_buffer_size }

    /// Initial send buffer capacity in bytes.
    #[must_use]
    pub fn send_buffer_size_bytes(&self) -> usize { self.send_buffer_size }

    /// Receive buffer limit, if any.
    #[must_use]
    pub fn receive_buffer_limit_bytes(&self) -> Option<usize> { self.receive_buffer_limit }

    /// Send buffer limit, if any.
    #[must_use]
    pub fn send_buffer_limit_bytes(&self) -> Option<usize> { self.send_buffer_limit }

    /// Whether `TCP_NODELAY` is requested.
    #[must_use]
    pub fn is_nodelay(&self) -> bool { self.nodelay }

    /// Connect timeout.
    #[must_use]
    pub fn connect_timeout_duration(&self) -> Duration { self.connect_timeout }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn receive_buffer_size_is_at_least_one() {
        let config = SessionConfig::default().receive_buffer_size(0);
        assert_eq!(config.receive_buffer_size_bytes(), 1);
    }

    #[test]
    fn limits_default_to_unbounded() {
        let config = SessionConfig::default();
        assert_eq!(config.receive_buffer_limit_bytes(), None);
        assert_eq!(config.send_buffer_limit_bytes(), None);
        assert!(config.is_nodelay());
    }
}
