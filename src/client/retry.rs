//! Reconnect delay policies.

use std::time::Duration;

/// Default wait between reconnect attempts.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// Decides how long to wait before reconnect attempt `attempt` (1-based,
/// reset after each successful connection).
pub trait RetryPolicy: Send + Sync + 'static {
    /// Delay before the given attempt.
    fn delay(&self, attempt: u32) -> Duration;
}

/// Wait the same interval before every attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FixedInterval(pub Duration);

impl Default for FixedInterval {
    fn default() -> Self { Self(DEFAULT_RETRY_INTERVAL) }
}

impl RetryPolicy for FixedInterval {
    fn delay(&self, _attempt: u32) -> Duration { self.0 }
}

/// Reconnect without waiting. Intended for tests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Immediate;

impl RetryPolicy for Immediate {
    fn delay(&self, _attempt: u32) -> Duration { Duration::ZERO }
}
