//! Metric helpers for `lanwire`.
//!
//! Thin wrappers over the [`metrics`](https://docs.rs/metrics) facade. With the
//! `metrics` feature disabled every helper compiles to a no-op.

/// Name of the gauge tracking connected sessions.
pub const SESSIONS_ACTIVE: &str = "lanwire_sessions_active";
/// Name of the counter tracking frames by direction.
pub const FRAMES_PROCESSED: &str = "lanwire_frames_processed_total";
/// Name of the counter tracking surfaced errors.
pub const ERRORS_TOTAL: &str = "lanwire_errors_total";
/// Name of the counter tracking reconnect attempts.
pub const RECONNECT_ATTEMPTS: &str = "lanwire_reconnect_attempts_total";

/// Direction of frame processing.
#[derive(Clone, Copy, Debug)]
pub enum Direction {
    /// Frames decoded from a peer.
    Inbound,
    /// Frames encoded for a peer.
    Outbound,
}

impl Direction {
    #[cfg_attr(not(feature = "metrics"), allow(dead_code))]
    fn as_str(self) -> &'static str {
        match self {
            Direction::Inbound => "inbound",
            Direction::Outbound => "outbound",
        }
    }
}

/// Increment the connected sessions gauge.
pub fn inc_sessions() {
    #[cfg(feature = "metrics")]
    metrics::gauge!(SESSIONS_ACTIVE).increment(1.0);
}

/// Decrement the connected sessions gauge.
pub fn dec_sessions() {
    #[cfg(feature = "metrics")]
    metrics::gauge!(SESSIONS_ACTIVE).decrement(1.0);
}

/// Record a processed frame for the given direction.
pub fn inc_frames(direction: Direction) {
    #[cfg(feature = "metrics")]
    metrics::counter!(FRAMES_PROCESSED, "direction" => direction.as_str()).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = direction;
}

/// Record a surfaced error of the given kind.
pub fn inc_errors(kind: &'static str) {
    #[cfg(feature = "metrics")]
    metrics::counter!(ERRORS_TOTAL, "kind" => kind).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = kind;
}

/// Record a reconnect attempt by the client wrapper.
pub fn inc_reconnects() {
    #[cfg(feature = "metrics")]
    metrics::counter!(RECONNECT_ATTEMPTS).increment(1);
}
