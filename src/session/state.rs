//! Lifecycle states of a [`Session`](super::Session).

use std::fmt;

/// Connection lifecycle of a session.
///
/// Sessions move `Disconnected → Connecting → Connected → Disconnecting →
/// Disconnected`. A failed or cancelled connect returns straight from
/// `Connecting` to `Disconnected`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// No socket is attached.
    #[default]
    Disconnected,
    /// A connect or accept is in progress.
    Connecting,
    /// Both I/O loops are running.
    Connected,
    /// Teardown was requested and the I/O loops are stopping.
    Disconnecting,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnecting => "disconnecting",
        };
        f.write_str(name)
    }
}
