//! System tags carried in the first header byte of every frame.
//!
//! The vocabulary is closed: both ends must agree on it out of band and an
//! unknown byte is a protocol error.

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Routing instruction attached to a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum Tag {
    /// Server broadcast, or a client broadcast relayed by the server.
    ServerToAll = 0,
    /// Server unicast, or a client unicast relayed by the server.
    ServerToClient = 1,
    /// Client message addressed to the server application.
    ClientToServer = 2,
    /// Client broadcast request.
    ClientToAll = 3,
    /// Client unicast request; `to_id` names the recipient.
    ClientToClient = 4,
    /// A peer left; `from_id` names it.
    Disconnect = 5,
    /// A peer joined; `from_id` carries its assigned id.
    Id = 6,
    /// Client proposes a nickname in `text`.
    NicknameAsk = 7,
    /// Server confirms `text` as the nickname of `from_id`.
    Nickname = 8,
}

impl Tag {
    /// Returns `true` for tags a client may send.
    #[must_use]
    pub fn is_client_originated(self) -> bool {
        matches!(
            self,
            Self::ClientToServer | Self::ClientToAll | Self::ClientToClient | Self::NicknameAsk
        )
    }
}
