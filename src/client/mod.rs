//! Reconnecting chat client.
//!
//! [`LanClient`] wraps a [`Session`](crate::session::Session) with the
//! client half of the tag protocol. It learns its own id from the first `ID`
//! frame of each connection, asks for its nickname, keeps a roster of peers
//! and reconnects after a drop according to a [`RetryPolicy`] until
//! [`LanClient::disconnect_and_stop`] is called.

mod builder;
mod error;
mod events;
mod retry;
mod roster;
mod runtime;

pub use builder::LanClientBuilder;
pub use error::ClientError;
pub use events::{ClientEvents, NoClientEvents};
pub use retry::{DEFAULT_RETRY_INTERVAL, FixedInterval, Immediate, RetryPolicy};
pub use roster::Roster;
pub use runtime::{LanClient, SERVER_NICKNAME};

#[cfg(test)]
mod tests;
