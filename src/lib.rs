//! Public API for the `lanwire` library.
//!
//! `lanwire` is a small LAN chat and messaging toolkit built on Tokio. It
//! provides a length-prefixed binary [`codec`] for tagged [`message`]s, an
//! asynchronous TCP [`session`] engine with double-buffered sends, a
//! multi-client relay [`server`] that assigns ids and nicknames, and a
//! reconnecting [`client`].

pub mod buffer;
pub mod byte_order;
pub mod client;
pub mod codec;
pub mod message;
pub mod metrics;
pub mod server;
pub mod session;
pub mod tag;

pub use buffer::{BufferError, ByteBuffer};
pub use client::{ClientError, ClientEvents, LanClient, LanClientBuilder};
pub use codec::{CodecError, MessageCodec};
pub use message::{Message, SERVER_ID};
pub use metrics::{Direction, ERRORS_TOTAL, FRAMES_PROCESSED, SESSIONS_ACTIVE};
pub use server::{LanServer, ServerError, ServerEvents, ServerHandle};
pub use session::{Session, SessionConfig, SessionError, SessionHandler, SessionState};
pub use tag::Tag;
