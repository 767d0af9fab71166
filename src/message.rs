//! The frame value exchanged between peers.
//!
//! A [`Message`] lives only for one send or receive event: it is built, encoded
//! into a session buffer, and dropped; or decoded from a receive buffer and
//! handed to a handler.

use bytes::Bytes;

use crate::tag::Tag;

/// Id used in `from_id` for frames originated by the server itself.
pub const SERVER_ID: u8 = 0;

/// One wire frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    /// Routing instruction.
    pub system_tag: Tag,
    /// Application-defined discriminator, opaque to the transport.
    pub user_tag: u8,
    /// Id of the originating peer.
    pub from_id: u8,
    /// Id of the addressed peer, where the tag uses one.
    pub to_id: u8,
    /// UTF-8 text payload.
    pub text: String,
    /// Opaque binary payload.
    pub raw: Bytes,
}

impl Message {
    /// Create a message with empty routing ids and payloads.
    ///
    /// # Examples
    ///
    /// ```
    /// use lanwire::{message::Message, tag::Tag};
    ///
    /// let msg = Message::new(Tag::ClientToAll)
    ///     .with_from(1)
    ///     .with_text("hello");
    /// assert_eq!(msg.text, "hello");
    /// assert!(msg.raw.is_empty());
    /// ```
    #[must_use]
    pub fn new(system_tag: Tag) -> Self {
        Self {
            system_tag,
            user_tag: 0,
            from_id: SERVER_ID,
            to_id: SERVER_ID,
            text: String::new(),
            raw: Bytes::new(),
        }
    }

    /// Set the application tag.
    #[must_use]
    pub fn with_user_tag(mut self, user_tag: u8) -> Self {
        self.user_tag = user_tag;
        self
    }

    /// Set the originating peer id.
    #[must_use]
    pub fn with_from(mut self, from_id: u8) -> Self {
        self.from_id = from_id;
        self
    }

    /// Set the addressed peer id.
    #[must_use]
    pub fn with_to(mut self, to_id: u8) -> Self {
        self.to_id = to_id;
        self
    }

    /// Set the text payload.
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Set the binary payload.
    #[must_use]
    pub fn with_raw(mut self, raw: impl Into<Bytes>) -> Self {
        self.raw = raw.into();
        self
    }

    /// Copy of this message re-stamped with another system tag.
    #[must_use]
    pub fn restamped(&self, system_tag: Tag) -> Self {
        Self {
            system_tag,
            ..self.clone()
        }
    }
}
