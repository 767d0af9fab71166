//! Lifecycle callbacks invoked by the session engine.
//!
//! A [`SessionHandler`] is supplied when a [`Session`] is constructed and is
//! shared by every connection the session makes. Callbacks receive the
//! session itself, so handlers can send or disconnect without holding a back
//! reference to it.

use std::sync::Arc;

use super::{Session, SessionError};

/// Callbacks fired by a [`Session`].
///
/// Every method has a no-op default. Callbacks run on the session's I/O tasks
/// and must not block.
pub trait SessionHandler: Send + Sync + 'static {
    /// The socket is attached and both I/O loops are about to start.
    fn on_connected(&self, _session: &Arc<Session>) {}

    /// Bytes are waiting in the receive buffer.
    ///
    /// `data` holds everything received and not yet consumed. Return the
    /// number of leading bytes consumed; the rest stays buffered and is
    /// presented again, followed by newer bytes, on the next call.
    fn on_received(&self, _session: &Arc<Session>, data: &[u8]) -> usize { data.len() }

    /// `sent` bytes reached the socket; `pending` bytes remain queued.
    fn on_sent(&self, _session: &Arc<Session>, _sent: usize, _pending: usize) {}

    /// Every queued byte has been written.
    fn on_empty(&self, _session: &Arc<Session>) {}

    /// Teardown started; the socket is still open.
    fn on_disconnecting(&self, _session: &Arc<Session>) {}

    /// Teardown finished or a connect attempt failed.
    fn on_disconnected(&self, _session: &Arc<Session>) {}

    /// A non-noise error occurred.
    fn on_error(&self, _session: &Arc<Session>, _error: &SessionError) {}
}
