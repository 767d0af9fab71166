//! Session start-up for accepted connections.

use std::{net::SocketAddr, panic::AssertUnwindSafe, sync::Arc};

use futures::FutureExt;
use log::{error, warn};
use tokio::net::TcpStream;
use tokio_util::task::TaskTracker;

use super::dispatch::ServerCore;
use crate::session::{Session, SessionConfig, SessionError};

/// Attach `stream` to a new session and drive it on `tracker`, logging and
/// discarding any panic that escapes the session's own handling.
pub(super) fn spawn_session(
    stream: TcpStream,
    core: &Arc<ServerCore>,
    config: &SessionConfig,
    tracker: &TaskTracker,
) {
    let peer_addr = match stream.peer_addr() {
        Ok(addr) => Some(addr),
        Err(e) => {
            warn!("failed to read peer address: error={e}");
            None
        }
    };
    let handler: Arc<ServerCore> = Arc::clone(core);
    let session = Session::new(config.clone(), handler);
    let driver = match session.accept(stream) {
        Ok(driver) => driver,
        Err(e) => {
            warn!("failed to start session: error={e}, peer_addr={peer_addr:?}");
            return;
        }
    };
    tracker.spawn(supervise(driver, peer_addr));
}

async fn supervise(driver: impl Future<Output = ()> + Send, peer_addr: Option<SocketAddr>) {
    if let Err(panic) = AssertUnwindSafe(driver).catch_unwind().await {
        let panic_msg = SessionError::from_panic(&*panic);
        // Emit via both `log` and `tracing` for tests that capture either.
        error!("session task panicked: panic={panic_msg}, peer_addr={peer_addr:?}");
        tracing::error!(panic = %panic_msg, ?peer_addr, "session task panicked");
    }
}
