//! Runtime control for [`LanServer`].

mod accept;
mod backoff;

use std::sync::Arc;

#[cfg(test)]
pub(super) use accept::MockAcceptListener;
pub(super) use accept::{AcceptLoopOptions, accept_loop};
pub use backoff::BackoffConfig;
use futures::Future;
use log::warn;
use tokio::{select, signal};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::info;

use super::{Bound, LanServer, ServerError, dispatch::ServerCore};

impl LanServer<Bound> {
    /// Run the server until Ctrl-C is received.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use lanwire::server::LanServer;
    ///
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), lanwire::server::ServerError> {
    /// LanServer::new()
    ///     .bind(([0, 0, 0, 0], 7777).into())?
    ///     .run()
    ///     .await
    /// # }
    /// ```
    ///
    /// Unbound servers cannot run:
    ///
    /// ```compile_fail
    /// use lanwire::server::LanServer;
    ///
    /// async fn try_run() { let _ = LanServer::new().run().await; }
    /// ```
    ///
    /// # Errors
    ///
    /// Currently infallible once bound; accept failures are retried with
    /// back-off and never surface here.
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_with_shutdown(async {
            let _ = signal::ctrl_c().await;
        })
        .await
    }

    /// Run the server until `shutdown` resolves, then disconnect every client
    /// and wait for their sessions to finish.
    ///
    /// # Examples
    ///
    /// ```
    /// use lanwire::server::LanServer;
    /// use tokio::sync::oneshot;
    ///
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), lanwire::server::ServerError> {
    /// let server = LanServer::new().bind(([127, 0, 0, 1], 0).into())?;
    /// let (tx, rx) = oneshot::channel::<()>();
    /// let task = tokio::spawn(server.run_with_shutdown(async {
    ///     let _ = rx.await;
    /// }));
    /// let _ = tx.send(());
    /// task.await.expect("join server task")?;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Currently infallible once bound.
    #[expect(
        clippy::integer_division_remainder_used,
        reason = "tokio::select! expands to modulus internally"
    )]
    pub async fn run_with_shutdown<S>(self, shutdown: S) -> Result<(), ServerError>
    where
        S: Future<Output = ()> + Send,
    {
        let LanServer {
            session_config,
            backoff,
            events,
            handle,
            ready_tx,
            state: Bound { listener },
        } = self;
        let shutdown_token = CancellationToken::new();
        let tracker = TaskTracker::new();
        let core = Arc::new(ServerCore::new(handle, events));

        let mut accept = tokio::spawn(accept_loop(
            Arc::clone(&listener),
            AcceptLoopOptions {
                core: Arc::clone(&core),
                session_config,
                shutdown: shutdown_token.clone(),
                tracker: tracker.clone(),
                backoff,
            },
        ));
        info!(addr = ?listener.local_addr().ok(), "server listening");

        if let Some(tx) = ready_tx
            && tx.send(()).is_err()
        {
            warn!("Failed to send readiness signal: receiver dropped");
        }

        let finished = select! {
            () = shutdown => None,
            res = &mut accept => Some(res),
        };
        shutdown_token.cancel();
        // Sessions spawned by an accept already in flight must be on the
        // tracker before the roster closes.
        let accepted = match finished {
            Some(res) => res,
            None => accept.await,
        };
        if let Err(e) = accepted {
            warn!("accept loop failed: error={e}");
        }

        core.close();
        tracker.close();
        tracker.wait().await;
        info!("server stopped");
        Ok(())
    }
}
