//! Graceful shutdown for the collector.
//!
//! Listens for SIGINT/SIGTERM and cancels a shared [`CancellationToken`]. Every
//! in-flight chain request races against the token, so cancellation aborts
//! outstanding work and lets workers release their fetch markers.

use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Owns the root cancellation token of the process.
pub struct ShutdownController {
    token: CancellationToken,
}

impl ShutdownController {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// A token cancelled on shutdown.
    pub fn token(&self) -> CancellationToken {
        self.token.child_token()
    }

    /// Trigger shutdown programmatically.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Wait for SIGTERM or SIGINT, then trigger shutdown.
    pub async fn wait_for_signal(&self) {
        let ctrl_c = signal::ctrl_c();

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "failed to install SIGTERM handler");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => { tracing::info!("received SIGINT, shutting down"); }
            _ = terminate => { tracing::info!("received SIGTERM, shutting down"); }
            _ = self.token.cancelled() => {}
        }

        self.shutdown();
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn programmatic_shutdown_cancels_tokens() {
        let controller = ShutdownController::new();
        let token = controller.token();
        assert!(!token.is_cancelled());
        controller.shutdown();
        token.cancelled().await;
        assert!(controller.is_shutdown());
    }

    #[tokio::test]
    async fn all_tokens_notified() {
        let controller = ShutdownController::new();
        let first = controller.token();
        let second = controller.token();
        controller.shutdown();
        assert!(first.is_cancelled());
        assert!(second.is_cancelled());
    }

    #[tokio::test]
    async fn wait_for_signal_returns_after_programmatic_shutdown() {
        let controller = ShutdownController::new();
        controller.shutdown();
        controller.wait_for_signal().await;
        assert!(controller.is_shutdown());
    }
}
