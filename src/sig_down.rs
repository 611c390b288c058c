use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Turns SIGTERM and SIGINT into a cancelled [`CancellationToken`].
///
/// A checkout that is interrupted supersedes its attempt in flight; proofs that already
/// reached the pending store stay there for `resubmit`.
pub struct SigDown {
    tracker: TaskTracker,
    token: CancellationToken,
}

impl SigDown {
    pub fn try_new() -> Result<Self, std::io::Error> {
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;
        let token = CancellationToken::new();
        let tracker = TaskTracker::new();
        let cancel = token.clone();
        tracker.spawn(async move {
            let name = tokio::select! {
                _ = sigterm.recv() => "SIGTERM",
                _ = sigint.recv() => "SIGINT",
                _ = cancel.cancelled() => return,
            };
            tracing::info!(signal = name, "Shutting down checkout");
            cancel.cancel();
        });
        tracker.close();
        Ok(Self { tracker, token })
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Cancels the token as if a signal had arrived and waits for the listener to finish.
    pub async fn shutdown(&self) {
        self.token.cancel();
        self.tracker.wait().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_shutdown_cancels_token() {
        let sig_down = SigDown::try_new().unwrap();
        let token = sig_down.cancellation_token();
        assert!(!token.is_cancelled());
        sig_down.shutdown().await;
        assert!(token.is_cancelled());
    }
}
