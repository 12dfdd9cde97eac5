//! Cancellation of in-flight requests (Ctrl-C, reset)

use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;

/// Cancellation token for async operations
///
/// Cancellation is sticky: once cancelled a token stays cancelled, so a
/// fresh token is needed for the next request.
#[derive(Clone)]
pub struct CancellationToken {
    sender: Arc<watch::Sender<bool>>,
    receiver: watch::Receiver<bool>,
}

impl CancellationToken {
    /// Create a new cancellation token
    pub fn new() -> Self {
        let (sender, receiver) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
            receiver,
        }
    }

    /// Cancel the token
    pub fn cancel(&self) {
        let _ = self.sender.send(true);
    }

    /// Check if cancelled
    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Wait until cancelled
    pub async fn cancelled(&mut self) {
        while !*self.receiver.borrow() {
            if self.receiver.changed().await.is_err() {
                break;
            }
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Cancel `token` on Ctrl-C (or SIGTERM on unix)
///
/// Signal streams are registered before this returns, so a signal that
/// arrives while the spawned waiter is still unscheduled is not lost.
pub fn cancel_on_signal(token: CancellationToken) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;

        tokio::spawn(async move {
            tokio::select! {
                _ = sigint.recv() => tracing::info!("Received SIGINT, cancelling request"),
                _ = sigterm.recv() => tracing::info!("Received SIGTERM, cancelling request"),
            }
            token.cancel();
        });
    }

    #[cfg(windows)]
    {
        let mut ctrl_c = tokio::signal::windows::ctrl_c()?;

        tokio::spawn(async move {
            ctrl_c.recv().await;
            tracing::info!("Received Ctrl+C, cancelling request");
            token.cancel();
        });
    }

    Ok(())
}

/// Run `future` unless `token` is cancelled first
pub async fn with_cancellation<F, T>(mut token: CancellationToken, future: F) -> Option<T>
where
    F: Future<Output = T>,
{
    if token.is_cancelled() {
        return None;
    }

    tokio::select! {
        result = future => Some(result),
        _ = token.cancelled() => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_cancellation_token_cancel() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());

        token.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_cancellation_token_clone() {
        let token1 = CancellationToken::new();
        let token2 = token1.clone();

        token1.cancel();

        assert!(token1.is_cancelled());
        assert!(token2.is_cancelled());
    }

    #[tokio::test]
    async fn test_with_cancellation_completes() {
        let token = CancellationToken::new();
        let result = with_cancellation(token, async { 42 }).await;
        assert_eq!(result, Some(42));
    }

    #[tokio::test]
    async fn test_already_cancelled_skips_future() {
        let token = CancellationToken::new();
        token.cancel();

        let result = with_cancellation(token, async { 42 }).await;
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn test_signal_handler_installs_without_cancelling() {
        let token = CancellationToken::new();
        cancel_on_signal(token.clone()).unwrap();
        tokio::task::yield_now().await;
        assert!(!token.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancel_while_pending() {
        let token = CancellationToken::new();
        let canceller = token.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let result = with_cancellation(token, std::future::pending::<u32>()).await;
        assert_eq!(result, None);
    }
}
