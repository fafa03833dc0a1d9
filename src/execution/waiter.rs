use crate::error::BotError;
use crate::Result;
use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;

/// Fixed-delay wait that a shutdown signal can cut short
#[derive(Debug, Clone, Default)]
pub struct Waiter {
    cancel: CancellationToken,
}

impl Waiter {
    pub fn new(cancel: CancellationToken) -> Self {
        Self { cancel }
    }

    /// Sleep for `duration`, or return `Cancelled` as soon as shutdown is requested
    pub async fn sleep(&self, duration: Duration) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(BotError::Cancelled);
        }

        tokio::select! {
            _ = self.cancel.cancelled() => Err(BotError::Cancelled),
            _ = sleep(duration) => Ok(()),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_sleep_completes_after_duration() {
        let waiter = Waiter::default();
        let start = Instant::now();

        waiter.sleep(Duration::from_secs(30)).await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_sleep() {
        let cancel = CancellationToken::new();
        let waiter = Waiter::new(cancel.clone());

        let handle = tokio::spawn(async move {
            let start = Instant::now();
            let result = waiter.sleep(Duration::from_secs(300)).await;
            (result, start.elapsed())
        });

        tokio::time::sleep(Duration::from_secs(5)).await;
        cancel.cancel();

        let (result, elapsed) = handle.await.unwrap();
        assert!(matches!(result, Err(BotError::Cancelled)));
        assert!(elapsed < Duration::from_secs(300));
    }

    #[tokio::test]
    async fn test_already_cancelled_returns_immediately() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let waiter = Waiter::new(cancel);

        assert!(waiter.is_cancelled());
        assert!(matches!(
            waiter.sleep(Duration::from_secs(3600)).await,
            Err(BotError::Cancelled)
        ));
    }
}
