use async_trait::async_trait;
use std::time::Duration;

/// Decides how long the scanner waits before retrying a failed or premature step.
#[async_trait]
pub trait Backoff: Send + Sync {
    /// Suspends the caller until the next attempt may start.
    async fn wait(&self);
}

/// Waits the same interval before every retry, with no cap on the number of retries.
#[derive(Debug, Clone, Copy)]
pub struct FixedBackoff {
    interval: Duration,
}

impl FixedBackoff {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

#[async_trait]
impl Backoff for FixedBackoff {
    async fn wait(&self) {
        tokio::time::sleep(self.interval).await;
    }
}
