use crate::{
    events::EventExtractor,
    ledger::{BlockStatus, Operation},
    storage::{FeedBatch, StoreError},
    workers::{backoff::Backoff, ScannerHandle, WorkerContext},
};
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::watch;

/// The steps a single block goes through before the cursor moves past it.
#[derive(Debug)]
enum ScanState {
    DetermineNext,
    FetchOps(u64),
    HandleEmpty(u64),
    Persist(u64, Vec<Operation>),
    Advanced(u64),
}

/// Walks the chain one irreversible block at a time, storing the notifications of each
/// block and advancing the cursor in the same atomic batch.
///
/// Every failure except an unreadable cursor is retried in place after a backoff, so a
/// block is never skipped and the cursor never passes a block whose notifications were
/// not stored.
pub struct BlockScanner {
    ctx: WorkerContext,
    backoff: Arc<dyn Backoff>,
    extractor: EventExtractor,
    shutdown: watch::Receiver<bool>,
}

impl BlockScanner {
    /// Creates a new `BlockScanner` and the [`ScannerHandle`] used to stop it.
    ///
    /// The scanner waits `retry_backoff_ms` between retries; use
    /// [`with_backoff`](Self::with_backoff) to substitute another policy.
    pub fn new(ctx: WorkerContext) -> (Self, ScannerHandle) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let backoff = Arc::new(ctx.retry_backoff());
        let extractor = EventExtractor::new(ctx.config.scanner.mention_cap);

        let scanner = Self {
            ctx,
            backoff,
            extractor,
            shutdown: shutdown_rx,
        };
        (scanner, ScannerHandle::new(shutdown_tx))
    }

    pub fn with_backoff(mut self, backoff: Arc<dyn Backoff>) -> Self {
        self.backoff = backoff;
        self
    }

    /// Processes blocks until the handle requests a shutdown.
    ///
    /// Returns an error only when the stored cursor cannot be interpreted, which no amount
    /// of retrying would fix.
    pub async fn run(self) -> Result<()> {
        let mut shutdown = self.shutdown.clone();
        tracing::info!("Block scanner started.");

        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => {
                    tracing::info!("BlockScanner: shutdown signal received, exiting.");
                    return Ok(());
                }
                res = self.process_next() => {
                    res?;
                }
            }
        }
    }

    /// Resolves the next block, retrying every step as often as needed, and returns the
    /// height the cursor was advanced to.
    pub async fn process_next(&self) -> Result<u64> {
        let mut state = ScanState::DetermineNext;
        loop {
            state = match state {
                ScanState::DetermineNext => self.determine_next().await?,
                ScanState::FetchOps(target) => self.fetch_ops(target).await,
                ScanState::HandleEmpty(target) => self.handle_empty(target).await,
                ScanState::Persist(target, ops) => self.persist(target, ops).await,
                ScanState::Advanced(height) => return Ok(height),
            };
        }
    }

    async fn determine_next(&self) -> Result<ScanState> {
        let target = match self.ctx.store.last_block().await {
            Ok(Some(cursor)) => cursor + 1,
            Ok(None) => self.ctx.config.scanner.genesis_height,
            Err(e @ StoreError::MalformedCursor(_)) => return Err(e.into()),
            Err(e) => {
                tracing::error!("Failed to read the cursor: {}", e);
                self.backoff.wait().await;
                return Ok(ScanState::DetermineNext);
            }
        };

        match self.ctx.client.fetch_global_properties().await {
            Ok(props) if props.last_irreversible_height >= target => {
                Ok(ScanState::FetchOps(target))
            }
            Ok(props) => {
                tracing::debug!(
                    block = target,
                    last_irreversible = props.last_irreversible_height,
                    "Waiting for the block to become irreversible."
                );
                self.backoff.wait().await;
                Ok(ScanState::DetermineNext)
            }
            Err(e) => {
                tracing::error!(block = target, "Failed to fetch global properties: {}", e);
                self.backoff.wait().await;
                Ok(ScanState::DetermineNext)
            }
        }
    }

    async fn fetch_ops(&self, target: u64) -> ScanState {
        let include_virtual = self.ctx.config.scanner.include_virtual_ops;
        match self
            .ctx
            .client
            .fetch_operations(target, include_virtual)
            .await
        {
            Ok(ops) if ops.is_empty() => ScanState::HandleEmpty(target),
            Ok(ops) => ScanState::Persist(target, ops),
            Err(e) => {
                tracing::error!(block = target, "Failed to fetch operations, retrying: {}", e);
                self.backoff.wait().await;
                ScanState::FetchOps(target)
            }
        }
    }

    async fn handle_empty(&self, target: u64) -> ScanState {
        let status = match self.ctx.client.fetch_block(target).await {
            Ok(block) => BlockStatus::classify(block),
            Err(e) => {
                tracing::error!(block = target, "Failed to fetch block, retrying: {}", e);
                self.backoff.wait().await;
                return ScanState::FetchOps(target);
            }
        };

        match status {
            BlockStatus::ConfirmedEmpty(_) => {
                tracing::info!(block = target, "Block exists and is empty, loading next.");
                self.persist(target, Vec::new()).await
            }
            BlockStatus::NotYetReachable | BlockStatus::Populated(_) => {
                tracing::warn!(block = target, "Block not settled on the node yet, retrying.");
                self.backoff.wait().await;
                ScanState::FetchOps(target)
            }
        }
    }

    async fn persist(&self, target: u64, ops: Vec<Operation>) -> ScanState {
        let deliveries = self.extractor.extract(&ops);
        let batch = match FeedBatch::for_block(target, &deliveries, self.ctx.config.scanner.feed_cap)
        {
            Ok(batch) => batch,
            Err(e) => {
                tracing::error!(block = target, "Failed to encode notifications: {}", e);
                self.backoff.wait().await;
                return ScanState::Persist(target, ops);
            }
        };

        match self.ctx.store.execute(batch).await {
            Ok(()) => {
                tracing::info!(
                    block = target,
                    notifications = deliveries.len(),
                    "Block loaded."
                );
                ScanState::Advanced(target)
            }
            Err(e) => {
                tracing::error!(block = target, "Failed to store notifications, retrying: {}", e);
                self.backoff.wait().await;
                ScanState::Persist(target, ops)
            }
        }
    }
}
