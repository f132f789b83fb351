//! # Block Scanner & Background Workers
//!
//! This module defines the [`BlockScanner`], the single sequential worker that turns the
//! ledger into recipient feeds.
//!
//! ## Core Components
//!
//! - [`BlockScanner`]: Owns the scan loop. It is consumed when its `run` method is called.
//! - [`ScannerHandle`]: A clonable handle used to stop the running scanner.
//! - [`WorkerContext`]: The explicit dependencies (configuration, ledger client, feed
//!   store) the scanner is built from.
//! - [`Backoff`]: The retry policy applied between attempts.
//!

mod backoff;
mod scanner;

pub use backoff::{Backoff, FixedBackoff};
pub use scanner::BlockScanner;

use crate::{client::LedgerClient, config::ConnectorConfig, storage::FeedStore};
use std::{sync::Arc, time::Duration};
use tokio::sync::watch;

/// A shared context containing all dependencies required by the workers.
#[derive(Clone)]
pub struct WorkerContext {
    pub config: Arc<ConnectorConfig>,
    pub client: Arc<dyn LedgerClient>,
    pub store: Arc<dyn FeedStore>,
}

impl WorkerContext {
    pub fn new(
        config: Arc<ConnectorConfig>,
        client: Arc<dyn LedgerClient>,
        store: Arc<dyn FeedStore>,
    ) -> Self {
        Self {
            config,
            client,
            store,
        }
    }

    fn retry_backoff(&self) -> FixedBackoff {
        FixedBackoff::new(Duration::from_millis(
            self.config.scanner.retry_backoff_ms,
        ))
    }
}

/// A clonable, thread-safe handle for stopping a running [`BlockScanner`].
///
/// Dropping every handle has the same effect as calling [`stop`](Self::stop).
#[derive(Debug, Clone)]
pub struct ScannerHandle {
    shutdown: Arc<watch::Sender<bool>>,
}

impl ScannerHandle {
    fn new(shutdown: watch::Sender<bool>) -> Self {
        Self {
            shutdown: Arc::new(shutdown),
        }
    }

    /// Signals the scanner to stop at its next suspension point.
    ///
    /// Batches are atomic, so stopping never leaves a partially stored block behind.
    pub fn stop(&self) {
        if self.shutdown.send(true).is_err() {
            tracing::warn!("Failed to send shutdown to the scanner: it may already be down");
        }
    }
}
