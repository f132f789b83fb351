use crate::events::{Delivery, Notification};
use async_trait::async_trait;
use thiserror::Error;

/// The scalar key holding the height of the last fully processed block.
pub const CURSOR_KEY: &str = "last_block_num";

/// The list key holding `account`'s feed.
pub fn feed_key(account: &str) -> String {
    format!("notifications:{account}")
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend failure: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("failed to encode or decode a stored value: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("stored cursor `{0}` is not a block number")]
    MalformedCursor(String),
}

impl StoreError {
    pub fn backend<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        StoreError::Backend(Box::new(err))
    }
}

/// One write inside a [`FeedBatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCommand {
    /// Prepends `value` to the list at `key`, creating the list if needed.
    PushFront { key: String, value: String },
    /// Keeps only the first `len` entries of the list at `key`.
    Trim { key: String, len: usize },
    /// Sets the cursor to `height`.
    SetCursor(u64),
}

/// An ordered group of commands applied all-or-nothing by [`FeedStore::execute`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedBatch {
    commands: Vec<StoreCommand>,
}

impl FeedBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the batch that stores `deliveries` and advances the cursor to `height`.
    ///
    /// Each delivery becomes a push onto the recipient's feed followed by a trim to
    /// `feed_cap`; the cursor update comes last.
    pub fn for_block(
        height: u64,
        deliveries: &[Delivery],
        feed_cap: usize,
    ) -> Result<Self, StoreError> {
        let mut batch = Self::new();
        for delivery in deliveries {
            let key = feed_key(&delivery.recipient);
            batch.push_front(key.clone(), serde_json::to_string(&delivery.notification)?);
            batch.trim(key, feed_cap);
        }
        batch.set_cursor(height);
        Ok(batch)
    }

    pub fn push_front(&mut self, key: String, value: String) -> &mut Self {
        self.commands.push(StoreCommand::PushFront { key, value });
        self
    }

    pub fn trim(&mut self, key: String, len: usize) -> &mut Self {
        self.commands.push(StoreCommand::Trim { key, len });
        self
    }

    pub fn set_cursor(&mut self, height: u64) -> &mut Self {
        self.commands.push(StoreCommand::SetCursor(height));
        self
    }

    pub fn commands(&self) -> &[StoreCommand] {
        &self.commands
    }

    /// The number of `PushFront` commands in the batch.
    pub fn push_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, StoreCommand::PushFront { .. }))
            .count()
    }

    /// The cursor value this batch sets, if any.
    pub fn cursor(&self) -> Option<u64> {
        self.commands.iter().rev().find_map(|c| match c {
            StoreCommand::SetCursor(height) => Some(*height),
            _ => None,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl IntoIterator for FeedBatch {
    type Item = StoreCommand;
    type IntoIter = std::vec::IntoIter<StoreCommand>;

    fn into_iter(self) -> Self::IntoIter {
        self.commands.into_iter()
    }
}

/// Parses a stored cursor value.
pub fn parse_cursor(raw: &[u8]) -> Result<u64, StoreError> {
    let text = String::from_utf8_lossy(raw);
    text.trim()
        .parse::<u64>()
        .map_err(|_| StoreError::MalformedCursor(text.into_owned()))
}

/// A trait defining the persistent store holding the cursor and the recipient feeds.
/// This allows for different database implementations.
#[async_trait]
pub trait FeedStore: Send + Sync {
    /// Retrieves the cursor. Returns `None` if no block has been processed yet.
    async fn last_block(&self) -> Result<Option<u64>, StoreError>;

    /// Applies every command of `batch` atomically: either all of them become durable or
    /// none of them is visible.
    async fn execute(&self, batch: FeedBatch) -> Result<(), StoreError>;

    /// Retrieves the raw serialized entries of `account`'s feed, newest first.
    async fn feed(&self, account: &str) -> Result<Vec<String>, StoreError>;

    /// Retrieves `account`'s feed as notifications, newest first.
    async fn notifications(&self, account: &str) -> Result<Vec<Notification>, StoreError> {
        self.feed(account)
            .await?
            .iter()
            .map(|entry| serde_json::from_str(entry).map_err(StoreError::from))
            .collect()
    }
}
