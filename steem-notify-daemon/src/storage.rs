//! Provides the `sled`-based implementation of the `FeedStore` trait defined in the
//! `steem-notify-connector` library.
use async_trait::async_trait;
use sled::{
    transaction::{ConflictableTransactionError, ConflictableTransactionResult, TransactionalTree},
    Db,
};
use std::collections::{hash_map::Entry, HashMap};

use crate::error::DaemonError;
use steem_notify_connector::storage::{
    feed_key, parse_cursor, FeedBatch, FeedStore, StoreCommand, StoreError, CURSOR_KEY,
};

/// A `sled`-backed implementation of the `FeedStore` trait.
///
/// The cursor is stored as a decimal string under `last_block_num`. Each feed is a JSON
/// array of serialized notifications under `notifications:<account>`, newest first.
#[derive(Clone)]
pub struct SledFeedStore {
    db: Db,
}

impl SledFeedStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Opens (or creates) the database at `path`.
    pub fn open(path: &str) -> Result<Self, DaemonError> {
        Ok(Self::new(sled::open(path)?))
    }
}

fn decode_list(key: &str, raw: &[u8]) -> Result<Vec<String>, DaemonError> {
    serde_json::from_slice(raw).map_err(|source| DaemonError::CorruptFeed {
        key: key.to_string(),
        source,
    })
}

fn read_list(
    tx: &TransactionalTree,
    key: &str,
) -> ConflictableTransactionResult<Vec<String>, DaemonError> {
    match tx.get(key)? {
        Some(raw) => decode_list(key, &raw).map_err(ConflictableTransactionError::Abort),
        None => Ok(Vec::new()),
    }
}

fn cached_list<'a, 'k>(
    lists: &'a mut HashMap<&'k str, Vec<String>>,
    tx: &TransactionalTree,
    key: &'k str,
) -> ConflictableTransactionResult<&'a mut Vec<String>, DaemonError> {
    Ok(match lists.entry(key) {
        Entry::Occupied(entry) => entry.into_mut(),
        Entry::Vacant(entry) => entry.insert(read_list(tx, key)?),
    })
}

#[async_trait]
impl FeedStore for SledFeedStore {
    async fn last_block(&self) -> Result<Option<u64>, StoreError> {
        self.db
            .get(CURSOR_KEY)
            .map_err(StoreError::backend)?
            .map(|raw| parse_cursor(&raw))
            .transpose()
    }

    /// Replays the batch against an in-transaction copy of every touched list, then writes
    /// the lists and the cursor back in the same `sled` transaction.
    async fn execute(&self, batch: FeedBatch) -> Result<(), StoreError> {
        let commands: Vec<StoreCommand> = batch.into_iter().collect();

        self.db
            .transaction(
                |tx: &TransactionalTree| -> ConflictableTransactionResult<(), DaemonError> {
                    let mut lists: HashMap<&str, Vec<String>> = HashMap::new();
                    let mut cursor = None;

                    for command in &commands {
                        match command {
                            StoreCommand::PushFront { key, value } => {
                                cached_list(&mut lists, tx, key)?.insert(0, value.clone());
                            }
                            StoreCommand::Trim { key, len } => {
                                cached_list(&mut lists, tx, key)?.truncate(*len);
                            }
                            StoreCommand::SetCursor(height) => cursor = Some(*height),
                        }
                    }

                    for (key, list) in &lists {
                        if list.is_empty() {
                            tx.remove(*key)?;
                        } else {
                            let encoded = serde_json::to_vec(list).map_err(|e| {
                                ConflictableTransactionError::Abort(DaemonError::Encoding(e))
                            })?;
                            tx.insert(*key, encoded)?;
                        }
                    }

                    if let Some(height) = cursor {
                        tx.insert(CURSOR_KEY, height.to_string().as_bytes())?;
                    }
                    Ok(())
                },
            )
            .map_err(|e| StoreError::from(DaemonError::from(e)))?;

        self.db.flush_async().await.map_err(StoreError::backend)?;

        Ok(())
    }

    async fn feed(&self, account: &str) -> Result<Vec<String>, StoreError> {
        let key = feed_key(account);
        match self.db.get(&key).map_err(StoreError::backend)? {
            Some(raw) => Ok(decode_list(&key, &raw)?),
            None => Ok(Vec::new()),
        }
    }
}
