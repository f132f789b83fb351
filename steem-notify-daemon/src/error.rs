use sled::transaction::TransactionError;
use steem_notify_connector::storage::StoreError;
use thiserror::Error;

/// Defines the primary error types for the daemon.
#[derive(Error, Debug)]
pub enum DaemonError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Database error: {0}")]
    Database(#[from] sled::Error),

    #[error("Stored feed under `{key}` is not a JSON list: {source}")]
    CorruptFeed {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Serialization failed: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Flattens a failed sled transaction into the error that aborted it.
impl From<TransactionError<DaemonError>> for DaemonError {
    fn from(err: TransactionError<DaemonError>) -> Self {
        match err {
            TransactionError::Abort(e) => e,
            TransactionError::Storage(e) => DaemonError::Database(e),
        }
    }
}

impl From<DaemonError> for StoreError {
    fn from(err: DaemonError) -> Self {
        match err {
            DaemonError::Encoding(e) => StoreError::Encoding(e),
            other => StoreError::backend(other),
        }
    }
}
