use serde::{Deserialize, Serialize};

/// The top-level configuration for the `steem-notify-connector` library.
///
/// This struct aggregates the ledger node endpoint and the scanner behavior. It is
/// typically deserialized from a configuration file and passed to the `BlockScanner`
/// upon initialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectorConfig {
    #[serde(default)]
    pub steem: Steem,
    #[serde(default)]
    pub scanner: Scanner,
}

/// Defines the connection settings for the ledger node.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Steem {
    pub rpc_url: String,
    /// Per-request timeout in seconds for JSON-RPC calls.
    pub request_timeout_secs: u64,
}

/// Defines behavior for the `BlockScanner`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Scanner {
    /// The first block to process when no cursor has been stored yet.
    pub genesis_height: u64,
    /// The maximum number of entries kept in a recipient's feed.
    pub feed_cap: usize,
    /// The fixed delay in milliseconds between retries.
    pub retry_backoff_ms: u64,
    /// The maximum number of `mention` notifications emitted for a single post.
    pub mention_cap: usize,
    /// Whether virtual operations are requested from `get_ops_in_block`.
    pub include_virtual_ops: bool,
}

impl Default for Steem {
    fn default() -> Self {
        Self {
            rpc_url: "https://api.steemit.com".to_string(),
            request_timeout_secs: 20,
        }
    }
}

impl Default for Scanner {
    fn default() -> Self {
        Self {
            genesis_height: 20_000_000,
            feed_cap: 100,
            retry_backoff_ms: 2_000,
            mention_cap: 9,
            include_virtual_ops: false,
        }
    }
}
