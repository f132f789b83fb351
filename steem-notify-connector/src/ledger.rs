//! # Ledger Data Model
//!
//! Typed views over the JSON documents returned by the ledger node. Operations arrive as
//! `[tag, body]` pairs; only the tags the extractor cares about are decoded into typed
//! bodies, everything else is kept as [`OperationKind::Other`].

use chrono::NaiveDateTime;
use serde::{de::DeserializeOwned, Deserialize, Deserializer};
use serde_json::Value;

/// A single operation as returned by `get_ops_in_block`, with the block number and
/// timestamp the node attaches to it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Operation {
    pub block: u64,
    #[serde(default)]
    pub trx_id: String,
    pub timestamp: NaiveDateTime,
    pub op: OperationKind,
}

/// The operation payload, keyed by the operation tag.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationKind {
    Comment(CommentOp),
    CustomJson(CustomJsonOp),
    AccountWitnessVote(AccountWitnessVoteOp),
    Vote(VoteOp),
    Transfer(TransferOp),
    /// Any operation the extractor does not inspect, or a known tag whose body did not
    /// match the expected shape.
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CommentOp {
    #[serde(default)]
    pub parent_author: String,
    #[serde(default)]
    pub parent_permlink: String,
    pub author: String,
    pub permlink: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CustomJsonOp {
    pub id: String,
    /// The application payload, itself a JSON document encoded as a string.
    pub json: String,
    #[serde(default)]
    pub required_posting_auths: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AccountWitnessVoteOp {
    pub account: String,
    pub witness: String,
    pub approve: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VoteOp {
    pub voter: String,
    pub author: String,
    pub permlink: String,
    pub weight: i16,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TransferOp {
    pub from: String,
    pub to: String,
    pub amount: String,
    #[serde(default)]
    pub memo: String,
}

impl OperationKind {
    /// Builds an `OperationKind` from the raw `[tag, body]` pair.
    pub fn from_tagged(tag: &str, body: Value) -> Self {
        fn decode<T, F>(tag: &str, body: Value, map: F) -> OperationKind
        where
            T: DeserializeOwned,
            F: FnOnce(T) -> OperationKind,
        {
            match serde_json::from_value::<T>(body) {
                Ok(op) => map(op),
                Err(e) => {
                    tracing::warn!(tag, "Operation body does not match its tag: {}", e);
                    OperationKind::Other(tag.to_string())
                }
            }
        }

        match tag {
            "comment" => decode(tag, body, OperationKind::Comment),
            "custom_json" => decode(tag, body, OperationKind::CustomJson),
            "account_witness_vote" => decode(tag, body, OperationKind::AccountWitnessVote),
            "vote" => decode(tag, body, OperationKind::Vote),
            "transfer" => decode(tag, body, OperationKind::Transfer),
            other => OperationKind::Other(other.to_string()),
        }
    }

    /// The operation tag this payload was decoded from.
    pub fn tag(&self) -> &str {
        match self {
            OperationKind::Comment(_) => "comment",
            OperationKind::CustomJson(_) => "custom_json",
            OperationKind::AccountWitnessVote(_) => "account_witness_vote",
            OperationKind::Vote(_) => "vote",
            OperationKind::Transfer(_) => "transfer",
            OperationKind::Other(tag) => tag,
        }
    }
}

impl<'de> Deserialize<'de> for OperationKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let (tag, body): (String, Value) = Deserialize::deserialize(deserializer)?;
        Ok(OperationKind::from_tagged(&tag, body))
    }
}

/// A block record as returned by `get_block`. Transactions are kept opaque since the
/// scanner only needs to know whether there are any.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Block {
    #[serde(default)]
    pub previous: String,
    pub timestamp: NaiveDateTime,
    #[serde(default)]
    pub witness: String,
    #[serde(default)]
    pub transactions: Vec<Value>,
}

impl Block {
    /// A block is confirmed empty only when it links to a predecessor and holds no
    /// transactions.
    pub fn is_confirmed_empty(&self) -> bool {
        !self.previous.is_empty() && self.transactions.is_empty()
    }
}

/// The subset of `get_dynamic_global_properties` the scanner relies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct GlobalProperties {
    #[serde(rename = "head_block_number", default)]
    pub head_height: u64,
    #[serde(rename = "last_irreversible_block_num")]
    pub last_irreversible_height: u64,
}

/// What a `get_block` lookup says about a height whose operation list came back empty.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockStatus {
    /// The node has no chain-reachable block at this height yet.
    NotYetReachable,
    /// The block exists, links to its predecessor and has no transactions.
    ConfirmedEmpty(Block),
    /// The block has transactions even though no operations were returned for it.
    Populated(Block),
}

impl BlockStatus {
    pub fn classify(block: Option<Block>) -> Self {
        match block {
            None => BlockStatus::NotYetReachable,
            Some(block) if block.is_confirmed_empty() => BlockStatus::ConfirmedEmpty(block),
            Some(block) if block.previous.is_empty() => BlockStatus::NotYetReachable,
            Some(block) => BlockStatus::Populated(block),
        }
    }
}
