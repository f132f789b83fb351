//! # Event Extraction
//!
//! Maps the operations of a block to the notifications they produce. Extraction is pure:
//! the same operations always yield the same deliveries, in the same order.

use crate::ledger::{CommentOp, CustomJsonOp, Operation, OperationKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use thiserror::Error;

/// Default upper bound on `mention` notifications emitted for a single post.
pub const DEFAULT_MENTION_CAP: usize = 9;

/// A user-facing notification, serialized with a `type` discriminator.
///
/// The recipient is not part of the payload; it is carried by the [`Delivery`] wrapping it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    Reply {
        parent_permlink: String,
        author: String,
        permlink: String,
        timestamp: i64,
        block: u64,
    },
    Mention {
        is_root_post: bool,
        author: String,
        permlink: String,
        timestamp: i64,
        block: u64,
    },
    Follow {
        follower: String,
        timestamp: i64,
        block: u64,
    },
    Reblog {
        account: String,
        permlink: String,
        timestamp: i64,
        block: u64,
    },
    WitnessVote {
        account: String,
        approve: bool,
        timestamp: i64,
        block: u64,
    },
    Vote {
        voter: String,
        permlink: String,
        weight: i16,
        timestamp: i64,
        block: u64,
    },
    Transfer {
        from: String,
        amount: String,
        memo: String,
        timestamp: i64,
        block: u64,
    },
}

impl Notification {
    /// The height of the block the notification was extracted from.
    pub fn block(&self) -> u64 {
        match self {
            Notification::Reply { block, .. }
            | Notification::Mention { block, .. }
            | Notification::Follow { block, .. }
            | Notification::Reblog { block, .. }
            | Notification::WitnessVote { block, .. }
            | Notification::Vote { block, .. }
            | Notification::Transfer { block, .. } => *block,
        }
    }
}

/// A notification addressed to the account whose feed receives it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub recipient: String,
    pub notification: Notification,
}

/// A `custom_json` payload that could not be interpreted.
#[derive(Debug, Error)]
pub enum MalformedPayload {
    #[error("payload is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("`{id}` payload does not match a known shape: {reason}")]
    UnexpectedShape { id: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FollowAction {
    pub follower: String,
    pub following: String,
    #[serde(default)]
    pub what: Vec<String>,
}

impl FollowAction {
    /// `what: ["blog"]` is a follow; an empty list is an unfollow and `["ignore"]` a mute.
    pub fn is_blog_follow(&self) -> bool {
        self.what.first().map(String::as_str) == Some("blog")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReblogAction {
    pub account: String,
    pub author: String,
    pub permlink: String,
}

/// The recognized `custom_json` application payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CustomJsonPayload {
    Follow(FollowAction),
    Reblog(ReblogAction),
    /// An application id or action the extractor does not handle.
    Unrecognized,
}

impl CustomJsonPayload {
    /// Interprets the embedded payload of a `custom_json` operation.
    ///
    /// Payloads of unknown application ids are not parsed at all.
    pub fn parse(id: &str, json: &str) -> Result<Self, MalformedPayload> {
        if id != "follow" {
            return Ok(CustomJsonPayload::Unrecognized);
        }

        let value: Value = serde_json::from_str(json)?;
        let shape_error = |reason: &str| MalformedPayload::UnexpectedShape {
            id: id.to_string(),
            reason: reason.to_string(),
        };

        let (action, body) = match value {
            Value::Array(mut items) if items.len() == 2 => {
                let body = items.pop().unwrap_or(Value::Null);
                match items.pop() {
                    Some(Value::String(action)) => (action, body),
                    _ => return Err(shape_error("first element is not an action name")),
                }
            }
            _ => return Err(shape_error("expected a two element array")),
        };

        match action.as_str() {
            "follow" => {
                let follow: FollowAction =
                    serde_json::from_value(body).map_err(|e| shape_error(&e.to_string()))?;
                if follow.follower.is_empty() || follow.following.is_empty() {
                    return Err(shape_error("follow without follower or following"));
                }
                Ok(CustomJsonPayload::Follow(follow))
            }
            "reblog" => {
                let reblog: ReblogAction =
                    serde_json::from_value(body).map_err(|e| shape_error(&e.to_string()))?;
                if reblog.account.is_empty() || reblog.author.is_empty() || reblog.permlink.is_empty()
                {
                    return Err(shape_error("reblog with an empty field"));
                }
                Ok(CustomJsonPayload::Reblog(reblog))
            }
            _ => Ok(CustomJsonPayload::Unrecognized),
        }
    }
}

/// Turns operations into deliveries.
#[derive(Debug, Clone, Copy)]
pub struct EventExtractor {
    mention_cap: usize,
}

impl Default for EventExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_MENTION_CAP)
    }
}

impl EventExtractor {
    pub fn new(mention_cap: usize) -> Self {
        Self { mention_cap }
    }

    /// Extracts every delivery produced by `operations`, in operation order.
    pub fn extract(&self, operations: &[Operation]) -> Vec<Delivery> {
        let mut deliveries = Vec::new();
        for op in operations {
            self.extract_one(op, &mut deliveries);
        }
        deliveries
    }

    fn extract_one(&self, op: &Operation, out: &mut Vec<Delivery>) {
        let timestamp = op.timestamp.and_utc().timestamp();
        let block = op.block;
        let mut deliver = |recipient: &str, notification: Notification| {
            out.push(Delivery {
                recipient: recipient.to_string(),
                notification,
            })
        };

        match &op.op {
            OperationKind::Comment(comment) => {
                let is_root_post = comment.parent_author.is_empty();
                if !is_root_post {
                    deliver(
                        &comment.parent_author,
                        Notification::Reply {
                            parent_permlink: comment.parent_permlink.clone(),
                            author: comment.author.clone(),
                            permlink: comment.permlink.clone(),
                            timestamp,
                            block,
                        },
                    );
                }
                for mentioned in self.mentions(comment) {
                    deliver(
                        &mentioned,
                        Notification::Mention {
                            is_root_post,
                            author: comment.author.clone(),
                            permlink: comment.permlink.clone(),
                            timestamp,
                            block,
                        },
                    );
                }
            }
            OperationKind::CustomJson(custom) => match parse_custom_json(custom, block) {
                Some(CustomJsonPayload::Follow(follow)) if follow.is_blog_follow() => deliver(
                    &follow.following,
                    Notification::Follow {
                        follower: follow.follower,
                        timestamp,
                        block,
                    },
                ),
                Some(CustomJsonPayload::Reblog(reblog)) => deliver(
                    &reblog.author,
                    Notification::Reblog {
                        account: reblog.account,
                        permlink: reblog.permlink,
                        timestamp,
                        block,
                    },
                ),
                _ => {}
            },
            OperationKind::AccountWitnessVote(vote) => deliver(
                &vote.witness,
                Notification::WitnessVote {
                    account: vote.account.clone(),
                    approve: vote.approve,
                    timestamp,
                    block,
                },
            ),
            OperationKind::Vote(vote) => deliver(
                &vote.author,
                Notification::Vote {
                    voter: vote.voter.clone(),
                    permlink: vote.permlink.clone(),
                    weight: vote.weight,
                    timestamp,
                    block,
                },
            ),
            OperationKind::Transfer(transfer) => deliver(
                &transfer.to,
                Notification::Transfer {
                    from: transfer.from.clone(),
                    amount: transfer.amount.clone(),
                    memo: transfer.memo.clone(),
                    timestamp,
                    block,
                },
            ),
            OperationKind::Other(_) => {}
        }
    }

    /// Accounts mentioned in a comment's title and body, lower-cased, deduplicated in
    /// order of first appearance, without the author, and capped.
    fn mentions(&self, comment: &CommentOp) -> Vec<String> {
        let content = format!("{} {}", comment.title, comment.body);
        let mut seen = HashSet::new();
        scan_mentions(&content)
            .map(|handle| handle.to_ascii_lowercase())
            .filter(|handle| *handle != comment.author)
            .filter(|handle| seen.insert(handle.clone()))
            .take(self.mention_cap)
            .collect()
    }
}

/// Extracts deliveries with the default mention cap.
pub fn extract(operations: &[Operation]) -> Vec<Delivery> {
    EventExtractor::default().extract(operations)
}

fn parse_custom_json(custom: &CustomJsonOp, block: u64) -> Option<CustomJsonPayload> {
    match CustomJsonPayload::parse(&custom.id, &custom.json) {
        Ok(payload) => Some(payload),
        Err(e) => {
            tracing::warn!(block, id = %custom.id, "Skipping custom_json: {}", e);
            None
        }
    }
}

/// Yields the handles (without `@`) of every `@handle` token in `text`.
///
/// A handle starts with an ASCII letter, continues with letters, digits, `.` or `-`, and
/// ends with a letter or digit. Matching is greedy and case-insensitive.
fn scan_mentions(text: &str) -> impl Iterator<Item = &str> {
    let bytes = text.as_bytes();
    let mut pos = 0;

    std::iter::from_fn(move || {
        while pos < bytes.len() {
            let at = pos;
            pos += 1;
            if bytes[at] != b'@' {
                continue;
            }

            let start = at + 1;
            if !bytes.get(start).is_some_and(u8::is_ascii_alphabetic) {
                continue;
            }

            let mut run_end = start + 1;
            while bytes
                .get(run_end)
                .is_some_and(|b| b.is_ascii_alphanumeric() || *b == b'.' || *b == b'-')
            {
                run_end += 1;
            }

            // Backtrack to the last letter or digit after the leading letter.
            let last_alnum = (start + 1..run_end)
                .rev()
                .find(|&i| bytes[i].is_ascii_alphanumeric());

            if let Some(last) = last_alnum {
                pos = last + 1;
                // Only ASCII bytes were consumed, so these are char boundaries.
                return Some(&text[start..=last]);
            }
        }
        None
    })
}
