//! A Rust library for turning a Steem-style ledger into per-account notification feeds.
//!
//! This crate provides the building blocks of the notification pipeline: a client for the
//! ledger node, a pure event extractor, the feed store abstraction and the block scanner
//! that drives them.
//!
//! # Key Components
//!
//! *   [`client`]: The [`LedgerClient`](client::LedgerClient) trait and its JSON-RPC implementation.
//! *   [`events`]: Maps block operations to notifications addressed to their recipients.
//! *   [`storage`]: The [`FeedStore`](storage::FeedStore) trait and the atomic batches written to it.
//! *   [`workers::BlockScanner`]: The main entry point. It walks irreversible blocks one
//!     at a time and persists their notifications together with the cursor.
pub mod client;
/// Defines configuration structures for the connector.
pub mod config;
/// Notification types and the operation-to-notification extractor.
pub mod events;
/// Typed views over blocks, operations and chain properties.
pub mod ledger;
/// A trait and batch commands for the persistent feed store.
pub mod storage;
/// The background worker responsible for scanning the chain.
pub mod workers;
