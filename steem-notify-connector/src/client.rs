//! # Ledger Client
//!
//! This module provides the [`LedgerClient`] trait, the narrow request/response surface the
//! [`BlockScanner`](crate::workers::BlockScanner) needs from a ledger node, and
//! [`JsonRpcClient`], its JSON-RPC 2.0 over HTTP implementation.
//!
//! The client holds no state besides the HTTP connection pool and never retries; every
//! retry decision belongs to the caller.

use crate::{
    config::Steem,
    ledger::{Block, GlobalProperties, Operation},
};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};
use thiserror::Error;

/// JSON-RPC method names understood by the node.
pub mod rpc_methods {
    pub const GET_BLOCK: &str = "condenser_api.get_block";
    pub const GET_OPS_IN_BLOCK: &str = "condenser_api.get_ops_in_block";
    pub const GET_DYNAMIC_GLOBAL_PROPERTIES: &str = "condenser_api.get_dynamic_global_properties";
}

/// Any failure talking to the ledger node.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("node returned RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("unexpected response shape: {0}")]
    Decode(#[from] serde_json::Error),
}

/// A trait abstracting over the ledger node.
///
/// This allows the scanner to be driven by the live [`JsonRpcClient`] in production and by
/// scripted fakes in tests.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Fetches every operation recorded in the block at `height`.
    async fn fetch_operations(
        &self,
        height: u64,
        include_virtual: bool,
    ) -> Result<Vec<Operation>, TransportError>;

    /// Fetches the block record at `height`. Returns `None` when the node has no block at
    /// that height yet.
    async fn fetch_block(&self, height: u64) -> Result<Option<Block>, TransportError>;

    /// Fetches the chain properties, most importantly the last irreversible height.
    async fn fetch_global_properties(&self) -> Result<GlobalProperties, TransportError>;
}

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Deserialize)]
struct RpcErrorObject {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

/// A [`LedgerClient`] speaking JSON-RPC 2.0 to a node over HTTP(S).
#[derive(Debug)]
pub struct JsonRpcClient {
    http: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    /// Creates a new `JsonRpcClient`.
    ///
    /// # Arguments
    ///
    /// * `config` - The node endpoint and request timeout.
    pub fn new(config: &Steem) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            url: config.rpc_url.clone(),
            next_id: AtomicU64::new(1),
        })
    }

    /// Sends a single call and returns its raw `result`, which is `Value::Null` when the
    /// node answered with a null result.
    async fn call(&self, method: &str, params: Value) -> Result<Value, TransportError> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        tracing::trace!(method, id = request.id, "Sending RPC request");

        let response: RpcResponse = self
            .http
            .post(&self.url)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(error) = response.error {
            return Err(TransportError::Rpc {
                code: error.code,
                message: error.message,
            });
        }

        Ok(response.result)
    }

    async fn call_typed<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, TransportError> {
        let result = self.call(method, params).await?;
        Ok(serde_json::from_value(result)?)
    }
}

#[async_trait]
impl LedgerClient for JsonRpcClient {
    async fn fetch_operations(
        &self,
        height: u64,
        include_virtual: bool,
    ) -> Result<Vec<Operation>, TransportError> {
        self.call_typed(rpc_methods::GET_OPS_IN_BLOCK, json!([height, include_virtual]))
            .await
    }

    async fn fetch_block(&self, height: u64) -> Result<Option<Block>, TransportError> {
        // A null result is how the node reports a height beyond its head.
        self.call_typed(rpc_methods::GET_BLOCK, json!([height])).await
    }

    async fn fetch_global_properties(&self) -> Result<GlobalProperties, TransportError> {
        self.call_typed(rpc_methods::GET_DYNAMIC_GLOBAL_PROPERTIES, json!([]))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_request_envelope() {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: 7,
            method: rpc_methods::GET_OPS_IN_BLOCK,
            params: json!([20000000, false]),
        };

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "jsonrpc": "2.0",
                "id": 7,
                "method": "condenser_api.get_ops_in_block",
                "params": [20000000, false]
            })
        );
    }

    #[test]
    fn missing_result_reads_as_null() {
        let response: RpcResponse =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":1,"result":null}"#).unwrap();
        assert!(response.result.is_null());
        assert!(response.error.is_none());

        let block: Option<Block> = serde_json::from_value(response.result).unwrap();
        assert!(block.is_none());
    }

    #[test]
    fn error_object_is_decoded() {
        let response: RpcResponse = serde_json::from_str(
            r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32003,"message":"Unable to acquire database lock"}}"#,
        )
        .unwrap();

        let error = response.error.unwrap();
        assert_eq!(error.code, -32003);
        assert_eq!(error.message, "Unable to acquire database lock");
    }
}
