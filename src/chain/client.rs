// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Harbor Systems

//! Meridian ledger client.
//!
//! The [`LedgerClient`] trait is the seam between the engine and the chain:
//! production code talks JSON-RPC over HTTP, tests substitute an in-memory
//! ledger.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::types::{BlockId, OnChainAccount, TransactionResult};
use crate::chain::Address;
use crate::transactions::Transaction;

/// Errors that can occur while talking to the ledger.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("invalid RPC URL: {0}")]
    InvalidRpcUrl(String),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("malformed RPC response: {0}")]
    InvalidResponse(String),

    #[error("transaction {0} execution failed: {1}")]
    ExecutionFailed(String, String),

    #[error("timed out after {1:?} waiting for transaction {0} to seal")]
    SealTimeout(String, std::time::Duration),

    #[error("account creation transaction produced no account-created event")]
    NoAccountCreatedEvent,
}

/// Read and submit access to the Meridian ledger.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Fetch the on-chain state of an account, including its full key list.
    async fn get_account(&self, address: &Address) -> Result<OnChainAccount, LedgerError>;

    /// Id of the latest sealed block, used as a transaction reference block.
    async fn latest_sealed_block_id(&self) -> Result<BlockId, LedgerError>;

    /// Submit a signed transaction. Returns the transaction id accepted by
    /// the network; acceptance does not imply execution or sealing.
    async fn send_transaction(&self, tx: &Transaction) -> Result<String, LedgerError>;

    /// Current result of a previously submitted transaction.
    async fn transaction_result(&self, tx_id: &str) -> Result<TransactionResult, LedgerError>;
}

// =============================================================================
// JSON-RPC HTTP client
// =============================================================================

#[derive(Serialize)]
struct RpcRequest<'a, P: Serialize> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: P,
}

#[derive(Deserialize)]
struct RpcResponse<R> {
    result: Option<R>,
    error: Option<RpcErrorBody>,
}

#[derive(Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

/// JSON-RPC client for a Meridian access node.
pub struct HttpLedgerClient {
    endpoint: url::Url,
    http: reqwest::Client,
}

impl HttpLedgerClient {
    pub fn new(endpoint: url::Url) -> Self {
        Self {
            endpoint,
            http: reqwest::Client::new(),
        }
    }

    async fn call<P: Serialize, R: DeserializeOwned>(
        &self,
        method: &str,
        params: P,
    ) -> Result<R, LedgerError> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: 1,
            method,
            params,
        };

        let response = self
            .http
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await
            .map_err(|e| LedgerError::Rpc(e.to_string()))?;

        let body: RpcResponse<R> = response
            .json()
            .await
            .map_err(|e| LedgerError::InvalidResponse(e.to_string()))?;

        if let Some(err) = body.error {
            return Err(LedgerError::Rpc(format!("{} (code {})", err.message, err.code)));
        }

        body.result
            .ok_or_else(|| LedgerError::InvalidResponse("missing result field".to_string()))
    }
}

#[async_trait]
impl LedgerClient for HttpLedgerClient {
    async fn get_account(&self, address: &Address) -> Result<OnChainAccount, LedgerError> {
        self.call("meridian_getAccount", [address.hex()]).await
    }

    async fn latest_sealed_block_id(&self) -> Result<BlockId, LedgerError> {
        self.call("meridian_latestSealedBlock", ()).await
    }

    async fn send_transaction(&self, tx: &Transaction) -> Result<String, LedgerError> {
        self.call("meridian_sendTransaction", [tx]).await
    }

    async fn transaction_result(&self, tx_id: &str) -> Result<TransactionResult, LedgerError> {
        self.call("meridian_getTransactionResult", [tx_id]).await
    }
}
