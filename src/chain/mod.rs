// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Harbor Systems

//! Meridian ledger integration: chain types, the [`LedgerClient`] seam and
//! the submit-and-wait-for-seal primitive used by every synchronous
//! engine submission.

pub mod client;
#[cfg(test)]
pub mod mock;
pub mod types;

pub use client::{HttpLedgerClient, LedgerClient, LedgerError};
pub use types::{
    validate_address, Address, AddressError, BlockId, ChainEvent, ChainId, OnChainAccount,
    OnChainAccountKey, TransactionResult, TransactionStatus, ACCOUNT_CREATED_EVENT,
};

use std::time::Duration;

use crate::transactions::Transaction;

/// How often the seal-wait loop polls for a transaction result.
const SEAL_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// A submission failure that may have happened after the network accepted
/// the transaction. When `transaction_id` is set, the transaction is on the
/// network even though the operation failed; callers must surface the id so
/// drift can be detected and repaired later.
#[derive(Debug)]
pub struct SealError {
    pub transaction_id: Option<String>,
    pub source: LedgerError,
}

/// Submit a transaction and block until the ledger seals it, bounded by
/// `timeout`. A sealed-with-error result and a timeout both fail, carrying
/// the transaction id.
pub async fn send_and_wait(
    client: &dyn LedgerClient,
    tx: &Transaction,
    timeout: Duration,
) -> Result<TransactionResult, SealError> {
    let tx_id = client.send_transaction(tx).await.map_err(|e| SealError {
        transaction_id: None,
        source: e,
    })?;

    let wait = async {
        loop {
            let result = client.transaction_result(&tx_id).await?;
            if result.status.is_final() {
                return Ok(result);
            }
            tokio::time::sleep(SEAL_POLL_INTERVAL).await;
        }
    };

    let result: Result<TransactionResult, LedgerError> =
        match tokio::time::timeout(timeout, wait).await {
            Ok(inner) => inner,
            Err(_) => {
                return Err(SealError {
                    transaction_id: Some(tx_id.clone()),
                    source: LedgerError::SealTimeout(tx_id, timeout),
                })
            }
        };

    match result {
        Ok(sealed) => {
            if let Some(message) = &sealed.error_message {
                return Err(SealError {
                    transaction_id: Some(tx_id.clone()),
                    source: LedgerError::ExecutionFailed(tx_id, message.clone()),
                });
            }
            Ok(sealed)
        }
        Err(e) => Err(SealError {
            transaction_id: Some(tx_id),
            source: e,
        }),
    }
}
