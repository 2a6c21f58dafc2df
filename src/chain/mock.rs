// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Harbor Systems

//! In-memory ledger for tests.
//!
//! Executes the script templates against a fake chain: account creation
//! allocates addresses and emits the account-created event, key scripts
//! mutate the on-chain key list, and every submission is recorded for
//! assertions. Failures are injectable per submission.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::client::{LedgerClient, LedgerError};
use super::types::{
    Address, BlockId, ChainEvent, ChainId, OnChainAccount, OnChainAccountKey, TransactionResult,
    TransactionStatus,
};
use crate::keys::{AccountKeyDescriptor, HASH_ALGO_SHA2_256, SIGN_ALGO_ECDSA_SECP256K1};
use crate::transactions::{templates, Transaction};

pub struct MockLedger {
    chain: ChainId,
    accounts: Mutex<HashMap<Address, OnChainAccount>>,
    results: Mutex<HashMap<String, TransactionResult>>,
    submitted: Mutex<Vec<Transaction>>,
    next_ordinal: AtomicU64,
    block_height: AtomicU64,
    fail_submissions: AtomicBool,
}

impl MockLedger {
    pub fn new(chain: ChainId) -> Self {
        Self {
            chain,
            accounts: Mutex::new(HashMap::new()),
            results: Mutex::new(HashMap::new()),
            submitted: Mutex::new(Vec::new()),
            // Leave room below for fixture addresses registered by tests.
            next_ordinal: AtomicU64::new(0x1000),
            block_height: AtomicU64::new(1),
            fail_submissions: AtomicBool::new(false),
        }
    }

    /// Seed an on-chain account.
    pub fn register_account(&self, account: OnChainAccount) {
        self.accounts
            .lock()
            .unwrap()
            .insert(account.address, account);
    }

    /// Build an unrevoked on-chain key with the service's default algorithms.
    pub fn on_chain_key(index: u32, public_key: &str) -> OnChainAccountKey {
        OnChainAccountKey {
            index,
            public_key: public_key.to_string(),
            sign_algo: SIGN_ALGO_ECDSA_SECP256K1.to_string(),
            hash_algo: HASH_ALGO_SHA2_256.to_string(),
            sequence_number: 0,
            revoked: false,
        }
    }

    /// All transactions accepted by the network, in submission order.
    pub fn submissions(&self) -> Vec<Transaction> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn submission_count(&self) -> usize {
        self.submitted.lock().unwrap().len()
    }

    /// On-chain keys of an account, empty if the account does not exist.
    pub fn keys_of(&self, address: &Address) -> Vec<OnChainAccountKey> {
        self.accounts
            .lock()
            .unwrap()
            .get(address)
            .map(|a| a.keys.clone())
            .unwrap_or_default()
    }

    /// Make every subsequent `send_transaction` fail at the network edge.
    pub fn fail_submissions(&self, fail: bool) {
        self.fail_submissions.store(fail, Ordering::SeqCst);
    }

    fn sealed(events: Vec<ChainEvent>) -> TransactionResult {
        TransactionResult {
            status: TransactionStatus::Sealed,
            error_message: None,
            events,
        }
    }

    fn sealed_error(message: String) -> TransactionResult {
        TransactionResult {
            status: TransactionStatus::Sealed,
            error_message: Some(message),
            events: Vec::new(),
        }
    }

    fn next_key_index(keys: &[OnChainAccountKey]) -> u32 {
        keys.iter().map(|k| k.index + 1).max().unwrap_or(0)
    }

    /// Execute the transaction's script against the fake chain state.
    fn apply(&self, tx: &Transaction) -> TransactionResult {
        let mut accounts = self.accounts.lock().unwrap();

        let result = if tx.script == templates::CREATE_ACCOUNT {
            let descriptors: Vec<AccountKeyDescriptor> = match tx
                .arguments
                .first()
                .cloned()
                .map(serde_json::from_value)
            {
                Some(Ok(d)) => d,
                _ => return Self::sealed_error("invalid key descriptor argument".to_string()),
            };

            let ordinal = self.next_ordinal.fetch_add(1, Ordering::SeqCst);
            let address = Address::from_ordinal(self.chain, ordinal);
            let keys = descriptors
                .iter()
                .map(|d| OnChainAccountKey {
                    index: d.index,
                    public_key: d.public_key.clone(),
                    sign_algo: d.sign_algo.clone(),
                    hash_algo: d.hash_algo.clone(),
                    sequence_number: 0,
                    revoked: false,
                })
                .collect();
            accounts.insert(address, OnChainAccount { address, keys });
            Self::sealed(vec![ChainEvent::account_created(&address)])
        } else if tx.script == templates::ADD_ACCOUNT_KEYS {
            let Some(target) = tx.authorizers.first() else {
                return Self::sealed_error("missing authorizer".to_string());
            };
            let public_keys: Vec<String> = match tx
                .arguments
                .first()
                .cloned()
                .map(serde_json::from_value)
            {
                Some(Ok(p)) => p,
                _ => return Self::sealed_error("invalid public key list argument".to_string()),
            };
            match accounts.get_mut(target) {
                Some(account) => {
                    for public_key in public_keys {
                        let index = Self::next_key_index(&account.keys);
                        account
                            .keys
                            .push(Self::on_chain_key(index, &format!("0x{public_key}")));
                    }
                    Self::sealed(Vec::new())
                }
                None => Self::sealed_error(format!("account not found: {target}")),
            }
        } else if tx.script == templates::ADD_ACCOUNT_KEY {
            let Some(target) = tx.authorizers.first() else {
                return Self::sealed_error("missing authorizer".to_string());
            };
            let descriptor: AccountKeyDescriptor = match tx
                .arguments
                .first()
                .cloned()
                .map(serde_json::from_value)
            {
                Some(Ok(d)) => d,
                _ => return Self::sealed_error("invalid key descriptor argument".to_string()),
            };
            match accounts.get_mut(target) {
                Some(account) => {
                    let index = Self::next_key_index(&account.keys);
                    account
                        .keys
                        .push(Self::on_chain_key(index, &descriptor.public_key));
                    Self::sealed(Vec::new())
                }
                None => Self::sealed_error(format!("account not found: {target}")),
            }
        } else if tx.script == templates::REVOKE_ACCOUNT_KEY {
            let Some(target) = tx.authorizers.first() else {
                return Self::sealed_error("missing authorizer".to_string());
            };
            let key_index: u32 = match tx.arguments.first().cloned().map(serde_json::from_value) {
                Some(Ok(i)) => i,
                _ => return Self::sealed_error("invalid key index argument".to_string()),
            };
            match accounts.get_mut(target) {
                Some(account) => {
                    match account.keys.iter_mut().find(|k| k.index == key_index) {
                        Some(key) => {
                            key.revoked = true;
                            Self::sealed(Vec::new())
                        }
                        None => Self::sealed_error(format!(
                            "no key at index {key_index} on {target}"
                        )),
                    }
                }
                None => Self::sealed_error(format!("account not found: {target}")),
            }
        } else {
            Self::sealed(Vec::new())
        };

        // A successfully executed transaction consumes the proposal key's
        // sequence number.
        if result.error_message.is_none() {
            if let Some(account) = accounts.get_mut(&tx.proposal_key.address) {
                if let Some(key) = account
                    .keys
                    .iter_mut()
                    .find(|k| k.index == tx.proposal_key.key_index)
                {
                    key.sequence_number += 1;
                }
            }
        }

        result
    }
}

#[async_trait]
impl LedgerClient for MockLedger {
    async fn get_account(&self, address: &Address) -> Result<OnChainAccount, LedgerError> {
        self.accounts
            .lock()
            .unwrap()
            .get(address)
            .cloned()
            .ok_or_else(|| LedgerError::Rpc(format!("account not found: {address}")))
    }

    async fn latest_sealed_block_id(&self) -> Result<BlockId, LedgerError> {
        let height = self.block_height.fetch_add(1, Ordering::SeqCst);
        Ok(BlockId(format!("block-{height}")))
    }

    async fn send_transaction(&self, tx: &Transaction) -> Result<String, LedgerError> {
        if self.fail_submissions.load(Ordering::SeqCst) {
            return Err(LedgerError::Rpc("injected send failure".to_string()));
        }

        let id = tx.id();
        self.submitted.lock().unwrap().push(tx.clone());
        let result = self.apply(tx);
        self.results.lock().unwrap().insert(id.clone(), result);
        Ok(id)
    }

    async fn transaction_result(&self, tx_id: &str) -> Result<TransactionResult, LedgerError> {
        self.results
            .lock()
            .unwrap()
            .get(tx_id)
            .cloned()
            .ok_or_else(|| LedgerError::Rpc(format!("unknown transaction: {tx_id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_account_allocates_address_and_emits_event() {
        let ledger = MockLedger::new(ChainId::MeridianLocal);
        let descriptors = vec![
            AccountKeyDescriptor {
                public_key: "0xaa".to_string(),
                sign_algo: SIGN_ALGO_ECDSA_SECP256K1.to_string(),
                hash_algo: HASH_ALGO_SHA2_256.to_string(),
                index: 0,
                weight: 1000,
            },
            AccountKeyDescriptor {
                public_key: "0xaa".to_string(),
                sign_algo: SIGN_ALGO_ECDSA_SECP256K1.to_string(),
                hash_algo: HASH_ALGO_SHA2_256.to_string(),
                index: 1,
                weight: 1000,
            },
        ];
        let tx = Transaction::new(
            templates::CREATE_ACCOUNT,
            vec![serde_json::to_value(&descriptors).unwrap()],
        );

        let id = ledger.send_transaction(&tx).await.unwrap();
        let result = ledger.transaction_result(&id).await.unwrap();

        let created = result.events[0].created_address().unwrap();
        assert!(created.is_valid_for(ChainId::MeridianLocal));
        assert_eq!(ledger.keys_of(&created).len(), 2);
    }

    #[tokio::test]
    async fn add_and_revoke_keys_mutate_chain_state() {
        let ledger = MockLedger::new(ChainId::MeridianLocal);
        let address = Address::from_ordinal(ChainId::MeridianLocal, 1);
        ledger.register_account(OnChainAccount {
            address,
            keys: vec![MockLedger::on_chain_key(0, "0xaa")],
        });

        let mut add = Transaction::new(
            templates::ADD_ACCOUNT_KEYS,
            vec![serde_json::json!(["aa", "aa"])],
        );
        add.add_authorizer(address);
        ledger.send_transaction(&add).await.unwrap();
        assert_eq!(ledger.keys_of(&address).len(), 3);

        let mut revoke =
            Transaction::new(templates::REVOKE_ACCOUNT_KEY, vec![serde_json::json!(1)]);
        revoke.add_authorizer(address);
        ledger.send_transaction(&revoke).await.unwrap();

        let keys = ledger.keys_of(&address);
        assert!(keys.iter().find(|k| k.index == 1).unwrap().revoked);
        assert_eq!(keys.iter().filter(|k| !k.revoked).count(), 2);
    }

    #[tokio::test]
    async fn sequence_number_advances_for_proposer() {
        let ledger = MockLedger::new(ChainId::MeridianLocal);
        let address = Address::from_ordinal(ChainId::MeridianLocal, 1);
        ledger.register_account(OnChainAccount {
            address,
            keys: vec![MockLedger::on_chain_key(0, "0xaa")],
        });

        let mut tx = Transaction::new(templates::NOOP, vec![]);
        tx.proposal_key.address = address;
        tx.proposal_key.key_index = 0;
        ledger.send_transaction(&tx).await.unwrap();

        assert_eq!(ledger.keys_of(&address)[0].sequence_number, 1);
    }
}
