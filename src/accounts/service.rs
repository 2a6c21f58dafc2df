// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Harbor Systems

//! Engine operations: account creation, key-count reconciliation, key
//! addition and revocation.
//!
//! The engine is a stateless orchestrator over the account store, key
//! manager, ledger client and job queue. It holds no per-account locks:
//! two jobs targeting the same address can race on index computation or on
//! a read-modify-write of the account record. The only engine-owned shared
//! resource is the creation rate limiter.

use std::sync::Arc;

use chrono::Utc;

use crate::accounts::jobs::{
    AddNewKeyAttributes, RevokeKeyAttributes, SyncAccountKeyCountAttributes,
    ACCOUNT_CREATE_JOB_TYPE, ADD_NEW_KEY_JOB_TYPE, REVOKE_KEY_JOB_TYPE,
    SYNC_ACCOUNT_KEY_COUNT_JOB_TYPE,
};
use crate::accounts::limiter::CreationLimiter;
use crate::accounts::store::{AccountStore, ListOptions};
use crate::accounts::{Account, AccountAddedPayload, AccountObserver, AccountType};
use crate::chain::{self, validate_address, Address, LedgerClient, LedgerError};
use crate::config::{Config, MAX_COMPUTE_LIMIT};
use crate::error::{EngineError, PartialFailure};
use crate::jobs::{Job, WorkerPool};
use crate::keys::{decode_public_key, KeyManager};
use crate::transactions::{templates, Transaction, TransactionsService};

/// Result of [`AccountsService::create`]: a scheduled job, or the account
/// itself when the caller asked for synchronous creation.
pub enum CreateOutcome {
    Scheduled(Job),
    Created {
        account: Account,
        transaction_id: String,
    },
}

/// The Account & Key Lifecycle Engine.
pub struct AccountsService {
    config: Arc<Config>,
    store: Arc<dyn AccountStore>,
    km: Arc<dyn KeyManager>,
    ledger: Arc<dyn LedgerClient>,
    pool: Arc<WorkerPool>,
    txs: Arc<TransactionsService>,
    limiter: CreationLimiter,
    observers: Vec<Arc<dyn AccountObserver>>,
}

impl AccountsService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Arc<Config>,
        store: Arc<dyn AccountStore>,
        km: Arc<dyn KeyManager>,
        ledger: Arc<dyn LedgerClient>,
        pool: Arc<WorkerPool>,
        txs: Arc<TransactionsService>,
        observers: Vec<Arc<dyn AccountObserver>>,
    ) -> Self {
        let limiter = CreationLimiter::per_second(config.account_create_rate_limit);
        Self {
            config,
            store,
            km,
            ledger,
            pool,
            txs,
            limiter,
            observers,
        }
    }

    async fn schedule_job(
        &self,
        job_type: &'static str,
        attributes: serde_json::Value,
    ) -> Result<Job, EngineError> {
        let mut job = self.pool.create_job(job_type, attributes)?;
        self.pool.schedule(&mut job).await?;
        Ok(job)
    }

    // =========================================================================
    // Public operations
    // =========================================================================

    /// All accounts, newest first. Encrypted key material is stripped.
    pub fn list(&self, limit: i64, offset: i64) -> Result<Vec<Account>, EngineError> {
        let mut accounts = self.store.accounts(ListOptions::parse(limit, offset))?;
        for account in &mut accounts {
            account.zero_key_values();
        }
        Ok(accounts)
    }

    /// Create a custodial account: synchronously, or as a scheduled job.
    pub async fn create(&self, sync: bool) -> Result<CreateOutcome, EngineError> {
        tracing::trace!(sync, "create account");

        if !sync {
            let job = self
                .schedule_job(ACCOUNT_CREATE_JOB_TYPE, serde_json::Value::Null)
                .await?;
            return Ok(CreateOutcome::Scheduled(job));
        }

        let (account, transaction_id) = self.create_account().await.map_err(|e| e.source)?;
        Ok(CreateOutcome::Created {
            account,
            transaction_id,
        })
    }

    /// Track an externally-keyed account for bookkeeping.
    pub fn add_non_custodial_account(&self, address: &str) -> Result<Account, EngineError> {
        tracing::trace!(address, "add non-custodial account");
        let validated = validate_address(address, self.config.chain_id)?;

        let now = Utc::now();
        let account = Account {
            address: validated.hex(),
            account_type: AccountType::NonCustodial,
            keys: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        self.store.insert_account(&account)?;
        Ok(account)
    }

    /// Stop tracking a non-custodial account. Removing an account that is
    /// already gone succeeds.
    pub fn delete_non_custodial_account(&self, address: &str) -> Result<(), EngineError> {
        tracing::trace!(address, "delete non-custodial account");
        let validated = validate_address(address, self.config.chain_id)?;

        let account = match self.store.account(&validated.hex()) {
            Ok(account) => account,
            Err(crate::accounts::store::StoreError::NotFound(_)) => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        if account.account_type != AccountType::NonCustodial {
            return Err(EngineError::Validation(
                "only non-custodial accounts supported".to_string(),
            ));
        }

        self.store.hard_delete_account(&account.address)?;
        Ok(())
    }

    /// A single account, with every key's encrypted material zeroed.
    pub fn details(&self, address: &str) -> Result<Account, EngineError> {
        tracing::trace!(address, "account details");
        let validated = validate_address(address, self.config.chain_id)?;

        let mut account = self.store.account(&validated.hex())?;
        account.zero_key_values();
        Ok(account)
    }

    /// Schedule reconciliation of the account's on-chain key count against
    /// the configured default.
    pub async fn sync_account_key_count(&self, address: &str) -> Result<Job, EngineError> {
        let validated = validate_address(address, self.config.chain_id)?;

        let attributes = serde_json::to_value(SyncAccountKeyCountAttributes {
            address: validated,
            num_keys: self.config.default_account_key_count,
        })?;

        self.schedule_job(SYNC_ACCOUNT_KEY_COUNT_JOB_TYPE, attributes)
            .await
    }

    /// Schedule addition of one new key to the account.
    pub async fn add_new_key(&self, address: &str) -> Result<Job, EngineError> {
        let validated = validate_address(address, self.config.chain_id)?;

        let attributes = serde_json::to_value(AddNewKeyAttributes { address: validated })?;
        self.schedule_job(ADD_NEW_KEY_JOB_TYPE, attributes).await
    }

    /// Schedule revocation of the key at the given index.
    pub async fn revoke_key(&self, address: &str, key_index: u32) -> Result<Job, EngineError> {
        let validated = validate_address(address, self.config.chain_id)?;

        let attributes = serde_json::to_value(RevokeKeyAttributes {
            address: validated,
            old_key_index: key_index,
        })?;
        self.schedule_job(REVOKE_KEY_JOB_TYPE, attributes).await
    }

    /// Ensure the admin account exists in the store and the on-chain
    /// proposer pool is sized to the configured count.
    pub async fn init_admin_account(&self) -> Result<(), EngineError> {
        let admin_hex = self.config.admin_address.hex();

        let stored = match self.store.account(&admin_hex) {
            Ok(account) => account,
            Err(crate::accounts::store::StoreError::NotFound(_)) => {
                let now = Utc::now();
                let account = Account {
                    address: admin_hex.clone(),
                    account_type: AccountType::Custodial,
                    keys: vec![self.km.admin_key_record()?],
                    created_at: now,
                    updated_at: now,
                };
                self.store.insert_account(&account)?;
                tracing::info!(address = %admin_hex, "admin account initialized in store");
                account
            }
            Err(e) => return Err(e.into()),
        };

        let on_chain = self.ledger.get_account(&self.config.admin_address).await?;
        let existing = on_chain.keys.iter().filter(|k| !k.revoked).count() as u32;
        if existing >= self.config.admin_proposal_key_count {
            return Ok(());
        }

        // Clone the admin public key until the proposer pool is full.
        let clone_count = self.config.admin_proposal_key_count - existing;
        let source = stored.keys.first().ok_or_else(|| {
            EngineError::InvariantViolation(format!("admin account {admin_hex} has no stored keys"))
        })?;
        let public_keys: Vec<serde_json::Value> = (0..clone_count)
            .map(|_| {
                serde_json::Value::String(
                    source.public_key.trim_start_matches("0x").to_string(),
                )
            })
            .collect();

        self.txs
            .create(
                true,
                &self.config.admin_address,
                templates::ADD_ACCOUNT_KEYS,
                vec![serde_json::Value::Array(public_keys)],
            )
            .await
            .map_err(|e| e.source)?;

        tracing::info!(added = clone_count, "admin proposal keys created");
        Ok(())
    }

    // =========================================================================
    // Account creation
    // =========================================================================

    /// Create a new custodial account on the ledger.
    ///
    /// The rate-limit token is taken before any other step, so the key and
    /// reference block are fresh when the transaction is actually sent.
    pub(crate) async fn create_account(&self) -> Result<(Account, String), PartialFailure> {
        self.limiter.take().await;

        let payer = self.km.admin_payer().await?;
        let proposer = self.km.admin_proposer().await?;
        let reference_block = self.ledger.latest_sealed_block_id().await?;

        // One fresh key pair; the account gets N structurally identical
        // descriptors differing only by index, so it can later sign with
        // several equivalent keys concurrently.
        let generated = self.km.generate().await?;
        let mut descriptors = Vec::with_capacity(self.config.default_account_key_count as usize);
        for index in 0..self.config.default_account_key_count {
            let mut descriptor = generated.descriptor.clone();
            descriptor.index = index;
            descriptors.push(descriptor);
        }

        let mut tx = Transaction::new(
            templates::CREATE_ACCOUNT,
            vec![serde_json::to_value(&descriptors)?],
        );

        if let Some(path) = &self.config.script_path_create_account {
            tx.set_script(std::fs::read_to_string(path)?);
        }

        tx.set_reference_block(reference_block)
            .set_compute_limit(MAX_COMPUTE_LIMIT)
            .set_proposal_key(&proposer)
            .set_payer(payer.address);

        // Proposer signs the payload unless it is also the payer.
        if !proposer.is_same(&payer) {
            tx.sign_payload(&proposer)?;
        }
        tx.sign_envelope(&payer)?;

        let result = chain::send_and_wait(
            self.ledger.as_ref(),
            &tx,
            self.config.transaction_timeout,
        )
        .await?;
        let transaction_id = tx.id();

        let new_address = result
            .events
            .iter()
            .find_map(|event| event.created_address())
            .ok_or_else(|| {
                PartialFailure::with_transaction_id(
                    LedgerError::NoAccountCreatedEvent,
                    transaction_id.clone(),
                )
            })?;

        // Encrypt the private key once; every index shares the ciphertext.
        let encrypted = self
            .km
            .save(&generated)
            .map_err(|e| PartialFailure::with_transaction_id(e, transaction_id.clone()))?;

        let keys = descriptors
            .iter()
            .map(|descriptor| {
                let mut record = encrypted.clone();
                record.account_address = new_address.hex();
                record.index = descriptor.index;
                record
            })
            .collect();

        let now = Utc::now();
        let account = Account {
            address: new_address.hex(),
            account_type: AccountType::Custodial,
            keys,
            created_at: now,
            updated_at: now,
        };

        self.store
            .insert_account(&account)
            .map_err(|e| PartialFailure::with_transaction_id(e, transaction_id.clone()))?;

        let payload = AccountAddedPayload {
            address: new_address,
        };
        for observer in &self.observers {
            observer.account_added(&payload);
        }

        tracing::debug!(address = %account.address, "account created");
        Ok((account, transaction_id))
    }

    // =========================================================================
    // Key-count reconciliation
    // =========================================================================

    /// Reconcile the account's valid on-chain key count against `num_keys`.
    /// Returns the resulting key count and the transaction id, if one was
    /// submitted.
    pub(crate) async fn sync_key_count(
        &self,
        address: Address,
        num_keys: u32,
    ) -> Result<(usize, String), PartialFailure> {
        if num_keys < 1 {
            return Err(EngineError::Validation(format!(
                "invalid number of keys specified: {num_keys}, min. 1 expected"
            ))
            .into());
        }

        let on_chain = self.ledger.get_account(&address).await.map_err(|e| {
            tracing::error!(address = %address, error = %e, "failed to get on-chain account");
            PartialFailure::from(e)
        })?;

        let mut db_account = self.store.account(&address.hex())?;
        db_account.sort_keys_by_index();

        // Source key: lowest stored index. Only valid keys are ever stored.
        let source = db_account.keys.first().cloned().ok_or_else(|| {
            EngineError::InvariantViolation(format!(
                "custodial account {address} has no stored keys"
            ))
        })?;
        let source_key = decode_public_key(&source.public_key, &source.sign_algo).map_err(|e| {
            tracing::error!(public_key = %source.public_key, error = %e, "failed to decode source key");
            PartialFailure::from(e)
        })?;
        tracing::trace!(index = source.index, "source key selected");

        // Valid = present, not revoked, and matching the source public key.
        let valid_keys = on_chain
            .keys
            .iter()
            .filter(|key| {
                !key.revoked
                    && decode_public_key(&key.public_key, &key.sign_algo)
                        .map(|pk| pk == source_key)
                        .unwrap_or(false)
            })
            .count();

        if valid_keys != db_account.keys.len() {
            tracing::warn!(
                address = %address,
                on_chain = valid_keys,
                database = db_account.keys.len(),
                "on-chain vs. database key count mismatch"
            );
        }

        let target = num_keys as usize;
        if valid_keys < target {
            let clone_count = target - valid_keys;
            tracing::debug!(
                valid_keys,
                num_keys,
                clone_count,
                "going to add keys"
            );

            // Clone the source key, continuing indices past the local max.
            let mut public_keys = Vec::with_capacity(clone_count);
            for _ in 0..clone_count {
                public_keys.push(serde_json::Value::String(
                    source.public_key.trim_start_matches("0x").to_string(),
                ));

                let next_index = db_account
                    .keys
                    .last()
                    .map(|k| k.index + 1)
                    .unwrap_or_default();
                let mut cloned = source.clone();
                cloned.index = next_index;
                db_account.keys.push(cloned);
            }

            // One transaction carries all new public keys.
            let submitted = self
                .txs
                .create(
                    true,
                    &address,
                    templates::ADD_ACCOUNT_KEYS,
                    vec![serde_json::Value::Array(public_keys)],
                )
                .await?;

            db_account.updated_at = Utc::now();
            self.store.save_account(&db_account).map_err(|e| {
                tracing::error!(address = %address, error = %e, "failed to update account after key add");
                PartialFailure::with_transaction_id(e, submitted.transaction_id.clone())
            })?;

            Ok((db_account.keys.len(), submitted.transaction_id))
        } else if valid_keys > target {
            // Excess keys are not auto-revoked.
            tracing::debug!(valid_keys, num_keys, "too many valid keys");
            Ok((0, String::new()))
        } else {
            tracing::debug!(num_keys, "correct number of keys");
            Ok((target, String::new()))
        }
    }

    // =========================================================================
    // Add key
    // =========================================================================

    /// Add one freshly generated key to the account. The chain, not the
    /// local store, is the authority for the new key's index.
    pub(crate) async fn add_key(
        &self,
        address: Address,
    ) -> Result<(Account, String), PartialFailure> {
        let mut db_account = self.store.account(&address.hex()).map_err(|e| {
            tracing::error!(address = %address, error = %e, "failed to get account from store");
            PartialFailure::from(e)
        })?;
        db_account.sort_keys_by_index();

        // Decode the lowest-index key only to validate its shape.
        let source = db_account.keys.first().ok_or_else(|| {
            EngineError::InvariantViolation(format!(
                "custodial account {address} has no stored keys"
            ))
        })?;
        decode_public_key(&source.public_key, &source.sign_algo)?;

        let generated = self.km.generate().await?;
        let encrypted = self.km.save(&generated)?;

        let next_index = self.next_key_index_on_chain(&address).await?;

        let mut descriptor = generated.descriptor.clone();
        descriptor.index = next_index;
        let submitted = self
            .txs
            .create(
                true,
                &address,
                templates::ADD_ACCOUNT_KEY,
                vec![serde_json::to_value(&descriptor)?],
            )
            .await?;
        tracing::info!(tx_id = %submitted.transaction_id, "add-key transaction sealed");

        // Local mutation only after the chain accepted the key.
        let mut record = encrypted;
        record.account_address = db_account.address.clone();
        record.index = next_index;
        db_account.keys.push(record);
        db_account.updated_at = Utc::now();

        self.store.save_account(&db_account).map_err(|e| {
            tracing::error!(address = %address, error = %e, "failed to update account after key add");
            PartialFailure::with_transaction_id(e, submitted.transaction_id.clone())
        })?;

        Ok((db_account, submitted.transaction_id))
    }

    /// Next key index for the account, computed from the chain: local
    /// records can be missing keys the chain already has, and colliding
    /// indices would be rejected on chain.
    pub(crate) async fn next_key_index_on_chain(
        &self,
        address: &Address,
    ) -> Result<u32, EngineError> {
        let on_chain = self.ledger.get_account(address).await?;
        on_chain
            .keys
            .iter()
            .map(|key| key.index)
            .max()
            .map(|max| max + 1)
            .ok_or_else(|| {
                EngineError::NotFound(format!("account {address} has no keys on chain"))
            })
    }

    // =========================================================================
    // Revoke key
    // =========================================================================

    /// Revoke the key at `key_index` on chain, then delete its record.
    pub(crate) async fn revoke_key_at_index(
        &self,
        address: Address,
        key_index: u32,
    ) -> Result<(Account, String), PartialFailure> {
        let mut db_account = self.store.account(&address.hex()).map_err(|e| {
            tracing::error!(address = %address, error = %e, "failed to get account from store");
            PartialFailure::from(e)
        })?;

        // The last signing key must never be removed.
        if db_account.keys.len() == 1 {
            return Err(EngineError::InvariantViolation(format!(
                "account {} only has one key, cannot revoke",
                db_account.address
            ))
            .into());
        }

        let key_to_delete = db_account
            .keys
            .iter()
            .find(|key| key.index == key_index)
            .cloned()
            .ok_or_else(|| {
                EngineError::NotFound(format!(
                    "key {key_index} on account {}",
                    db_account.address
                ))
            })?;

        // General submission path: the signing key is chosen LRU and may be
        // the very key being revoked, failing the transaction. A retry
        // succeeds once that key rotates out of selection.
        let submitted = self
            .txs
            .create(
                true,
                &address,
                templates::REVOKE_ACCOUNT_KEY,
                vec![serde_json::json!(key_index)],
            )
            .await?;
        tracing::info!(tx_id = %submitted.transaction_id, key_index, "revoke transaction sealed");

        self.store
            .delete_key_for_account(&db_account, &key_to_delete)
            .map_err(|e| {
                tracing::error!(address = %address, error = %e, "failed to delete key from store");
                PartialFailure::with_transaction_id(e, submitted.transaction_id.clone())
            })?;

        db_account.keys.retain(|key| key.index != key_index);
        Ok((db_account, submitted.transaction_id))
    }
}
