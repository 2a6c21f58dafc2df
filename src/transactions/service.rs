// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Harbor Systems

//! General transaction submission path.
//!
//! Builds a transaction authorized by the target account: the account's
//! least-recently-used stored key proposes and signs the payload, the admin
//! account pays and signs the envelope. Synchronous submissions block until
//! the ledger seals the transaction.
//!
//! The LRU selection is a documented hazard for key revocation: the key
//! being revoked may itself be selected and sign its own revocation, which
//! makes the transaction fail on chain. A retry succeeds once that key is
//! no longer the least recently used.

use std::sync::Arc;
use std::time::Duration;

use crate::chain::{self, Address, LedgerClient};
use crate::config::MAX_COMPUTE_LIMIT;
use crate::error::PartialFailure;
use crate::keys::KeyManager;
use crate::transactions::{Argument, Transaction};

/// A transaction accepted by the network through the general path.
#[derive(Debug, Clone)]
pub struct SubmittedTransaction {
    pub transaction_id: String,
    pub proposer_address: Address,
}

pub struct TransactionsService {
    km: Arc<dyn KeyManager>,
    ledger: Arc<dyn LedgerClient>,
    seal_timeout: Duration,
}

impl TransactionsService {
    pub fn new(
        km: Arc<dyn KeyManager>,
        ledger: Arc<dyn LedgerClient>,
        seal_timeout: Duration,
    ) -> Self {
        Self {
            km,
            ledger,
            seal_timeout,
        }
    }

    /// Build, sign and submit a transaction authorized by `address`.
    ///
    /// With `sync`, waits for the seal and fails on sealed-with-error or
    /// timeout; the returned failure carries the transaction id whenever
    /// the network had already accepted the transaction.
    pub async fn create(
        &self,
        sync: bool,
        address: &Address,
        script: &str,
        arguments: Vec<Argument>,
    ) -> Result<SubmittedTransaction, PartialFailure> {
        let proposer = self.km.account_authority(address).await?;
        let payer = self.km.admin_payer().await?;
        let reference_block = self.ledger.latest_sealed_block_id().await?;

        let mut tx = Transaction::new(script, arguments);
        tx.set_reference_block(reference_block)
            .set_compute_limit(MAX_COMPUTE_LIMIT)
            .set_proposal_key(&proposer)
            .set_payer(payer.address)
            .add_authorizer(*address);

        if !proposer.is_same(&payer) {
            tx.sign_payload(&proposer)?;
        }
        tx.sign_envelope(&payer)?;

        tracing::debug!(
            address = %address,
            proposer_key_index = proposer.key_index,
            sync,
            "submitting transaction"
        );

        if sync {
            chain::send_and_wait(self.ledger.as_ref(), &tx, self.seal_timeout).await?;
        } else {
            self.ledger.send_transaction(&tx).await?;
        }

        Ok(SubmittedTransaction {
            transaction_id: tx.id(),
            proposer_address: proposer.address,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::store::{AccountStore, FsAccountStore};
    use crate::accounts::{Account, AccountType};
    use crate::chain::mock::MockLedger;
    use crate::chain::{ChainId, OnChainAccount};
    use crate::keys::cipher::Aes256GcmCipher;
    use crate::keys::manager::LocalKeyManager;
    use crate::keys::KeyManager as _;
    use crate::transactions::templates;

    const TEST_CIPHER_KEY: &str =
        "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";
    const TEST_ADMIN_KEY: &str =
        "2222222222222222222222222222222222222222222222222222222222222222";

    struct Fixture {
        service: TransactionsService,
        ledger: Arc<MockLedger>,
        account_address: Address,
        _dir: tempfile::TempDir,
    }

    async fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<FsAccountStore> =
            Arc::new(FsAccountStore::open(dir.path().join("accounts")).unwrap());
        let ledger = Arc::new(MockLedger::new(ChainId::MeridianLocal));
        let cipher = Arc::new(Aes256GcmCipher::from_hex(TEST_CIPHER_KEY).unwrap());
        let admin = Address::from_ordinal(ChainId::MeridianLocal, 1);
        let km = Arc::new(
            LocalKeyManager::new(
                cipher,
                store.clone(),
                ledger.clone(),
                admin,
                TEST_ADMIN_KEY,
                1,
            )
            .unwrap(),
        );

        // A stored account with one key, mirrored on chain
        let account_address = Address::from_ordinal(ChainId::MeridianLocal, 5);
        let pair = km.generate().await.unwrap();
        let mut record = km.save(&pair).unwrap();
        record.account_address = account_address.hex();
        record.index = 0;
        ledger.register_account(OnChainAccount {
            address: account_address,
            keys: vec![MockLedger::on_chain_key(0, &record.public_key)],
        });
        store
            .insert_account(&Account {
                address: account_address.hex(),
                account_type: AccountType::Custodial,
                keys: vec![record],
                created_at: chrono::Utc::now(),
                updated_at: chrono::Utc::now(),
            })
            .unwrap();

        let service = TransactionsService::new(km, ledger.clone(), Duration::from_secs(5));
        Fixture {
            service,
            ledger,
            account_address,
            _dir: dir,
        }
    }

    #[tokio::test]
    async fn sync_create_submits_signed_transaction() {
        let f = fixture().await;

        let submitted = f
            .service
            .create(true, &f.account_address, templates::NOOP, vec![])
            .await
            .unwrap();

        assert!(!submitted.transaction_id.is_empty());
        let txs = f.ledger.submissions();
        assert_eq!(txs.len(), 1);

        let tx = &txs[0];
        // Account proposes and signs the payload, admin pays the envelope
        assert_eq!(tx.proposal_key.address, f.account_address);
        assert_eq!(tx.authorizers, vec![f.account_address]);
        assert_eq!(tx.payload_signatures.len(), 1);
        assert_eq!(tx.envelope_signatures.len(), 1);
        assert_ne!(tx.payer, f.account_address);
        assert_eq!(tx.compute_limit, MAX_COMPUTE_LIMIT);
        assert!(!tx.reference_block_id.0.is_empty());
    }

    #[tokio::test]
    async fn send_failure_has_no_transaction_id() {
        let f = fixture().await;
        f.ledger.fail_submissions(true);

        let err = f
            .service
            .create(true, &f.account_address, templates::NOOP, vec![])
            .await
            .unwrap_err();
        assert!(err.transaction_id.is_none());
        assert!(err.source.is_retryable());
    }

    #[tokio::test]
    async fn execution_failure_keeps_transaction_id() {
        let f = fixture().await;

        // Revoking a nonexistent index fails at execution, after acceptance
        let err = f
            .service
            .create(
                true,
                &f.account_address,
                templates::REVOKE_ACCOUNT_KEY,
                vec![serde_json::json!(42)],
            )
            .await
            .unwrap_err();
        assert!(err.transaction_id.is_some());
    }
}
