// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Harbor Systems

//! Job executors for the lifecycle engine.
//!
//! One executor per job type, collected into an immutable table by
//! [`executor_table`] and handed to the worker pool at startup. Account
//! creation and key-count sync notify on completion; add-key and
//! revoke-key do not.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::accounts::AccountsService;
use crate::chain::Address;
use crate::error::{EngineError, PartialFailure};
use crate::jobs::{ExecutorTable, Job, JobError, JobExecutor};

pub const ACCOUNT_CREATE_JOB_TYPE: &str = "account_create";
pub const SYNC_ACCOUNT_KEY_COUNT_JOB_TYPE: &str = "sync_account_key_count";
pub const ADD_NEW_KEY_JOB_TYPE: &str = "add_new_key";
pub const REVOKE_KEY_JOB_TYPE: &str = "revoke_key";

// =============================================================================
// Attribute payloads (persisted JSON shapes; must round-trip losslessly)
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct SyncAccountKeyCountAttributes {
    pub address: Address,
    #[serde(rename = "numkeys")]
    pub num_keys: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct AddNewKeyAttributes {
    pub address: Address,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct RevokeKeyAttributes {
    pub address: Address,
    #[serde(rename = "oldKeyIndex")]
    pub old_key_index: u32,
}

// =============================================================================
// Executors
// =============================================================================

/// Build the immutable job-type → executor table for the engine.
pub fn executor_table(service: Arc<AccountsService>) -> ExecutorTable {
    let mut table = ExecutorTable::new();
    table.insert(
        ACCOUNT_CREATE_JOB_TYPE,
        Arc::new(AccountCreateExecutor {
            service: service.clone(),
        }) as Arc<dyn JobExecutor>,
    );
    table.insert(
        SYNC_ACCOUNT_KEY_COUNT_JOB_TYPE,
        Arc::new(SyncAccountKeyCountExecutor {
            service: service.clone(),
        }),
    );
    table.insert(
        ADD_NEW_KEY_JOB_TYPE,
        Arc::new(AddNewKeyExecutor {
            service: service.clone(),
        }),
    );
    table.insert(REVOKE_KEY_JOB_TYPE, Arc::new(RevokeKeyExecutor { service }));
    table
}

fn decode_attributes<T: DeserializeOwned>(job: &Job) -> Result<T, EngineError> {
    serde_json::from_value(job.attributes.clone())
        .map_err(|e| JobError::MalformedAttributes(e.to_string()).into())
}

/// Copy a partial failure's transaction id onto the job, then surface the
/// underlying error. A failed job with a transaction id is the drift
/// signal repair tooling looks for.
fn apply_partial_failure(job: &mut Job, failure: PartialFailure) -> EngineError {
    if let Some(tx_id) = failure.transaction_id {
        job.transaction_id = tx_id;
    }
    failure.source
}

struct AccountCreateExecutor {
    service: Arc<AccountsService>,
}

#[async_trait::async_trait]
impl JobExecutor for AccountCreateExecutor {
    async fn execute(&self, job: &mut Job) -> Result<(), EngineError> {
        if job.job_type != ACCOUNT_CREATE_JOB_TYPE {
            return Err(JobError::InvalidJobType.into());
        }
        job.should_notify = true;

        match self.service.create_account().await {
            Ok((account, tx_id)) => {
                job.transaction_id = tx_id;
                job.result = account.address;
                Ok(())
            }
            Err(failure) => Err(apply_partial_failure(job, failure)),
        }
    }
}

struct SyncAccountKeyCountExecutor {
    service: Arc<AccountsService>,
}

#[async_trait::async_trait]
impl JobExecutor for SyncAccountKeyCountExecutor {
    async fn execute(&self, job: &mut Job) -> Result<(), EngineError> {
        if job.job_type != SYNC_ACCOUNT_KEY_COUNT_JOB_TYPE {
            return Err(JobError::InvalidJobType.into());
        }
        job.should_notify = true;

        let attrs: SyncAccountKeyCountAttributes = decode_attributes(job)?;
        tracing::trace!(address = %attrs.address, num_keys = attrs.num_keys, "sync attributes decoded");

        match self
            .service
            .sync_key_count(attrs.address, attrs.num_keys)
            .await
        {
            Ok((count, tx_id)) => {
                job.transaction_id = tx_id;
                job.result = format!("{}:{}", attrs.address, count);
                Ok(())
            }
            Err(failure) => Err(apply_partial_failure(job, failure)),
        }
    }
}

struct AddNewKeyExecutor {
    service: Arc<AccountsService>,
}

#[async_trait::async_trait]
impl JobExecutor for AddNewKeyExecutor {
    async fn execute(&self, job: &mut Job) -> Result<(), EngineError> {
        if job.job_type != ADD_NEW_KEY_JOB_TYPE {
            return Err(JobError::InvalidJobType.into());
        }
        job.should_notify = false;

        let attrs: AddNewKeyAttributes = decode_attributes(job)?;

        match self.service.add_key(attrs.address).await {
            Ok((account, tx_id)) => {
                job.transaction_id = tx_id;
                job.result = format!("{}:{}", account.address, account.keys.len());
                Ok(())
            }
            Err(failure) => Err(apply_partial_failure(job, failure)),
        }
    }
}

struct RevokeKeyExecutor {
    service: Arc<AccountsService>,
}

#[async_trait::async_trait]
impl JobExecutor for RevokeKeyExecutor {
    async fn execute(&self, job: &mut Job) -> Result<(), EngineError> {
        if job.job_type != REVOKE_KEY_JOB_TYPE {
            return Err(JobError::InvalidJobType.into());
        }
        job.should_notify = false;

        let attrs: RevokeKeyAttributes = decode_attributes(job)?;

        match self
            .service
            .revoke_key_at_index(attrs.address, attrs.old_key_index)
            .await
        {
            Ok((account, tx_id)) => {
                job.transaction_id = tx_id;
                job.result = format!("{}:{}", account.address, account.keys.len());
                Ok(())
            }
            Err(failure) => Err(apply_partial_failure(job, failure)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::service::tests::fixture;
    use crate::accounts::store::AccountStore as _;
    use crate::accounts::CreateOutcome;
    use crate::chain::{ChainId, OnChainAccount};
    use crate::jobs::JobStatus;
    use std::time::{Duration, Instant};
    use uuid::Uuid;

    async fn wait_for_terminal(f: &crate::accounts::service::tests::Fixture, id: &Uuid) -> Job {
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            if let Some(job) = f.pool.store().get(id).unwrap() {
                if matches!(job.status, JobStatus::Complete | JobStatus::Failed) {
                    return job;
                }
            }
            assert!(Instant::now() < deadline, "job never reached a terminal state");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[test]
    fn attribute_wire_shapes_are_exact() {
        let address = Address::from_ordinal(ChainId::MeridianLocal, 9);

        let sync = serde_json::to_value(SyncAccountKeyCountAttributes {
            address,
            num_keys: 3,
        })
        .unwrap();
        assert_eq!(
            sync,
            serde_json::json!({ "address": address.hex(), "numkeys": 3 })
        );

        let revoke = serde_json::to_value(RevokeKeyAttributes {
            address,
            old_key_index: 2,
        })
        .unwrap();
        assert_eq!(
            revoke,
            serde_json::json!({ "address": address.hex(), "oldKeyIndex": 2 })
        );

        let add = serde_json::to_value(AddNewKeyAttributes { address }).unwrap();
        assert_eq!(add, serde_json::json!({ "address": address.hex() }));

        // Round-trip
        let back: SyncAccountKeyCountAttributes = serde_json::from_value(sync).unwrap();
        assert_eq!(back.address, address);
        assert_eq!(back.num_keys, 3);
    }

    #[tokio::test]
    async fn executor_table_covers_every_job_type() {
        let f = fixture(1).await;
        let table = executor_table(f.service.clone());

        for job_type in [
            ACCOUNT_CREATE_JOB_TYPE,
            SYNC_ACCOUNT_KEY_COUNT_JOB_TYPE,
            ADD_NEW_KEY_JOB_TYPE,
            REVOKE_KEY_JOB_TYPE,
        ] {
            assert!(table.contains_key(job_type), "missing executor: {job_type}");
        }
        assert_eq!(table.len(), 4);
    }

    #[tokio::test]
    async fn executors_reject_mismatched_job_types() {
        let f = fixture(1).await;
        let executor = AccountCreateExecutor {
            service: f.service.clone(),
        };

        let mut job = Job::new("revoke_key", serde_json::Value::Null);
        let err = executor.execute(&mut job).await.unwrap_err();
        assert!(matches!(err, EngineError::Job(JobError::InvalidJobType)));
    }

    #[tokio::test]
    async fn executors_reject_malformed_attributes() {
        let f = fixture(1).await;
        let executor = SyncAccountKeyCountExecutor {
            service: f.service.clone(),
        };

        let mut job = Job::new(
            SYNC_ACCOUNT_KEY_COUNT_JOB_TYPE,
            serde_json::json!({ "address": 42 }),
        );
        let err = executor.execute(&mut job).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Job(JobError::MalformedAttributes(_))
        ));
        // Notification policy is applied before attribute decoding
        assert!(job.should_notify);
    }

    #[tokio::test]
    async fn notification_policy_is_per_type() {
        let f = fixture(1).await;
        let (account, _) = f.service.create_account().await.unwrap();
        let address = Address::parse(&account.address).unwrap();

        let mut add_job = Job::new(
            ADD_NEW_KEY_JOB_TYPE,
            serde_json::to_value(AddNewKeyAttributes { address }).unwrap(),
        );
        AddNewKeyExecutor {
            service: f.service.clone(),
        }
        .execute(&mut add_job)
        .await
        .unwrap();
        assert!(!add_job.should_notify);
        assert!(!add_job.transaction_id.is_empty());
        assert_eq!(add_job.result, format!("{}:2", account.address));

        let mut revoke_job = Job::new(
            REVOKE_KEY_JOB_TYPE,
            serde_json::to_value(RevokeKeyAttributes {
                address,
                old_key_index: 1,
            })
            .unwrap(),
        );
        RevokeKeyExecutor {
            service: f.service.clone(),
        }
        .execute(&mut revoke_job)
        .await
        .unwrap();
        assert!(!revoke_job.should_notify);
        assert_eq!(revoke_job.result, format!("{}:1", account.address));
    }

    #[tokio::test]
    async fn create_job_runs_through_the_pool() {
        let f = fixture(2).await;
        f.pool.start(executor_table(f.service.clone()));

        let CreateOutcome::Scheduled(job) = f.service.create(false).await.unwrap() else {
            panic!("async create must schedule a job");
        };
        assert!(job.attributes.is_null());

        let done = wait_for_terminal(&f, &job.id).await;
        assert_eq!(done.status, JobStatus::Complete);
        assert!(done.should_notify);
        assert!(!done.transaction_id.is_empty());

        // The result is the new address, present in the store with 2 keys
        let stored = f.store.account(&done.result).unwrap();
        assert_eq!(stored.keys.len(), 2);
    }

    #[tokio::test]
    async fn sync_job_runs_through_the_pool() {
        let f = fixture(1).await;
        f.pool.start(executor_table(f.service.clone()));
        let (account, _) = f.service.create_account().await.unwrap();

        let job = f
            .service
            .sync_account_key_count(&account.address)
            .await
            .unwrap();

        let done = wait_for_terminal(&f, &job.id).await;
        assert_eq!(done.status, JobStatus::Complete);
        // Target equals the default key count (1): a pure no-op
        assert_eq!(done.result, format!("{}:1", account.address));
        assert!(done.transaction_id.is_empty());
    }

    #[tokio::test]
    async fn failed_job_keeps_transaction_id_for_drift_repair() {
        let f = fixture(2).await;
        let (account, _) = f.service.create_account().await.unwrap();
        let address = Address::parse(&account.address).unwrap();

        // The chain no longer has key 1, but the local store does: the
        // revoke transaction is accepted and fails at execution.
        let keys = f
            .ledger
            .keys_of(&address)
            .into_iter()
            .filter(|k| k.index != 1)
            .collect();
        f.ledger.register_account(OnChainAccount { address, keys });

        let executor = RevokeKeyExecutor {
            service: f.service.clone(),
        };
        let mut job = Job::new(
            REVOKE_KEY_JOB_TYPE,
            serde_json::to_value(RevokeKeyAttributes {
                address,
                old_key_index: 1,
            })
            .unwrap(),
        );

        let err = executor.execute(&mut job).await.unwrap_err();
        assert!(matches!(err, EngineError::Ledger(_)));
        // The transaction was on the network: its id is on the job
        assert!(!job.transaction_id.is_empty());

        // Local state was not mutated
        assert_eq!(f.store.account(&account.address).unwrap().keys.len(), 2);
    }
}
