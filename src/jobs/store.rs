// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Harbor Systems

//! Embedded job database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `jobs`: job id (uuid string) → serialized Job (JSON bytes)

use std::path::Path;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use uuid::Uuid;

use super::Job;

/// Primary table: job id → serialized Job (JSON bytes).
const JOBS: TableDefinition<&str, &[u8]> = TableDefinition::new("jobs");

#[derive(Debug, thiserror::Error)]
pub enum JobDbError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type JobDbResult<T> = Result<T, JobDbError>;

/// Embedded ACID job store.
pub struct JobStore {
    db: Database,
}

impl JobStore {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> JobDbResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let db = Database::create(path)?;

        // Pre-create the table so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(JOBS)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Insert or update a job record.
    pub fn upsert(&self, job: &Job) -> JobDbResult<()> {
        let json = serde_json::to_vec(job)?;
        let id = job.id.to_string();

        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(JOBS)?;
            table.insert(id.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Look up a single job by id.
    pub fn get(&self, id: &Uuid) -> JobDbResult<Option<Job>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(JOBS)?;
        match table.get(id.to_string().as_str())? {
            Some(value) => {
                let job: Job = serde_json::from_slice(value.value())?;
                Ok(Some(job))
            }
            None => Ok(None),
        }
    }

    /// List jobs newest first within the given window.
    pub fn list(&self, limit: usize, offset: usize) -> JobDbResult<Vec<Job>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(JOBS)?;

        let mut jobs = Vec::new();
        for entry in table.iter()? {
            let entry = entry?;
            match serde_json::from_slice::<Job>(entry.1.value()) {
                Ok(job) => jobs.push(job),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping malformed job record");
                }
            }
        }

        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(jobs.into_iter().skip(offset).take(limit).collect())
    }
}
