// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Harbor Systems

//! Asynchronous jobs: the persisted job record, the executor contract and
//! the worker pool that drives executors.
//!
//! Every job type has exactly one executor. Executors are registered as an
//! immutable type→executor table handed to [`WorkerPool::start`]; nothing
//! mutates the pool after construction. A job is executed exactly once per
//! attempt; retries are governed by the pool's policy and
//! [`EngineError::is_retryable`](crate::error::EngineError::is_retryable).

pub mod pool;
pub mod store;

pub use pool::{PoolOptions, WorkerPool};
pub use store::{JobDbError, JobStore};

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EngineError;

/// Errors from job creation and dispatch.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// A job reached an executor registered under a different type.
    #[error("invalid job type for executor")]
    InvalidJobType,

    #[error("malformed job attributes: {0}")]
    MalformedAttributes(String),

    #[error("no executor registered for job type: {0}")]
    UnknownType(String),

    #[error("worker queue is full")]
    QueueFull,

    #[error(transparent)]
    Db(#[from] JobDbError),
}

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Init,
    Accepted,
    NoAvailableWorkers,
    InProgress,
    Complete,
    Failed,
}

/// A persisted unit of asynchronous work.
///
/// `attributes` is the type-specific JSON payload; it round-trips through
/// storage losslessly. `transaction_id` stays populated even when the job
/// fails after a transaction was already submitted: that combination is
/// the drift signal callers watch for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub job_type: String,
    pub status: JobStatus,
    pub error: Option<String>,
    pub result: String,
    pub transaction_id: String,
    pub attributes: serde_json::Value,
    pub should_notify: bool,
    pub attempt_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new(job_type: &str, attributes: serde_json::Value) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            job_type: job_type.to_string(),
            status: JobStatus::Init,
            error: None,
            result: String::new(),
            transaction_id: String::new(),
            attributes,
            should_notify: false,
            attempt_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Executes jobs of exactly one type.
#[async_trait::async_trait]
pub trait JobExecutor: Send + Sync {
    async fn execute(&self, job: &mut Job) -> Result<(), EngineError>;
}

/// Immutable job-type → executor table, built once and passed to the pool.
pub type ExecutorTable = HashMap<&'static str, Arc<dyn JobExecutor>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_job_starts_in_init() {
        let job = Job::new("account_create", serde_json::Value::Null);
        assert_eq!(job.status, JobStatus::Init);
        assert_eq!(job.attempt_count, 0);
        assert!(job.error.is_none());
        assert!(job.transaction_id.is_empty());
        assert!(!job.should_notify);
    }

    #[test]
    fn job_json_round_trips_attributes_losslessly() {
        let attrs = serde_json::json!({
            "address": "0xf300000000000001",
            "numkeys": 3,
        });
        let mut job = Job::new("sync_account_key_count", attrs.clone());
        job.transaction_id = "abc".to_string();
        job.result = "0xf300000000000001:3".to_string();

        let encoded = serde_json::to_vec(&job).unwrap();
        let decoded: Job = serde_json::from_slice(&encoded).unwrap();

        assert_eq!(decoded.attributes, attrs);
        assert_eq!(decoded.id, job.id);
        assert_eq!(decoded.transaction_id, "abc");
        assert_eq!(decoded.status, JobStatus::Init);
    }

    #[test]
    fn status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&JobStatus::NoAvailableWorkers).unwrap(),
            r#""no_available_workers""#
        );
        assert_eq!(
            serde_json::to_string(&JobStatus::InProgress).unwrap(),
            r#""in_progress""#
        );
    }
}
