// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Harbor Systems

//! Worker pool driving job executors.
//!
//! Jobs are persisted first, then pushed onto a bounded in-memory queue.
//! Worker tasks pull job ids, load the record, and run the matching
//! executor exactly once per attempt. Retryable failures are rescheduled
//! with a short backoff until the attempt limit is reached; terminal jobs
//! with `should_notify` are POSTed to the configured webhook.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::{ExecutorTable, Job, JobDbError, JobError, JobStatus, JobStore};

/// Delay before a retryable failure re-enters the queue.
const RETRY_BACKOFF: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct PoolOptions {
    /// Bounded queue capacity; scheduling into a full queue fails the call
    /// and parks the job in `NoAvailableWorkers`.
    pub capacity: usize,
    pub worker_count: usize,
    /// Executor invocations per job before a retryable failure is final.
    pub max_attempts: u32,
    /// Webhook receiving terminal jobs whose executor set `should_notify`.
    pub notification_webhook: Option<url::Url>,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            capacity: 1000,
            worker_count: 2,
            max_attempts: 3,
            notification_webhook: None,
        }
    }
}

pub struct WorkerPool {
    store: Arc<JobStore>,
    sender: mpsc::Sender<Uuid>,
    receiver: std::sync::Mutex<Option<mpsc::Receiver<Uuid>>>,
    options: PoolOptions,
    cancel: CancellationToken,
}

impl WorkerPool {
    pub fn new(store: Arc<JobStore>, options: PoolOptions) -> Self {
        let (sender, receiver) = mpsc::channel(options.capacity.max(1));
        Self {
            store,
            sender,
            receiver: std::sync::Mutex::new(Some(receiver)),
            options,
            cancel: CancellationToken::new(),
        }
    }

    pub fn store(&self) -> &Arc<JobStore> {
        &self.store
    }

    /// Create and persist a job in `Init` state.
    pub fn create_job(
        &self,
        job_type: &str,
        attributes: serde_json::Value,
    ) -> Result<Job, JobError> {
        let job = Job::new(job_type, attributes);
        self.store.upsert(&job)?;
        Ok(job)
    }

    /// Mark the job accepted and push it onto the queue.
    pub async fn schedule(&self, job: &mut Job) -> Result<(), JobError> {
        job.status = JobStatus::Accepted;
        job.touch();
        self.store.upsert(job)?;

        if self.sender.try_send(job.id).is_err() {
            job.status = JobStatus::NoAvailableWorkers;
            job.touch();
            self.store.upsert(job)?;
            return Err(JobError::QueueFull);
        }
        Ok(())
    }

    /// Start the worker tasks with an immutable executor table. Calling
    /// `start` twice is a no-op.
    pub fn start(&self, executors: ExecutorTable) {
        let Some(receiver) = self.receiver.lock().unwrap().take() else {
            tracing::warn!("worker pool already started");
            return;
        };

        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));
        let context = WorkerContext {
            store: self.store.clone(),
            executors: Arc::new(executors),
            sender: self.sender.clone(),
            max_attempts: self.options.max_attempts,
            webhook: self.options.notification_webhook.clone(),
            http: reqwest::Client::new(),
        };

        for worker_id in 0..self.options.worker_count.max(1) {
            let receiver = receiver.clone();
            let context = context.clone();
            let cancel = self.cancel.clone();

            tokio::spawn(async move {
                tracing::debug!(worker_id, "worker started");
                loop {
                    let job_id = {
                        let mut rx = receiver.lock().await;
                        tokio::select! {
                            _ = cancel.cancelled() => break,
                            received = rx.recv() => match received {
                                Some(id) => id,
                                None => break,
                            },
                        }
                    };

                    if let Err(e) = context.process(job_id).await {
                        tracing::error!(worker_id, job_id = %job_id, error = %e, "job processing failed");
                    }
                }
                tracing::debug!(worker_id, "worker stopped");
            });
        }
    }

    /// Signal every worker to stop after its current job.
    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

#[derive(Clone)]
struct WorkerContext {
    store: Arc<JobStore>,
    executors: Arc<ExecutorTable>,
    sender: mpsc::Sender<Uuid>,
    max_attempts: u32,
    webhook: Option<url::Url>,
    http: reqwest::Client,
}

impl WorkerContext {
    async fn process(&self, job_id: Uuid) -> Result<(), JobDbError> {
        let Some(mut job) = self.store.get(&job_id)? else {
            tracing::warn!(job_id = %job_id, "queued job missing from store");
            return Ok(());
        };

        let Some(executor) = self.executors.get(job.job_type.as_str()) else {
            job.status = JobStatus::Failed;
            job.error = Some(JobError::UnknownType(job.job_type.clone()).to_string());
            job.touch();
            self.store.upsert(&job)?;
            return Ok(());
        };

        job.status = JobStatus::InProgress;
        job.attempt_count += 1;
        job.touch();
        self.store.upsert(&job)?;

        match executor.execute(&mut job).await {
            Ok(()) => {
                job.status = JobStatus::Complete;
                job.error = None;
            }
            Err(e) => {
                tracing::warn!(
                    job_id = %job.id,
                    job_type = %job.job_type,
                    attempt = job.attempt_count,
                    error = %e,
                    "job attempt failed"
                );
                job.error = Some(e.to_string());

                if e.is_retryable() && job.attempt_count < self.max_attempts {
                    job.status = JobStatus::Accepted;
                    job.touch();
                    self.store.upsert(&job)?;
                    self.requeue_later(job.id);
                    return Ok(());
                }
                job.status = JobStatus::Failed;
            }
        }

        job.touch();
        self.store.upsert(&job)?;

        if job.should_notify {
            self.notify(&job).await;
        }
        Ok(())
    }

    fn requeue_later(&self, job_id: Uuid) {
        let sender = self.sender.clone();
        tokio::spawn(async move {
            tokio::time::sleep(RETRY_BACKOFF).await;
            if sender.send(job_id).await.is_err() {
                tracing::warn!(job_id = %job_id, "pool stopped before retry could be queued");
            }
        });
    }

    async fn notify(&self, job: &Job) {
        let Some(url) = &self.webhook else { return };

        match self.http.post(url.clone()).json(job).send().await {
            Ok(response) if !response.status().is_success() => {
                tracing::warn!(
                    job_id = %job.id,
                    status = %response.status(),
                    "job notification rejected"
                );
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(job_id = %job.id, error = %e, "job notification failed");
            }
        }
    }
}
