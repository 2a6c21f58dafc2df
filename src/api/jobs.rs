// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Harbor Systems

//! Job inspection endpoint.
//!
//! Asynchronous operations surface their outcome only through the job
//! record: callers poll here for the result string, the error, and the
//! transaction id. A failed job that still carries a transaction id means
//! the transaction reached the network before a later step failed.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiError;
use crate::jobs::{Job, JobStatus};
use crate::state::AppState;

/// A job as returned to API clients.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct JobResponse {
    pub job_id: Uuid,
    pub job_type: String,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub result: String,
    pub transaction_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Job> for JobResponse {
    fn from(job: Job) -> Self {
        Self {
            job_id: job.id,
            job_type: job.job_type,
            status: job.status,
            error: job.error,
            result: job.result,
            transaction_id: job.transaction_id,
            created_at: job.created_at,
            updated_at: job.updated_at,
        }
    }
}

/// Fetch a job record by id.
#[utoipa::path(
    get,
    path = "/v1/jobs/{job_id}",
    tag = "Jobs",
    params(("job_id" = Uuid, Path, description = "Job identifier")),
    responses(
        (status = 200, description = "Job record", body = JobResponse),
        (status = 404, description = "Job not found")
    )
)]
pub async fn job_details(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<JobResponse>, ApiError> {
    let job = state
        .job_store
        .get(&job_id)
        .map_err(|e| ApiError::internal(e.to_string()))?
        .ok_or_else(|| ApiError::not_found(format!("Job {job_id}")))?;

    Ok(Json(JobResponse::from(job)))
}
