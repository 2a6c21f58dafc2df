// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Harbor Systems

//! Account management API endpoints.
//!
//! Thin marshaling over the lifecycle engine: handlers validate nothing
//! beyond parameter shapes; the engine owns address validation and every
//! invariant. Key material in responses is always zeroed.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::jobs::JobResponse;
use crate::accounts::{Account, CreateOutcome};
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateQuery {
    /// Create synchronously and return the account instead of a job.
    pub sync: Option<bool>,
}

/// Response to account creation: a job (async, the default) or the created
/// account with its creation transaction id (`?sync=true`).
#[derive(Debug, Serialize, ToSchema)]
pub struct CreateAccountResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job: Option<JobResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<Account>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
}

/// Request to track a non-custodial account.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AddNonCustodialRequest {
    pub address: String,
}

/// List accounts, newest first.
#[utoipa::path(
    get,
    path = "/v1/accounts",
    tag = "Accounts",
    params(
        ("limit" = Option<i64>, Query, description = "Maximum accounts to return"),
        ("offset" = Option<i64>, Query, description = "Accounts to skip"),
    ),
    responses((status = 200, description = "Accounts", body = [Account]))
)]
pub async fn list_accounts(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Account>>, ApiError> {
    let accounts = state
        .accounts
        .list(query.limit.unwrap_or(0), query.offset.unwrap_or(0))?;
    Ok(Json(accounts))
}

/// Create a custodial account.
#[utoipa::path(
    post,
    path = "/v1/accounts",
    tag = "Accounts",
    params(("sync" = Option<bool>, Query, description = "Wait for the creation to seal")),
    responses(
        (status = 201, description = "Job scheduled or account created", body = CreateAccountResponse),
        (status = 502, description = "Ledger failure")
    )
)]
pub async fn create_account(
    State(state): State<AppState>,
    Query(query): Query<CreateQuery>,
) -> Result<(StatusCode, Json<CreateAccountResponse>), ApiError> {
    let sync = query.sync.unwrap_or(false);

    let response = match state.accounts.create(sync).await? {
        CreateOutcome::Scheduled(job) => CreateAccountResponse {
            job: Some(JobResponse::from(job)),
            account: None,
            transaction_id: None,
        },
        CreateOutcome::Created {
            account,
            transaction_id,
        } => CreateAccountResponse {
            job: None,
            account: Some(account),
            transaction_id: Some(transaction_id),
        },
    };

    Ok((StatusCode::CREATED, Json(response)))
}

/// Account details; key records never include private material.
#[utoipa::path(
    get,
    path = "/v1/accounts/{address}",
    tag = "Accounts",
    params(("address" = String, Path, description = "Account address")),
    responses(
        (status = 200, description = "Account", body = Account),
        (status = 400, description = "Invalid address"),
        (status = 404, description = "Account not found")
    )
)]
pub async fn account_details(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<Account>, ApiError> {
    let account = state.accounts.details(&address)?;
    Ok(Json(account))
}

/// Schedule key-count reconciliation for an account.
#[utoipa::path(
    post,
    path = "/v1/accounts/{address}/keys/sync",
    tag = "Accounts",
    params(("address" = String, Path, description = "Account address")),
    responses(
        (status = 200, description = "Reconciliation job scheduled", body = JobResponse),
        (status = 400, description = "Invalid address")
    )
)]
pub async fn sync_account_key_count(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<JobResponse>, ApiError> {
    let job = state.accounts.sync_account_key_count(&address).await?;
    Ok(Json(JobResponse::from(job)))
}

/// Schedule addition of a new key to an account.
#[utoipa::path(
    post,
    path = "/v1/accounts/{address}/keys",
    tag = "Accounts",
    params(("address" = String, Path, description = "Account address")),
    responses(
        (status = 201, description = "Add-key job scheduled", body = JobResponse),
        (status = 400, description = "Invalid address")
    )
)]
pub async fn add_account_key(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<(StatusCode, Json<JobResponse>), ApiError> {
    let job = state.accounts.add_new_key(&address).await?;
    Ok((StatusCode::CREATED, Json(JobResponse::from(job))))
}

/// Schedule revocation of the key at the given index.
#[utoipa::path(
    delete,
    path = "/v1/accounts/{address}/keys/{index}",
    tag = "Accounts",
    params(
        ("address" = String, Path, description = "Account address"),
        ("index" = u32, Path, description = "Key index to revoke"),
    ),
    responses(
        (status = 200, description = "Revoke job scheduled", body = JobResponse),
        (status = 400, description = "Invalid address")
    )
)]
pub async fn revoke_account_key(
    State(state): State<AppState>,
    Path((address, index)): Path<(String, u32)>,
) -> Result<Json<JobResponse>, ApiError> {
    let job = state.accounts.revoke_key(&address, index).await?;
    Ok(Json(JobResponse::from(job)))
}

/// Track an externally-keyed account.
#[utoipa::path(
    post,
    path = "/v1/accounts/non-custodial",
    tag = "Accounts",
    request_body = AddNonCustodialRequest,
    responses(
        (status = 201, description = "Account tracked", body = Account),
        (status = 400, description = "Invalid address"),
        (status = 409, description = "Account already tracked")
    )
)]
pub async fn add_non_custodial_account(
    State(state): State<AppState>,
    Json(request): Json<AddNonCustodialRequest>,
) -> Result<(StatusCode, Json<Account>), ApiError> {
    let account = state.accounts.add_non_custodial_account(&request.address)?;
    Ok((StatusCode::CREATED, Json(account)))
}

/// Stop tracking a non-custodial account (idempotent).
#[utoipa::path(
    delete,
    path = "/v1/accounts/non-custodial/{address}",
    tag = "Accounts",
    params(("address" = String, Path, description = "Account address")),
    responses(
        (status = 200, description = "Account no longer tracked"),
        (status = 400, description = "Custodial accounts cannot be deleted")
    )
)]
pub async fn delete_non_custodial_account(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.accounts.delete_non_custodial_account(&address)?;
    Ok(StatusCode::OK)
}
