// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Harbor Systems

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::accounts::{Account, AccountType};
use crate::auth;
use crate::jobs::JobStatus;
use crate::keys::KeyRecord;
use crate::state::AppState;

pub mod accounts;
pub mod health;
pub mod jobs;

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route(
            "/accounts",
            get(accounts::list_accounts).post(accounts::create_account),
        )
        .route(
            "/accounts/non-custodial",
            post(accounts::add_non_custodial_account),
        )
        .route(
            "/accounts/non-custodial/{address}",
            delete(accounts::delete_non_custodial_account),
        )
        .route("/accounts/{address}", get(accounts::account_details))
        .route(
            "/accounts/{address}/keys",
            post(accounts::add_account_key),
        )
        .route(
            "/accounts/{address}/keys/sync",
            post(accounts::sync_account_key_count),
        )
        .route(
            "/accounts/{address}/keys/{index}",
            delete(accounts::revoke_account_key),
        )
        .route("/jobs/{job_id}", get(jobs::job_details))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_bearer,
        ))
        .with_state(state.clone());

    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .with_state(state);

    Router::new()
        .nest("/v1", v1_routes)
        .merge(health_routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        accounts::list_accounts,
        accounts::create_account,
        accounts::account_details,
        accounts::sync_account_key_count,
        accounts::add_account_key,
        accounts::revoke_account_key,
        accounts::add_non_custodial_account,
        accounts::delete_non_custodial_account,
        jobs::job_details,
        health::health,
        health::liveness,
        health::readiness
    ),
    components(
        schemas(
            Account,
            AccountType,
            KeyRecord,
            JobStatus,
            accounts::CreateAccountResponse,
            accounts::AddNonCustodialRequest,
            jobs::JobResponse,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    tags(
        (name = "Accounts", description = "Account and key lifecycle management"),
        (name = "Jobs", description = "Asynchronous job inspection"),
        (name = "Health", description = "Service health probes")
    )
)]
struct ApiDoc;
