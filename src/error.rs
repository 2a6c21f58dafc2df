// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Harbor Systems

//! Error taxonomy for the lifecycle engine and its HTTP mapping.
//!
//! Validation and invariant failures short-circuit before any network or
//! storage mutation and are never retried. Ledger failures are transient
//! and eligible for the job queue's retry policy. A [`PartialFailure`]
//! additionally carries the transaction id whenever the network had
//! already accepted a transaction before a later step failed; that id
//! must reach the job record so drift can be repaired.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::accounts::store::StoreError;
use crate::chain::{AddressError, LedgerError, SealError};
use crate::jobs::JobError;
use crate::keys::KeyError;

// =============================================================================
// Engine errors
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Bad input: malformed address, wrong chain, target key count < 1.
    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// An operation would break a hard invariant (e.g. revoking the last
    /// signing key of a custodial account).
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Key(#[from] KeyError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Job(#[from] JobError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

impl EngineError {
    /// Whether the job queue should retry after this error. Only ledger
    /// failures are transient; everything else fails the same way again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::Ledger(_) | EngineError::Key(KeyError::Ledger(_))
        )
    }
}

impl From<AddressError> for EngineError {
    fn from(e: AddressError) -> Self {
        EngineError::Validation(e.to_string())
    }
}

// =============================================================================
// Partial failures
// =============================================================================

/// An engine failure that may have left a transaction on the network.
///
/// Executors copy `transaction_id` onto the job before reporting the error,
/// so a failed job with a transaction id signals possible drift between the
/// local store and the chain.
#[derive(Debug)]
pub struct PartialFailure {
    pub transaction_id: Option<String>,
    pub source: EngineError,
}

impl PartialFailure {
    pub fn new(source: EngineError) -> Self {
        Self {
            transaction_id: None,
            source,
        }
    }

    pub fn with_transaction_id(source: impl Into<EngineError>, tx_id: impl Into<String>) -> Self {
        Self {
            transaction_id: Some(tx_id.into()),
            source: source.into(),
        }
    }
}

impl From<EngineError> for PartialFailure {
    fn from(e: EngineError) -> Self {
        PartialFailure::new(e)
    }
}

impl From<LedgerError> for PartialFailure {
    fn from(e: LedgerError) -> Self {
        PartialFailure::new(e.into())
    }
}

impl From<KeyError> for PartialFailure {
    fn from(e: KeyError) -> Self {
        PartialFailure::new(e.into())
    }
}

impl From<StoreError> for PartialFailure {
    fn from(e: StoreError) -> Self {
        PartialFailure::new(e.into())
    }
}

impl From<AddressError> for PartialFailure {
    fn from(e: AddressError) -> Self {
        PartialFailure::new(e.into())
    }
}

impl From<std::io::Error> for PartialFailure {
    fn from(e: std::io::Error) -> Self {
        PartialFailure::new(e.into())
    }
}

impl From<serde_json::Error> for PartialFailure {
    fn from(e: serde_json::Error) -> Self {
        PartialFailure::new(e.into())
    }
}

impl From<SealError> for PartialFailure {
    fn from(e: SealError) -> Self {
        Self {
            transaction_id: e.transaction_id,
            source: e.source.into(),
        }
    }
}

// =============================================================================
// HTTP error mapping
// =============================================================================

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        match &e {
            EngineError::Validation(_) => ApiError::bad_request(e.to_string()),
            EngineError::NotFound(_) | EngineError::Store(StoreError::NotFound(_)) => {
                ApiError::not_found(e.to_string())
            }
            EngineError::Store(StoreError::AlreadyExists(_)) => ApiError::conflict(e.to_string()),
            EngineError::InvariantViolation(_) => ApiError::conflict(e.to_string()),
            EngineError::Ledger(_) => ApiError::bad_gateway(e.to_string()),
            EngineError::Job(JobError::QueueFull) => {
                ApiError::new(StatusCode::SERVICE_UNAVAILABLE, e.to_string())
            }
            _ => ApiError::internal(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}
