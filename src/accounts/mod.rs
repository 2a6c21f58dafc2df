// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Harbor Systems

//! # Account & Key Lifecycle Engine
//!
//! The core of the service: account creation and key rotation driven as
//! asynchronous retryable jobs, reconciliation of the encrypted key store
//! against the on-chain source of truth, and rate-limited, correctly
//! authorized transaction submission.
//!
//! ## Modules
//!
//! - [`service`] - the engine operations (create, sync, add key, revoke key)
//! - [`jobs`] - job type constants, attribute payloads and executors
//! - [`store`] - durable account/key records
//! - [`limiter`] - creation-path token limiter

pub mod jobs;
pub mod limiter;
pub mod service;
pub mod store;

pub use service::{AccountsService, CreateOutcome};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::chain::Address;
use crate::keys::KeyRecord;

/// Whether this service holds the account's signing keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    /// Keys are generated and held by this service.
    Custodial,
    /// Tracked for bookkeeping only; keys are held externally.
    NonCustodial,
}

/// A ledger account managed (or tracked) by this service.
///
/// Invariants: a custodial account always holds at least one [`KeyRecord`];
/// a non-custodial account holds none.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Account {
    /// Chain-formatted address, unique across the store.
    pub address: String,
    #[serde(rename = "type")]
    pub account_type: AccountType,
    pub keys: Vec<KeyRecord>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Stable sort of the key records by index. Source-key selection and
    /// index assignment both depend on this ordering being deterministic.
    pub fn sort_keys_by_index(&mut self) {
        self.keys.sort_by_key(|k| k.index);
    }

    /// Blank out every key's encrypted private material for API exposure.
    pub fn zero_key_values(&mut self) {
        for key in &mut self.keys {
            key.zero_value();
        }
    }
}

// =============================================================================
// Account-created observers
// =============================================================================

/// Payload delivered to observers when a custodial account is created.
#[derive(Debug, Clone)]
pub struct AccountAddedPayload {
    pub address: Address,
}

/// Receives account-created notifications. Observers are registered
/// explicitly at engine construction; there is no ambient global dispatch.
pub trait AccountObserver: Send + Sync {
    fn account_added(&self, payload: &AccountAddedPayload);
}

/// Observer that records creations in the service log.
pub struct LoggingObserver;

impl AccountObserver for LoggingObserver {
    fn account_added(&self, payload: &AccountAddedPayload) {
        tracing::info!(address = %payload.address, "account created");
    }
}
