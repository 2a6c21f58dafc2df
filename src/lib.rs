// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Harbor Systems

//! Harbor - Custodial Meridian Wallet Service
//!
//! This crate provides a custodial wallet backend for the Meridian ledger:
//! accounts and their signing keys are generated and held server-side, key
//! lifecycle operations run as asynchronous retryable jobs, and the
//! encrypted key store is reconciled against on-chain state.
//!
//! ## Modules
//!
//! - `accounts` - the Account & Key Lifecycle Engine (core)
//! - `api` - HTTP API handlers (Axum)
//! - `chain` - Meridian ledger integration
//! - `jobs` - job records and the worker pool
//! - `keys` - key generation, encryption and signing authorities
//! - `transactions` - transaction building, signing and submission

pub mod accounts;
pub mod api;
pub mod auth;
pub mod chain;
pub mod config;
pub mod error;
pub mod jobs;
pub mod keys;
pub mod state;
pub mod transactions;
