// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Harbor Systems

use std::sync::Arc;

use crate::accounts::AccountsService;
use crate::chain::LedgerClient;
use crate::config::Config;
use crate::jobs::JobStore;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub accounts: Arc<AccountsService>,
    pub job_store: Arc<JobStore>,
    pub ledger: Arc<dyn LedgerClient>,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        accounts: Arc<AccountsService>,
        job_store: Arc<JobStore>,
        ledger: Arc<dyn LedgerClient>,
    ) -> Self {
        Self {
            config,
            accounts,
            job_store,
            ledger,
        }
    }
}
