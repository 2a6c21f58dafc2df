// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Harbor Systems

//! Durable account/key records.
//!
//! ## Storage Layout
//!
//! One JSON file per account:
//! ```text
//! {data_dir}/accounts/{address}.json
//! ```
//!
//! Writes go through a temp-file-and-rename so a crash never leaves a
//! half-written record. Key records live inside the account file; their
//! `value` field is ciphertext (the key manager encrypts before storing).

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::accounts::Account;
use crate::keys::KeyRecord;

/// Errors from the account store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("key does not belong to the given account: {0}")]
    KeyOwnership(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Listing window for account queries.
#[derive(Debug, Clone, Copy)]
pub struct ListOptions {
    pub limit: usize,
    pub offset: usize,
}

impl ListOptions {
    /// Negative or zero limits mean "no limit"; negative offsets clamp to 0.
    pub fn parse(limit: i64, offset: i64) -> Self {
        Self {
            limit: if limit <= 0 { usize::MAX } else { limit as usize },
            offset: offset.max(0) as usize,
        }
    }
}

/// Durable storage for accounts and their key records.
pub trait AccountStore: Send + Sync {
    /// All accounts, newest first, within the listing window.
    fn accounts(&self, options: ListOptions) -> StoreResult<Vec<Account>>;

    /// A single account with its key records.
    fn account(&self, address: &str) -> StoreResult<Account>;

    /// Insert a new account; fails if the address is already present.
    fn insert_account(&self, account: &Account) -> StoreResult<()>;

    /// Update an existing account record.
    fn save_account(&self, account: &Account) -> StoreResult<()>;

    /// Permanently remove an account record.
    fn hard_delete_account(&self, address: &str) -> StoreResult<()>;

    /// Remove exactly one key record from an account. Refuses keys that
    /// belong to a different account.
    fn delete_key_for_account(&self, account: &Account, key: &KeyRecord) -> StoreResult<()>;
}

// =============================================================================
// Filesystem store
// =============================================================================

/// JSON-file-per-account store.
pub struct FsAccountStore {
    root: PathBuf,
}

impl FsAccountStore {
    /// Open (or create) the store rooted at the given directory.
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn account_path(&self, address: &str) -> PathBuf {
        self.root.join(format!("{address}.json"))
    }

    fn read_account(&self, path: &Path) -> StoreResult<Account> {
        let data = fs::read(path)?;
        Ok(serde_json::from_slice(&data)?)
    }

    /// Write via a temp file in the same directory, then rename over the
    /// target. Rename within one filesystem is atomic.
    fn write_account(&self, account: &Account) -> StoreResult<()> {
        let target = self.account_path(&account.address);
        let tmp = self.root.join(format!(".{}.tmp", account.address));

        let json = serde_json::to_vec_pretty(account)?;
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&json)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &target)?;
        Ok(())
    }

    fn exists(&self, address: &str) -> bool {
        self.account_path(address).exists()
    }
}

impl AccountStore for FsAccountStore {
    fn accounts(&self, options: ListOptions) -> StoreResult<Vec<Account>> {
        let mut all = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().is_none_or(|e| e != "json") {
                continue;
            }
            match self.read_account(&path) {
                Ok(account) => all.push(account),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable account record");
                }
            }
        }

        // Newest first
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(all
            .into_iter()
            .skip(options.offset)
            .take(options.limit)
            .collect())
    }

    fn account(&self, address: &str) -> StoreResult<Account> {
        let path = self.account_path(address);
        if !path.exists() {
            return Err(StoreError::NotFound(format!("account {address}")));
        }
        self.read_account(&path)
    }

    fn insert_account(&self, account: &Account) -> StoreResult<()> {
        if self.exists(&account.address) {
            return Err(StoreError::AlreadyExists(format!(
                "account {}",
                account.address
            )));
        }
        self.write_account(account)
    }

    fn save_account(&self, account: &Account) -> StoreResult<()> {
        if !self.exists(&account.address) {
            return Err(StoreError::NotFound(format!("account {}", account.address)));
        }
        self.write_account(account)
    }

    fn hard_delete_account(&self, address: &str) -> StoreResult<()> {
        let path = self.account_path(address);
        if !path.exists() {
            return Err(StoreError::NotFound(format!("account {address}")));
        }
        fs::remove_file(path)?;
        Ok(())
    }

    fn delete_key_for_account(&self, account: &Account, key: &KeyRecord) -> StoreResult<()> {
        if key.account_address != account.address {
            return Err(StoreError::KeyOwnership(format!(
                "key {} belongs to {}, not {}",
                key.index, key.account_address, account.address
            )));
        }

        let mut stored = self.account(&account.address)?;
        let before = stored.keys.len();
        stored.keys.retain(|k| k.index != key.index);
        if stored.keys.len() == before {
            return Err(StoreError::NotFound(format!(
                "key {} on account {}",
                key.index, account.address
            )));
        }
        stored.updated_at = chrono::Utc::now();
        self.write_account(&stored)
    }
}
