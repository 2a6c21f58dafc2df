// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Harbor Systems

//! # Runtime Configuration
//!
//! Configuration is loaded from the environment at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `DATA_DIR` | Root directory for accounts and the job database | `./data` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `CHAIN_ID` | Meridian network (`meridian-mainnet`/`-testnet`/`-local`) | `meridian-local` |
//! | `LEDGER_RPC_URL` | Meridian access node JSON-RPC endpoint | `http://localhost:8650` |
//! | `ADMIN_ADDRESS` | Admin (payer) account address | Required |
//! | `ADMIN_PRIVATE_KEY` | Hex-encoded admin private key | Required |
//! | `ADMIN_PROPOSAL_KEY_COUNT` | Size of the admin proposer key pool | `10` |
//! | `DEFAULT_ACCOUNT_KEY_COUNT` | Keys installed on each new account | `1` |
//! | `TX_SEAL_TIMEOUT_SECS` | Submit-and-wait seal timeout | `60` |
//! | `SCRIPT_PATH_CREATE_ACCOUNT` | Operator-supplied creation script | Unset (built-in script) |
//! | `ACCOUNT_CREATE_RATE_LIMIT` | Creations per second (0 = unlimited) | `0` |
//! | `KEY_ENCRYPTION_KEY` | Hex-encoded 32-byte key-at-rest encryption key | Required |
//! | `API_TOKEN` | Bearer token guarding `/v1` (unset = auth disabled) | Unset |
//! | `WORKER_COUNT` | Job worker tasks | `2` |
//! | `WORKER_QUEUE_CAPACITY` | Bounded job queue size | `1000` |
//! | `JOB_MAX_ATTEMPTS` | Executor attempts per job | `3` |
//! | `NOTIFICATION_WEBHOOK_URL` | Webhook for job notifications | Unset |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::path::PathBuf;
use std::time::Duration;

use crate::chain::{validate_address, Address, ChainId};

/// Compute ceiling applied to every transaction this service submits.
pub const MAX_COMPUTE_LIMIT: u64 = 9999;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub host: String,
    pub port: u16,
    pub chain_id: ChainId,
    pub ledger_rpc_url: url::Url,
    pub admin_address: Address,
    pub admin_private_key_hex: String,
    pub admin_proposal_key_count: u32,
    pub default_account_key_count: u32,
    pub transaction_timeout: Duration,
    pub script_path_create_account: Option<PathBuf>,
    pub account_create_rate_limit: u32,
    pub key_encryption_key_hex: String,
    pub api_token: Option<String>,
    pub worker_count: usize,
    pub worker_queue_capacity: usize,
    pub job_max_attempts: u32,
    pub notification_webhook_url: Option<url::Url>,
    pub log_format: LogFormat,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from an arbitrary variable lookup (tests pass a map).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let chain_id: ChainId = lookup("CHAIN_ID")
            .unwrap_or_else(|| "meridian-local".to_string())
            .parse()
            .map_err(|e| ConfigError::Invalid {
                var: "CHAIN_ID",
                reason: format!("{e}"),
            })?;

        let admin_address_raw = lookup("ADMIN_ADDRESS").ok_or(ConfigError::Missing("ADMIN_ADDRESS"))?;
        let admin_address =
            validate_address(&admin_address_raw, chain_id).map_err(|e| ConfigError::Invalid {
                var: "ADMIN_ADDRESS",
                reason: format!("{e}"),
            })?;

        let ledger_rpc_url = lookup("LEDGER_RPC_URL")
            .unwrap_or_else(|| "http://localhost:8650".to_string())
            .parse()
            .map_err(|e: url::ParseError| ConfigError::Invalid {
                var: "LEDGER_RPC_URL",
                reason: e.to_string(),
            })?;

        let notification_webhook_url = match lookup("NOTIFICATION_WEBHOOK_URL") {
            Some(raw) => Some(raw.parse().map_err(|e: url::ParseError| {
                ConfigError::Invalid {
                    var: "NOTIFICATION_WEBHOOK_URL",
                    reason: e.to_string(),
                }
            })?),
            None => None,
        };

        let log_format = match lookup("LOG_FORMAT").as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        let default_account_key_count =
            parse_or("DEFAULT_ACCOUNT_KEY_COUNT", &lookup, 1u32)?;
        if default_account_key_count < 1 {
            return Err(ConfigError::Invalid {
                var: "DEFAULT_ACCOUNT_KEY_COUNT",
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            data_dir: lookup("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./data")),
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or("PORT", &lookup, 8080u16)?,
            chain_id,
            ledger_rpc_url,
            admin_address,
            admin_private_key_hex: lookup("ADMIN_PRIVATE_KEY")
                .ok_or(ConfigError::Missing("ADMIN_PRIVATE_KEY"))?,
            admin_proposal_key_count: parse_or("ADMIN_PROPOSAL_KEY_COUNT", &lookup, 10u32)?,
            default_account_key_count,
            transaction_timeout: Duration::from_secs(parse_or(
                "TX_SEAL_TIMEOUT_SECS",
                &lookup,
                60u64,
            )?),
            script_path_create_account: lookup("SCRIPT_PATH_CREATE_ACCOUNT").map(PathBuf::from),
            account_create_rate_limit: parse_or("ACCOUNT_CREATE_RATE_LIMIT", &lookup, 0u32)?,
            key_encryption_key_hex: lookup("KEY_ENCRYPTION_KEY")
                .ok_or(ConfigError::Missing("KEY_ENCRYPTION_KEY"))?,
            api_token: lookup("API_TOKEN").filter(|t| !t.is_empty()),
            worker_count: parse_or("WORKER_COUNT", &lookup, 2usize)?,
            worker_queue_capacity: parse_or("WORKER_QUEUE_CAPACITY", &lookup, 1000usize)?,
            job_max_attempts: parse_or("JOB_MAX_ATTEMPTS", &lookup, 3u32)?,
            notification_webhook_url,
            log_format,
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    var: &'static str,
    lookup: &impl Fn(&str) -> Option<String>,
    default: T,
) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match lookup(var) {
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
impl Config {
    /// A config suitable for unit tests; no environment involved.
    pub fn test_defaults(chain_id: ChainId) -> Self {
        Self {
            data_dir: PathBuf::from("/tmp/harbor-test"),
            host: "127.0.0.1".to_string(),
            port: 0,
            chain_id,
            ledger_rpc_url: "http://localhost:8650".parse().unwrap(),
            admin_address: Address::from_ordinal(chain_id, 1),
            admin_private_key_hex:
                "1111111111111111111111111111111111111111111111111111111111111111".to_string(),
            admin_proposal_key_count: 2,
            default_account_key_count: 1,
            transaction_timeout: Duration::from_secs(5),
            script_path_create_account: None,
            account_create_rate_limit: 0,
            key_encryption_key_hex:
                "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f".to_string(),
            api_token: None,
            worker_count: 1,
            worker_queue_capacity: 100,
            job_max_attempts: 3,
            notification_webhook_url: None,
            log_format: LogFormat::Pretty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from<'a>(map: &'a HashMap<&'a str, &'a str>) -> impl Fn(&str) -> Option<String> + 'a {
        move |var| map.get(var).map(|v| v.to_string())
    }

    fn minimal_env() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("ADMIN_ADDRESS", "0xf300000000000001"),
            (
                "ADMIN_PRIVATE_KEY",
                "1111111111111111111111111111111111111111111111111111111111111111",
            ),
            (
                "KEY_ENCRYPTION_KEY",
                "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f",
            ),
        ])
    }

    #[test]
    fn minimal_environment_gets_defaults() {
        let env = minimal_env();
        let config = Config::from_lookup(lookup_from(&env)).unwrap();

        assert_eq!(config.chain_id, ChainId::MeridianLocal);
        assert_eq!(config.port, 8080);
        assert_eq!(config.default_account_key_count, 1);
        assert_eq!(config.account_create_rate_limit, 0);
        assert_eq!(config.transaction_timeout, Duration::from_secs(60));
        assert!(config.api_token.is_none());
        assert!(config.script_path_create_account.is_none());
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn missing_required_variables_fail() {
        let mut env = minimal_env();
        env.remove("ADMIN_PRIVATE_KEY");
        let err = Config::from_lookup(lookup_from(&env)).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("ADMIN_PRIVATE_KEY")));
    }

    #[test]
    fn admin_address_must_match_chain() {
        let mut env = minimal_env();
        env.insert("CHAIN_ID", "meridian-testnet");
        // 0xf3... is a local-chain address
        let err = Config::from_lookup(lookup_from(&env)).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                var: "ADMIN_ADDRESS",
                ..
            }
        ));
    }

    #[test]
    fn key_count_below_one_is_rejected() {
        let mut env = minimal_env();
        env.insert("DEFAULT_ACCOUNT_KEY_COUNT", "0");
        let err = Config::from_lookup(lookup_from(&env)).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                var: "DEFAULT_ACCOUNT_KEY_COUNT",
                ..
            }
        ));
    }

    #[test]
    fn garbage_numbers_are_rejected() {
        let mut env = minimal_env();
        env.insert("PORT", "not-a-port");
        assert!(Config::from_lookup(lookup_from(&env)).is_err());
    }
}
