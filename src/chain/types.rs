// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Harbor Systems

//! Core types for the Meridian ledger: chain identifiers, addresses,
//! on-chain account state and transaction results.

use serde::{Deserialize, Serialize};

/// Event type emitted by the ledger when a new account is created.
pub const ACCOUNT_CREATED_EVENT: &str = "meridian.AccountCreated";

// =============================================================================
// Chain Identifier
// =============================================================================

/// Identifies which Meridian network the service talks to.
///
/// Addresses are chain-tagged: the first byte of an address encodes the
/// network it was generated for, so an otherwise well-formed address can be
/// rejected when it belongs to a different chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChainId {
    MeridianMainnet,
    MeridianTestnet,
    MeridianLocal,
}

impl ChainId {
    /// The address tag byte for this network.
    pub fn address_prefix(&self) -> u8 {
        match self {
            ChainId::MeridianMainnet => 0x1b,
            ChainId::MeridianTestnet => 0x6e,
            ChainId::MeridianLocal => 0xf3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChainId::MeridianMainnet => "meridian-mainnet",
            ChainId::MeridianTestnet => "meridian-testnet",
            ChainId::MeridianLocal => "meridian-local",
        }
    }
}

impl std::fmt::Display for ChainId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ChainId {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "meridian-mainnet" => Ok(ChainId::MeridianMainnet),
            "meridian-testnet" => Ok(ChainId::MeridianTestnet),
            "meridian-local" => Ok(ChainId::MeridianLocal),
            other => Err(AddressError::UnknownChain(other.to_string())),
        }
    }
}

// =============================================================================
// Address
// =============================================================================

/// Errors produced while parsing or validating addresses.
#[derive(Debug, thiserror::Error)]
pub enum AddressError {
    #[error("invalid address format: {0}")]
    InvalidFormat(String),

    #[error(r#"not a valid address for {chain}: "{address}""#)]
    WrongChain { address: String, chain: ChainId },

    #[error("unknown chain identifier: {0}")]
    UnknownChain(String),
}

/// A Meridian account address: 8 bytes, rendered as `0x` + 16 hex chars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(pub [u8; 8]);

impl Address {
    /// Parse an address from its chain-formatted string form.
    pub fn parse(s: &str) -> Result<Self, AddressError> {
        let stripped = s.strip_prefix("0x").unwrap_or(s);
        if stripped.len() != 16 {
            return Err(AddressError::InvalidFormat(s.to_string()));
        }
        let bytes =
            hex::decode(stripped).map_err(|_| AddressError::InvalidFormat(s.to_string()))?;
        let mut out = [0u8; 8];
        out.copy_from_slice(&bytes);
        Ok(Address(out))
    }

    /// Whether this address carries the given chain's tag byte.
    pub fn is_valid_for(&self, chain: ChainId) -> bool {
        self.0[0] == chain.address_prefix()
    }

    /// Chain-formatted string form (`0x` + 16 lowercase hex chars).
    pub fn hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Build an address from a chain tag and a 56-bit account ordinal.
    pub fn from_ordinal(chain: ChainId, ordinal: u64) -> Self {
        let mut bytes = [0u8; 8];
        bytes[0] = chain.address_prefix();
        bytes[1..].copy_from_slice(&ordinal.to_be_bytes()[1..]);
        Address(bytes)
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.hex())
    }
}

impl Serialize for Address {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.hex())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Address::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Parse and chain-validate an address string. Every engine operation goes
/// through this before any store or ledger lookup.
pub fn validate_address(s: &str, chain: ChainId) -> Result<Address, AddressError> {
    let address = Address::parse(s)?;
    if !address.is_valid_for(chain) {
        return Err(AddressError::WrongChain {
            address: s.to_string(),
            chain,
        });
    }
    Ok(address)
}

// =============================================================================
// On-chain account state
// =============================================================================

/// A signing key as the ledger reports it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnChainAccountKey {
    pub index: u32,
    /// Uncompressed SEC1 public key, `0x`-prefixed hex.
    pub public_key: String,
    pub sign_algo: String,
    pub hash_algo: String,
    pub sequence_number: u64,
    pub revoked: bool,
}

/// Account state as the ledger reports it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnChainAccount {
    pub address: Address,
    pub keys: Vec<OnChainAccountKey>,
}

/// Identifier of a sealed block, cited by transactions to bound validity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockId(pub String);

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Transaction results and events
// =============================================================================

/// Execution status of a submitted transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Executed,
    Sealed,
    Expired,
}

impl TransactionStatus {
    /// Whether the ledger will not change this status any further.
    pub fn is_final(&self) -> bool {
        matches!(self, TransactionStatus::Sealed | TransactionStatus::Expired)
    }
}

/// An event emitted during transaction execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub payload: serde_json::Value,
}

impl ChainEvent {
    pub fn account_created(address: &Address) -> Self {
        Self {
            event_type: ACCOUNT_CREATED_EVENT.to_string(),
            payload: serde_json::json!({ "address": address.hex() }),
        }
    }

    /// The created address, if this is an account-created event.
    pub fn created_address(&self) -> Option<Address> {
        if self.event_type != ACCOUNT_CREATED_EVENT {
            return None;
        }
        self.payload
            .get("address")
            .and_then(|v| v.as_str())
            .and_then(|s| Address::parse(s).ok())
    }
}

/// Terminal (or in-flight) result of a transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionResult {
    pub status: TransactionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default)]
    pub events: Vec<ChainEvent>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_parse_and_format_round_trip() {
        let addr = Address::parse("0x6e00000000000001").unwrap();
        assert_eq!(addr.hex(), "0x6e00000000000001");

        // Prefix is optional on input
        let bare = Address::parse("6e00000000000001").unwrap();
        assert_eq!(addr, bare);
    }

    #[test]
    fn address_rejects_malformed_input() {
        assert!(Address::parse("0x123").is_err());
        assert!(Address::parse("0xzz00000000000001").is_err());
        assert!(Address::parse("").is_err());
    }

    #[test]
    fn validate_address_checks_chain_tag() {
        let testnet_addr = Address::from_ordinal(ChainId::MeridianTestnet, 7).hex();

        assert!(validate_address(&testnet_addr, ChainId::MeridianTestnet).is_ok());
        let err = validate_address(&testnet_addr, ChainId::MeridianMainnet).unwrap_err();
        assert!(matches!(err, AddressError::WrongChain { .. }));
    }

    #[test]
    fn address_serde_as_hex_string() {
        let addr = Address::from_ordinal(ChainId::MeridianLocal, 42);
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, format!("\"{}\"", addr.hex()));

        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }

    #[test]
    fn account_created_event_round_trip() {
        let addr = Address::from_ordinal(ChainId::MeridianLocal, 9);
        let event = ChainEvent::account_created(&addr);
        assert_eq!(event.created_address(), Some(addr));

        let other = ChainEvent {
            event_type: "meridian.KeyAdded".to_string(),
            payload: serde_json::json!({ "address": addr.hex() }),
        };
        assert_eq!(other.created_address(), None);
    }

    #[test]
    fn transaction_status_finality() {
        assert!(TransactionStatus::Sealed.is_final());
        assert!(TransactionStatus::Expired.is_final());
        assert!(!TransactionStatus::Pending.is_final());
        assert!(!TransactionStatus::Executed.is_final());
    }
}
