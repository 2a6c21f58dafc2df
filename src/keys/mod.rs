// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Harbor Systems

//! Key management: encrypted key records, signing authorities and the
//! [`KeyManager`] seam.
//!
//! ## Security
//!
//! - Private keys are PKCS#8 PEM, encrypted at rest by a pluggable
//!   [`KeyCipher`](cipher::KeyCipher) backend
//! - Encrypted material travels as base64 in JSON
//! - Key records returned over the API always have `value` zeroed

pub mod cipher;
pub mod manager;

use std::sync::Arc;

use k256::ecdsa::VerifyingKey;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::chain::{Address, LedgerError};

/// Signature algorithm tag for keys this service generates.
pub const SIGN_ALGO_ECDSA_SECP256K1: &str = "ECDSA_secp256k1";

/// Hash algorithm tag for keys this service generates.
pub const HASH_ALGO_SHA2_256: &str = "SHA2_256";

/// Full signing weight for a single account key.
pub const FULL_KEY_WEIGHT: u32 = 1000;

/// Errors from key generation, encryption and authority selection.
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("malformed public key: {0}")]
    MalformedPublicKey(String),

    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("key cipher error: {0}")]
    Cipher(String),

    #[error("no signing keys available: {0}")]
    NoKeysAvailable(String),

    #[error("signing failed: {0}")]
    Signing(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("key store error: {0}")]
    Store(String),
}

// =============================================================================
// Key Record
// =============================================================================

/// Base64 (de)serialization for encrypted key bytes.
pub mod base64_bytes {
    use base64ct::{Base64, Encoding};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&Base64::encode_string(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        Base64::decode_vec(&s).map_err(serde::de::Error::custom)
    }
}

/// A stored account signing key. Only currently-valid keys are ever
/// persisted; revocation deletes the record outright.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct KeyRecord {
    /// Address of the account this key belongs to.
    pub account_address: String,
    /// Positional key index, unique per account.
    pub index: u32,
    /// Which encryption backend produced `value`.
    pub storage_backend: String,
    /// Encrypted private-key material (base64 on the wire).
    #[serde(with = "base64_bytes")]
    #[schema(value_type = String)]
    pub value: Vec<u8>,
    /// Uncompressed SEC1 public key, `0x`-prefixed hex.
    pub public_key: String,
    pub sign_algo: String,
    pub hash_algo: String,
}

impl KeyRecord {
    /// Blank out the encrypted private material. API responses must never
    /// carry it, even in encrypted form.
    pub fn zero_value(&mut self) {
        self.value = Vec::new();
    }
}

/// Decode a `0x`-prefixed hex public key into a verifying key, checking
/// both the hex encoding and the curve point.
pub fn decode_public_key(public_key: &str, sign_algo: &str) -> Result<VerifyingKey, KeyError> {
    if sign_algo != SIGN_ALGO_ECDSA_SECP256K1 {
        return Err(KeyError::MalformedPublicKey(format!(
            "unsupported signature algorithm: {sign_algo}"
        )));
    }
    let stripped = public_key.strip_prefix("0x").unwrap_or(public_key);
    let bytes = hex::decode(stripped)
        .map_err(|e| KeyError::MalformedPublicKey(format!("{public_key}: {e}")))?;
    VerifyingKey::from_sec1_bytes(&bytes)
        .map_err(|e| KeyError::MalformedPublicKey(format!("{public_key}: {e}")))
}

// =============================================================================
// Key descriptors and generated pairs
// =============================================================================

/// Public description of an account key, as ledger transactions carry it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountKeyDescriptor {
    #[serde(rename = "publicKey")]
    pub public_key: String,
    #[serde(rename = "signAlgo")]
    pub sign_algo: String,
    #[serde(rename = "hashAlgo")]
    pub hash_algo: String,
    pub index: u32,
    pub weight: u32,
}

/// A freshly generated key pair: the public descriptor plus the PEM-encoded
/// private key, which exists in plaintext only until [`KeyManager::save`]
/// encrypts it.
pub struct GeneratedKeyPair {
    pub descriptor: AccountKeyDescriptor,
    pub private_key_pem: String,
}

// =============================================================================
// Signing authorities
// =============================================================================

/// Signs transaction payload/envelope messages.
pub trait TransactionSigner: Send + Sync {
    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, KeyError>;
}

/// A signing identity bound to a concrete account key: used to propose
/// (sequence number), pay, or authorize a transaction.
#[derive(Clone)]
pub struct Authority {
    pub address: Address,
    pub key_index: u32,
    pub sequence_number: u64,
    pub signer: Arc<dyn TransactionSigner>,
}

impl Authority {
    /// Whether two authorities denote the same on-chain key. A transaction
    /// whose proposer and payer coincide is signed once, on the envelope.
    pub fn is_same(&self, other: &Authority) -> bool {
        self.address == other.address && self.key_index == other.key_index
    }
}

impl std::fmt::Debug for Authority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authority")
            .field("address", &self.address)
            .field("key_index", &self.key_index)
            .field("sequence_number", &self.sequence_number)
            .finish()
    }
}

// =============================================================================
// Key Manager
// =============================================================================

/// Key generation, encryption and signing-authority selection.
///
/// The admin pool supplies a payer authority and proposer authorities for
/// account creation; per-account authorities drive the general transaction
/// submission path.
#[async_trait::async_trait]
pub trait KeyManager: Send + Sync {
    /// Generate a fresh key pair with the service's default algorithms.
    async fn generate(&self) -> Result<GeneratedKeyPair, KeyError>;

    /// Encrypt a generated private key into a storable record. The caller
    /// assigns `account_address` and `index` before persisting.
    fn save(&self, pair: &GeneratedKeyPair) -> Result<KeyRecord, KeyError>;

    /// Reconstruct a signer from a stored (encrypted) key record.
    fn signer_for(&self, record: &KeyRecord) -> Result<Arc<dyn TransactionSigner>, KeyError>;

    /// The admin authority that pays transaction fees.
    async fn admin_payer(&self) -> Result<Authority, KeyError>;

    /// A proposer authority from the admin pool, selected least-recently-
    /// used, with its current on-chain sequence number.
    async fn admin_proposer(&self) -> Result<Authority, KeyError>;

    /// A signing authority for the given account, selected least-recently-
    /// used among its stored keys.
    ///
    /// The LRU policy is blind to what the transaction does: a key about to
    /// be revoked stays eligible and can end up signing its own revocation.
    async fn account_authority(&self, address: &Address) -> Result<Authority, KeyError>;

    /// The admin account's own stored key record (for bootstrapping the
    /// account store).
    fn admin_key_record(&self) -> Result<KeyRecord, KeyError>;
}
