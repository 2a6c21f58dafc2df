// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Harbor Systems

//! Local key manager: k256 key generation, encryption via the configured
//! [`KeyCipher`], and signing-authority selection.
//!
//! Authority selection is least-recently-used on two levels: the admin
//! proposer pool (so concurrent account creations spread across proposal
//! keys instead of colliding on one sequence number) and each account's
//! own stored keys (for the general submission path). Sequence numbers are
//! fetched from the chain at selection time.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use async_trait::async_trait;
use k256::ecdsa::signature::Signer;
use k256::ecdsa::{Signature, SigningKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::pkcs8::{DecodePrivateKey, EncodePrivateKey, LineEnding};
use k256::SecretKey;

use super::cipher::KeyCipher;
use super::{
    AccountKeyDescriptor, Authority, GeneratedKeyPair, KeyError, KeyManager, KeyRecord,
    TransactionSigner, FULL_KEY_WEIGHT, HASH_ALGO_SHA2_256, SIGN_ALGO_ECDSA_SECP256K1,
};
use crate::accounts::store::AccountStore;
use crate::chain::{Address, LedgerClient};

/// Signs with an in-memory k256 key.
struct LocalSigner {
    key: SigningKey,
}

impl TransactionSigner for LocalSigner {
    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, KeyError> {
        let signature: Signature = self.key.sign(message);
        Ok(signature.to_vec())
    }
}

/// Key manager holding the admin authorities in memory and encrypting
/// generated keys with the configured cipher backend.
pub struct LocalKeyManager {
    cipher: Arc<dyn KeyCipher>,
    store: Arc<dyn AccountStore>,
    ledger: Arc<dyn LedgerClient>,
    admin_address: Address,
    admin_secret: SecretKey,
    admin_public_key: String,
    proposal_key_count: u32,
    proposer_last_used: Mutex<HashMap<u32, Instant>>,
    account_last_used: Mutex<HashMap<(String, u32), Instant>>,
}

impl LocalKeyManager {
    pub fn new(
        cipher: Arc<dyn KeyCipher>,
        store: Arc<dyn AccountStore>,
        ledger: Arc<dyn LedgerClient>,
        admin_address: Address,
        admin_private_key_hex: &str,
        proposal_key_count: u32,
    ) -> Result<Self, KeyError> {
        let stripped = admin_private_key_hex
            .strip_prefix("0x")
            .unwrap_or(admin_private_key_hex);
        let bytes = hex::decode(stripped)
            .map_err(|e| KeyError::InvalidPrivateKey(format!("admin key is not hex: {e}")))?;
        let admin_secret = SecretKey::from_slice(&bytes)
            .map_err(|e| KeyError::InvalidPrivateKey(format!("admin key: {e}")))?;
        let admin_public_key = public_key_hex(&admin_secret);

        Ok(Self {
            cipher,
            store,
            ledger,
            admin_address,
            admin_secret,
            admin_public_key,
            proposal_key_count,
            proposer_last_used: Mutex::new(HashMap::new()),
            account_last_used: Mutex::new(HashMap::new()),
        })
    }

    pub fn admin_address(&self) -> Address {
        self.admin_address
    }

    fn admin_signer(&self) -> Arc<dyn TransactionSigner> {
        Arc::new(LocalSigner {
            key: SigningKey::from(&self.admin_secret),
        })
    }

    /// Least-recently-used proposal key index; never-used indices win,
    /// lowest first.
    fn pick_proposer_index(&self) -> Result<u32, KeyError> {
        if self.proposal_key_count == 0 {
            return Err(KeyError::NoKeysAvailable(
                "admin proposal key pool is empty".to_string(),
            ));
        }
        let mut last_used = self.proposer_last_used.lock().unwrap();
        let index = (0..self.proposal_key_count)
            .min_by_key(|i| last_used.get(i).copied())
            .unwrap_or(0);
        last_used.insert(index, Instant::now());
        Ok(index)
    }

    async fn sequence_number_of(&self, address: &Address, key_index: u32) -> Result<u64, KeyError> {
        let on_chain = self.ledger.get_account(address).await?;
        on_chain
            .keys
            .iter()
            .find(|k| k.index == key_index)
            .map(|k| k.sequence_number)
            .ok_or_else(|| {
                KeyError::NoKeysAvailable(format!("key {key_index} not on chain for {address}"))
            })
    }
}

/// `0x`-prefixed hex of the uncompressed SEC1 public key.
fn public_key_hex(secret: &SecretKey) -> String {
    let point = secret.public_key().to_encoded_point(false);
    format!("0x{}", hex::encode(point.as_bytes()))
}

#[async_trait]
impl KeyManager for LocalKeyManager {
    async fn generate(&self) -> Result<GeneratedKeyPair, KeyError> {
        let secret = SecretKey::random(&mut rand::rngs::OsRng);
        let public_key = public_key_hex(&secret);
        let pem = secret
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| KeyError::InvalidPrivateKey(e.to_string()))?;

        Ok(GeneratedKeyPair {
            descriptor: AccountKeyDescriptor {
                public_key,
                sign_algo: SIGN_ALGO_ECDSA_SECP256K1.to_string(),
                hash_algo: HASH_ALGO_SHA2_256.to_string(),
                index: 0,
                weight: FULL_KEY_WEIGHT,
            },
            private_key_pem: pem.to_string(),
        })
    }

    fn save(&self, pair: &GeneratedKeyPair) -> Result<KeyRecord, KeyError> {
        let value = self.cipher.encrypt(pair.private_key_pem.as_bytes())?;
        Ok(KeyRecord {
            account_address: String::new(),
            index: 0,
            storage_backend: self.cipher.backend_tag().to_string(),
            value,
            public_key: pair.descriptor.public_key.clone(),
            sign_algo: pair.descriptor.sign_algo.clone(),
            hash_algo: pair.descriptor.hash_algo.clone(),
        })
    }

    fn signer_for(&self, record: &KeyRecord) -> Result<Arc<dyn TransactionSigner>, KeyError> {
        if record.storage_backend != self.cipher.backend_tag() {
            return Err(KeyError::Cipher(format!(
                "storage backend {} not handled by {}",
                record.storage_backend,
                self.cipher.backend_tag()
            )));
        }

        let plaintext = self.cipher.decrypt(&record.value)?;
        let pem_str = std::str::from_utf8(&plaintext)
            .map_err(|e| KeyError::InvalidPrivateKey(format!("invalid UTF-8: {e}")))?;
        let parsed = pem::parse(pem_str)
            .map_err(|e| KeyError::InvalidPrivateKey(format!("invalid PEM: {e}")))?;
        let secret = SecretKey::from_pkcs8_der(parsed.contents())
            .map_err(|e| KeyError::InvalidPrivateKey(format!("invalid key format: {e}")))?;

        Ok(Arc::new(LocalSigner {
            key: SigningKey::from(&secret),
        }))
    }

    async fn admin_payer(&self) -> Result<Authority, KeyError> {
        Ok(Authority {
            address: self.admin_address,
            key_index: 0,
            sequence_number: 0,
            signer: self.admin_signer(),
        })
    }

    async fn admin_proposer(&self) -> Result<Authority, KeyError> {
        let key_index = self.pick_proposer_index()?;
        let sequence_number = self
            .sequence_number_of(&self.admin_address, key_index)
            .await?;

        Ok(Authority {
            address: self.admin_address,
            key_index,
            sequence_number,
            signer: self.admin_signer(),
        })
    }

    async fn account_authority(&self, address: &Address) -> Result<Authority, KeyError> {
        let mut account = self
            .store
            .account(&address.hex())
            .map_err(|e| KeyError::Store(e.to_string()))?;
        account.sort_keys_by_index();

        if account.keys.is_empty() {
            return Err(KeyError::NoKeysAvailable(format!(
                "no stored keys for {address}"
            )));
        }

        let record = {
            let mut last_used = self.account_last_used.lock().unwrap();
            let record = account
                .keys
                .iter()
                .min_by_key(|k| last_used.get(&(account.address.clone(), k.index)).copied())
                .ok_or_else(|| {
                    KeyError::NoKeysAvailable(format!("no stored keys for {address}"))
                })?;
            last_used.insert((account.address.clone(), record.index), Instant::now());
            record.clone()
        };

        let signer = self.signer_for(&record)?;
        let sequence_number = self.sequence_number_of(address, record.index).await?;

        Ok(Authority {
            address: *address,
            key_index: record.index,
            sequence_number,
            signer,
        })
    }

    fn admin_key_record(&self) -> Result<KeyRecord, KeyError> {
        let pem = self
            .admin_secret
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| KeyError::InvalidPrivateKey(e.to_string()))?;
        let value = self.cipher.encrypt(pem.as_bytes())?;

        Ok(KeyRecord {
            account_address: self.admin_address.hex(),
            index: 0,
            storage_backend: self.cipher.backend_tag().to_string(),
            value,
            public_key: self.admin_public_key.clone(),
            sign_algo: SIGN_ALGO_ECDSA_SECP256K1.to_string(),
            hash_algo: HASH_ALGO_SHA2_256.to_string(),
        })
    }
}
