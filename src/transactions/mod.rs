// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Harbor Systems

//! Transaction building and signing for the Meridian ledger.
//!
//! A transaction carries a script, JSON arguments, a reference block, a
//! proposal key (address, key index, sequence number), a payer and a list
//! of authorizers. The proposer signs the payload, the payer signs the
//! envelope; when proposer and payer are the same key, only the envelope
//! signature is produced.

pub mod service;
pub mod templates;

pub use service::{SubmittedTransaction, TransactionsService};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::chain::{Address, BlockId};
use crate::keys::{Authority, KeyError};

/// A transaction argument. Arguments are plain JSON values; the ledger's
/// scripting runtime decodes them positionally.
pub type Argument = serde_json::Value;

/// The key a transaction cites for sequence-number ordering.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalKey {
    pub address: Address,
    pub key_index: u32,
    pub sequence_number: u64,
}

/// A signature over the payload or envelope message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionSignature {
    pub address: Address,
    pub key_index: u32,
    /// Hex-encoded ECDSA signature.
    pub signature: String,
}

/// A Meridian transaction, as built, signed and submitted by this service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub script: String,
    pub arguments: Vec<Argument>,
    pub reference_block_id: BlockId,
    pub compute_limit: u64,
    pub proposal_key: ProposalKey,
    pub payer: Address,
    pub authorizers: Vec<Address>,
    pub payload_signatures: Vec<TransactionSignature>,
    pub envelope_signatures: Vec<TransactionSignature>,
}

/// An address that signs nothing and pays for nothing; placeholder until
/// the builder sets the real parties.
const EMPTY_ADDRESS: Address = Address([0u8; 8]);

impl Transaction {
    pub fn new(script: &str, arguments: Vec<Argument>) -> Self {
        Self {
            script: script.to_string(),
            arguments,
            reference_block_id: BlockId(String::new()),
            compute_limit: 0,
            proposal_key: ProposalKey {
                address: EMPTY_ADDRESS,
                key_index: 0,
                sequence_number: 0,
            },
            payer: EMPTY_ADDRESS,
            authorizers: Vec::new(),
            payload_signatures: Vec::new(),
            envelope_signatures: Vec::new(),
        }
    }

    /// Replace the script wholesale (operator-supplied override).
    pub fn set_script(&mut self, script: String) -> &mut Self {
        self.script = script;
        self
    }

    pub fn set_reference_block(&mut self, id: BlockId) -> &mut Self {
        self.reference_block_id = id;
        self
    }

    pub fn set_compute_limit(&mut self, limit: u64) -> &mut Self {
        self.compute_limit = limit;
        self
    }

    pub fn set_proposal_key(&mut self, authority: &Authority) -> &mut Self {
        self.proposal_key = ProposalKey {
            address: authority.address,
            key_index: authority.key_index,
            sequence_number: authority.sequence_number,
        };
        self
    }

    pub fn set_payer(&mut self, payer: Address) -> &mut Self {
        self.payer = payer;
        self
    }

    pub fn add_authorizer(&mut self, authorizer: Address) -> &mut Self {
        self.authorizers.push(authorizer);
        self
    }

    /// Canonical byte encoding of the payload portion: everything a
    /// proposer commits to.
    fn payload_message(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(b"meridian/tx/payload\x00");
        out.extend_from_slice(self.script.as_bytes());
        for arg in &self.arguments {
            out.extend_from_slice(arg.to_string().as_bytes());
            out.push(0);
        }
        out.extend_from_slice(self.reference_block_id.0.as_bytes());
        out.extend_from_slice(&self.compute_limit.to_be_bytes());
        out.extend_from_slice(&self.proposal_key.address.0);
        out.extend_from_slice(&self.proposal_key.key_index.to_be_bytes());
        out.extend_from_slice(&self.proposal_key.sequence_number.to_be_bytes());
        out.extend_from_slice(&self.payer.0);
        for authorizer in &self.authorizers {
            out.extend_from_slice(&authorizer.0);
        }
        out
    }

    /// Canonical byte encoding of the envelope: the payload plus every
    /// payload signature.
    fn envelope_message(&self) -> Vec<u8> {
        let mut out = self.payload_message();
        out.extend_from_slice(b"meridian/tx/envelope\x00");
        for sig in &self.payload_signatures {
            out.extend_from_slice(&sig.address.0);
            out.extend_from_slice(&sig.key_index.to_be_bytes());
            out.extend_from_slice(sig.signature.as_bytes());
        }
        out
    }

    /// Sign the payload as the given authority (the proposer, when it is
    /// not also the payer).
    pub fn sign_payload(&mut self, authority: &Authority) -> Result<&mut Self, KeyError> {
        let signature = authority.signer.sign(&self.payload_message())?;
        self.payload_signatures.push(TransactionSignature {
            address: authority.address,
            key_index: authority.key_index,
            signature: hex::encode(signature),
        });
        Ok(self)
    }

    /// Sign the envelope as the given authority (the payer).
    pub fn sign_envelope(&mut self, authority: &Authority) -> Result<&mut Self, KeyError> {
        let signature = authority.signer.sign(&self.envelope_message())?;
        self.envelope_signatures.push(TransactionSignature {
            address: authority.address,
            key_index: authority.key_index,
            signature: hex::encode(signature),
        });
        Ok(self)
    }

    /// Transaction id: SHA-256 over the fully signed envelope.
    pub fn id(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.envelope_message());
        for sig in &self.envelope_signatures {
            hasher.update(sig.signature.as_bytes());
        }
        hex::encode(hasher.finalize())
    }
}
