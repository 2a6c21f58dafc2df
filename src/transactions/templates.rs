// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Harbor Systems

//! Ledger script templates for account and key management.
//!
//! Scripts are opaque to this service; the ledger's scripting runtime
//! interprets them. Arguments are passed positionally as JSON values.

/// Create a new account carrying the given key descriptors. The payer
/// funds the account; the ledger emits `meridian.AccountCreated` with the
/// new address.
///
/// Arguments: `[keys: [KeyDescriptor]]`
pub const CREATE_ACCOUNT: &str = r#"
transaction(keys: [KeyDescriptor]) {
    prepare(payer: auth(Create) &Account) {
        let account = Account(payer: payer)
        for key in keys {
            account.keys.add(key)
        }
    }
}
"#;

/// Add a batch of public keys (hex strings, no 0x prefix) to the signing
/// account. Used by key-count reconciliation to install all clones in one
/// transaction.
///
/// Arguments: `[publicKeys: [String]]`
pub const ADD_ACCOUNT_KEYS: &str = r#"
transaction(publicKeys: [String]) {
    prepare(signer: auth(AddKey) &Account) {
        for publicKey in publicKeys {
            signer.keys.add(publicKey.decodeHex())
        }
    }
}
"#;

/// Add a single key descriptor to the signing account.
///
/// Arguments: `[key: KeyDescriptor]`
pub const ADD_ACCOUNT_KEY: &str = r#"
transaction(key: KeyDescriptor) {
    prepare(signer: auth(AddKey) &Account) {
        signer.keys.add(key)
    }
}
"#;

/// Revoke the key at the given index on the signing account. The key stays
/// in the on-chain key list, marked revoked.
///
/// Arguments: `[keyIndex: UInt32]`
pub const REVOKE_ACCOUNT_KEY: &str = r#"
transaction(keyIndex: UInt32) {
    prepare(signer: auth(RevokeKey) &Account) {
        signer.keys.revoke(keyIndex: keyIndex)
    }
}
"#;

/// A transaction with no effect, for exercising the submission path.
#[cfg(test)]
pub const NOOP: &str = r#"
transaction {
    prepare(signer: &Account) {}
}
"#;
