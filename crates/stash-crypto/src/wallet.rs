//! Wallet record: three independently sealed sections plus metadata
//!
//! Sections:
//! - `mainData`: general wallet contents
//! - `recoveryData`: recovery material, tied to `recoveryId`
//! - `keychainData`: auth token and signing keys
//!
//! Each section is its own envelope under the same wallet key. The storage
//! layer also gets a SHA-1 digest of every envelope so it can spot a swapped
//! or truncated blob before anyone tries to decrypt it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha1::{Digest, Sha1};
use stash_core::{StashError, StashResult};

use crate::cipher::AuthenticatedCipher;
use crate::kdf::WalletKey;

const AUTH_TOKEN_FIELD: &str = "authToken";

/// Constructor input for [`Wallet::new`].
///
/// Omitted sections get different defaults: `main_data` and `keychain_data`
/// become an empty object, `recovery_data` becomes an empty string. Stored
/// wallets already depend on the distinction.
#[derive(Debug, Clone)]
pub struct WalletOptions {
    pub id: String,
    pub key: WalletKey,
    pub recovery_id: Option<String>,
    pub main_data: Option<Value>,
    pub keychain_data: Option<Value>,
    pub recovery_data: Option<Value>,
}

impl WalletOptions {
    pub fn new(id: impl Into<String>, key: WalletKey) -> Self {
        Self {
            id: id.into(),
            key,
            recovery_id: None,
            main_data: None,
            keychain_data: None,
            recovery_data: None,
        }
    }
}

/// A decrypted wallet, owned by the session that unlocked it.
#[derive(Clone)]
pub struct Wallet {
    pub id: String,
    key: WalletKey,
    pub recovery_id: Option<String>,
    pub main_data: Value,
    pub recovery_data: Value,
    pub keychain_data: Value,
}

impl Wallet {
    pub fn new(options: WalletOptions) -> Self {
        Self {
            id: options.id,
            key: options.key,
            recovery_id: options.recovery_id,
            main_data: options.main_data.unwrap_or_else(empty_object),
            keychain_data: options.keychain_data.unwrap_or_else(empty_object),
            recovery_data: options
                .recovery_data
                .unwrap_or_else(|| Value::String(String::new())),
        }
    }

    pub fn key(&self) -> &WalletKey {
        &self.key
    }

    /// `keychainData.authToken`, when it is a string.
    pub fn auth_token(&self) -> Option<&str> {
        auth_token_of(&self.keychain_data)
    }

    /// Open all three sections of `encrypted` with an already-derived `key`.
    ///
    /// Sections are opened in order main, recovery, keychain, and the first
    /// failure is returned as-is; there is no partially decrypted wallet.
    pub fn decrypt(
        encrypted: &EncryptedWallet,
        id: impl Into<String>,
        key: WalletKey,
        cipher: &AuthenticatedCipher,
    ) -> StashResult<Self> {
        let main_data: Value = open_section(cipher, "mainData", &encrypted.main_data, &key)?;
        let recovery_data: Value =
            open_section(cipher, "recoveryData", &encrypted.recovery_data, &key)?;
        let keychain_data: Value =
            open_section(cipher, "keychainData", &encrypted.keychain_data, &key)?;

        if let Some(lifted) = encrypted.auth_token.as_deref() {
            if auth_token_of(&keychain_data) != Some(lifted) {
                tracing::warn!("authToken outside the keychain does not match the sealed one");
                return Err(StashError::IntegrityFailure);
            }
        }

        let wallet = Self::new(WalletOptions {
            id: id.into(),
            key,
            recovery_id: encrypted.recovery_id.clone(),
            main_data: Some(main_data),
            keychain_data: Some(keychain_data),
            recovery_data: Some(recovery_data),
        });
        tracing::debug!(wallet_id = %wallet.id, "wallet decrypted");
        Ok(wallet)
    }

    /// Seal every section under the wallet key.
    ///
    /// Does not modify the wallet. Each call yields fresh ciphertexts.
    pub fn encrypt(&self, cipher: &AuthenticatedCipher) -> StashResult<EncryptedWallet> {
        let main_data = cipher.encrypt(&self.main_data, &self.key)?;
        let recovery_data = cipher.encrypt(&self.recovery_data, &self.key)?;
        let keychain_data = cipher.encrypt(&self.keychain_data, &self.key)?;

        tracing::debug!(
            wallet_id = %self.id,
            cipher = %cipher.cipher_name(),
            "wallet encrypted"
        );

        Ok(EncryptedWallet {
            id: self.id.clone(),
            auth_token: self.auth_token().map(str::to_owned),
            recovery_id: self.recovery_id.clone(),
            main_data_hash: section_digest(&main_data),
            main_data,
            keychain_data_hash: section_digest(&keychain_data),
            keychain_data,
            recovery_data_hash: section_digest(&recovery_data),
            recovery_data,
        })
    }
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("recovery_id", &self.recovery_id)
            .field("main_data", &"[REDACTED]")
            .field("recovery_data", &"[REDACTED]")
            .field("keychain_data", &"[REDACTED]")
            .finish()
    }
}

/// Wire form exchanged with the storage layer.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedWallet {
    pub id: String,
    /// Copy of `keychainData.authToken` so the server can authenticate
    /// requests without the wallet key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovery_id: Option<String>,
    pub main_data: String,
    #[serde(default)]
    pub main_data_hash: String,
    pub keychain_data: String,
    #[serde(default)]
    pub keychain_data_hash: String,
    pub recovery_data: String,
    #[serde(default)]
    pub recovery_data_hash: String,
}

impl EncryptedWallet {
    /// Check each `*Hash` against its section.
    ///
    /// Only detects corruption or substitution in transit; it is not an
    /// integrity check, since anyone can recompute a SHA-1.
    pub fn verify_hashes(&self) -> StashResult<()> {
        let sections = [
            ("mainData", &self.main_data, &self.main_data_hash),
            ("keychainData", &self.keychain_data, &self.keychain_data_hash),
            ("recoveryData", &self.recovery_data, &self.recovery_data_hash),
        ];
        for (name, data, expected) in sections {
            if !section_digest(data).eq_ignore_ascii_case(expected) {
                return Err(StashError::CorruptData(format!("{name} does not match {name}Hash")));
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for EncryptedWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptedWallet")
            .field("id", &self.id)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .field("recovery_id", &self.recovery_id)
            .field("main_data_hash", &self.main_data_hash)
            .field("keychain_data_hash", &self.keychain_data_hash)
            .field("recovery_data_hash", &self.recovery_data_hash)
            .finish_non_exhaustive()
    }
}

/// Lowercase hex SHA-1 of an encrypted section's text.
pub fn section_digest(ciphertext: &str) -> String {
    hex::encode(Sha1::digest(ciphertext.as_bytes()))
}

fn open_section(
    cipher: &AuthenticatedCipher,
    name: &str,
    blob: &str,
    key: &WalletKey,
) -> StashResult<Value> {
    cipher.decrypt(blob, key).inspect_err(|e| {
        tracing::warn!(section = name, error = %e, "wallet section failed to open");
    })
}

fn auth_token_of(keychain_data: &Value) -> Option<&str> {
    keychain_data.get(AUTH_TOKEN_FIELD).and_then(Value::as_str)
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}
