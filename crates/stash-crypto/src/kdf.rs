//! Credential key derivation: username + password → wallet id → wallet key
//!
//! Both derivations are deterministic (the credentials double as the salt) and
//! deliberately expensive. There is no stored salt, so the same credentials
//! unlock the same wallet from any device.

use std::time::Instant;

use secrecy::{ExposeSecret, SecretString};
use stash_core::{CryptoConfig, StashError, StashResult};
use zeroize::{Zeroize, Zeroizing};

use crate::KEY_SIZE;

/// A 256-bit wallet key. Zeroized on drop to prevent secrets lingering in memory.
#[derive(Clone)]
pub struct WalletKey {
    bytes: [u8; KEY_SIZE],
}

impl WalletKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    /// Parse the hex form handed around by the UI layer.
    pub fn from_hex(hex_key: &str) -> StashResult<Self> {
        let mut decoded = Zeroizing::new(
            hex::decode(hex_key.trim())
                .map_err(|e| StashError::InvalidKey(format!("not hex: {e}")))?,
        );
        if decoded.len() != KEY_SIZE {
            return Err(StashError::InvalidKey(format!(
                "expected {KEY_SIZE} bytes, got {}",
                decoded.len()
            )));
        }

        let mut bytes = [0u8; KEY_SIZE];
        bytes.copy_from_slice(&decoded);
        decoded.zeroize();
        Ok(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }

    /// Lowercase hex, in a buffer that is wiped when dropped.
    pub fn to_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(hex::encode(self.bytes))
    }
}

impl Drop for WalletKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for WalletKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Wallet id and key derived from one set of credentials.
#[derive(Debug, Clone)]
pub struct DerivedSecrets {
    /// Lowercase hex scrypt output; safe to send to the storage layer.
    pub id: String,
    pub key: WalletKey,
}

/// Validated scrypt parameters
#[derive(Debug, Clone, Copy)]
pub struct ScryptParams {
    inner: scrypt::Params,
    log_n: u8,
    r: u32,
    p: u32,
    size: usize,
}

impl ScryptParams {
    /// `n` must be a power of two greater than one. `size` must be
    /// [`KEY_SIZE`]: the same output length feeds the AES-256 wallet key.
    pub fn new(n: u64, r: u32, p: u32, size: usize) -> StashResult<Self> {
        if n < 2 || !n.is_power_of_two() {
            return Err(StashError::Config(format!(
                "scrypt N must be a power of two greater than 1, got {n}"
            )));
        }
        if r == 0 || p == 0 {
            return Err(StashError::Config(format!(
                "scrypt r and p must be positive, got r={r} p={p}"
            )));
        }
        if size != KEY_SIZE {
            return Err(StashError::Config(format!(
                "scrypt output size must be {KEY_SIZE} bytes, got {size}"
            )));
        }

        let log_n = n.trailing_zeros() as u8;
        let inner = scrypt::Params::new(log_n, r, p, KEY_SIZE)
            .map_err(|e| StashError::Config(format!("invalid scrypt params: {e}")))?;

        Ok(Self {
            inner,
            log_n,
            r,
            p,
            size,
        })
    }

    pub fn n(&self) -> u64 {
        1u64 << self.log_n
    }

    pub fn r(&self) -> u32 {
        self.r
    }

    pub fn p(&self) -> u32 {
        self.p
    }

    pub fn size(&self) -> usize {
        self.size
    }
}

impl TryFrom<&CryptoConfig> for ScryptParams {
    type Error = StashError;

    fn try_from(config: &CryptoConfig) -> StashResult<Self> {
        Self::new(
            config.scrypt_n,
            config.scrypt_r,
            config.scrypt_p,
            config.scrypt_size,
        )
    }
}

/// Derives wallet ids and keys from credentials.
///
/// Every call costs a full scrypt run; run it off any thread that serves
/// interactive work (see [`crate::worker`]).
#[derive(Debug, Clone)]
pub struct KeyDerivation {
    params: ScryptParams,
}

impl KeyDerivation {
    pub fn new(params: ScryptParams) -> Self {
        Self { params }
    }

    pub fn from_config(config: &CryptoConfig) -> StashResult<Self> {
        Ok(Self::new(ScryptParams::try_from(config)?))
    }

    pub fn params(&self) -> &ScryptParams {
        &self.params
    }

    /// `id = hex(scrypt(username ‖ password, salt = username ‖ password))`
    ///
    /// Callers reject empty usernames and passwords before getting here.
    pub fn derive_id(&self, username: &str, password: &SecretString) -> StashResult<String> {
        let credentials = Zeroizing::new(format!("{username}{}", password.expose_secret()));
        let id = self.scrypt(&credentials)?;
        Ok(hex::encode(*id))
    }

    /// `key = scrypt(id ‖ username ‖ password, salt = id ‖ username ‖ password)`
    pub fn derive_key(
        &self,
        id: &str,
        username: &str,
        password: &SecretString,
    ) -> StashResult<WalletKey> {
        let credentials = Zeroizing::new(format!("{id}{username}{}", password.expose_secret()));
        let key = self.scrypt(&credentials)?;
        Ok(WalletKey::from_bytes(*key))
    }

    /// Run both derivations in order.
    pub fn derive(&self, username: &str, password: &SecretString) -> StashResult<DerivedSecrets> {
        let id = self.derive_id(username, password)?;
        let key = self.derive_key(&id, username, password)?;
        Ok(DerivedSecrets { id, key })
    }

    /// scrypt with the input doubling as the salt.
    fn scrypt(&self, input: &str) -> StashResult<Zeroizing<[u8; KEY_SIZE]>> {
        let started = Instant::now();
        let mut output = Zeroizing::new([0u8; KEY_SIZE]);
        scrypt::scrypt(
            input.as_bytes(),
            input.as_bytes(),
            &self.params.inner,
            output.as_mut_slice(),
        )
        .map_err(|e| StashError::Config(format!("scrypt failed: {e}")))?;

        tracing::debug!(
            n = self.params.n(),
            r = self.params.r(),
            p = self.params.p(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "scrypt derivation complete"
        );
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_kdf() -> KeyDerivation {
        // N=16 keeps unit tests quick; the real cost is covered by the integration tests
        KeyDerivation::new(ScryptParams::new(16, 8, 1, KEY_SIZE).unwrap())
    }

    fn password(s: &str) -> SecretString {
        SecretString::from(s.to_string())
    }

    #[test]
    fn test_derive_id_known_answer() {
        let id = fast_kdf()
            .derive_id("alice", &password("correct-horse"))
            .unwrap();
        assert_eq!(
            id,
            "c597bd0d8139736192739fee421447c810a543a663f700af98f3a4dbd4c0359c"
        );
    }

    #[test]
    fn test_derive_deterministic() {
        let kdf = fast_kdf();
        let a = kdf.derive("alice", &password("correct-horse")).unwrap();
        let b = kdf.derive("alice", &password("correct-horse")).unwrap();

        assert_eq!(a.id, b.id, "id must be deterministic");
        assert_eq!(a.key.as_bytes(), b.key.as_bytes(), "key must be deterministic");
    }

    #[test]
    fn test_single_character_changes_id_and_key() {
        let kdf = fast_kdf();
        let base = kdf.derive("alice", &password("correct-horse")).unwrap();
        let other_user = kdf.derive("alicf", &password("correct-horse")).unwrap();
        let other_pass = kdf.derive("alice", &password("correct-horsf")).unwrap();

        assert_ne!(base.id, other_user.id);
        assert_ne!(base.id, other_pass.id);
        assert_ne!(base.key.as_bytes(), other_user.key.as_bytes());
        assert_ne!(base.key.as_bytes(), other_pass.key.as_bytes());
    }

    #[test]
    fn test_key_chained_on_id() {
        let kdf = fast_kdf();
        let pw = password("correct-horse");
        let id = kdf.derive_id("alice", &pw).unwrap();

        let key = kdf.derive_key(&id, "alice", &pw).unwrap();
        let key_other_id = kdf.derive_key("00", "alice", &pw).unwrap();

        assert_ne!(key.as_bytes(), key_other_id.as_bytes());
        assert_ne!(id, hex::encode(key.as_bytes()), "id and key must differ");
    }

    #[test]
    fn test_id_is_lowercase_hex() {
        let id = fast_kdf().derive_id("bob", &password("hunter2")).unwrap();
        assert_eq!(id.len(), KEY_SIZE * 2);
        assert!(id.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn test_scrypt_params_validation() {
        assert!(ScryptParams::new(2048, 8, 1, 32).is_ok());
        assert!(ScryptParams::new(1000, 8, 1, 32).is_err(), "N not a power of two");
        assert!(ScryptParams::new(1, 8, 1, 32).is_err(), "N too small");
        assert!(ScryptParams::new(2048, 8, 1, 16).is_err(), "wrong output size");
        assert!(ScryptParams::new(2048, 0, 1, 32).is_err(), "r must be positive");
    }

    #[test]
    fn test_default_config_params() {
        let params = ScryptParams::try_from(&CryptoConfig::default()).unwrap();
        assert_eq!(params.n(), 2048);
        assert_eq!(params.r(), 8);
        assert_eq!(params.p(), 1);
        assert_eq!(params.size(), 32);
    }

    #[test]
    fn test_params_from_config() {
        let config = CryptoConfig {
            scrypt_n: 1024,
            ..CryptoConfig::default()
        };
        let kdf = KeyDerivation::from_config(&config).unwrap();
        assert_eq!(kdf.params().n(), 1024);

        let bad = CryptoConfig {
            scrypt_n: 3,
            ..CryptoConfig::default()
        };
        assert!(matches!(
            KeyDerivation::from_config(&bad),
            Err(StashError::Config(_))
        ));
    }

    #[test]
    fn test_wallet_key_hex_roundtrip() {
        let key = WalletKey::from_bytes([0xABu8; KEY_SIZE]);
        let parsed = WalletKey::from_hex(&key.to_hex()).unwrap();
        assert_eq!(key.as_bytes(), parsed.as_bytes());
    }

    #[test]
    fn test_wallet_key_rejects_bad_hex() {
        assert!(matches!(
            WalletKey::from_hex("zz"),
            Err(StashError::InvalidKey(_))
        ));
        assert!(matches!(
            WalletKey::from_hex("0011"),
            Err(StashError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_wallet_key_debug_redacted() {
        let key = WalletKey::from_bytes([0x42u8; KEY_SIZE]);
        let debug = format!("{key:?}");
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains("42"));
    }
}
