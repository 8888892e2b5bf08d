//! Authenticated encryption of arbitrary serializable values
//!
//! Encrypt-then-MAC: the value is serialized to JSON and encrypted under the
//! wallet key with a fresh random IV; a fresh random salt derives a per-envelope
//! tag key via PBKDF2, and HMAC-SHA256 over the base64 `cipherText` text
//! authenticates it. Decryption verifies the tag before touching the
//! ciphertext.
//!
//! The tag key enters HMAC as its base64 text rather than raw bytes. Existing
//! wallets were sealed that way, so it stays.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::{de::DeserializeOwned, Serialize};
use sha2::Sha256;
use stash_core::{CryptoConfig, StashError, StashResult};
use zeroize::Zeroizing;

use crate::envelope::{CipherName, Envelope};
use crate::kdf::WalletKey;
use crate::{GCM_NONCE_SIZE, IV_SIZE, SALT_SIZE};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;
type HmacSha256 = Hmac<Sha256>;

const AES_BLOCK_SIZE: usize = 16;

/// PBKDF2-HMAC-SHA256 parameters for the per-envelope tag key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pbkdf2Params {
    iterations: u32,
    size: usize,
}

impl Pbkdf2Params {
    pub fn new(iterations: u32, size: usize) -> StashResult<Self> {
        if iterations == 0 {
            return Err(StashError::Config(
                "PBKDF2 iterations must be at least 1".into(),
            ));
        }
        if !(16..=64).contains(&size) {
            return Err(StashError::Config(format!(
                "PBKDF2 tag key size must be 16..=64 bytes, got {size}"
            )));
        }
        Ok(Self { iterations, size })
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    pub fn size(&self) -> usize {
        self.size
    }
}

impl Default for Pbkdf2Params {
    /// 10 000 iterations, 32 bytes: what every stored envelope was tagged with.
    fn default() -> Self {
        Self {
            iterations: 10_000,
            size: 32,
        }
    }
}

/// Seals values into envelopes and opens them again.
#[derive(Debug, Clone, Default)]
pub struct AuthenticatedCipher {
    tag_params: Pbkdf2Params,
    cipher: CipherName,
}

impl AuthenticatedCipher {
    /// `cipher` is used for new envelopes only; decryption follows each
    /// envelope's own `cipherName`.
    pub fn new(tag_params: Pbkdf2Params, cipher: CipherName) -> Self {
        Self { tag_params, cipher }
    }

    pub fn from_config(config: &CryptoConfig) -> StashResult<Self> {
        let tag_params = Pbkdf2Params::new(config.pbkdf2_iterations, config.pbkdf2_size)?;
        let cipher = config.cipher.parse()?;
        Ok(Self::new(tag_params, cipher))
    }

    pub fn cipher_name(&self) -> CipherName {
        self.cipher
    }

    pub fn tag_params(&self) -> &Pbkdf2Params {
        &self.tag_params
    }

    /// Serialize `value` to JSON and seal it. Returns the base64 envelope.
    ///
    /// Never deterministic: every call draws a fresh IV (or nonce) and tag salt.
    pub fn encrypt<T>(&self, value: &T, key: &WalletKey) -> StashResult<String>
    where
        T: Serialize + ?Sized,
    {
        let plaintext = Zeroizing::new(serde_json::to_vec(value)?);

        let raw_cipher_text = match self.cipher {
            CipherName::Aes => cbc_encrypt(key, &plaintext)?,
            CipherName::AesGcm => gcm_encrypt(key, &plaintext)?,
        };
        let cipher_text = STANDARD.encode(&raw_cipher_text);

        let mut tag_salt = [0u8; SALT_SIZE];
        rand::thread_rng().fill_bytes(&mut tag_salt);
        let tag = self
            .tag_mac(key, &tag_salt, &cipher_text)?
            .finalize()
            .into_bytes();

        tracing::trace!(
            cipher = %self.cipher,
            plaintext_len = plaintext.len(),
            cipher_text_len = raw_cipher_text.len(),
            "sealed envelope"
        );

        Envelope::new(&tag, &tag_salt, &raw_cipher_text, self.cipher).encode()
    }

    /// Open an envelope produced by [`AuthenticatedCipher::encrypt`].
    ///
    /// - undecodable envelope → [`StashError::CorruptData`]
    /// - tag mismatch → [`StashError::IntegrityFailure`], nothing is decrypted
    /// - unknown `cipherName` → [`StashError::UnsupportedCipher`]
    pub fn decrypt<T: DeserializeOwned>(&self, blob: &str, key: &WalletKey) -> StashResult<T> {
        let opened = Envelope::open(blob)?;

        self.tag_mac(key, &opened.tag_salt, &opened.envelope.cipher_text)?
            .verify_slice(&opened.tag)
            .map_err(|_| {
                tracing::warn!("envelope tag mismatch: data altered or wrong key");
                StashError::IntegrityFailure
            })?;

        let cipher: CipherName = opened.envelope.cipher_name.parse()?;
        let plaintext = match cipher {
            CipherName::Aes => cbc_decrypt(key, &opened.raw_cipher_text)?,
            CipherName::AesGcm => gcm_decrypt(key, &opened.raw_cipher_text)?,
        };

        serde_json::from_slice(&plaintext).map_err(|e| {
            StashError::CorruptData(format!("decrypted payload is not valid JSON: {e}"))
        })
    }

    /// HMAC keyed with base64(PBKDF2(key, salt)), already fed `cipher_text`.
    fn tag_mac(
        &self,
        key: &WalletKey,
        salt: &[u8],
        cipher_text: &str,
    ) -> StashResult<HmacSha256> {
        let mut tag_key = Zeroizing::new(vec![0u8; self.tag_params.size]);
        pbkdf2::pbkdf2_hmac::<Sha256>(
            key.as_bytes(),
            salt,
            self.tag_params.iterations,
            &mut tag_key,
        );
        let tag_key_text = Zeroizing::new(STANDARD.encode(tag_key.as_slice()));

        let mut mac = <HmacSha256 as Mac>::new_from_slice(tag_key_text.as_bytes())
            .map_err(|e| anyhow::anyhow!("HMAC init failed: {e}"))?;
        mac.update(cipher_text.as_bytes());
        Ok(mac)
    }
}

/// Returns `[16-byte IV][AES-256-CBC ciphertext]`.
fn cbc_encrypt(key: &WalletKey, plaintext: &[u8]) -> StashResult<Vec<u8>> {
    let mut iv = [0u8; IV_SIZE];
    rand::thread_rng().fill_bytes(&mut iv);

    let encryptor = Aes256CbcEnc::new_from_slices(key.as_bytes(), &iv)
        .map_err(|e| anyhow::anyhow!("AES-CBC init failed: {e}"))?;
    let ciphertext = encryptor.encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    let mut result = Vec::with_capacity(IV_SIZE + ciphertext.len());
    result.extend_from_slice(&iv);
    result.extend_from_slice(&ciphertext);
    Ok(result)
}

fn cbc_decrypt(key: &WalletKey, raw: &[u8]) -> StashResult<Zeroizing<Vec<u8>>> {
    if raw.len() < IV_SIZE + AES_BLOCK_SIZE || (raw.len() - IV_SIZE) % AES_BLOCK_SIZE != 0 {
        return Err(StashError::CorruptData(format!(
            "AES-CBC cipher text has invalid length {}",
            raw.len()
        )));
    }

    let (iv, ciphertext) = raw.split_at(IV_SIZE);
    let decryptor = Aes256CbcDec::new_from_slices(key.as_bytes(), iv)
        .map_err(|e| anyhow::anyhow!("AES-CBC init failed: {e}"))?;
    decryptor
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map(Zeroizing::new)
        .map_err(|_| StashError::CorruptData("AES-CBC padding is invalid".into()))
}

/// Returns `[12-byte nonce][AES-256-GCM ciphertext + 16-byte tag]`.
fn gcm_encrypt(key: &WalletKey, plaintext: &[u8]) -> StashResult<Vec<u8>> {
    let cipher = Aes256Gcm::new(key.as_bytes().into());

    let mut nonce_bytes = [0u8; GCM_NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| anyhow::anyhow!("AES-GCM encryption failed: {e}"))?;

    let mut result = Vec::with_capacity(GCM_NONCE_SIZE + ciphertext.len());
    result.extend_from_slice(&nonce_bytes);
    result.extend_from_slice(&ciphertext);
    Ok(result)
}

fn gcm_decrypt(key: &WalletKey, raw: &[u8]) -> StashResult<Zeroizing<Vec<u8>>> {
    if raw.len() < GCM_NONCE_SIZE + 16 {
        return Err(StashError::CorruptData(format!(
            "AES-GCM cipher text too short: {} bytes",
            raw.len()
        )));
    }

    let (nonce_bytes, ciphertext) = raw.split_at(GCM_NONCE_SIZE);
    let cipher = Aes256Gcm::new(key.as_bytes().into());
    cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map(Zeroizing::new)
        .map_err(|_| StashError::IntegrityFailure)
}
