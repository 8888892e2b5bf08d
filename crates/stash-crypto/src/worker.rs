//! Async facade that keeps the expensive work off the caller's thread.
//!
//! scrypt and PBKDF2 run on tokio's blocking pool. A [`DerivationSession`]
//! belongs to one credential prompt: it runs at most one derivation at a time,
//! and a resubmission makes any earlier request finish with
//! [`StashError::Cancelled`] at its next checkpoint.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use stash_core::{CryptoConfig, StashError, StashResult};
use tokio::sync::Semaphore;

use crate::cipher::AuthenticatedCipher;
use crate::kdf::{DerivedSecrets, KeyDerivation, WalletKey};
use crate::wallet::{EncryptedWallet, Wallet};

/// Username and password as typed by the user. Never persisted.
#[derive(Debug)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: SecretString) -> Self {
        Self {
            username: username.into(),
            password,
        }
    }

    fn validate(&self) -> StashResult<()> {
        if self.username.is_empty() {
            return Err(StashError::InvalidCredentials("username is empty"));
        }
        if self.password.expose_secret().is_empty() {
            return Err(StashError::InvalidCredentials("password is empty"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct CryptoWorker {
    kdf: KeyDerivation,
    cipher: AuthenticatedCipher,
}

impl CryptoWorker {
    pub fn new(kdf: KeyDerivation, cipher: AuthenticatedCipher) -> Self {
        Self { kdf, cipher }
    }

    pub fn from_config(config: &CryptoConfig) -> StashResult<Self> {
        Ok(Self::new(
            KeyDerivation::from_config(config)?,
            AuthenticatedCipher::from_config(config)?,
        ))
    }

    pub fn cipher(&self) -> &AuthenticatedCipher {
        &self.cipher
    }

    /// Start a credential-entry session.
    pub fn session(&self) -> DerivationSession {
        DerivationSession {
            kdf: self.kdf.clone(),
            generation: Arc::new(AtomicU64::new(0)),
            slot: Arc::new(Semaphore::new(1)),
        }
    }

    /// Seal `wallet` on the blocking pool. The wallet is handed back unchanged.
    pub async fn encrypt_wallet(&self, wallet: Wallet) -> StashResult<(Wallet, EncryptedWallet)> {
        let cipher = self.cipher.clone();
        tokio::task::spawn_blocking(move || -> StashResult<_> {
            let encrypted = wallet.encrypt(&cipher)?;
            Ok((wallet, encrypted))
        })
        .await
        .map_err(|e| anyhow::anyhow!("wallet encryption task failed: {e}"))?
    }

    /// Open `encrypted` on the blocking pool.
    pub async fn decrypt_wallet(
        &self,
        encrypted: EncryptedWallet,
        id: String,
        key: WalletKey,
    ) -> StashResult<Wallet> {
        let cipher = self.cipher.clone();
        tokio::task::spawn_blocking(move || Wallet::decrypt(&encrypted, id, key, &cipher))
            .await
            .map_err(|e| anyhow::anyhow!("wallet decryption task failed: {e}"))?
    }
}

/// Single-flight derivation for one credential prompt.
#[derive(Debug, Clone)]
pub struct DerivationSession {
    kdf: KeyDerivation,
    /// Ticket of the most recent request; older tickets are stale.
    generation: Arc<AtomicU64>,
    /// One permit: the derivation currently running.
    slot: Arc<Semaphore>,
}

impl DerivationSession {
    /// Derive the wallet id and key for `credentials`.
    ///
    /// Supersedes any earlier call on this session that has not finished yet.
    pub async fn derive(&self, credentials: Credentials) -> StashResult<DerivedSecrets> {
        credentials.validate()?;

        let ticket = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let permit = Arc::clone(&self.slot)
            .acquire_owned()
            .await
            .map_err(|e| anyhow::anyhow!("derivation slot closed: {e}"))?;

        let generation = Arc::clone(&self.generation);
        let is_current = move || generation.load(Ordering::SeqCst) == ticket;
        if !is_current() {
            tracing::debug!(ticket, "derivation superseded before start");
            return Err(StashError::Cancelled);
        }

        let kdf = self.kdf.clone();
        tokio::task::spawn_blocking(move || -> StashResult<DerivedSecrets> {
            let _permit = permit;

            let id = kdf.derive_id(&credentials.username, &credentials.password)?;
            if !is_current() {
                tracing::debug!(ticket, "derivation superseded after id");
                return Err(StashError::Cancelled);
            }

            let key = kdf.derive_key(&id, &credentials.username, &credentials.password)?;
            if !is_current() {
                tracing::debug!(ticket, "derivation superseded after key");
                return Err(StashError::Cancelled);
            }

            Ok(DerivedSecrets { id, key })
        })
        .await
        .map_err(|e| anyhow::anyhow!("derivation task failed: {e}"))?
    }
}
