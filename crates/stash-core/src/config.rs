use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{StashError, StashResult};

/// Top-level configuration (loaded from stash.toml)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StashConfig {
    pub crypto: CryptoConfig,
    pub logging: LoggingConfig,
}

impl StashConfig {
    /// Parse a TOML document. Missing sections and keys fall back to defaults.
    pub fn from_toml_str(content: &str) -> StashResult<Self> {
        toml::from_str(content).map_err(|e| StashError::Config(format!("parsing config: {e}")))
    }

    /// Load configuration from `path`, using defaults when the file is absent.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .map_err(|e| anyhow::anyhow!("reading config {}: {e}", path.display()))?;
            Self::from_toml_str(&content)
                .map_err(|e| anyhow::anyhow!("config {}: {e}", path.display()))
        } else {
            tracing::warn!("config file not found: {}  (using defaults)", path.display());
            Ok(Self::default())
        }
    }
}

/// Wallet cryptography settings.
///
/// Defaults reproduce the parameters stored wallets were written with, so
/// changing any of them makes existing ids, keys or envelopes unreadable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptoConfig {
    /// scrypt CPU/memory cost N (power of two, default: 2048)
    pub scrypt_n: u64,
    /// scrypt block size r (default: 8)
    pub scrypt_r: u32,
    /// scrypt parallelization p (default: 1)
    pub scrypt_p: u32,
    /// Derived id/key length in bytes (default: 32)
    pub scrypt_size: usize,
    /// PBKDF2-HMAC-SHA256 iterations for the per-envelope tag key (default: 10000)
    pub pbkdf2_iterations: u32,
    /// Tag key length in bytes (default: 32)
    pub pbkdf2_size: usize,
    /// Cipher used for new envelopes: "aes" (CBC + HMAC) or "aes-gcm"
    pub cipher: String,
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            scrypt_n: 2048,
            scrypt_r: 8,
            scrypt_p: 1,
            scrypt_size: 32,
            pbkdf2_iterations: 10_000,
            pbkdf2_size: 32,
            cipher: "aes".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level or EnvFilter directive (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}
