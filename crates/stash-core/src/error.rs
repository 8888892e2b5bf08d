use thiserror::Error;

pub type StashResult<T> = Result<T, StashError>;

/// Every variant is terminal for the call that raised it: callers treat any of
/// them as "cannot unlock this wallet" and never retry or fall back.
#[derive(Debug, Error)]
pub enum StashError {
    /// The envelope could not be decoded, so verification was never attempted.
    #[error("data corrupt: {0}")]
    CorruptData(String),

    /// Tag mismatch: ciphertext or tag altered, or the wrong key was used.
    #[error("message integrity check failed")]
    IntegrityFailure,

    #[error("unsupported cipher: {0:?}")]
    UnsupportedCipher(String),

    #[error("invalid wallet key: {0}")]
    InvalidKey(String),

    #[error("invalid credentials: {0}")]
    InvalidCredentials(&'static str),

    #[error("config error: {0}")]
    Config(String),

    /// A newer derivation was submitted in the same session.
    #[error("derivation superseded by a newer request")]
    Cancelled,

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StashError {
    pub fn is_integrity_failure(&self) -> bool {
        matches!(self, StashError::IntegrityFailure)
    }

    pub fn is_corrupt_data(&self) -> bool {
        matches!(self, StashError::CorruptData(_))
    }
}
