//! stash-crypto: client-side wallet cryptography
//!
//! Nothing here ever talks to a server: the wallet id and key are derived from
//! the user's credentials, and every wallet section is sealed before it leaves
//! the process.
//!
//! Key hierarchy:
//! ```text
//! username + password
//!   ├── Wallet id  = scrypt(u‖p, salt = u‖p)              (N=2048, r=8, p=1, 32 bytes, hex)
//!   └── Wallet key = scrypt(id‖u‖p, salt = id‖u‖p)        (same parameters)
//!         └── Tag key (per envelope) = PBKDF2-HMAC-SHA256(key, random 128-bit salt)
//! ```
//!
//! Envelope (one per wallet section):
//! ```text
//! base64(JSON {
//!   "hash":       base64(HMAC-SHA256(base64(tag key), cipherText)),
//!   "hashSalt":   base64(tag salt),
//!   "cipherText": base64(IV ‖ AES-256-CBC/PKCS#7(JSON(value))),
//!   "cipherName": "aes"
//! })
//! ```
//!
//! The tag is verified before anything is decrypted.

pub mod cipher;
pub mod envelope;
pub mod kdf;
pub mod wallet;
pub mod worker;

pub use cipher::{AuthenticatedCipher, Pbkdf2Params};
pub use envelope::CipherName;
pub use kdf::{DerivedSecrets, KeyDerivation, ScryptParams, WalletKey};
pub use wallet::{section_digest, EncryptedWallet, Wallet, WalletOptions};
pub use worker::{Credentials, CryptoWorker, DerivationSession};

/// Size of a wallet key in bytes (AES-256)
pub const KEY_SIZE: usize = 32;

/// Size of an AES-CBC initialization vector (128-bit)
pub const IV_SIZE: usize = 16;

/// Size of the random salt used to derive each envelope's tag key (128-bit)
pub const SALT_SIZE: usize = 16;

/// Size of an AES-GCM nonce (96-bit)
pub const GCM_NONCE_SIZE: usize = 12;
