//! Envelope wire format for a single encrypted value
//!
//! ```text
//! base64(JSON {"hash": .., "hashSalt": .., "cipherText": .., "cipherName": ..})
//! ```
//!
//! Stored wallets use `hash`/`hashSalt` for the tag fields; `tag`/`tagSalt`
//! are accepted on read. Only decoding happens here, never verification.

use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use stash_core::{StashError, StashResult};

/// Ciphers an envelope may name. Anything else is rejected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum CipherName {
    /// AES-256-CBC with PKCS#7 padding; integrity comes only from the envelope tag.
    #[default]
    Aes,
    /// AES-256-GCM, for new envelopes.
    AesGcm,
}

impl CipherName {
    pub fn as_str(&self) -> &'static str {
        match self {
            CipherName::Aes => "aes",
            CipherName::AesGcm => "aes-gcm",
        }
    }
}

impl fmt::Display for CipherName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CipherName {
    type Err = StashError;

    fn from_str(s: &str) -> StashResult<Self> {
        match s {
            "aes" => Ok(CipherName::Aes),
            "aes-gcm" => Ok(CipherName::AesGcm),
            other => Err(StashError::UnsupportedCipher(other.to_string())),
        }
    }
}

/// The JSON object inside the outer base64 layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Envelope {
    /// base64 HMAC-SHA256 tag
    #[serde(rename = "hash", alias = "tag")]
    pub tag: String,
    /// base64 salt for the tag key
    #[serde(rename = "hashSalt", alias = "tagSalt")]
    pub tag_salt: String,
    /// base64 of `IV ‖ ciphertext`; the tag covers this exact text
    #[serde(rename = "cipherText")]
    pub cipher_text: String,
    #[serde(rename = "cipherName")]
    pub cipher_name: String,
}

/// An envelope whose base64 fields have been decoded.
pub(crate) struct OpenedEnvelope {
    pub envelope: Envelope,
    pub tag: Vec<u8>,
    pub tag_salt: Vec<u8>,
    pub raw_cipher_text: Vec<u8>,
}

impl Envelope {
    pub fn new(tag: &[u8], tag_salt: &[u8], raw_cipher_text: &[u8], cipher: CipherName) -> Self {
        Self {
            tag: STANDARD.encode(tag),
            tag_salt: STANDARD.encode(tag_salt),
            cipher_text: STANDARD.encode(raw_cipher_text),
            cipher_name: cipher.as_str().to_string(),
        }
    }

    /// JSON, then base64 to obscure the structure.
    pub fn encode(&self) -> StashResult<String> {
        let json = serde_json::to_vec(self)?;
        Ok(STANDARD.encode(json))
    }

    /// Undo [`Envelope::encode`] and decode every binary field.
    ///
    /// Any failure is [`StashError::CorruptData`].
    pub fn open(blob: &str) -> StashResult<OpenedEnvelope> {
        let json = STANDARD
            .decode(blob.trim())
            .map_err(|e| StashError::CorruptData(format!("envelope is not base64: {e}")))?;
        let envelope: Envelope = serde_json::from_slice(&json)
            .map_err(|e| StashError::CorruptData(format!("envelope is not valid JSON: {e}")))?;

        let tag = decode_field("hash", &envelope.tag)?;
        let tag_salt = decode_field("hashSalt", &envelope.tag_salt)?;
        let raw_cipher_text = decode_field("cipherText", &envelope.cipher_text)?;

        Ok(OpenedEnvelope {
            envelope,
            tag,
            tag_salt,
            raw_cipher_text,
        })
    }
}

fn decode_field(name: &str, value: &str) -> StashResult<Vec<u8>> {
    STANDARD
        .decode(value)
        .map_err(|e| StashError::CorruptData(format!("envelope field {name} is not base64: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Envelope {
        Envelope::new(&[1u8; 32], &[2u8; 16], &[3u8; 48], CipherName::Aes)
    }

    #[test]
    fn test_cipher_name_parse() {
        assert_eq!("aes".parse::<CipherName>().unwrap(), CipherName::Aes);
        assert_eq!("aes-gcm".parse::<CipherName>().unwrap(), CipherName::AesGcm);

        let err = "twofish".parse::<CipherName>().unwrap_err();
        assert!(matches!(err, StashError::UnsupportedCipher(ref name) if name == "twofish"));
        assert!("AES".parse::<CipherName>().is_err(), "names are case-sensitive");
    }

    #[test]
    fn test_encode_uses_stored_wallet_field_names() {
        let blob = sample().encode().unwrap();
        let json = String::from_utf8(STANDARD.decode(blob).unwrap()).unwrap();

        assert!(json.starts_with(r#"{"hash":"#), "field order: {json}");
        assert!(json.contains(r#""hashSalt":"#));
        assert!(json.contains(r#""cipherText":"#));
        assert!(json.contains(r#""cipherName":"aes""#));
        assert!(!json.contains(r#""tag""#));
    }

    #[test]
    fn test_open_accepts_tag_aliases() {
        let json = r#"{"tag":"AQID","tagSalt":"BAUG","cipherText":"BwgJ","cipherName":"aes"}"#;
        let opened = Envelope::open(&STANDARD.encode(json)).unwrap();

        assert_eq!(opened.tag, vec![1, 2, 3]);
        assert_eq!(opened.tag_salt, vec![4, 5, 6]);
        assert_eq!(opened.raw_cipher_text, vec![7, 8, 9]);
        assert_eq!(opened.envelope.cipher_name, "aes");
    }

    #[test]
    fn test_open_roundtrip() {
        let envelope = sample();
        let opened = Envelope::open(&envelope.encode().unwrap()).unwrap();

        assert_eq!(opened.envelope, envelope);
        assert_eq!(opened.tag, vec![1u8; 32]);
        assert_eq!(opened.raw_cipher_text, vec![3u8; 48]);
    }

    #[test]
    fn test_open_rejects_bad_base64() {
        let err = Envelope::open("not base64!!").err().unwrap();
        assert!(err.is_corrupt_data());
    }

    #[test]
    fn test_open_rejects_non_json() {
        let err = Envelope::open(&STANDARD.encode("plain text")).err().unwrap();
        assert!(err.is_corrupt_data());
    }

    #[test]
    fn test_open_rejects_missing_field() {
        let json = r#"{"hash":"AQID","cipherText":"BwgJ","cipherName":"aes"}"#;
        let err = Envelope::open(&STANDARD.encode(json)).err().unwrap();
        assert!(err.is_corrupt_data());
    }

    #[test]
    fn test_open_rejects_bad_inner_base64() {
        let json = r#"{"hash":"AQID","hashSalt":"BAUG","cipherText":"%%%%","cipherName":"aes"}"#;
        let err = Envelope::open(&STANDARD.encode(json)).err().unwrap();
        assert!(err.is_corrupt_data());
    }
}
