//! Cipher codec: access-code based AES-256-GCM for single text values.
//!
//! Blob layout is `salt[16] ‖ nonce[12] ‖ ciphertext‖tag`, base64 encoded. Values written by
//! this crate carry the [`CIPHERTEXT_TAG`] prefix and hold the raw UTF-8 plaintext. Untagged
//! blobs are the older layout whose payload is a JSON document (`"text"` or `500`).

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;
use thiserror::Error;
use zeroize::Zeroizing;

use crate::config::DEFAULT_KDF_ITERATIONS;

/// Prefix of every value encrypted by this crate
pub const CIPHERTEXT_TAG: &str = "stv1:";

pub const SALT_LEN: usize = 16;
pub const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;
const GCM_TAG_LEN: usize = 16;
/// Access codes are right-padded with `'0'` to this many characters before derivation
const PASSPHRASE_PAD_LEN: usize = 32;
/// Past this many cached keys the cache is emptied and starts over
const KEY_CACHE_LIMIT: usize = 4096;

/// A stored value that should be ciphertext could not be opened
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecryptFailure {
    #[error("ciphertext is not valid base64")]
    Malformed,
    #[error("ciphertext blob is {0} bytes, too short for salt, nonce and tag")]
    Undersized(usize),
    #[error("authentication failed (wrong access code or altered value)")]
    Authentication,
    #[error("decrypted payload is not readable text: {0}")]
    Payload(String),
}

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("access code must not be empty")]
    EmptyPassphrase,
    #[error("encryption failed")]
    Encryption,
    #[error(transparent)]
    Decrypt(#[from] DecryptFailure),
}

/// Layout of a blob handed to [`FieldCipher::decrypt_framed`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// `stv1:` prefix, raw UTF-8 payload
    Tagged,
    /// no prefix, JSON payload
    Legacy,
}

/// Encrypts and decrypts field values under one access code.
///
/// Keys are derived per salt with PBKDF2-HMAC-SHA256. Derived keys are cached by salt for
/// the lifetime of the cipher, so reading the same stored value twice derives only once.
pub struct FieldCipher {
    passphrase: Zeroizing<Vec<u8>>,
    iterations: u32,
    keys: Mutex<HashMap<[u8; SALT_LEN], Zeroizing<[u8; KEY_LEN]>>>,
}

impl fmt::Debug for FieldCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldCipher")
            .field("iterations", &self.iterations)
            .finish_non_exhaustive()
    }
}

impl FieldCipher {
    /// # Errors
    ///
    /// Returns `CryptoError::EmptyPassphrase` for an empty access code.
    pub fn new(access_code: &str, iterations: u32) -> Result<Self, CryptoError> {
        if access_code.is_empty() {
            return Err(CryptoError::EmptyPassphrase);
        }
        Ok(Self {
            passphrase: pad_passphrase(access_code),
            iterations: iterations.max(1),
            keys: Mutex::new(HashMap::new()),
        })
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Encrypt `plaintext` with a fresh salt and nonce, returning a tagged blob.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::Encryption` if the AEAD refuses the input.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        let mut salt = [0u8; SALT_LEN];
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut salt);
        OsRng.fill_bytes(&mut nonce);

        let key = self.key_for(&salt);
        let cipher = Aes256Gcm::new_from_slice(&key[..]).map_err(|_| CryptoError::Encryption)?;
        let sealed = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_bytes())
            .map_err(|_| CryptoError::Encryption)?;

        let mut blob = Vec::with_capacity(SALT_LEN + NONCE_LEN + sealed.len());
        blob.extend_from_slice(&salt);
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&sealed);
        Ok(format!("{CIPHERTEXT_TAG}{}", STANDARD.encode(blob)))
    }

    /// Decrypt a stored blob; the framing is taken from the presence of the tag.
    ///
    /// # Errors
    ///
    /// Returns a [`DecryptFailure`] describing why the blob could not be opened.
    pub fn decrypt(&self, stored: &str) -> Result<String, DecryptFailure> {
        match stored.strip_prefix(CIPHERTEXT_TAG) {
            Some(body) => self.decrypt_framed(body, Framing::Tagged),
            None => self.decrypt_framed(stored, Framing::Legacy),
        }
    }

    /// Decrypt a base64 body (without tag) using an explicit framing.
    ///
    /// # Errors
    ///
    /// Returns a [`DecryptFailure`] describing why the blob could not be opened.
    pub fn decrypt_framed(&self, body: &str, framing: Framing) -> Result<String, DecryptFailure> {
        let raw = STANDARD.decode(body.trim()).map_err(|_| DecryptFailure::Malformed)?;
        if raw.len() < SALT_LEN + NONCE_LEN + GCM_TAG_LEN {
            return Err(DecryptFailure::Undersized(raw.len()));
        }
        let (salt, rest) = raw.split_at(SALT_LEN);
        let (nonce, sealed) = rest.split_at(NONCE_LEN);

        let mut salt_arr = [0u8; SALT_LEN];
        salt_arr.copy_from_slice(salt);
        let key = self.key_for(&salt_arr);
        let cipher =
            Aes256Gcm::new_from_slice(&key[..]).map_err(|_| DecryptFailure::Authentication)?;
        let opened = Zeroizing::new(
            cipher
                .decrypt(Nonce::from_slice(nonce), sealed)
                .map_err(|_| DecryptFailure::Authentication)?,
        );
        let text = std::str::from_utf8(&opened).map_err(|e| DecryptFailure::Payload(e.to_string()))?;

        match framing {
            Framing::Tagged => Ok(text.to_string()),
            Framing::Legacy => legacy_payload(text),
        }
    }

    fn key_for(&self, salt: &[u8; SALT_LEN]) -> Zeroizing<[u8; KEY_LEN]> {
        let mut cache = self.keys.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(key) = cache.get(salt) {
            return key.clone();
        }
        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        pbkdf2::pbkdf2_hmac::<Sha256>(&self.passphrase, salt, self.iterations, &mut key[..]);
        if cache.len() >= KEY_CACHE_LIMIT {
            cache.clear();
        }
        cache.insert(*salt, key.clone());
        key
    }
}

/// Pad to 32 UTF-16 units with `'0'`; longer codes are used unchanged.
fn pad_passphrase(access_code: &str) -> Zeroizing<Vec<u8>> {
    let units = access_code.encode_utf16().count();
    let mut padded = Zeroizing::new(access_code.as_bytes().to_vec());
    if units < PASSPHRASE_PAD_LEN {
        padded.extend(std::iter::repeat(b'0').take(PASSPHRASE_PAD_LEN - units));
    }
    padded
}

/// Older blobs carry `JSON.stringify(value)`; strings unwrap, numbers render as text.
fn legacy_payload(text: &str) -> Result<String, DecryptFailure> {
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|e| DecryptFailure::Payload(e.to_string()))?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// One-shot encryption at the default iteration count.
///
/// Sessions hold a [`FieldCipher`] instead, which keeps derived keys around.
///
/// # Errors
///
/// Returns `CryptoError` for an empty passphrase or an AEAD failure.
pub fn encrypt(plaintext: &str, passphrase: &str) -> Result<String, CryptoError> {
    FieldCipher::new(passphrase, DEFAULT_KDF_ITERATIONS)?.encrypt(plaintext)
}

/// One-shot decryption at the default iteration count.
///
/// # Errors
///
/// Returns `CryptoError::Decrypt` when the blob cannot be opened with `passphrase`.
pub fn decrypt(blob: &str, passphrase: &str) -> Result<String, CryptoError> {
    Ok(FieldCipher::new(passphrase, DEFAULT_KDF_ITERATIONS)?.decrypt(blob)?)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const TEST_ITERATIONS: u32 = 1_000;

    pub(crate) fn cipher(code: &str) -> FieldCipher {
        FieldCipher::new(code, TEST_ITERATIONS).unwrap()
    }

    /// Build an untagged blob the way the previous application did.
    pub(crate) fn legacy_blob(code: &str, json_payload: &str) -> String {
        let fc = cipher(code);
        let mut salt = [0u8; SALT_LEN];
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut salt);
        OsRng.fill_bytes(&mut nonce);
        let key = fc.key_for(&salt);
        let sealed = Aes256Gcm::new_from_slice(&key[..])
            .unwrap()
            .encrypt(Nonce::from_slice(&nonce), json_payload.as_bytes())
            .unwrap();
        let mut blob = salt.to_vec();
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&sealed);
        STANDARD.encode(blob)
    }

    #[test]
    fn test_round_trip() {
        let fc = cipher("1234");
        for text in ["100", "Acme Co", "1.50×120", "", "ünïcödé, with comma"] {
            let blob = fc.encrypt(text).unwrap();
            assert!(blob.starts_with(CIPHERTEXT_TAG));
            assert_eq!(fc.decrypt(&blob).unwrap(), text);
        }
    }

    #[test]
    fn test_encryption_is_not_deterministic() {
        let fc = cipher("1234");
        let a = fc.encrypt("LOT-X").unwrap();
        let b = fc.encrypt("LOT-X").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_wrong_code_fails_authentication() {
        let blob = cipher("1234").encrypt("Acme Co").unwrap();
        assert_eq!(cipher("4321").decrypt(&blob), Err(DecryptFailure::Authentication));
    }

    #[test]
    fn test_malformed_and_undersized() {
        let fc = cipher("1234");
        assert_eq!(fc.decrypt("stv1:@@not base64@@"), Err(DecryptFailure::Malformed));
        let short = format!("{CIPHERTEXT_TAG}{}", STANDARD.encode([0u8; 20]));
        assert_eq!(fc.decrypt(&short), Err(DecryptFailure::Undersized(20)));
    }

    #[test]
    fn test_legacy_payload_is_json() {
        let fc = cipher("1234");
        assert_eq!(fc.decrypt(&legacy_blob("1234", "\"Acme Co\"")).unwrap(), "Acme Co");
        assert_eq!(fc.decrypt(&legacy_blob("1234", "500")).unwrap(), "500");
        assert_eq!(fc.decrypt(&legacy_blob("1234", "12.5")).unwrap(), "12.5");
        assert!(matches!(
            fc.decrypt(&legacy_blob("1234", "not json")),
            Err(DecryptFailure::Payload(_))
        ));
    }

    #[test]
    fn test_passphrase_padding() {
        assert_eq!(pad_passphrase("ab").as_slice(), b"ab000000000000000000000000000000");
        let long = "x".repeat(40);
        assert_eq!(pad_passphrase(&long).len(), 40);
    }

    #[test]
    fn test_empty_passphrase_rejected() {
        assert!(matches!(FieldCipher::new("", 10), Err(CryptoError::EmptyPassphrase)));
    }

    #[test]
    fn test_key_cache_reuses_derivation() {
        let fc = cipher("1234");
        let blob = fc.encrypt("a").unwrap();
        fc.decrypt(&blob).unwrap();
        fc.decrypt(&blob).unwrap();
        assert_eq!(fc.keys.lock().unwrap().len(), 1);
    }
}
