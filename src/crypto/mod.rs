//! Field-level encryption
//!
//! - [`codec`]: AES-256-GCM with PBKDF2 key derivation from the access code
//! - [`classifier`]: sensitive column sets and ciphertext detection
//! - [`record`]: encrypt / decrypt the sensitive columns of a whole row

pub mod classifier;
pub mod codec;
pub mod record;

pub use classifier::{is_sensitive, looks_encrypted, sensitive_fields, Ciphertext, EntityKind, FieldValue};
pub use codec::{decrypt, encrypt, CryptoError, DecryptFailure, FieldCipher, Framing, CIPHERTEXT_TAG};
pub use record::{parse_decimal, Field, Record, RecordCrypto};
