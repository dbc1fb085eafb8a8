//! Checksum calculation for migrations

use crate::migration::MigrationError;
use sha2::{Digest, Sha256};

/// Calculate the SHA-256 checksum identifying a migration
///
/// Migrations are compiled in, so the identity is the version and name pair; renaming or
/// renumbering an applied migration is detected as a mismatch.
pub fn calculate_checksum(version: i64, name: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{version}:{name}").as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Validate checksum against stored value
///
/// # Errors
///
/// Returns `MigrationError::ChecksumMismatch` if the checksums differ.
pub fn validate_checksum(
    version: i64,
    name: &str,
    stored_checksum: &str,
    current_checksum: &str,
) -> Result<(), MigrationError> {
    if stored_checksum == current_checksum {
        Ok(())
    } else {
        Err(MigrationError::ChecksumMismatch {
            version,
            name: name.to_string(),
            stored: stored_checksum.to_string(),
            current: current_checksum.to_string(),
        })
    }
}
