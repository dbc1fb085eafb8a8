//! The single access credential.
//!
//! Only a SHA-256 hash of the access code is stored; the code itself doubles as the field
//! encryption passphrase and never touches the disk.

use sha2::{Digest, Sha256};

use crate::executor::{StoreError, StoreExecutor};

/// Lower-case hex SHA-256 of the access code
pub fn hash_access_code(code: &str) -> String {
    format!("{:x}", Sha256::digest(code.as_bytes()))
}

pub fn has_credential(executor: &dyn StoreExecutor) -> Result<bool, StoreError> {
    let row = executor.query_one("SELECT COUNT(*) FROM credentials", &[])?;
    Ok(row.get_i64(0)? > 0)
}

pub fn store_credential(executor: &dyn StoreExecutor, code: &str) -> Result<(), StoreError> {
    executor.execute(
        "INSERT INTO credentials (code_hash) VALUES (?1)",
        &[&hash_access_code(code)],
    )?;
    Ok(())
}

pub fn verify_credential(executor: &dyn StoreExecutor, code: &str) -> Result<bool, StoreError> {
    let row = executor.query_optional(
        "SELECT id FROM credentials WHERE code_hash = ?1",
        &[&hash_access_code(code)],
    )?;
    Ok(row.is_some())
}

/// Swap every stored hash for the hash of `new_code`
pub fn replace_credential(executor: &dyn StoreExecutor, new_code: &str) -> Result<(), StoreError> {
    executor.execute("DELETE FROM credentials", &[])?;
    store_credential(executor, new_code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::tests::store;

    #[test]
    fn test_hash_is_hex_sha256() {
        assert_eq!(
            hash_access_code("1234"),
            "03ac674216f3e15c761ee1a5e255f067953623c8b388b4459e13f978d7c846f4"
        );
    }

    #[test]
    fn test_store_verify_replace() {
        let (exec, _) = store();
        assert!(!has_credential(&exec).unwrap());
        store_credential(&exec, "1234").unwrap();
        assert!(has_credential(&exec).unwrap());
        assert!(verify_credential(&exec, "1234").unwrap());
        assert!(!verify_credential(&exec, "4321").unwrap());

        replace_credential(&exec, "4321").unwrap();
        assert!(verify_credential(&exec, "4321").unwrap());
        assert!(!verify_credential(&exec, "1234").unwrap());
    }
}
