//! Store lifecycle and the authenticated session.
//!
//! A [`Store`] is an open, migrated database without a key. Registering or logging in with
//! the access code turns it into a [`Session`], which owns the field cipher for that code;
//! [`Session::logout`] hands the store back and the key material is wiped.

use crate::config::StoreConfig;
use crate::crypto::{FieldCipher, RecordCrypto};
use crate::error::InventoryError;
use crate::executor::{SqliteExecutor, StoreError, StoreExecutor};
use crate::migration::{MigrationError, MigrationReport, MigrationStatus};
use crate::migrations::{ensure_schema, migrator};
use crate::repository::credentials::{has_credential, replace_credential, store_credential, verify_credential};
use crate::repository::Repository;

pub struct Store {
    executor: SqliteExecutor,
    config: StoreConfig,
    migrations: MigrationReport,
}

impl Store {
    /// Open the database at `config.path` and bring its schema up to date
    ///
    /// # Errors
    ///
    /// Returns `InventoryError` if the file cannot be opened or a fatal migration fails.
    pub fn open(config: StoreConfig) -> Result<Self, InventoryError> {
        let executor = SqliteExecutor::open(&config.path, config.busy_timeout())?;
        Self::with_executor(executor, config)
    }

    /// Private in-memory database, migrated; `config.path` is ignored
    pub fn open_in_memory(config: StoreConfig) -> Result<Self, InventoryError> {
        Self::with_executor(SqliteExecutor::open_in_memory()?, config)
    }

    fn with_executor(executor: SqliteExecutor, config: StoreConfig) -> Result<Self, InventoryError> {
        let migrations = ensure_schema(&executor)?;
        if !migrations.applied.is_empty() {
            log::info!("Applied {} migration(s)", migrations.applied.len());
        }
        Ok(Self {
            executor,
            config,
            migrations,
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn executor(&self) -> &SqliteExecutor {
        &self.executor
    }

    /// What `open` applied or deferred
    pub fn migration_report(&self) -> &MigrationReport {
        &self.migrations
    }

    pub fn migration_status(&self) -> Result<MigrationStatus, MigrationError> {
        migrator()?.status(&self.executor)
    }

    pub fn is_registered(&self) -> Result<bool, StoreError> {
        has_credential(&self.executor)
    }

    pub fn verify_access_code(&self, code: &str) -> Result<bool, StoreError> {
        verify_credential(&self.executor, code)
    }

    /// First-time setup: store the code's hash and start a session with it
    ///
    /// # Errors
    ///
    /// `AlreadyRegistered` when a credential exists; `Crypto` for an empty code.
    pub fn register_access_code(self, code: &str) -> Result<Session, InventoryError> {
        let cipher = FieldCipher::new(code, self.config.kdf_iterations)?;
        if self.is_registered()? {
            return Err(InventoryError::AlreadyRegistered);
        }
        store_credential(&self.executor, code)?;
        log::info!("Access code registered");
        Ok(Session { store: self, cipher })
    }

    /// # Errors
    ///
    /// `NotRegistered` before setup, `InvalidAccessCode` when the hash does not match.
    pub fn login(self, code: &str) -> Result<Session, InventoryError> {
        if !self.is_registered()? {
            return Err(InventoryError::NotRegistered);
        }
        if !self.verify_access_code(code)? {
            log::warn!("Rejected login with a wrong access code");
            return Err(InventoryError::InvalidAccessCode);
        }
        let cipher = FieldCipher::new(code, self.config.kdf_iterations)?;
        Ok(Session { store: self, cipher })
    }
}

/// An unlocked store: every read and write goes through the session's cipher
pub struct Session {
    store: Store,
    cipher: FieldCipher,
}

impl Session {
    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn crypto(&self) -> RecordCrypto<'_> {
        RecordCrypto::new(&self.cipher, self.store.config.legacy_ciphertext_detection)
    }

    pub fn repository(&self) -> Repository<'_> {
        Repository::new(&self.store.executor, self.crypto())
    }

    /// Drop the key and return the locked store
    pub fn logout(self) -> Store {
        self.store
    }

    /// Re-encrypt every sensitive value under `new_code` and make it the access code.
    ///
    /// One transaction: if any stored value cannot be decrypted with the current code
    /// nothing is changed and the session keeps its current key.
    pub fn rekey(&mut self, new_code: &str) -> Result<usize, InventoryError> {
        let next = FieldCipher::new(new_code, self.store.config.kdf_iterations)?;
        let legacy = self.store.config.legacy_ciphertext_detection;

        let tx = self.store.executor.begin()?;
        let resealed = self
            .repository()
            .on(&tx)
            .reseal_all(RecordCrypto::new(&next, legacy))?;
        replace_credential(&tx, new_code)?;
        tx.commit()?;

        self.cipher = next;
        log::info!("Access code changed, {resealed} value(s) re-encrypted");
        Ok(resealed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::codec::tests::TEST_ITERATIONS;
    use crate::repository::stock_lots::tests::new_lot;

    fn config() -> StoreConfig {
        StoreConfig::default().with_kdf_iterations(TEST_ITERATIONS)
    }

    #[test]
    fn test_register_then_login() {
        let store = Store::open_in_memory(config()).unwrap();
        assert!(store.migration_status().unwrap().is_up_to_date());
        let session = store.register_access_code("1234").unwrap();
        session.repository().add_stock_lot(&new_lot("100", "500")).unwrap();

        let store = session.logout();
        let session = store.login("1234").unwrap();
        assert_eq!(session.repository().list_stock_lots().unwrap().len(), 1);
        let store = session.logout();
        assert!(matches!(
            store.register_access_code("9999"),
            Err(InventoryError::AlreadyRegistered)
        ));
    }

    #[test]
    fn test_login_checks_code() {
        let store = Store::open_in_memory(config()).unwrap();
        assert!(matches!(store.login("1234"), Err(InventoryError::NotRegistered)));

        let store = Store::open_in_memory(config()).unwrap();
        let store = store.register_access_code("1234").unwrap().logout();
        assert!(store.verify_access_code("1234").unwrap());
        assert!(matches!(store.login("0000"), Err(InventoryError::InvalidAccessCode)));
    }

    #[test]
    fn test_rekey_reencrypts_everything() {
        let store = Store::open_in_memory(config()).unwrap();
        let mut session = store.register_access_code("1234").unwrap();
        let id = session.repository().add_stock_lot(&new_lot("100", "500")).unwrap();

        let resealed = session.rekey("5678").unwrap();
        assert_eq!(resealed, 7);
        assert_eq!(session.repository().get_stock_lot(id).unwrap().serial_number, "100");

        let store = session.logout();
        assert!(matches!(store.login("1234"), Err(InventoryError::InvalidAccessCode)));
    }
}
