//! # Steeltrack
//!
//! Field-encrypted inventory ledger for steel stock lots and their sales, kept in an
//! embedded SQLite database.
//!
//! - [`crypto`]: AES-256-GCM field cipher keyed from the access code
//! - [`migrations`]: versioned schema migrations, applied by [`Store::open`]
//! - [`repository`]: stock lots, dimensions, sales and encryption maintenance
//! - [`import`]: inventory, sales and combined CSV imports
//! - [`session`]: access-code registration, login and re-keying
//!
//! ```rust,no_run
//! use steeltrack::{import, Store, StoreConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Store::open(StoreConfig::load()?)?;
//! let session = store.login("1234")?;
//! let outcome = import::import_inventory(&session.repository(), &std::fs::read_to_string("stock.csv")?)?;
//! println!("{outcome}");
//! # Ok(())
//! # }
//! ```

pub mod balance;
pub mod config;
pub mod crypto;
pub mod error;
pub mod executor;
pub mod import;
pub mod metrics;
pub mod migration;
pub mod migrations;
pub mod model;
pub mod repository;
pub mod session;
pub mod transaction;

pub use config::StoreConfig;
pub use crypto::{CryptoError, DecryptFailure, FieldCipher};
pub use error::InventoryError;
pub use executor::{SqliteExecutor, StoreError, StoreExecutor};
pub use import::{ImportError, ImportKind, ImportOutcome};
pub use migration::{MigrationError, MigrationReport, MigrationStatus};
pub use repository::Repository;
pub use session::{Session, Store};
pub use transaction::{Transaction, TransactionError};
