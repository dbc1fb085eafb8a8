//! Migration system
//!
//! This module provides the infrastructure for schema migrations, including:
//! - Migration trait definition
//! - SchemaManager for schema operations and table introspection
//! - Migration state tracking in `schema_migrations`
//! - Migration execution and checksum validation
//!
//! # Example
//!
//! ```rust,no_run
//! use steeltrack::migration::{Migration, Migrator, SchemaManager};
//! use steeltrack::executor::{SqliteExecutor, StoreError};
//!
//! pub struct CreateNotes;
//!
//! impl Migration for CreateNotes {
//!     fn name(&self) -> &str {
//!         "create_notes"
//!     }
//!
//!     fn version(&self) -> i64 {
//!         20240120120000
//!     }
//!
//!     fn up(&self, manager: &SchemaManager<'_>) -> Result<(), StoreError> {
//!         manager.execute("CREATE TABLE IF NOT EXISTS notes (id INTEGER PRIMARY KEY)", &[])
//!     }
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let executor = SqliteExecutor::open_in_memory()?;
//! let report = Migrator::new(vec![Box::new(CreateNotes)])?.up(&executor)?;
//! assert_eq!(report.applied.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod checksum;
pub mod error;
pub mod migration;
pub mod migrator;
pub mod record;
pub mod schema_manager;
pub mod state_table;
pub mod status;

pub use checksum::{calculate_checksum, validate_checksum};
pub use error::MigrationError;
pub use migration::Migration;
pub use migrator::Migrator;
pub use record::MigrationRecord;
pub use schema_manager::{ColumnInfo, CopyColumn, SchemaManager};
pub use state_table::{initialize_state_table, STATE_TABLE};
pub use status::{MigrationReport, MigrationStatus, PendingMigration};
