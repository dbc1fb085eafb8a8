//! Migration state table management

use crate::executor::{StoreError, StoreExecutor};
use sea_query::{Alias, ColumnDef, Index, IndexCreateStatement, Table, TableCreateStatement};

/// Name of the table recording applied migrations
pub const STATE_TABLE: &str = "schema_migrations";

/// Create the `schema_migrations` state tracking table
///
/// This table stores metadata about applied migrations, including:
/// - Version (timestamp)
/// - Name (human-readable)
/// - Checksum (SHA-256 of version and name)
/// - Applied timestamp
/// - Execution time
/// - Success status
pub fn create_state_table() -> TableCreateStatement {
    Table::create()
        .table(Alias::new(STATE_TABLE))
        .if_not_exists()
        .col(ColumnDef::new(Alias::new("version")).big_integer().not_null().primary_key())
        .col(ColumnDef::new(Alias::new("name")).text().not_null())
        .col(ColumnDef::new(Alias::new("checksum")).text().not_null())
        .col(ColumnDef::new(Alias::new("applied_at")).text().not_null())
        .col(ColumnDef::new(Alias::new("execution_time_ms")).integer().null())
        .col(ColumnDef::new(Alias::new("success")).integer().not_null().default(1))
        .to_owned()
}

/// Create index on `applied_at` for faster queries
pub fn create_state_table_index() -> IndexCreateStatement {
    Index::create()
        .if_not_exists()
        .name("idx_schema_migrations_applied_at")
        .table(Alias::new(STATE_TABLE))
        .col(Alias::new("applied_at"))
        .to_owned()
}

/// Initialize the migration state table
///
/// Creates the `schema_migrations` table and its index if they don't exist.
pub fn initialize_state_table(executor: &dyn StoreExecutor) -> Result<(), StoreError> {
    let manager = super::SchemaManager::new(executor);
    manager.create_table(create_state_table())?;
    manager.create_index(create_state_table_index())?;
    Ok(())
}
