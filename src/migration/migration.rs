//! Migration trait definition

use super::schema_manager::SchemaManager;
use crate::executor::StoreError;

/// Trait that all migrations must implement
///
/// Migrations are forward-only. Every `up()` must be safe to run against a database that
/// already has the change (detect first, then alter), because databases created by older
/// releases carry parts of the schema without any migration records.
pub trait Migration: Send + Sync {
    /// Get the migration name (human-readable identifier)
    fn name(&self) -> &str;

    /// Get the migration version (timestamp: YYYYMMDDHHMMSS)
    fn version(&self) -> i64;

    /// Apply the migration
    ///
    /// Runs inside a transaction with foreign-key enforcement suspended; returning an error
    /// rolls back everything this call did.
    fn up(&self, manager: &SchemaManager<'_>) -> Result<(), StoreError>;

    /// Whether a failure stops startup
    ///
    /// A non-fatal migration that fails is rolled back, logged, left unrecorded and retried
    /// on the next run.
    fn is_fatal(&self) -> bool {
        true
    }
}
