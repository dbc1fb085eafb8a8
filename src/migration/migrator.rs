//! Migrator - Core migration execution engine

use crate::executor::{StoreError, StoreExecutor};
use crate::migration::{
    calculate_checksum, initialize_state_table, validate_checksum, Migration, MigrationError,
    MigrationRecord, MigrationReport, MigrationStatus, PendingMigration, SchemaManager, STATE_TABLE,
};
use crate::transaction::Transaction;
use chrono::Utc;
use std::collections::HashSet;
use std::time::Instant;

#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;

/// Core migration execution engine
///
/// Holds the compiled-in migration list, sorted by version, and applies whatever the
/// state table does not record yet.
pub struct Migrator {
    migrations: Vec<Box<dyn Migration>>,
}

impl Migrator {
    /// Create a Migrator over `migrations`
    ///
    /// # Errors
    ///
    /// Returns `MigrationError` for non-positive or duplicate versions.
    pub fn new(mut migrations: Vec<Box<dyn Migration>>) -> Result<Self, MigrationError> {
        migrations.sort_by_key(|m| m.version());
        let mut seen = HashSet::new();
        for migration in &migrations {
            if migration.version() <= 0 {
                return Err(MigrationError::InvalidVersion(migration.version()));
            }
            if !seen.insert(migration.version()) {
                return Err(MigrationError::DuplicateVersion(migration.version()));
            }
        }
        Ok(Self { migrations })
    }

    pub fn migrations(&self) -> &[Box<dyn Migration>] {
        &self.migrations
    }

    /// Get migration status (applied vs pending)
    ///
    /// Validates the checksum of every applied migration on the way.
    pub fn status(&self, executor: &dyn StoreExecutor) -> Result<MigrationStatus, MigrationError> {
        initialize_state_table(executor)?;
        let applied = Self::query_applied_migrations(executor)?;

        let known: HashSet<i64> = self.migrations.iter().map(|m| m.version()).collect();
        if let Some(unknown) = applied.iter().find(|r| !known.contains(&r.version)) {
            return Err(MigrationError::UnknownMigration {
                version: unknown.version,
                name: unknown.name.clone(),
            });
        }

        let mut applied_records = Vec::new();
        let mut pending = Vec::new();
        for migration in &self.migrations {
            let checksum = calculate_checksum(migration.version(), migration.name());
            match applied.iter().find(|r| r.version == migration.version()) {
                Some(record) => {
                    validate_checksum(record.version, &record.name, &record.checksum, &checksum)?;
                    applied_records.push(record.clone());
                }
                None => pending.push(PendingMigration {
                    version: migration.version(),
                    name: migration.name().to_string(),
                    checksum,
                    fatal: migration.is_fatal(),
                }),
            }
        }

        Ok(MigrationStatus::new(applied_records, pending))
    }

    /// Apply pending migrations in version order
    ///
    /// Each migration runs in its own transaction with `PRAGMA foreign_keys` switched off
    /// for the duration and a `foreign_key_check` before commit. `executor` must not be
    /// inside a transaction already.
    ///
    /// # Errors
    ///
    /// Returns the first fatal failure; migrations applied before it stay applied.
    pub fn up(&self, executor: &dyn StoreExecutor) -> Result<MigrationReport, MigrationError> {
        let status = self.status(executor)?;
        let mut report = MigrationReport::default();

        for pending in &status.pending {
            let Some(migration) = self.migrations.iter().find(|m| m.version() == pending.version) else {
                continue;
            };

            #[cfg(feature = "tracing")]
            let _span = tracing_helpers::migration_span(pending.version, &pending.name).entered();

            executor.execute_batch("PRAGMA foreign_keys = OFF")?;
            let result = Self::apply(executor, migration.as_ref(), pending);
            let restored = executor.execute_batch("PRAGMA foreign_keys = ON");

            match result {
                Ok(elapsed_ms) => {
                    log::info!(
                        "Applied migration {} ({}) in {elapsed_ms} ms",
                        pending.version,
                        pending.name
                    );
                    report.applied.push((pending.version, pending.name.clone()));
                }
                Err(e) if !pending.fatal => {
                    log::warn!(
                        "Migration {} ({}) failed and was rolled back; it will be retried on next start: {e}",
                        pending.version,
                        pending.name
                    );
                    report.deferred.push((pending.version, pending.name.clone(), e.to_string()));
                }
                Err(e) => return Err(e),
            }
            restored?;
        }

        Ok(report)
    }

    fn apply(
        executor: &dyn StoreExecutor,
        migration: &dyn Migration,
        pending: &PendingMigration,
    ) -> Result<i64, MigrationError> {
        let start = Instant::now();
        let tx = Transaction::new(executor.connection()).map_err(StoreError::from)?;
        let manager = SchemaManager::new(&tx);

        migration.up(&manager).map_err(|e| MigrationError::ExecutionFailed {
            version: pending.version,
            name: pending.name.clone(),
            error: e.to_string(),
        })?;

        let violations = tx.query_all("PRAGMA foreign_key_check", &[])?;
        if !violations.is_empty() {
            return Err(MigrationError::ForeignKeyViolation {
                version: pending.version,
                name: pending.name.clone(),
                violations: violations.len(),
            });
        }

        let elapsed_ms = i64::try_from(start.elapsed().as_millis()).unwrap_or(i64::MAX);
        let record = MigrationRecord::new(
            pending.version,
            pending.name.clone(),
            pending.checksum.clone(),
            Utc::now(),
            Some(elapsed_ms),
            true,
        );
        Self::record_migration(&tx, &record)?;
        tx.commit().map_err(StoreError::from)?;
        Ok(elapsed_ms)
    }

    /// Query applied migrations from the state table
    fn query_applied_migrations(executor: &dyn StoreExecutor) -> Result<Vec<MigrationRecord>, MigrationError> {
        let sql = format!(
            "SELECT version, name, checksum, applied_at, execution_time_ms, success \
             FROM {STATE_TABLE} WHERE success = 1 ORDER BY version ASC"
        );
        let rows = executor.query_all(&sql, &[])?;
        rows.iter()
            .map(|row| MigrationRecord::from_row(row).map_err(MigrationError::Database))
            .collect()
    }

    fn record_migration(executor: &dyn StoreExecutor, record: &MigrationRecord) -> Result<(), MigrationError> {
        let sql = format!(
            "INSERT INTO {STATE_TABLE} (version, name, checksum, applied_at, execution_time_ms, success) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
        );
        executor.execute(
            &sql,
            &[
                &record.version,
                &record.name,
                &record.checksum,
                &record.applied_at_text(),
                &record.execution_time_ms,
                &record.success,
            ],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::SqliteExecutor;

    struct CreateNotes;

    impl Migration for CreateNotes {
        fn name(&self) -> &str {
            "create_notes"
        }

        fn version(&self) -> i64 {
            20240101000000
        }

        fn up(&self, manager: &SchemaManager<'_>) -> Result<(), StoreError> {
            manager.execute("CREATE TABLE IF NOT EXISTS notes (id INTEGER PRIMARY KEY, body TEXT)", &[])
        }
    }

    struct Broken {
        fatal: bool,
    }

    impl Migration for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn version(&self) -> i64 {
            20240102000000
        }

        fn up(&self, manager: &SchemaManager<'_>) -> Result<(), StoreError> {
            manager.execute("CREATE TABLE half_done (id INTEGER)", &[])?;
            manager.execute("THIS IS NOT SQL", &[])
        }

        fn is_fatal(&self) -> bool {
            self.fatal
        }
    }

    #[test]
    fn test_up_applies_once() {
        let exec = SqliteExecutor::open_in_memory().unwrap();
        let migrator = Migrator::new(vec![Box::new(CreateNotes)]).unwrap();

        let first = migrator.up(&exec).unwrap();
        assert_eq!(first.applied, vec![(20240101000000, "create_notes".to_string())]);
        let second = migrator.up(&exec).unwrap();
        assert!(second.is_noop());

        let status = migrator.status(&exec).unwrap();
        assert!(status.is_up_to_date());
        assert_eq!(status.latest_applied_version(), Some(20240101000000));
    }

    #[test]
    fn test_non_fatal_failure_is_deferred_and_rolled_back() {
        let exec = SqliteExecutor::open_in_memory().unwrap();
        let migrator = Migrator::new(vec![Box::new(CreateNotes), Box::new(Broken { fatal: false })]).unwrap();

        let report = migrator.up(&exec).unwrap();
        assert_eq!(report.applied.len(), 1);
        assert_eq!(report.deferred.len(), 1);
        let half = exec
            .query_one("SELECT COUNT(*) FROM sqlite_master WHERE name = 'half_done'", &[])
            .unwrap();
        assert_eq!(half.get_i64(0).unwrap(), 0);
        assert_eq!(migrator.status(&exec).unwrap().pending_count, 1);

        let fk = exec.query_one("PRAGMA foreign_keys", &[]).unwrap();
        assert_eq!(fk.get_i64(0).unwrap(), 1);
    }

    #[test]
    fn test_fatal_failure_is_returned() {
        let exec = SqliteExecutor::open_in_memory().unwrap();
        let migrator = Migrator::new(vec![Box::new(Broken { fatal: true })]).unwrap();
        let err = migrator.up(&exec).unwrap_err();
        assert!(matches!(err, MigrationError::ExecutionFailed { version: 20240102000000, .. }));
    }

    #[test]
    fn test_checksum_mismatch_detected() {
        let exec = SqliteExecutor::open_in_memory().unwrap();
        Migrator::new(vec![Box::new(CreateNotes)]).unwrap().up(&exec).unwrap();
        exec.execute("UPDATE schema_migrations SET checksum = 'tampered'", &[]).unwrap();
        let err = Migrator::new(vec![Box::new(CreateNotes)]).unwrap().status(&exec).unwrap_err();
        assert!(matches!(err, MigrationError::ChecksumMismatch { .. }));
    }

    #[test]
    fn test_duplicate_versions_rejected() {
        let err = Migrator::new(vec![Box::new(CreateNotes), Box::new(CreateNotes)]).err().unwrap();
        assert!(matches!(err, MigrationError::DuplicateVersion(20240101000000)));
    }
}
