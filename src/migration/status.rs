//! Migration status tracking

use crate::migration::MigrationRecord;

/// Migration status information
#[derive(Debug, Clone)]
pub struct MigrationStatus {
    /// Applied migrations (from database)
    pub applied: Vec<MigrationRecord>,

    /// Pending migrations (known to this build, not yet recorded)
    pub pending: Vec<PendingMigration>,

    /// Total number of migrations (applied + pending)
    pub total: usize,

    pub applied_count: usize,

    pub pending_count: usize,
}

/// Represents a pending migration (not yet applied)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMigration {
    pub version: i64,
    pub name: String,
    pub checksum: String,
    /// Failure stops startup
    pub fatal: bool,
}

impl MigrationStatus {
    #[must_use]
    pub fn new(applied: Vec<MigrationRecord>, pending: Vec<PendingMigration>) -> Self {
        let applied_count = applied.len();
        let pending_count = pending.len();
        let total = applied_count + pending_count;

        Self {
            applied,
            pending,
            total,
            applied_count,
            pending_count,
        }
    }

    /// Check if all migrations are applied
    #[must_use]
    pub fn is_up_to_date(&self) -> bool {
        self.pending_count == 0
    }

    #[must_use]
    pub fn latest_applied_version(&self) -> Option<i64> {
        self.applied.iter().map(|m| m.version).max()
    }

    #[must_use]
    pub fn next_pending_version(&self) -> Option<i64> {
        self.pending.first().map(|m| m.version)
    }
}

/// Outcome of one migrator run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// `(version, name)` of migrations applied in this run
    pub applied: Vec<(i64, String)>,
    /// Non-fatal migrations that failed and will be retried: `(version, name, error)`
    pub deferred: Vec<(i64, String, String)>,
}

impl MigrationReport {
    pub fn is_noop(&self) -> bool {
        self.applied.is_empty() && self.deferred.is_empty()
    }
}
