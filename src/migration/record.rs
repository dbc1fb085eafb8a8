//! `MigrationRecord` - Represents entries in the `schema_migrations` state table

use chrono::{DateTime, Utc};

use crate::executor::{Row, StoreError};
use crate::model::parse_timestamp;

/// Represents a migration record in the `schema_migrations` state table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationRecord {
    /// Migration version (timestamp: YYYYMMDDHHMMSS)
    pub version: i64,

    /// Human-readable migration name
    pub name: String,

    /// `SHA-256` checksum of version and name
    pub checksum: String,

    /// When the migration was applied
    pub applied_at: DateTime<Utc>,

    /// Execution time in milliseconds (`None` if not recorded)
    pub execution_time_ms: Option<i64>,

    /// Whether the migration completed successfully
    pub success: bool,
}

impl MigrationRecord {
    #[must_use]
    pub fn new(
        version: i64,
        name: String,
        checksum: String,
        applied_at: DateTime<Utc>,
        execution_time_ms: Option<i64>,
        success: bool,
    ) -> Self {
        Self {
            version,
            name,
            checksum,
            applied_at,
            execution_time_ms,
            success,
        }
    }

    /// Create a `MigrationRecord` from a database row
    ///
    /// Expected column order: `version`, `name`, `checksum`, `applied_at`, `execution_time_ms`, `success`
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the row data cannot be parsed or if timestamp parsing fails.
    pub fn from_row(row: &Row) -> Result<Self, StoreError> {
        let applied_at = parse_timestamp(&row.get_string(3)?)?.and_utc();
        let execution_time_ms = match row.get_opt_string(4) {
            Some(_) => Some(row.get_i64(4)?),
            None => None,
        };

        Ok(Self {
            version: row.get_i64(0)?,
            name: row.get_string(1)?,
            checksum: row.get_string(2)?,
            applied_at,
            execution_time_ms,
            success: row.get_bool(5)?,
        })
    }

    /// `applied_at` in the text form stored in the state table
    pub fn applied_at_text(&self) -> String {
        self.applied_at.format("%Y-%m-%d %H:%M:%S%.3f").to_string()
    }
}
