//! Migration-specific error types

use crate::executor::StoreError;

/// Migration-specific errors
#[derive(Debug)]
pub enum MigrationError {
    /// Database execution error
    Database(StoreError),
    /// Checksum mismatch
    ChecksumMismatch {
        version: i64,
        name: String,
        stored: String,
        current: String,
    },
    /// Migration failed during execution
    ExecutionFailed {
        version: i64,
        name: String,
        error: String,
    },
    /// Rows left pointing at missing parents after a migration
    ForeignKeyViolation {
        version: i64,
        name: String,
        violations: usize,
    },
    /// Invalid migration version
    InvalidVersion(i64),
    /// Two migrations share a version
    DuplicateVersion(i64),
    /// Applied migration that this build does not know about
    UnknownMigration { version: i64, name: String },
}

impl std::fmt::Display for MigrationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MigrationError::Database(e) => write!(f, "Database error: {e}"),
            MigrationError::ChecksumMismatch {
                version,
                name,
                stored,
                current,
            } => {
                write!(
                    f,
                    "Migration '{name}' (version {version}) has been modified after being applied.\n\
                     Stored checksum: {stored}\n\
                     Current checksum: {current}"
                )
            }
            MigrationError::ExecutionFailed { version, name, error } => {
                write!(f, "Migration '{name}' (version {version}) failed during execution: {error}")
            }
            MigrationError::ForeignKeyViolation {
                version,
                name,
                violations,
            } => {
                write!(
                    f,
                    "Migration '{name}' (version {version}) left {violations} row(s) with a missing parent"
                )
            }
            MigrationError::InvalidVersion(version) => {
                write!(f, "Invalid migration version: {version}")
            }
            MigrationError::DuplicateVersion(version) => {
                write!(f, "More than one migration uses version {version}")
            }
            MigrationError::UnknownMigration { version, name } => {
                write!(
                    f,
                    "Applied migration '{name}' (version {version}) is not known to this build.\n\
                     Suggestion: the database was upgraded by a newer release"
                )
            }
        }
    }
}

impl std::error::Error for MigrationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MigrationError::Database(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StoreError> for MigrationError {
    fn from(error: StoreError) -> Self {
        MigrationError::Database(error)
    }
}
