//! Transaction Module
//!
//! Provides transaction support on top of a borrowed SQLite connection:
//! - `Transaction` implements [`StoreExecutor`], so repositories run unchanged inside one
//! - Nested transactions through savepoints
//! - Commit / rollback, with rollback on drop for anything left open

use crate::executor::{StoreError, StoreExecutor};
use rusqlite::Connection;
use std::fmt;

#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;

/// Transaction error type
#[derive(Debug)]
pub enum TransactionError {
    /// SQLite error from `rusqlite`
    Sqlite(rusqlite::Error),
    /// Transaction already committed or rolled back
    TransactionClosed,
    /// Other transaction errors
    Other(String),
}

impl fmt::Display for TransactionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionError::Sqlite(e) => write!(f, "SQLite error: {e}"),
            TransactionError::TransactionClosed => {
                write!(f, "Transaction has already been committed or rolled back")
            }
            TransactionError::Other(s) => write!(f, "Transaction error: {s}"),
        }
    }
}

impl std::error::Error for TransactionError {}

impl From<rusqlite::Error> for TransactionError {
    fn from(err: rusqlite::Error) -> Self {
        TransactionError::Sqlite(err)
    }
}

impl From<TransactionError> for StoreError {
    fn from(err: TransactionError) -> Self {
        match err {
            TransactionError::Sqlite(e) => StoreError::Sqlite(e),
            TransactionError::TransactionClosed => StoreError::Other("Transaction closed".to_string()),
            TransactionError::Other(s) => StoreError::Other(s),
        }
    }
}

/// A database transaction
///
/// Depth 0 is a real `BEGIN`; deeper levels are savepoints named `sp_<depth>`. Dropping an
/// open transaction rolls it back, so an early `?` return never leaves half-written rows.
///
/// ```no_run
/// use steeltrack::executor::{SqliteExecutor, StoreExecutor, StoreError};
///
/// # fn main() -> Result<(), StoreError> {
/// let executor = SqliteExecutor::open_in_memory()?;
/// let tx = executor.begin()?;
/// tx.execute("CREATE TABLE t (id INTEGER PRIMARY KEY)", &[])?;
/// tx.commit()?;
/// # Ok(())
/// # }
/// ```
pub struct Transaction<'conn> {
    conn: &'conn Connection,
    depth: u32,
    closed: bool,
}

impl<'conn> Transaction<'conn> {
    pub(crate) fn new(conn: &'conn Connection) -> Result<Self, TransactionError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::begin_transaction_span(0).entered();

        conn.execute_batch("BEGIN")?;
        Ok(Self {
            conn,
            depth: 0,
            closed: false,
        })
    }

    /// Start a nested transaction (savepoint)
    ///
    /// The nested transaction can be rolled back on its own while the outer one stays open.
    ///
    /// # Errors
    ///
    /// Returns `TransactionError::TransactionClosed` if this transaction is already finished.
    pub fn begin_nested(&self) -> Result<Transaction<'conn>, TransactionError> {
        if self.closed {
            return Err(TransactionError::TransactionClosed);
        }
        let depth = self.depth + 1;
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::begin_transaction_span(depth).entered();

        self.conn.execute_batch(&format!("SAVEPOINT sp_{depth}"))?;
        Ok(Transaction {
            conn: self.conn,
            depth,
            closed: false,
        })
    }

    /// Commit the transaction (or release the savepoint)
    ///
    /// # Errors
    ///
    /// Returns `TransactionError` if the commit fails or the transaction is already closed.
    pub fn commit(mut self) -> Result<(), TransactionError> {
        if self.closed {
            return Err(TransactionError::TransactionClosed);
        }
        let sql = if self.depth == 0 {
            "COMMIT".to_string()
        } else {
            format!("RELEASE SAVEPOINT sp_{}", self.depth)
        };
        self.conn.execute_batch(&sql)?;
        self.closed = true;
        Ok(())
    }

    /// Roll back the transaction (or back to the savepoint)
    ///
    /// # Errors
    ///
    /// Returns `TransactionError` if the rollback fails or the transaction is already closed.
    pub fn rollback(mut self) -> Result<(), TransactionError> {
        if self.closed {
            return Err(TransactionError::TransactionClosed);
        }
        self.closed = true;
        self.rollback_inner()
    }

    fn rollback_inner(&self) -> Result<(), TransactionError> {
        let sql = if self.depth == 0 {
            "ROLLBACK".to_string()
        } else {
            // ROLLBACK TO keeps the savepoint on the stack, so release it afterwards.
            format!("ROLLBACK TO SAVEPOINT sp_{0}; RELEASE SAVEPOINT sp_{0}", self.depth)
        };
        self.conn.execute_batch(&sql)?;
        Ok(())
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl StoreExecutor for Transaction<'_> {
    fn connection(&self) -> &Connection {
        self.conn
    }

    fn transaction(&self) -> Result<Transaction<'_>, TransactionError> {
        self.begin_nested()
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(e) = self.rollback_inner() {
                log::warn!("Rollback of abandoned transaction (depth {}) failed: {e}", self.depth);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::executor::{SqliteExecutor, StoreExecutor};

    fn executor() -> SqliteExecutor {
        let exec = SqliteExecutor::open_in_memory().unwrap();
        exec.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT)").unwrap();
        exec
    }

    fn count(exec: &dyn StoreExecutor) -> i64 {
        exec.query_one("SELECT COUNT(*) FROM t", &[]).unwrap().get_i64(0).unwrap()
    }

    #[test]
    fn test_commit_persists() {
        let exec = executor();
        let tx = exec.begin().unwrap();
        tx.execute("INSERT INTO t (name) VALUES ('a')", &[]).unwrap();
        tx.commit().unwrap();
        assert_eq!(count(&exec), 1);
    }

    #[test]
    fn test_drop_rolls_back() {
        let exec = executor();
        {
            let tx = exec.begin().unwrap();
            tx.execute("INSERT INTO t (name) VALUES ('a')", &[]).unwrap();
        }
        assert_eq!(count(&exec), 0);
    }

    #[test]
    fn test_nested_rollback_keeps_outer() {
        let exec = executor();
        let tx = exec.begin().unwrap();
        tx.execute("INSERT INTO t (name) VALUES ('outer')", &[]).unwrap();

        let nested = tx.begin_nested().unwrap();
        assert_eq!(nested.depth(), 1);
        nested.execute("INSERT INTO t (name) VALUES ('inner')", &[]).unwrap();
        nested.rollback().unwrap();

        tx.commit().unwrap();
        assert_eq!(count(&exec), 1);
    }

    #[test]
    fn test_nested_commit_then_outer_rollback() {
        let exec = executor();
        let tx = exec.begin().unwrap();
        let nested = tx.begin_nested().unwrap();
        nested.execute("INSERT INTO t (name) VALUES ('inner')", &[]).unwrap();
        nested.commit().unwrap();
        tx.rollback().unwrap();
        assert_eq!(count(&exec), 0);
    }

    #[test]
    fn test_unit_of_work_nests_inside_transaction() {
        let exec = executor();
        let tx = exec.begin().unwrap();
        let unit = (&tx as &dyn StoreExecutor).transaction().unwrap();
        assert_eq!(unit.depth(), 1);
        unit.execute("INSERT INTO t (name) VALUES ('inner')", &[]).unwrap();
        unit.commit().unwrap();
        tx.commit().unwrap();
        assert_eq!(count(&exec), 1);

        let top = (&exec as &dyn StoreExecutor).transaction().unwrap();
        assert_eq!(top.depth(), 0);
    }
}
