//! `StoreExecutor` Module
//!
//! Provides the `StoreExecutor` trait that abstracts statement execution over an embedded
//! SQLite connection.
//!
//! Repositories, the balance calculator, the CSV import engine and the schema migrator all
//! work against `&dyn StoreExecutor`, so the plain connection executor and a
//! [`Transaction`](crate::transaction::Transaction) can be used interchangeably.

use rusqlite::types::{ToSql, Value};
use rusqlite::{Connection, OptionalExtension};
use std::fmt;
use std::path::Path;
use std::time::{Duration, Instant};

use crate::metrics::METRICS;
use crate::transaction::{Transaction, TransactionError};
#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;

/// `StoreExecutor` error type
#[derive(Debug)]
pub enum StoreError {
    /// SQLite error from `rusqlite`
    Sqlite(rusqlite::Error),
    /// Query execution error
    QueryError(String),
    /// Row parsing/conversion error
    ParseError(String),
    /// A row that was required did not exist
    NotFound(String),
    /// Other execution errors
    Other(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Sqlite(e) => write!(f, "SQLite error: {e}"),
            StoreError::QueryError(s) => write!(f, "Query error: {s}"),
            StoreError::ParseError(s) => write!(f, "Parse error: {s}"),
            StoreError::NotFound(s) => write!(f, "Not found: {s}"),
            StoreError::Other(s) => write!(f, "Execution error: {s}"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Sqlite(e) => Some(e),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Sqlite(err)
    }
}

/// An owned result row.
///
/// Values are copied out of the statement so rows can outlive it. Columns are addressed by
/// position, in the order of the `SELECT` list.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    values: Vec<Value>,
}

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Raw value at `idx`; out-of-range reads yield `Value::Null`.
    pub fn value(&self, idx: usize) -> &Value {
        static NULL: Value = Value::Null;
        self.values.get(idx).unwrap_or(&NULL)
    }

    pub fn get_i64(&self, idx: usize) -> Result<i64, StoreError> {
        match self.value(idx) {
            Value::Integer(i) => Ok(*i),
            Value::Real(r) => Ok(*r as i64),
            Value::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| StoreError::ParseError(format!("column {idx}: '{s}' is not an integer"))),
            other => Err(StoreError::ParseError(format!(
                "column {idx}: expected integer, got {other:?}"
            ))),
        }
    }

    pub fn get_f64(&self, idx: usize) -> Result<f64, StoreError> {
        match self.value(idx) {
            Value::Integer(i) => Ok(*i as f64),
            Value::Real(r) => Ok(*r),
            Value::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| StoreError::ParseError(format!("column {idx}: '{s}' is not a number"))),
            other => Err(StoreError::ParseError(format!(
                "column {idx}: expected number, got {other:?}"
            ))),
        }
    }

    pub fn get_bool(&self, idx: usize) -> Result<bool, StoreError> {
        match self.value(idx) {
            Value::Null => Ok(false),
            _ => Ok(self.get_i64(idx)? != 0),
        }
    }

    pub fn get_string(&self, idx: usize) -> Result<String, StoreError> {
        self.get_opt_string(idx)
            .ok_or_else(|| StoreError::ParseError(format!("column {idx}: unexpected NULL")))
    }

    /// Text rendering of any scalar column; `None` for NULL.
    ///
    /// Numeric columns are rendered with Rust's shortest round-trip formatting, so a REAL
    /// `500.0` reads back as `"500"`.
    pub fn get_opt_string(&self, idx: usize) -> Option<String> {
        match self.value(idx) {
            Value::Null => None,
            Value::Integer(i) => Some(i.to_string()),
            Value::Real(r) => Some(r.to_string()),
            Value::Text(s) => Some(s.clone()),
            Value::Blob(b) => Some(String::from_utf8_lossy(b).into_owned()),
        }
    }
}

/// Trait for executing database operations
///
/// Implementors only supply the underlying connection; statement execution, timing and
/// row materialisation are shared.
pub trait StoreExecutor {
    /// The connection statements run on
    fn connection(&self) -> &Connection;

    /// Execute a SQL statement and return the number of rows affected
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the statement fails.
    fn execute(&self, query: &str, params: &[&dyn ToSql]) -> Result<usize, StoreError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::execute_query_span(query).entered();

        let start = Instant::now();
        let result = self.connection().execute(query, params).map_err(|e| {
            METRICS.record_query_error();
            StoreError::Sqlite(e)
        });
        METRICS.record_query(start.elapsed());
        result
    }

    /// Execute several `;`-separated statements without parameters
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if any statement fails.
    fn execute_batch(&self, sql: &str) -> Result<(), StoreError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::execute_query_span(sql).entered();

        let start = Instant::now();
        let result = self.connection().execute_batch(sql).map_err(|e| {
            METRICS.record_query_error();
            StoreError::Sqlite(e)
        });
        METRICS.record_query(start.elapsed());
        result
    }

    /// Execute a query and return all rows
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the query fails.
    fn query_all(&self, query: &str, params: &[&dyn ToSql]) -> Result<Vec<Row>, StoreError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::execute_query_span(query).entered();

        let start = Instant::now();
        let result = collect_rows(self.connection(), query, params).map_err(|e| {
            METRICS.record_query_error();
            StoreError::Sqlite(e)
        });
        METRICS.record_query(start.elapsed());
        result
    }

    /// Execute a query and return the first row, if any
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the query fails.
    fn query_optional(&self, query: &str, params: &[&dyn ToSql]) -> Result<Option<Row>, StoreError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::execute_query_span(query).entered();

        let start = Instant::now();
        let result = self
            .connection()
            .query_row(query, params, row_values)
            .optional()
            .map_err(|e| {
                METRICS.record_query_error();
                StoreError::Sqlite(e)
            });
        METRICS.record_query(start.elapsed());
        result
    }

    /// Execute a query and return exactly one row
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the query yields no row.
    fn query_one(&self, query: &str, params: &[&dyn ToSql]) -> Result<Row, StoreError> {
        self.query_optional(query, params)?
            .ok_or_else(|| StoreError::NotFound(format!("no row returned by: {}", query.trim())))
    }

    /// Row id of the most recent successful `INSERT` on this connection
    fn last_insert_id(&self) -> i64 {
        self.connection().last_insert_rowid()
    }

    /// Start a unit of work: a transaction here, a savepoint inside a [`Transaction`]
    ///
    /// # Errors
    ///
    /// Returns `TransactionError` if `BEGIN` (or `SAVEPOINT`) fails.
    fn transaction(&self) -> Result<Transaction<'_>, TransactionError> {
        Transaction::new(self.connection())
    }
}

fn row_values(row: &rusqlite::Row<'_>) -> rusqlite::Result<Row> {
    let count = row.as_ref().column_count();
    let mut values = Vec::with_capacity(count);
    for idx in 0..count {
        values.push(row.get::<_, Value>(idx)?);
    }
    Ok(Row::new(values))
}

fn collect_rows(conn: &Connection, query: &str, params: &[&dyn ToSql]) -> rusqlite::Result<Vec<Row>> {
    let mut stmt = conn.prepare(query)?;
    let rows = stmt.query_map(params, row_values)?;
    rows.collect()
}

/// `StoreExecutor` over a single owned SQLite connection
///
/// The application is single-user and single-connection; every repository call goes through
/// this executor or a transaction borrowed from it.
pub struct SqliteExecutor {
    conn: Connection,
}

impl SqliteExecutor {
    /// Open (or create) a database file
    ///
    /// Parent directories are created when missing.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the directory or database cannot be opened.
    pub fn open(path: impl AsRef<Path>, busy_timeout: Duration) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Other(format!("cannot create data directory {}: {e}", parent.display()))
                })?;
            }
        }
        log::debug!("Opening database at {}", path.display());
        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;
        Self::from_connection(conn)
    }

    /// Open a private in-memory database
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if SQLite cannot allocate the database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    /// Wrap an existing connection, enabling foreign-key enforcement
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the pragma cannot be set.
    pub fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.pragma_update(None, "foreign_keys", true)?;
        Ok(Self { conn })
    }

    /// Start a new transaction on this connection
    ///
    /// # Errors
    ///
    /// Returns `TransactionError` if `BEGIN` fails.
    pub fn begin(&self) -> Result<Transaction<'_>, TransactionError> {
        Transaction::new(&self.conn)
    }

    /// Check that the connection still answers `SELECT 1`
    pub fn check_health(&self) -> bool {
        self.conn
            .query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .map(|v| v == 1)
            .unwrap_or(false)
    }

    /// Consume the executor and return the underlying connection
    pub fn into_connection(self) -> Connection {
        self.conn
    }
}

impl StoreExecutor for SqliteExecutor {
    fn connection(&self) -> &Connection {
        &self.conn
    }
}
