//! Data access for stock lots, dimensions, sales and the access credential.
//!
//! A [`Repository`] pairs an executor with the session's [`RecordCrypto`]: sensitive columns
//! are sealed on the way in and opened on the way out, so callers only ever see plaintext.
//! Lookups by a sensitive column (serial number, lot code) cannot be expressed in SQL and
//! scan the decrypted table instead.

pub mod credentials;
pub mod maintenance;
pub mod sales;
pub mod stock_lots;

pub use maintenance::{EncryptionStatus, LegacyEncryptionReport, SampleStatus};

use chrono::NaiveDateTime;
use rusqlite::types::{ToSql, Value};

use crate::crypto::{EntityKind, Field, Record, RecordCrypto};
use crate::executor::{Row, StoreError, StoreExecutor};
use crate::model::parse_timestamp;

/// Repository over one executor (connection or transaction) for one session
#[derive(Clone, Copy)]
pub struct Repository<'a> {
    executor: &'a dyn StoreExecutor,
    crypto: RecordCrypto<'a>,
}

impl<'a> Repository<'a> {
    pub fn new(executor: &'a dyn StoreExecutor, crypto: RecordCrypto<'a>) -> Self {
        Self { executor, crypto }
    }

    pub fn executor(&self) -> &'a dyn StoreExecutor {
        self.executor
    }

    pub fn crypto(&self) -> RecordCrypto<'a> {
        self.crypto
    }

    /// The same repository over another executor, typically a transaction of this one
    pub fn on<'b>(&self, executor: &'b dyn StoreExecutor) -> Repository<'b>
    where
        'a: 'b,
    {
        Repository {
            executor,
            crypto: self.crypto,
        }
    }

    /// Decrypted copy of `row`, named after `columns`
    fn open_row(&self, kind: EntityKind, columns: &[&str], row: &Row) -> Record {
        let stored = columns
            .iter()
            .enumerate()
            .fold(Record::new(), |rec, (idx, name)| rec.with(name, Field::from_sql(row.value(idx))));
        self.crypto.decrypt_record(kind, &stored)
    }
}

fn params(values: &[Value]) -> Vec<&dyn ToSql> {
    values.iter().map(|v| v as &dyn ToSql).collect()
}

/// `INSERT` every column of `record`; returns the new row id
pub(crate) fn insert_record(executor: &dyn StoreExecutor, table: &str, record: &Record) -> Result<i64, StoreError> {
    let columns: Vec<&str> = record.columns().collect();
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
    let sql = format!(
        "INSERT INTO {table} ({}) VALUES ({})",
        columns.join(", "),
        placeholders.join(", ")
    );
    let values = record.sql_values();
    executor.execute(&sql, &params(&values))?;
    Ok(executor.last_insert_id())
}

/// `UPDATE` the columns of `record` on row `id`, bumping `updated_at`; returns rows changed
pub(crate) fn update_record(
    executor: &dyn StoreExecutor,
    table: &str,
    id: i64,
    record: &Record,
) -> Result<usize, StoreError> {
    let mut assignments: Vec<String> = record
        .columns()
        .enumerate()
        .map(|(i, column)| format!("{column} = ?{}", i + 1))
        .collect();
    assignments.push("updated_at = CURRENT_TIMESTAMP".to_string());
    let sql = format!(
        "UPDATE {table} SET {} WHERE id = ?{}",
        assignments.join(", "),
        record.len() + 1
    );
    let mut values = record.sql_values();
    values.push(Value::Integer(id));
    executor.execute(&sql, &params(&values))
}

/// Timestamps written by `CURRENT_TIMESTAMP`; rows from older releases may have none
pub(crate) fn row_timestamp(row: &Row, idx: usize) -> Result<NaiveDateTime, StoreError> {
    match row.get_opt_string(idx) {
        Some(text) => parse_timestamp(&text),
        None => Ok(NaiveDateTime::default()),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::crypto::codec::tests::cipher;
    use crate::crypto::FieldCipher;
    use crate::executor::SqliteExecutor;
    use crate::migrations::ensure_schema;

    pub(crate) fn store() -> (SqliteExecutor, FieldCipher) {
        let exec = SqliteExecutor::open_in_memory().unwrap();
        ensure_schema(&exec).unwrap();
        (exec, cipher("1234"))
    }

    #[test]
    fn test_insert_and_update_record() {
        let (exec, _) = store();
        let record = Record::new()
            .with("code_hash", Field::text("abc"));
        let id = insert_record(&exec, "credentials", &record).unwrap();
        assert!(id > 0);

        let lot = Record::new()
            .with("entry_date", Field::text("2024-06-01"))
            .with("serial_number", Field::text("1"))
            .with("type", Field::text("E"))
            .with("weight", Field::Integer(10))
            .with("lot_code", Field::text("L"))
            .with("quality", Field::text("Soft"));
        let lot_id = insert_record(&exec, "stock_lots", &lot).unwrap();
        let changed = update_record(&exec, "stock_lots", lot_id, &Record::new().with("lot_code", Field::text("M")))
            .unwrap();
        assert_eq!(changed, 1);
        let row = exec.query_one("SELECT lot_code FROM stock_lots WHERE id = ?1", &[&lot_id]).unwrap();
        assert_eq!(row.get_string(0).unwrap(), "M");
    }
}
