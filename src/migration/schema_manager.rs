//! SchemaManager - Provides methods for schema operations in migrations

use crate::executor::{StoreError, StoreExecutor};
use rusqlite::types::ToSql;
use sea_query::{
    Alias, ColumnDef, IndexCreateStatement, SqliteQueryBuilder, Table, TableAlterStatement,
    TableCreateStatement, TableDropStatement,
};

/// One column as reported by `PRAGMA table_info`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    /// Declared type, upper-cased (`""` when none was declared)
    pub declared_type: String,
    pub not_null: bool,
    pub primary_key: bool,
}

impl ColumnInfo {
    /// Declared with REAL affinity (`REAL`, `FLOAT`, `DOUBLE`)
    pub fn is_fractional(&self) -> bool {
        ["REAL", "FLOA", "DOUB"].iter().any(|t| self.declared_type.contains(t))
    }
}

/// How to fill one column of a rebuilt table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyColumn {
    pub name: &'static str,
    /// SQL expression used when the old table lacks the column
    pub fallback: &'static str,
    /// SQL applied to the old value; `{}` stands for the quoted column
    pub transform: Option<&'static str>,
}

impl CopyColumn {
    pub const fn keep(name: &'static str, fallback: &'static str) -> Self {
        Self {
            name,
            fallback,
            transform: None,
        }
    }

    pub const fn transformed(name: &'static str, fallback: &'static str, transform: &'static str) -> Self {
        Self {
            name,
            fallback,
            transform: Some(transform),
        }
    }
}

/// SchemaManager provides methods for performing schema operations in migrations
///
/// It borrows the executor the migrator hands it (normally the migration's transaction), so
/// everything a migration does commits or rolls back as one unit.
pub struct SchemaManager<'a> {
    executor: &'a dyn StoreExecutor,
}

impl<'a> SchemaManager<'a> {
    pub fn new(executor: &'a dyn StoreExecutor) -> Self {
        Self { executor }
    }

    /// Create a table
    ///
    /// # Example
    /// ```rust,no_run
    /// use sea_query::{Alias, ColumnDef, Table};
    /// # fn demo(manager: &steeltrack::migration::SchemaManager<'_>) -> Result<(), steeltrack::StoreError> {
    /// let table = Table::create()
    ///     .table(Alias::new("notes"))
    ///     .if_not_exists()
    ///     .col(ColumnDef::new(Alias::new("id")).integer().not_null().auto_increment().primary_key())
    ///     .col(ColumnDef::new(Alias::new("body")).text())
    ///     .to_owned();
    /// manager.create_table(table)?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn create_table(&self, table: TableCreateStatement) -> Result<(), StoreError> {
        let sql = table.build(SqliteQueryBuilder);
        self.executor.execute(&sql, &[]).map(|_| ())
    }

    pub fn drop_table(&self, table: TableDropStatement) -> Result<(), StoreError> {
        let sql = table.build(SqliteQueryBuilder);
        self.executor.execute(&sql, &[]).map(|_| ())
    }

    pub fn alter_table(&self, alter: TableAlterStatement) -> Result<(), StoreError> {
        let sql = alter.build(SqliteQueryBuilder);
        self.executor.execute(&sql, &[]).map(|_| ())
    }

    pub fn create_index(&self, index: IndexCreateStatement) -> Result<(), StoreError> {
        let sql = index.build(SqliteQueryBuilder);
        self.executor.execute(&sql, &[]).map(|_| ())
    }

    /// Add a column to an existing table
    pub fn add_column(&self, table: &str, column: ColumnDef) -> Result<(), StoreError> {
        let alter = Table::alter().table(Alias::new(table)).add_column(column).to_owned();
        self.alter_table(alter)
    }

    /// Rename a column in an existing table
    pub fn rename_column(&self, table: &str, old_name: &str, new_name: &str) -> Result<(), StoreError> {
        let alter = Table::alter()
            .table(Alias::new(table))
            .rename_column(Alias::new(old_name), Alias::new(new_name))
            .to_owned();
        self.alter_table(alter)
    }

    pub fn rename_table(&self, from: &str, to: &str) -> Result<(), StoreError> {
        let sql = Table::rename()
            .table(Alias::new(from), Alias::new(to))
            .to_owned()
            .build(SqliteQueryBuilder);
        self.executor.execute(&sql, &[]).map(|_| ())
    }

    /// Execute raw SQL
    pub fn execute(&self, sql: &str, params: &[&dyn ToSql]) -> Result<(), StoreError> {
        self.executor.execute(sql, params).map(|_| ())
    }

    /// Get a reference to the underlying executor
    pub fn executor(&self) -> &dyn StoreExecutor {
        self.executor
    }

    pub fn has_table(&self, table: &str) -> Result<bool, StoreError> {
        Ok(self.table_sql(table)?.is_some())
    }

    /// The `CREATE TABLE` text SQLite keeps for `table`
    pub fn table_sql(&self, table: &str) -> Result<Option<String>, StoreError> {
        let row = self.executor.query_optional(
            "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?1",
            &[&table],
        )?;
        Ok(row.and_then(|r| r.get_opt_string(0)))
    }

    pub fn columns(&self, table: &str) -> Result<Vec<ColumnInfo>, StoreError> {
        let rows = self.executor.query_all(
            "SELECT name, type, \"notnull\", pk FROM pragma_table_info(?1) ORDER BY cid",
            &[&table],
        )?;
        rows.iter()
            .map(|row| {
                Ok(ColumnInfo {
                    name: row.get_string(0)?,
                    declared_type: row.get_opt_string(1).unwrap_or_default().to_uppercase(),
                    not_null: row.get_bool(2)?,
                    primary_key: row.get_bool(3)?,
                })
            })
            .collect()
    }

    pub fn column(&self, table: &str, column: &str) -> Result<Option<ColumnInfo>, StoreError> {
        Ok(self
            .columns(table)?
            .into_iter()
            .find(|c| c.name.eq_ignore_ascii_case(column)))
    }

    pub fn has_column(&self, table: &str, column: &str) -> Result<bool, StoreError> {
        Ok(self.column(table, column)?.is_some())
    }

    /// Rewrite `table` into the shape of `shadow`.
    ///
    /// `shadow` must create a table named `{table}_rebuild`. Rows are copied column by column
    /// (missing old columns take their fallback), the old table is dropped and the shadow
    /// renamed into its place. Callers run this inside a transaction with foreign keys off.
    pub fn rebuild_table(
        &self,
        table: &str,
        shadow: TableCreateStatement,
        columns: &[CopyColumn],
    ) -> Result<u64, StoreError> {
        let shadow_name = format!("{table}_rebuild");
        self.execute(&format!("DROP TABLE IF EXISTS \"{shadow_name}\""), &[])?;
        self.create_table(shadow)?;

        let existing = self.columns(table)?;
        let targets: Vec<String> = columns.iter().map(|c| format!("\"{}\"", c.name)).collect();
        let sources: Vec<String> = columns
            .iter()
            .map(|c| {
                if existing.iter().any(|e| e.name.eq_ignore_ascii_case(c.name)) {
                    let quoted = format!("\"{}\"", c.name);
                    let value = match c.transform {
                        Some(t) => t.replace("{}", &quoted),
                        None => quoted,
                    };
                    format!("COALESCE({value}, {})", c.fallback)
                } else {
                    c.fallback.to_string()
                }
            })
            .collect();

        let copied = self.executor.execute(
            &format!(
                "INSERT INTO \"{shadow_name}\" ({}) SELECT {} FROM \"{table}\"",
                targets.join(", "),
                sources.join(", ")
            ),
            &[],
        )?;
        self.execute(&format!("DROP TABLE \"{table}\""), &[])?;
        self.rename_table(&shadow_name, table)?;
        log::info!("Rebuilt table {table} ({copied} rows copied)");
        Ok(copied as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::SqliteExecutor;

    #[test]
    fn test_table_introspection() {
        let exec = SqliteExecutor::open_in_memory().unwrap();
        exec.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY, w REAL NOT NULL CHECK (w > 0))")
            .unwrap();
        let manager = SchemaManager::new(&exec);

        assert!(manager.has_table("t").unwrap());
        assert!(!manager.has_table("missing").unwrap());
        assert!(manager.table_sql("t").unwrap().unwrap().contains("CHECK"));

        let w = manager.column("t", "w").unwrap().unwrap();
        assert!(w.is_fractional());
        assert!(w.not_null);
        assert!(manager.column("t", "id").unwrap().unwrap().primary_key);
    }

    #[test]
    fn test_add_and_rename_column() {
        let exec = SqliteExecutor::open_in_memory().unwrap();
        exec.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY)").unwrap();
        let manager = SchemaManager::new(&exec);
        manager.add_column("t", ColumnDef::new(Alias::new("note")).text().to_owned()).unwrap();
        manager.rename_column("t", "note", "remark").unwrap();
        assert!(manager.has_column("t", "remark").unwrap());
        assert!(!manager.has_column("t", "note").unwrap());
    }

    #[test]
    fn test_rebuild_table_copies_with_fallbacks() {
        let exec = SqliteExecutor::open_in_memory().unwrap();
        exec.execute_batch(
            "CREATE TABLE t (id INTEGER PRIMARY KEY, w REAL CHECK (w > 0));
             INSERT INTO t (id, w) VALUES (1, 10.6), (2, 3.2);",
        )
        .unwrap();
        let manager = SchemaManager::new(&exec);
        let shadow = Table::create()
            .table(Alias::new("t_rebuild"))
            .col(ColumnDef::new(Alias::new("id")).integer().not_null().primary_key())
            .col(ColumnDef::new(Alias::new("w")).integer().not_null())
            .col(ColumnDef::new(Alias::new("flag")).integer().not_null().default(0))
            .to_owned();
        let copied = manager
            .rebuild_table(
                "t",
                shadow,
                &[
                    CopyColumn::keep("id", "NULL"),
                    CopyColumn::transformed("w", "0", "CAST(ROUND({}) AS INTEGER)"),
                    CopyColumn::keep("flag", "0"),
                ],
            )
            .unwrap();
        assert_eq!(copied, 2);
        assert!(!manager.table_sql("t").unwrap().unwrap().contains("CHECK"));
        let row = exec.query_one("SELECT w, flag FROM t WHERE id = 1", &[]).unwrap();
        assert_eq!(row.get_i64(0).unwrap(), 11);
        assert_eq!(row.get_i64(1).unwrap(), 0);
    }
}
