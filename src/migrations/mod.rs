//! The store's schema history.
//!
//! Migrations are compiled in and applied in version order at open. Every one of them
//! detects before it alters, so databases written by older releases (which carry parts of
//! the schema and no `schema_migrations` rows) converge on the same shape as a new file.

pub mod schema;

mod m20240101000000_adopt_legacy_tables;
mod m20240601000000_create_core_tables;
mod m20240601000100_add_lot_descriptor_columns;
mod m20240601000200_drop_check_constraints;
mod m20240601000300_dimension_width_integer;

pub use m20240101000000_adopt_legacy_tables::AdoptLegacyTables;
pub use m20240601000000_create_core_tables::CreateCoreTables;
pub use m20240601000100_add_lot_descriptor_columns::AddLotDescriptorColumns;
pub use m20240601000200_drop_check_constraints::DropCheckConstraints;
pub use m20240601000300_dimension_width_integer::DimensionWidthInteger;

use crate::executor::StoreExecutor;
use crate::migration::{Migration, MigrationError, MigrationReport, Migrator};

pub fn all() -> Vec<Box<dyn Migration>> {
    vec![
        Box::new(AdoptLegacyTables),
        Box::new(CreateCoreTables),
        Box::new(AddLotDescriptorColumns),
        Box::new(DropCheckConstraints),
        Box::new(DimensionWidthInteger),
    ]
}

pub fn migrator() -> Result<Migrator, MigrationError> {
    Migrator::new(all())
}

/// Bring the schema up to date. Safe to call on every start.
pub fn ensure_schema(executor: &dyn StoreExecutor) -> Result<MigrationReport, MigrationError> {
    let report = migrator()?.up(executor)?;
    if report.is_noop() {
        log::debug!("Schema up to date");
    }
    for (version, name, error) in &report.deferred {
        log::warn!("Migration {version} ({name}) deferred: {error}");
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::SqliteExecutor;
    use crate::migration::SchemaManager;

    #[test]
    fn test_fresh_database_gets_every_table() {
        let exec = SqliteExecutor::open_in_memory().unwrap();
        let report = ensure_schema(&exec).unwrap();
        assert_eq!(report.applied.len(), all().len());

        let manager = SchemaManager::new(&exec);
        for table in [schema::CREDENTIALS, schema::STOCK_LOTS, schema::DIMENSIONS, schema::SALES] {
            assert!(manager.has_table(table).unwrap(), "{table}");
        }
        assert!(!manager.column(schema::DIMENSIONS, "width").unwrap().unwrap().is_fractional());
        assert!(ensure_schema(&exec).unwrap().is_noop());
    }

    #[test]
    fn test_legacy_layout_is_adopted() {
        let exec = SqliteExecutor::open_in_memory().unwrap();
        exec.execute_batch(
            "CREATE TABLE auth_codes (id INTEGER PRIMARY KEY AUTOINCREMENT, code_hash TEXT NOT NULL UNIQUE);
             CREATE TABLE inventory (
                 id INTEGER PRIMARY KEY AUTOINCREMENT,
                 entry_date DATE NOT NULL,
                 sno TEXT NOT NULL,
                 type TEXT NOT NULL,
                 weight REAL NOT NULL CHECK (weight > 0),
                 lot TEXT NOT NULL,
                 quality TEXT NOT NULL,
                 sold_to TEXT,
                 grade TEXT,
                 completed BOOLEAN DEFAULT 0,
                 dc_status BOOLEAN DEFAULT 0,
                 created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                 updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
             );
             CREATE TABLE inventory_dimensions (
                 id INTEGER PRIMARY KEY AUTOINCREMENT,
                 inventory_id INTEGER NOT NULL REFERENCES inventory(id) ON DELETE CASCADE,
                 thickness REAL NOT NULL,
                 width REAL NOT NULL
             );
             CREATE TABLE sales (
                 id INTEGER PRIMARY KEY AUTOINCREMENT,
                 inventory_id INTEGER NOT NULL REFERENCES inventory(id) ON DELETE CASCADE,
                 sold_to TEXT NOT NULL,
                 quantity_sold REAL NOT NULL CHECK (quantity_sold > 0),
                 sale_date DATE NOT NULL
             );
             INSERT INTO inventory (entry_date, sno, type, weight, lot, quality, grade)
                 VALUES ('2024-01-05', 'S1', 'GA', 500, 'L1', 'Soft', 'Z120');
             INSERT INTO inventory_dimensions (inventory_id, thickness, width) VALUES (1, 0.456, 1219.6);
             INSERT INTO sales (inventory_id, sold_to, quantity_sold, sale_date) VALUES (1, 'Acme', 200, '2024-02-01');",
        )
        .unwrap();

        let report = ensure_schema(&exec).unwrap();
        assert!(report.deferred.is_empty());

        let manager = SchemaManager::new(&exec);
        assert!(!manager.has_table("inventory").unwrap());
        assert!(manager.has_column(schema::STOCK_LOTS, "serial_number").unwrap());
        assert!(!manager.table_sql(schema::STOCK_LOTS).unwrap().unwrap().to_uppercase().contains("CHECK"));
        assert!(!manager.table_sql(schema::SALES).unwrap().unwrap().to_uppercase().contains("CHECK"));

        let lot = exec
            .query_one("SELECT serial_number, coating, lot_code FROM stock_lots WHERE id = 1", &[])
            .unwrap();
        assert_eq!(lot.get_string(0).unwrap(), "S1");
        assert_eq!(lot.get_string(1).unwrap(), "Z120");
        assert_eq!(lot.get_string(2).unwrap(), "L1");

        let dim = exec
            .query_one("SELECT thickness, width FROM dimensions WHERE stock_lot_id = 1", &[])
            .unwrap();
        assert!((dim.get_f64(0).unwrap() - 0.46).abs() < 1e-9);
        assert_eq!(dim.get_i64(1).unwrap(), 1220);

        let sale = exec
            .query_one("SELECT customer_name, stock_lot_id FROM sales", &[])
            .unwrap();
        assert_eq!(sale.get_string(0).unwrap(), "Acme");
        assert_eq!(sale.get_i64(1).unwrap(), 1);

        assert!(exec.query_all("PRAGMA foreign_key_check", &[]).unwrap().is_empty());
    }
}
