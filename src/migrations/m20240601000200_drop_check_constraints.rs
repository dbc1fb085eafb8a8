//! Migration: Drop CHECK constraints
//! Version: 20240601000200
//! Description: Early schemas declared `CHECK (weight > 0)` style constraints, which reject
//! ciphertext in those columns. Affected tables are rebuilt without them; a table missing
//! one of the current columns is rebuilt the same way so it picks up the defaults.

use crate::executor::StoreError;
use crate::migration::{CopyColumn, Migration, SchemaManager};

use super::schema::{sales_index, sales_table, stock_lots_table, SALES, SALE_COPY, STOCK_LOTS, STOCK_LOT_COPY};

pub struct DropCheckConstraints;

pub(crate) fn has_check_constraint(manager: &SchemaManager<'_>, table: &str) -> Result<bool, StoreError> {
    Ok(manager
        .table_sql(table)?
        .map(|sql| sql.to_uppercase().contains("CHECK"))
        .unwrap_or(false))
}

fn needs_rebuild(manager: &SchemaManager<'_>, table: &str, copy: &[CopyColumn]) -> Result<bool, StoreError> {
    if !manager.has_table(table)? {
        return Ok(false);
    }
    if has_check_constraint(manager, table)? {
        return Ok(true);
    }
    let existing = manager.columns(table)?;
    Ok(copy
        .iter()
        .any(|c| !existing.iter().any(|e| e.name.eq_ignore_ascii_case(c.name))))
}

impl Migration for DropCheckConstraints {
    fn name(&self) -> &str {
        "drop_check_constraints"
    }

    fn version(&self) -> i64 {
        20240601000200
    }

    fn up(&self, manager: &SchemaManager<'_>) -> Result<(), StoreError> {
        if needs_rebuild(manager, STOCK_LOTS, STOCK_LOT_COPY)? {
            log::info!("Rebuilding {STOCK_LOTS} into the current shape");
            manager.rebuild_table(STOCK_LOTS, stock_lots_table(&format!("{STOCK_LOTS}_rebuild")), STOCK_LOT_COPY)?;
        }
        if needs_rebuild(manager, SALES, SALE_COPY)? {
            log::info!("Rebuilding {SALES} into the current shape");
            manager.rebuild_table(SALES, sales_table(&format!("{SALES}_rebuild")), SALE_COPY)?;
            manager.create_index(sales_index())?;
        }
        Ok(())
    }
}
