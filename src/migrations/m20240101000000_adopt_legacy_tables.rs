//! Migration: Adopt legacy tables
//! Version: 20240101000000
//! Description: Renames tables and columns written by the first desktop release
//! (`auth_codes`, `inventory`, `inventory_dimensions`, `sales.inventory_id`, ...) to the
//! current names, so the remaining migrations see one schema.

use crate::executor::StoreError;
use crate::migration::{Migration, SchemaManager};

use super::schema::{CREDENTIALS, DIMENSIONS, SALES, STOCK_LOTS};

pub struct AdoptLegacyTables;

const STOCK_LOT_RENAMES: &[(&str, &str)] = &[
    ("sno", "serial_number"),
    ("lot", "lot_code"),
    ("sold_to", "customer_name"),
    ("dc_status", "at_dc"),
];

const DIMENSION_RENAMES: &[(&str, &str)] = &[("inventory_id", "stock_lot_id")];

const SALE_RENAMES: &[(&str, &str)] = &[
    ("inventory_id", "stock_lot_id"),
    ("sold_to", "customer_name"),
    ("dimensions", "dimensions_snapshot"),
];

fn adopt_table(manager: &SchemaManager<'_>, legacy: &str, current: &str) -> Result<(), StoreError> {
    if manager.has_table(legacy)? && !manager.has_table(current)? {
        log::info!("Renaming legacy table {legacy} to {current}");
        manager.rename_table(legacy, current)?;
    }
    Ok(())
}

fn rename_columns(manager: &SchemaManager<'_>, table: &str, renames: &[(&str, &str)]) -> Result<(), StoreError> {
    if !manager.has_table(table)? {
        return Ok(());
    }
    for (old, new) in renames {
        if manager.has_column(table, old)? && !manager.has_column(table, new)? {
            manager.rename_column(table, old, new)?;
        }
    }
    Ok(())
}

impl Migration for AdoptLegacyTables {
    fn name(&self) -> &str {
        "adopt_legacy_tables"
    }

    fn version(&self) -> i64 {
        20240101000000
    }

    fn up(&self, manager: &SchemaManager<'_>) -> Result<(), StoreError> {
        adopt_table(manager, "auth_codes", CREDENTIALS)?;
        adopt_table(manager, "inventory", STOCK_LOTS)?;
        adopt_table(manager, "inventory_dimensions", DIMENSIONS)?;

        rename_columns(manager, STOCK_LOTS, STOCK_LOT_RENAMES)?;
        rename_columns(manager, DIMENSIONS, DIMENSION_RENAMES)?;
        rename_columns(manager, SALES, SALE_RENAMES)?;
        Ok(())
    }
}
