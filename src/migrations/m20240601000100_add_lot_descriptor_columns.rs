//! Migration: Add lot descriptor columns
//! Version: 20240601000100
//! Description: coating / specifications / form on stock lots, the sale dimension snapshot,
//! and the old `grade` value carried into `coating`

use sea_query::{Alias, ColumnDef};

use crate::executor::StoreError;
use crate::migration::{Migration, SchemaManager};

use super::schema::{SALES, STOCK_LOTS};

pub struct AddLotDescriptorColumns;

fn add_text_column(manager: &SchemaManager<'_>, table: &str, column: &str) -> Result<(), StoreError> {
    if manager.has_column(table, column)? {
        log::debug!("{table}.{column} already present");
        return Ok(());
    }
    manager.add_column(table, ColumnDef::new(Alias::new(column)).text().to_owned())
}

impl Migration for AddLotDescriptorColumns {
    fn name(&self) -> &str {
        "add_lot_descriptor_columns"
    }

    fn version(&self) -> i64 {
        20240601000100
    }

    fn up(&self, manager: &SchemaManager<'_>) -> Result<(), StoreError> {
        for column in ["coating", "specifications", "form"] {
            add_text_column(manager, STOCK_LOTS, column)?;
        }
        add_text_column(manager, SALES, "dimensions_snapshot")?;

        if manager.has_column(STOCK_LOTS, "grade")? {
            manager.execute(
                "UPDATE stock_lots SET coating = grade WHERE coating IS NULL AND grade IS NOT NULL",
                &[],
            )?;
        }
        Ok(())
    }
}
