//! Migration: Create core tables
//! Version: 20240601000000
//! Description: credentials, stock_lots, dimensions and sales, with cascading foreign keys

use crate::executor::StoreError;
use crate::migration::{Migration, SchemaManager};

use super::schema::{
    credentials_table, dimensions_index, dimensions_table, sales_index, sales_table, stock_lots_table, DIMENSIONS,
    SALES, STOCK_LOTS,
};

pub struct CreateCoreTables;

impl Migration for CreateCoreTables {
    fn name(&self) -> &str {
        "create_core_tables"
    }

    fn version(&self) -> i64 {
        20240601000000
    }

    fn up(&self, manager: &SchemaManager<'_>) -> Result<(), StoreError> {
        manager.create_table(credentials_table())?;
        manager.create_table(stock_lots_table(STOCK_LOTS))?;
        manager.create_table(dimensions_table(DIMENSIONS))?;
        manager.create_table(sales_table(SALES))?;

        manager.create_index(dimensions_index())?;
        manager.create_index(sales_index())?;
        Ok(())
    }
}
