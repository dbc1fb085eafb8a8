//! Migration: Dimension width as integer
//! Version: 20240601000300
//! Description: Rebuilds `dimensions` when `width` was declared REAL, rounding widths

use crate::executor::StoreError;
use crate::migration::{Migration, SchemaManager};

use super::schema::{dimensions_index, dimensions_table, DIMENSIONS, DIMENSION_COPY};

pub struct DimensionWidthInteger;

impl Migration for DimensionWidthInteger {
    fn name(&self) -> &str {
        "dimension_width_integer"
    }

    fn version(&self) -> i64 {
        20240601000300
    }

    fn up(&self, manager: &SchemaManager<'_>) -> Result<(), StoreError> {
        let fractional = manager
            .column(DIMENSIONS, "width")?
            .map(|c| c.is_fractional())
            .unwrap_or(false);
        if !fractional {
            return Ok(());
        }
        log::info!("Converting {DIMENSIONS}.width to INTEGER");
        manager.rebuild_table(DIMENSIONS, dimensions_table(&format!("{DIMENSIONS}_rebuild")), DIMENSION_COPY)?;
        manager.create_index(dimensions_index())
    }

    /// Only display precision is at stake, so a failure leaves the app usable.
    fn is_fatal(&self) -> bool {
        false
    }
}
