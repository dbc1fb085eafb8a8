//! Balance calculator: weight minus the decrypted quantities sold.
//!
//! Nothing here is cached. Every figure is recomputed from the live `sales` rows, and the
//! same [`LotBalance`] check guards manual sale entry and all three CSV imports.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::crypto::{parse_decimal, RecordCrypto};
use crate::error::InventoryError;
use crate::executor::{StoreError, StoreExecutor};

/// Two decimal places, half away from zero
pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Decrypted sum of the quantities sold from a lot, rounded to two places.
///
/// A quantity that is missing or does not read as a number counts as zero.
pub fn total_sold(
    executor: &dyn StoreExecutor,
    crypto: RecordCrypto<'_>,
    stock_lot_id: i64,
) -> Result<Decimal, StoreError> {
    sold_excluding(executor, crypto, stock_lot_id, None)
}

/// [`total_sold`] leaving one sale out, for re-validating an edited sale
pub fn sold_excluding(
    executor: &dyn StoreExecutor,
    crypto: RecordCrypto<'_>,
    stock_lot_id: i64,
    excluded_sale: Option<i64>,
) -> Result<Decimal, StoreError> {
    let rows = executor.query_all(
        "SELECT id, quantity_sold FROM sales WHERE stock_lot_id = ?1",
        &[&stock_lot_id],
    )?;
    let mut total = Decimal::ZERO;
    for row in &rows {
        if excluded_sale == Some(row.get_i64(0)?) {
            continue;
        }
        let Some(stored) = row.get_opt_string(1) else {
            continue;
        };
        let plain = crypto.open_or_keep("quantity_sold", &stored);
        match parse_decimal(&plain) {
            Some(quantity) => total += quantity,
            None => log::debug!("Sale {} of lot {stock_lot_id} has no readable quantity", row.get_i64(0)?),
        }
    }
    Ok(round2(total))
}

/// `weight - total_sold`, rounded to two places
pub fn balance(weight: Decimal, total_sold: Decimal) -> Decimal {
    round2(weight - total_sold)
}

/// The sellable position of one lot at the moment it was loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LotBalance {
    pub weight: Decimal,
    pub sold: Decimal,
}

impl LotBalance {
    pub fn new(weight: Decimal, sold: Decimal) -> Self {
        Self { weight, sold }
    }

    /// Read the live position of a lot, optionally ignoring one of its sales
    pub fn load(
        executor: &dyn StoreExecutor,
        crypto: RecordCrypto<'_>,
        stock_lot_id: i64,
        weight: Decimal,
        excluded_sale: Option<i64>,
    ) -> Result<Self, StoreError> {
        Ok(Self::new(weight, sold_excluding(executor, crypto, stock_lot_id, excluded_sale)?))
    }

    pub fn remaining(&self) -> Decimal {
        balance(self.weight, self.sold)
    }

    /// Accept `requested` if it fits in what is left.
    ///
    /// # Errors
    ///
    /// `InventoryError::OverSell` when `requested` exceeds [`remaining`](Self::remaining).
    pub fn admit(&self, requested: Decimal) -> Result<(), InventoryError> {
        let remaining = self.remaining();
        if requested > remaining {
            return Err(InventoryError::OverSell {
                requested: requested.normalize(),
                remaining: remaining.normalize(),
            });
        }
        Ok(())
    }
}
