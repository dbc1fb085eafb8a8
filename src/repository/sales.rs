//! Sales recorded against stock lots.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::{insert_record, row_timestamp, update_record, Repository};
use crate::balance::LotBalance;
use crate::crypto::{parse_decimal, EntityKind, Field, Record};
use crate::error::InventoryError;
use crate::executor::{Row, StoreError};
use crate::model::sale::{decode_snapshot, encode_snapshot};
use crate::model::{parse_stored_date, Dimension, NewSale, Sale, SaleForm, SaleUpdate, DATE_FORMAT};

const SALE_COLUMNS: &[&str] = &[
    "id",
    "stock_lot_id",
    "customer_name",
    "quantity_sold",
    "form",
    "sale_date",
    "dimensions_snapshot",
    "created_at",
    "updated_at",
];

fn select_sales(filter: &str) -> String {
    format!("SELECT {} FROM sales {filter}", SALE_COLUMNS.join(", "))
}

fn check_quantity(quantity: Decimal) -> Result<(), InventoryError> {
    if quantity <= Decimal::ZERO {
        return Err(InventoryError::validation(format!(
            "Quantity sold must be a positive number, got {quantity}"
        )));
    }
    Ok(())
}

fn check_customer(customer: &str) -> Result<&str, InventoryError> {
    let customer = customer.trim();
    if customer.is_empty() {
        return Err(InventoryError::validation("Customer name is required"));
    }
    Ok(customer)
}

impl<'a> Repository<'a> {
    /// Record a sale against a lot.
    ///
    /// # Errors
    ///
    /// `Validation` for a blank customer or non-positive quantity, `NotFound` for an unknown
    /// lot, `AtDistributionCenter` while the lot is at the DC, `OverSell` when the quantity
    /// exceeds the lot's live balance.
    pub fn add_sale(&self, sale: &NewSale) -> Result<i64, InventoryError> {
        check_quantity(sale.quantity_sold)?;
        let customer = check_customer(&sale.customer_name)?;
        let lot = self.get_stock_lot(sale.stock_lot_id)?;
        if lot.at_dc {
            return Err(InventoryError::AtDistributionCenter {
                serial_number: lot.serial_number,
            });
        }
        LotBalance::load(self.executor, self.crypto, lot.id, lot.weight, None)?.admit(sale.quantity_sold)?;

        let snapshot = sale
            .dimensions_snapshot
            .clone()
            .unwrap_or_else(|| Dimension::snapshot(&lot.dimensions));
        let record = Record::new()
            .with("stock_lot_id", Field::Integer(lot.id))
            .with("customer_name", Field::text(customer))
            .with("quantity_sold", Field::Number(sale.quantity_sold))
            .with("form", Field::opt_text(sale.form.map(|f| f.as_str())))
            .with("sale_date", Field::text(sale.sale_date.format(DATE_FORMAT).to_string()))
            .with(
                "dimensions_snapshot",
                if snapshot.is_empty() {
                    Field::Null
                } else {
                    Field::text(encode_snapshot(&snapshot))
                },
            );
        let sealed = self.crypto.encrypt_record(EntityKind::Sale, &record)?;
        let id = insert_record(self.executor, "sales", &sealed)?;
        log::debug!("Recorded sale {id} of {} from lot {}", sale.quantity_sold, lot.id);
        Ok(id)
    }

    pub fn get_sale(&self, id: i64) -> Result<Sale, InventoryError> {
        let row = self
            .executor
            .query_optional(&select_sales("WHERE id = ?1"), &[&id])?
            .ok_or(InventoryError::NotFound { entity: "Sale", id })?;
        Ok(self.decode_sale(&row)?)
    }

    /// Sales of a lot, most recent first
    pub fn sales_for_lot(&self, stock_lot_id: i64) -> Result<Vec<Sale>, StoreError> {
        let rows = self.executor.query_all(
            &select_sales("WHERE stock_lot_id = ?1 ORDER BY sale_date DESC, created_at DESC, id DESC"),
            &[&stock_lot_id],
        )?;
        rows.iter().map(|row| self.decode_sale(row)).collect()
    }

    /// An existing sale with the same lot, date and form whose decrypted customer and
    /// quantity also match
    pub fn find_matching_sale(
        &self,
        stock_lot_id: i64,
        sale_date: NaiveDate,
        form: Option<SaleForm>,
        customer_name: &str,
        quantity: Decimal,
    ) -> Result<Option<i64>, StoreError> {
        let date = sale_date.format(DATE_FORMAT).to_string();
        let form = form.map(|f| f.as_str());
        let rows = self.executor.query_all(
            "SELECT id, customer_name, quantity_sold FROM sales \
             WHERE stock_lot_id = ?1 AND sale_date = ?2 AND form IS ?3",
            &[&stock_lot_id, &date, &form],
        )?;
        for row in &rows {
            let stored_customer = row.get_opt_string(1).unwrap_or_default();
            if self.crypto.open_or_keep("customer_name", &stored_customer) != customer_name.trim() {
                continue;
            }
            let stored_quantity = row.get_opt_string(2).unwrap_or_default();
            let existing = parse_decimal(&self.crypto.open_or_keep("quantity_sold", &stored_quantity));
            if existing == Some(quantity) {
                return Ok(Some(row.get_i64(0)?));
            }
        }
        Ok(None)
    }

    /// Apply a partial update; a new quantity is checked against the lot's balance
    /// without the sale's previous quantity.
    pub fn update_sale(&self, id: i64, update: &SaleUpdate) -> Result<(), InventoryError> {
        let current = self.get_sale(id)?;
        if *update == SaleUpdate::default() {
            return Ok(());
        }

        let mut record = Record::new();
        if let Some(customer) = &update.customer_name {
            record.set("customer_name", Field::text(check_customer(customer)?));
        }
        if let Some(quantity) = update.quantity_sold {
            check_quantity(quantity)?;
            let lot = self.get_stock_lot(current.stock_lot_id)?;
            LotBalance::load(self.executor, self.crypto, lot.id, lot.weight, Some(id))?.admit(quantity)?;
            record.set("quantity_sold", Field::Number(quantity));
        }
        if let Some(form) = update.form {
            record.set("form", Field::text(form.as_str()));
        }
        if let Some(date) = update.sale_date {
            record.set("sale_date", Field::text(date.format(DATE_FORMAT).to_string()));
        }

        let sealed = self.crypto.encrypt_record(EntityKind::Sale, &record)?;
        update_record(self.executor, "sales", id, &sealed)?;
        Ok(())
    }

    pub fn delete_sale(&self, id: i64) -> Result<(), InventoryError> {
        let deleted = self.executor.execute("DELETE FROM sales WHERE id = ?1", &[&id])?;
        if deleted == 0 {
            return Err(InventoryError::NotFound { entity: "Sale", id });
        }
        Ok(())
    }

    fn decode_sale(&self, row: &Row) -> Result<Sale, StoreError> {
        let rec = self.open_row(EntityKind::Sale, SALE_COLUMNS, row);
        let id = row.get_i64(0)?;
        let quantity_sold = rec.decimal("quantity_sold").unwrap_or_else(|| {
            log::warn!("Sale {id} has no readable quantity, using 0");
            Decimal::ZERO
        });
        Ok(Sale {
            id,
            stock_lot_id: row.get_i64(1)?,
            customer_name: rec.text("customer_name").unwrap_or_default(),
            quantity_sold,
            form: rec.text("form").filter(|f| !f.is_empty()),
            sale_date: parse_stored_date(&row.get_string(5)?)?,
            dimensions_snapshot: rec
                .text("dimensions_snapshot")
                .map(|s| decode_snapshot(&s))
                .unwrap_or_default(),
            created_at: row_timestamp(row, 7)?,
            updated_at: row_timestamp(row, 8)?,
        })
    }
}
