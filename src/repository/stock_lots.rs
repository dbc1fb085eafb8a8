//! Stock lots and their dimensions.

use std::collections::HashMap;

use rust_decimal::Decimal;

use super::{insert_record, row_timestamp, update_record, Repository};
use crate::balance::{balance, total_sold};
use crate::crypto::{EntityKind, Field, Record};
use crate::error::InventoryError;
use crate::executor::{Row, StoreError, StoreExecutor};
use crate::model::{
    parse_stored_date, Dimension, LotFilter, LotWithBalance, NewStockLot, StockLot, StockLotUpdate, DATE_FORMAT,
};

const LOT_COLUMNS: &[&str] = &[
    "id",
    "entry_date",
    "serial_number",
    "type",
    "weight",
    "lot_code",
    "quality",
    "coating",
    "specifications",
    "form",
    "customer_name",
    "completed",
    "at_dc",
    "created_at",
    "updated_at",
];

fn select_lots(filter: &str) -> String {
    format!("SELECT {} FROM stock_lots {filter}", LOT_COLUMNS.join(", "))
}

pub(crate) fn insert_dimensions(
    executor: &dyn StoreExecutor,
    stock_lot_id: i64,
    dimensions: &[Dimension],
) -> Result<(), StoreError> {
    for dim in dimensions {
        executor.execute(
            "INSERT INTO dimensions (stock_lot_id, thickness, width) VALUES (?1, ?2, ?3)",
            &[&stock_lot_id, &dim.thickness_f64(), &dim.width()],
        )?;
    }
    Ok(())
}

fn lot_record(lot: &NewStockLot) -> Record {
    Record::new()
        .with("entry_date", Field::text(lot.entry_date.format(DATE_FORMAT).to_string()))
        .with("serial_number", Field::text(lot.serial_number.trim()))
        .with("type", Field::text(lot.steel_type.as_str()))
        .with("weight", Field::Number(lot.weight))
        .with("lot_code", Field::text(lot.lot_code.trim()))
        .with("quality", Field::text(lot.quality.as_str()))
        .with("coating", Field::opt_text(lot.coating.as_deref()))
        .with("specifications", Field::opt_text(lot.specifications.as_deref()))
        .with("form", Field::opt_text(lot.form.as_deref()))
        .with("customer_name", Field::opt_text(lot.customer_name.as_deref()))
        .with("completed", Field::Integer(0))
        .with("at_dc", Field::Integer(0))
}

impl<'a> Repository<'a> {
    /// Create a lot together with its dimensions.
    ///
    /// # Errors
    ///
    /// `Validation` for a blank serial, non-positive weight or no dimensions;
    /// `DuplicateSerial` when another lot already carries the serial number.
    pub fn add_stock_lot(&self, lot: &NewStockLot) -> Result<i64, InventoryError> {
        let serial = lot.serial_number.trim();
        if serial.is_empty() {
            return Err(InventoryError::validation("Serial number is required"));
        }
        if lot.weight <= Decimal::ZERO {
            return Err(InventoryError::validation(format!(
                "Weight must be a positive number, got {}",
                lot.weight
            )));
        }
        if lot.dimensions.is_empty() {
            return Err(InventoryError::validation("At least one dimension is required"));
        }
        if self.find_serial_id(serial)?.is_some() {
            return Err(InventoryError::DuplicateSerial(serial.to_string()));
        }

        let sealed = self.crypto.encrypt_record(EntityKind::StockLot, &lot_record(lot))?;
        let tx = self.executor.transaction()?;
        let id = insert_record(&tx, "stock_lots", &sealed)?;
        insert_dimensions(&tx, id, &lot.dimensions)?;
        tx.commit()?;

        log::debug!("Created stock lot {id} with {} dimension(s)", lot.dimensions.len());
        Ok(id)
    }

    /// Every lot, decrypted, most recent entry first
    pub fn list_stock_lots(&self) -> Result<Vec<StockLot>, InventoryError> {
        let rows = self
            .executor
            .query_all(&select_lots("ORDER BY entry_date DESC, created_at DESC, id DESC"), &[])?;
        let mut dimensions = self.all_dimensions()?;
        let mut lots = rows
            .iter()
            .map(|row| self.decode_lot(row))
            .collect::<Result<Vec<_>, _>>()?;
        for lot in &mut lots {
            lot.dimensions = dimensions.remove(&lot.id).unwrap_or_default();
        }
        Ok(lots)
    }

    /// Lots matching `filter`; the comparison runs on decrypted values
    pub fn find_stock_lots(&self, filter: &LotFilter) -> Result<Vec<StockLot>, InventoryError> {
        Ok(self
            .list_stock_lots()?
            .into_iter()
            .filter(|lot| filter.matches(lot))
            .collect())
    }

    pub fn get_stock_lot(&self, id: i64) -> Result<StockLot, InventoryError> {
        let row = self
            .executor
            .query_optional(&select_lots("WHERE id = ?1"), &[&id])?
            .ok_or(InventoryError::NotFound { entity: "Stock lot", id })?;
        let mut lot = self.decode_lot(&row)?;
        lot.dimensions = self.dimensions_for(id)?;
        Ok(lot)
    }

    /// The lot whose decrypted serial number equals `serial` exactly
    pub fn find_by_serial(&self, serial: &str) -> Result<Option<StockLot>, InventoryError> {
        match self.find_serial_id(serial)? {
            Some(id) => self.get_stock_lot(id).map(Some),
            None => Ok(None),
        }
    }

    /// Id of the lot with this serial number, decrypting every stored serial
    pub fn find_serial_id(&self, serial: &str) -> Result<Option<i64>, StoreError> {
        Ok(self.serial_index()?.remove(serial))
    }

    /// Decrypted serial number to lot id, for callers that look up many serials
    pub fn serial_index(&self) -> Result<HashMap<String, i64>, StoreError> {
        let rows = self
            .executor
            .query_all("SELECT id, serial_number FROM stock_lots ORDER BY id", &[])?;
        let mut index = HashMap::with_capacity(rows.len());
        for row in &rows {
            let id = row.get_i64(0)?;
            let stored = row.get_opt_string(1).unwrap_or_default();
            let serial = self.crypto.open_or_keep("serial_number", &stored);
            index.entry(serial).or_insert(id);
        }
        Ok(index)
    }

    /// Apply a partial update.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown id, `DuplicateSerial` when the new serial belongs to another
    /// lot, `Validation` when the new weight is not positive or is below what was already sold
    /// or the new dimension list is empty.
    pub fn update_stock_lot(&self, id: i64, update: &StockLotUpdate) -> Result<(), InventoryError> {
        let current = self.get_stock_lot(id)?;
        if update.is_empty() {
            return Ok(());
        }

        let mut record = Record::new();
        if let Some(date) = update.entry_date {
            record.set("entry_date", Field::text(date.format(DATE_FORMAT).to_string()));
        }
        if let Some(serial) = &update.serial_number {
            let serial = serial.trim();
            if serial.is_empty() {
                return Err(InventoryError::validation("Serial number is required"));
            }
            if self.find_serial_id(serial)?.is_some_and(|other| other != id) {
                return Err(InventoryError::DuplicateSerial(serial.to_string()));
            }
            record.set("serial_number", Field::text(serial));
        }
        if let Some(steel_type) = update.steel_type {
            record.set("type", Field::text(steel_type.as_str()));
        }
        if let Some(weight) = update.weight {
            if weight <= Decimal::ZERO {
                return Err(InventoryError::validation(format!(
                    "Weight must be a positive number, got {weight}"
                )));
            }
            let sold = total_sold(self.executor, self.crypto, id)?;
            if weight < sold {
                return Err(InventoryError::validation(format!(
                    "Weight {weight} is below the quantity already sold ({sold}) for serial number {}",
                    current.serial_number
                )));
            }
            record.set("weight", Field::Number(weight));
        }
        if let Some(lot_code) = &update.lot_code {
            record.set("lot_code", Field::text(lot_code.trim()));
        }
        if let Some(quality) = update.quality {
            record.set("quality", Field::text(quality.as_str()));
        }
        for (column, value) in [
            ("coating", &update.coating),
            ("specifications", &update.specifications),
            ("form", &update.form),
            ("customer_name", &update.customer_name),
        ] {
            if let Some(value) = value {
                record.set(column, Field::opt_text(Some(value.as_str())));
            }
        }
        if let Some(dims) = &update.dimensions {
            if dims.is_empty() {
                return Err(InventoryError::validation("At least one dimension is required"));
            }
        }

        let sealed = self.crypto.encrypt_record(EntityKind::StockLot, &record)?;
        let tx = self.executor.transaction()?;
        update_record(&tx, "stock_lots", id, &sealed)?;
        if let Some(dims) = &update.dimensions {
            tx.execute("DELETE FROM dimensions WHERE stock_lot_id = ?1", &[&id])?;
            insert_dimensions(&tx, id, dims)?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Delete a lot; its dimensions and sales go with it
    pub fn delete_stock_lot(&self, id: i64) -> Result<(), InventoryError> {
        let deleted = self.executor.execute("DELETE FROM stock_lots WHERE id = ?1", &[&id])?;
        if deleted == 0 {
            return Err(InventoryError::NotFound { entity: "Stock lot", id });
        }
        Ok(())
    }

    pub fn add_dimensions(&self, id: i64, dimensions: &[Dimension]) -> Result<(), InventoryError> {
        self.ensure_lot_exists(id)?;
        let tx = self.executor.transaction()?;
        insert_dimensions(&tx, id, dimensions)?;
        tx.commit()?;
        Ok(())
    }

    /// Remove every dimension of the lot equal to `dimension`.
    ///
    /// # Errors
    ///
    /// `Validation` when that would leave the lot without dimensions.
    pub fn remove_dimension(&self, id: i64, dimension: &Dimension) -> Result<usize, InventoryError> {
        let current = self.dimensions_for(id)?;
        let remaining = current.iter().filter(|d| *d != dimension).count();
        if remaining == current.len() {
            return Ok(0);
        }
        if remaining == 0 {
            return Err(InventoryError::validation("A stock lot must keep at least one dimension"));
        }
        let removed = self.executor.execute(
            "DELETE FROM dimensions WHERE stock_lot_id = ?1 AND ROUND(thickness, 2) = ROUND(?2, 2) AND width = ?3",
            &[&id, &dimension.thickness_f64(), &dimension.width()],
        )?;
        Ok(removed)
    }

    /// Dimensions of a lot, thinnest then narrowest first
    pub fn dimensions_for(&self, id: i64) -> Result<Vec<Dimension>, StoreError> {
        let rows = self.executor.query_all(
            "SELECT thickness, width FROM dimensions WHERE stock_lot_id = ?1 ORDER BY thickness, width",
            &[&id],
        )?;
        rows.iter().map(decode_dimension).collect()
    }

    fn all_dimensions(&self) -> Result<HashMap<i64, Vec<Dimension>>, StoreError> {
        let rows = self.executor.query_all(
            "SELECT stock_lot_id, thickness, width FROM dimensions ORDER BY stock_lot_id, thickness, width",
            &[],
        )?;
        let mut by_lot: HashMap<i64, Vec<Dimension>> = HashMap::new();
        for row in &rows {
            let dim = Dimension::from_stored(row.get_f64(1)?, row.get_i64(2)?);
            by_lot.entry(row.get_i64(0)?).or_default().push(dim);
        }
        Ok(by_lot)
    }

    /// Mark every lot whose decrypted lot code equals `lot_code`; returns how many changed
    pub fn set_lot_completion(&self, lot_code: &str, completed: bool) -> Result<usize, InventoryError> {
        let rows = self.executor.query_all("SELECT id, lot_code FROM stock_lots", &[])?;
        let tx = self.executor.transaction()?;
        let mut changed = 0;
        for row in &rows {
            let stored = row.get_opt_string(1).unwrap_or_default();
            if self.crypto.open_or_keep("lot_code", &stored) == lot_code {
                changed += tx.execute(
                    "UPDATE stock_lots SET completed = ?1, updated_at = CURRENT_TIMESTAMP WHERE id = ?2",
                    &[&completed, &row.get_i64(0)?],
                )?;
            }
        }
        tx.commit()?;
        log::info!("Lot {lot_code}: {changed} stock lot(s) marked completed={completed}");
        Ok(changed)
    }

    /// Move lots to the distribution center.
    ///
    /// All or nothing: a lot sold through the legacy customer field cannot be sent, and one
    /// such lot in `ids` rejects the whole request.
    pub fn send_to_dc(&self, ids: &[i64]) -> Result<usize, InventoryError> {
        let mut sold = Vec::new();
        for &id in ids {
            let lot = self.get_stock_lot(id)?;
            if lot.has_legacy_customer() {
                sold.push(lot.serial_number);
            }
        }
        if !sold.is_empty() {
            return Err(InventoryError::validation(format!(
                "Cannot send sold items to DC: {} item(s) are already sold ({})",
                sold.len(),
                sold.join(", ")
            )));
        }
        self.set_dc_flag(ids, true)
    }

    pub fn return_from_dc(&self, ids: &[i64]) -> Result<usize, InventoryError> {
        self.set_dc_flag(ids, false)
    }

    fn set_dc_flag(&self, ids: &[i64], at_dc: bool) -> Result<usize, InventoryError> {
        let tx = self.executor.transaction()?;
        let mut changed = 0;
        for id in ids {
            changed += tx.execute(
                "UPDATE stock_lots SET at_dc = ?1, updated_at = CURRENT_TIMESTAMP WHERE id = ?2",
                &[&at_dc, id],
            )?;
        }
        tx.commit()?;
        Ok(changed)
    }

    /// Every lot with its balance and the customers it was sold to
    pub fn list_with_balance(&self, filter: &LotFilter) -> Result<Vec<LotWithBalance>, InventoryError> {
        self.find_stock_lots(filter)?
            .into_iter()
            .map(|lot| -> Result<LotWithBalance, InventoryError> {
                let sold = total_sold(self.executor, self.crypto, lot.id)?;
                let mut customers: Vec<String> = Vec::new();
                for sale in self.sales_for_lot(lot.id)? {
                    if !sale.customer_name.is_empty() && !customers.contains(&sale.customer_name) {
                        customers.push(sale.customer_name);
                    }
                }
                Ok(LotWithBalance {
                    balance: balance(lot.weight, sold),
                    total_sold: sold,
                    customers,
                    lot,
                })
            })
            .collect()
    }

    pub(crate) fn ensure_lot_exists(&self, id: i64) -> Result<(), InventoryError> {
        self.executor
            .query_optional("SELECT id FROM stock_lots WHERE id = ?1", &[&id])?
            .map(|_| ())
            .ok_or(InventoryError::NotFound { entity: "Stock lot", id })
    }

    fn decode_lot(&self, row: &Row) -> Result<StockLot, StoreError> {
        let rec = self.open_row(EntityKind::StockLot, LOT_COLUMNS, row);
        let id = row.get_i64(0)?;
        let weight = rec.decimal("weight").unwrap_or_else(|| {
            log::warn!("Stock lot {id} has no readable weight, using 0");
            Decimal::ZERO
        });
        Ok(StockLot {
            id,
            entry_date: parse_stored_date(&row.get_string(1)?)?,
            serial_number: rec.text("serial_number").unwrap_or_default(),
            steel_type: rec.text("type").unwrap_or_default(),
            weight,
            lot_code: rec.text("lot_code").unwrap_or_default(),
            quality: rec.text("quality").unwrap_or_default(),
            coating: rec.text("coating"),
            specifications: rec.text("specifications"),
            form: rec.text("form"),
            customer_name: rec.text("customer_name"),
            completed: row.get_bool(11)?,
            at_dc: row.get_bool(12)?,
            dimensions: Vec::new(),
            created_at: row_timestamp(row, 13)?,
            updated_at: row_timestamp(row, 14)?,
        })
    }
}

fn decode_dimension(row: &Row) -> Result<Dimension, StoreError> {
    Ok(Dimension::from_stored(row.get_f64(0)?, row.get_i64(1)?))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::crypto::{FieldValue, RecordCrypto};
    use crate::model::{Quality, SteelType};
    use crate::repository::tests::store;
    use chrono::NaiveDate;
    use std::str::FromStr;

    pub(crate) fn d(text: &str) -> Decimal {
        Decimal::from_str(text).unwrap()
    }

    pub(crate) fn new_lot(serial: &str, weight: &str) -> NewStockLot {
        NewStockLot {
            entry_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            serial_number: serial.to_string(),
            steel_type: SteelType::E,
            weight: d(weight),
            lot_code: "LOT-X".to_string(),
            quality: Quality::Soft,
            coating: Some("ZincA".to_string()),
            specifications: Some("Grade1".to_string()),
            form: Some("Coil".to_string()),
            customer_name: None,
            dimensions: vec![Dimension::new(d("2.0"), d("100")), Dimension::new(d("1.5"), d("120"))],
        }
    }

    #[test]
    fn test_add_and_read_back() {
        let (exec, cipher) = store();
        let repo = Repository::new(&exec, RecordCrypto::new(&cipher, true));
        let id = repo.add_stock_lot(&new_lot("100", "500")).unwrap();

        let stored = exec
            .query_one("SELECT serial_number, weight, entry_date FROM stock_lots WHERE id = ?1", &[&id])
            .unwrap();
        assert!(matches!(
            repo.crypto().classify(&stored.get_string(0).unwrap()),
            FieldValue::Encrypted(_)
        ));
        assert_eq!(stored.get_string(2).unwrap(), "2024-06-01");

        let lot = repo.get_stock_lot(id).unwrap();
        assert_eq!(lot.serial_number, "100");
        assert_eq!(lot.weight, d("500"));
        assert_eq!(lot.coating.as_deref(), Some("ZincA"));
        assert_eq!(Dimension::join(&lot.dimensions), "1.50×120; 2.00×100");
        assert_eq!(repo.find_by_serial("100").unwrap().unwrap().id, id);
        assert!(repo.find_by_serial("10").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_serial_rejected() {
        let (exec, cipher) = store();
        let repo = Repository::new(&exec, RecordCrypto::new(&cipher, true));
        repo.add_stock_lot(&new_lot("100", "500")).unwrap();
        let err = repo.add_stock_lot(&new_lot("100", "20")).unwrap_err();
        assert!(matches!(err, InventoryError::DuplicateSerial(s) if s == "100"));
        assert_eq!(repo.list_stock_lots().unwrap().len(), 1);
    }

    #[test]
    fn test_lot_requires_dimensions_and_weight() {
        let (exec, cipher) = store();
        let repo = Repository::new(&exec, RecordCrypto::new(&cipher, true));
        let mut lot = new_lot("1", "0");
        assert!(matches!(repo.add_stock_lot(&lot), Err(InventoryError::Validation(_))));
        lot.weight = d("5");
        lot.dimensions.clear();
        assert!(matches!(repo.add_stock_lot(&lot), Err(InventoryError::Validation(_))));
    }

    #[test]
    fn test_update_replaces_dimensions_and_fields() {
        let (exec, cipher) = store();
        let repo = Repository::new(&exec, RecordCrypto::new(&cipher, true));
        let id = repo.add_stock_lot(&new_lot("100", "500")).unwrap();
        let update = StockLotUpdate {
            lot_code: Some("LOT-Y".to_string()),
            coating: Some(String::new()),
            dimensions: Some(vec![Dimension::new(d("3"), d("90"))]),
            ..Default::default()
        };
        repo.update_stock_lot(id, &update).unwrap();
        let lot = repo.get_stock_lot(id).unwrap();
        assert_eq!(lot.lot_code, "LOT-Y");
        assert_eq!(lot.coating, None);
        assert_eq!(lot.dimensions, vec![Dimension::new(d("3"), d("90"))]);
    }

    #[test]
    fn test_remove_last_dimension_refused() {
        let (exec, cipher) = store();
        let repo = Repository::new(&exec, RecordCrypto::new(&cipher, true));
        let id = repo.add_stock_lot(&new_lot("100", "500")).unwrap();
        assert_eq!(repo.remove_dimension(id, &Dimension::new(d("2"), d("100"))).unwrap(), 1);
        let err = repo.remove_dimension(id, &Dimension::new(d("1.5"), d("120"))).unwrap_err();
        assert!(matches!(err, InventoryError::Validation(_)));
        repo.add_dimensions(id, &[Dimension::new(d("4"), d("60"))]).unwrap();
        assert_eq!(repo.dimensions_for(id).unwrap().len(), 2);
    }

    #[test]
    fn test_lot_completion_matches_decrypted_code() {
        let (exec, cipher) = store();
        let repo = Repository::new(&exec, RecordCrypto::new(&cipher, true));
        repo.add_stock_lot(&new_lot("1", "5")).unwrap();
        repo.add_stock_lot(&new_lot("2", "5")).unwrap();
        assert_eq!(repo.set_lot_completion("LOT-X", true).unwrap(), 2);
        assert_eq!(repo.set_lot_completion("LOT-Z", true).unwrap(), 0);
        let filter = LotFilter {
            completed: Some(true),
            ..Default::default()
        };
        assert_eq!(repo.find_stock_lots(&filter).unwrap().len(), 2);
    }

    #[test]
    fn test_send_to_dc_refuses_legacy_sold_lot() {
        let (exec, cipher) = store();
        let repo = Repository::new(&exec, RecordCrypto::new(&cipher, true));
        let free = repo.add_stock_lot(&new_lot("1", "5")).unwrap();
        let mut sold = new_lot("2", "5");
        sold.customer_name = Some("Acme".to_string());
        let sold = repo.add_stock_lot(&sold).unwrap();

        let err = repo.send_to_dc(&[free, sold]).unwrap_err();
        assert!(err.to_string().contains("1 item(s) are already sold"));
        assert!(!repo.get_stock_lot(free).unwrap().at_dc);

        assert_eq!(repo.send_to_dc(&[free]).unwrap(), 1);
        assert!(repo.get_stock_lot(free).unwrap().at_dc);
        assert_eq!(repo.return_from_dc(&[free]).unwrap(), 1);
        assert!(!repo.get_stock_lot(free).unwrap().at_dc);
    }

    #[test]
    fn test_delete_cascades() {
        let (exec, cipher) = store();
        let repo = Repository::new(&exec, RecordCrypto::new(&cipher, true));
        let id = repo.add_stock_lot(&new_lot("1", "5")).unwrap();
        repo.delete_stock_lot(id).unwrap();
        let dims = exec.query_one("SELECT COUNT(*) FROM dimensions", &[]).unwrap();
        assert_eq!(dims.get_i64(0).unwrap(), 0);
        assert!(matches!(repo.delete_stock_lot(id), Err(InventoryError::NotFound { .. })));
    }
}
