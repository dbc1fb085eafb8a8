//! Encryption diagnostics and bulk conversions over every sensitive value.

use serde::Serialize;

use super::{update_record, Repository};
use crate::crypto::{sensitive_fields, EntityKind, Field, Record, RecordCrypto};
use crate::error::InventoryError;
use crate::executor::{StoreError, StoreExecutor};

const SAMPLE_SIZE: usize = 5;

const TABLES: &[(EntityKind, &str, &str)] = &[
    (EntityKind::StockLot, "stock_lots", "Stock lot"),
    (EntityKind::Sale, "sales", "Sale"),
];

/// What a sample of one table holds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SampleStatus {
    pub has_encrypted: bool,
    pub has_plaintext: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EncryptionStatus {
    pub stock_lots: SampleStatus,
    pub sales: SampleStatus,
    pub total_stock_lots: i64,
    pub total_sales: i64,
}

impl EncryptionStatus {
    /// Every sampled sensitive value is ciphertext
    pub fn is_fully_encrypted(&self) -> bool {
        !self.stock_lots.has_plaintext && !self.sales.has_plaintext
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LegacyEncryptionReport {
    pub stock_lots_updated: usize,
    pub sales_updated: usize,
    pub values_encrypted: usize,
}

/// `(id, [(column, stored)])` for every row of `table`, non-empty sensitive values only
fn sensitive_values(
    executor: &dyn StoreExecutor,
    kind: EntityKind,
    table: &str,
    limit: Option<usize>,
) -> Result<Vec<(i64, Vec<(&'static str, String)>)>, StoreError> {
    let columns = sensitive_fields(kind);
    let limit = limit.map(|n| format!(" LIMIT {n}")).unwrap_or_default();
    let rows = executor.query_all(
        &format!("SELECT id, {} FROM {table} ORDER BY id{limit}", columns.join(", ")),
        &[],
    )?;
    rows.iter()
        .map(|row| {
            let values = columns
                .iter()
                .enumerate()
                .filter_map(|(idx, column)| {
                    row.get_opt_string(idx + 1)
                        .filter(|v| !v.is_empty())
                        .map(|v| (*column, v))
                })
                .collect();
            Ok((row.get_i64(0)?, values))
        })
        .collect()
}

fn count(executor: &dyn StoreExecutor, table: &str) -> Result<i64, StoreError> {
    executor.query_one(&format!("SELECT COUNT(*) FROM {table}"), &[])?.get_i64(0)
}

impl<'a> Repository<'a> {
    /// Sample up to five lots and five sales and report which representations they hold
    pub fn encryption_status(&self) -> Result<EncryptionStatus, InventoryError> {
        let mut status = EncryptionStatus {
            total_stock_lots: count(self.executor, "stock_lots")?,
            total_sales: count(self.executor, "sales")?,
            ..Default::default()
        };
        for &(kind, table, _) in TABLES {
            let sample = match kind {
                EntityKind::StockLot => &mut status.stock_lots,
                EntityKind::Sale => &mut status.sales,
            };
            for (_, values) in sensitive_values(self.executor, kind, table, Some(SAMPLE_SIZE))? {
                for (_, stored) in values {
                    if self.crypto.classify(&stored).is_encrypted() {
                        sample.has_encrypted = true;
                    } else {
                        sample.has_plaintext = true;
                    }
                }
            }
        }
        Ok(status)
    }

    /// Encrypt every plaintext sensitive value in place, in one transaction.
    ///
    /// Values that are already ciphertext are left alone.
    pub fn encrypt_legacy_rows(&self) -> Result<LegacyEncryptionReport, InventoryError> {
        let tx = self.executor.transaction()?;
        let mut report = LegacyEncryptionReport::default();
        for &(kind, table, _) in TABLES {
            for (id, values) in sensitive_values(&tx, kind, table, None)? {
                let mut record = Record::new();
                for (column, stored) in values {
                    if !self.crypto.classify(&stored).is_encrypted() {
                        record.set(column, Field::Text(self.crypto.seal_text(&stored)?));
                    }
                }
                if record.is_empty() {
                    continue;
                }
                report.values_encrypted += record.len();
                update_record(&tx, table, id, &record)?;
                match kind {
                    EntityKind::StockLot => report.stock_lots_updated += 1,
                    EntityKind::Sale => report.sales_updated += 1,
                }
            }
        }
        tx.commit()?;
        log::info!(
            "Encrypted {} plaintext value(s) across {} stock lot(s) and {} sale(s)",
            report.values_encrypted,
            report.stock_lots_updated,
            report.sales_updated
        );
        Ok(report)
    }

    /// Re-encrypt every sensitive value from this repository's key to `target`.
    ///
    /// Runs on the repository's executor; callers wrap it in a transaction. Plaintext values
    /// are sealed too, so the result is fully encrypted under `target`.
    ///
    /// # Errors
    ///
    /// `Undecryptable` for the first stored ciphertext this key cannot open.
    pub(crate) fn reseal_all(&self, target: RecordCrypto<'_>) -> Result<usize, InventoryError> {
        let mut resealed = 0;
        for &(kind, table, entity) in TABLES {
            for (id, values) in sensitive_values(self.executor, kind, table, None)? {
                let mut record = Record::new();
                for (column, stored) in values {
                    let plain = self
                        .crypto
                        .open_strict(&stored)
                        .map_err(|source| InventoryError::Undecryptable {
                            entity,
                            id,
                            column: column.to_string(),
                            source,
                        })?;
                    record.set(column, Field::Text(target.seal_text(&plain)?));
                }
                if !record.is_empty() {
                    resealed += record.len();
                    update_record(self.executor, table, id, &record)?;
                }
            }
        }
        Ok(resealed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::codec::tests::cipher as cipher_for;
    use crate::repository::stock_lots::tests::new_lot;
    use crate::repository::tests::store;

    fn insert_plain_lot(exec: &dyn StoreExecutor) {
        exec.execute_batch(
            "INSERT INTO stock_lots (entry_date, serial_number, type, weight, lot_code, quality)
             VALUES ('2024-01-01', 'OLD-1', 'GA', 250, 'L0', 'Hard')",
        )
        .unwrap();
    }

    #[test]
    fn test_status_reports_mixed_tables() {
        let (exec, cipher) = store();
        let repo = Repository::new(&exec, RecordCrypto::new(&cipher, true));
        let empty = repo.encryption_status().unwrap();
        assert_eq!(empty, EncryptionStatus::default());

        insert_plain_lot(&exec);
        repo.add_stock_lot(&new_lot("100", "500")).unwrap();
        let status = repo.encryption_status().unwrap();
        assert!(status.stock_lots.has_encrypted);
        assert!(status.stock_lots.has_plaintext);
        assert!(!status.is_fully_encrypted());
        assert_eq!(status.total_stock_lots, 2);
    }

    #[test]
    fn test_encrypt_legacy_rows_only_touches_plaintext() {
        let (exec, cipher) = store();
        let repo = Repository::new(&exec, RecordCrypto::new(&cipher, true));
        insert_plain_lot(&exec);
        let fresh = repo.add_stock_lot(&new_lot("100", "500")).unwrap();
        let before = exec
            .query_one("SELECT serial_number FROM stock_lots WHERE id = ?1", &[&fresh])
            .unwrap();

        let report = repo.encrypt_legacy_rows().unwrap();
        assert_eq!(report.stock_lots_updated, 1);
        assert_eq!(report.values_encrypted, 4);
        assert!(repo.encryption_status().unwrap().is_fully_encrypted());

        let after = exec
            .query_one("SELECT serial_number FROM stock_lots WHERE id = ?1", &[&fresh])
            .unwrap();
        assert_eq!(before, after);
        let old = repo.find_by_serial("OLD-1").unwrap().unwrap();
        assert_eq!(old.weight, rust_decimal::Decimal::from(250));

        assert_eq!(repo.encrypt_legacy_rows().unwrap().values_encrypted, 0);
    }

    #[test]
    fn test_reseal_fails_on_foreign_ciphertext() {
        let (exec, cipher) = store();
        let other = cipher_for("9999");
        Repository::new(&exec, RecordCrypto::new(&other, true))
            .add_stock_lot(&new_lot("100", "500"))
            .unwrap();
        let target = cipher_for("5678");
        let err = Repository::new(&exec, RecordCrypto::new(&cipher, true))
            .reseal_all(RecordCrypto::new(&target, true))
            .unwrap_err();
        assert!(matches!(err, InventoryError::Undecryptable { entity: "Stock lot", .. }));
    }
}
