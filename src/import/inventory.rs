//! Inventory layout: one stock lot per line.

use super::csv_line::{header_matches, split_header, split_line, CsvText};
use super::fields::LotColumns;
use super::outcome::ImportOutcome;
use super::ImportError;
use crate::error::InventoryError;
use crate::repository::Repository;

pub const INVENTORY_HEADER: [&str; 11] = [
    "Entry Date",
    "S.No",
    "Type",
    "Dimensions",
    "Weight",
    "Coating",
    "Specifications",
    "Item Form",
    "LOT",
    "Quality",
    "Balance",
];

pub(super) fn run(repo: &Repository<'_>, text: &str) -> Result<ImportOutcome, ImportError> {
    let csv = CsvText::parse(text)?;
    let header = split_header(csv.header, ',');
    if !header_matches(&header, &INVENTORY_HEADER) {
        return Err(ImportError::HeaderMismatch(format!(
            "Invalid CSV format. Expected headers: {}",
            INVENTORY_HEADER.join(", ")
        )));
    }

    let mut outcome = ImportOutcome::default();
    for (line_no, line) in csv.rows {
        let label = format!("Row {line_no}");
        let values = split_line(line, ',');
        if values.len() != INVENTORY_HEADER.len() {
            outcome.error(format!(
                "{label}: Expected {} columns, got {}",
                INVENTORY_HEADER.len(),
                values.len()
            ));
            continue;
        }

        let columns = LotColumns {
            entry_date: &values[0],
            serial_number: &values[1],
            steel_type: &values[2],
            dimensions: &values[3],
            weight: &values[4],
            coating: &values[5],
            specifications: &values[6],
            form: &values[7],
            lot_code: &values[8],
            quality: &values[9],
        };
        let lot = match columns.to_new_lot() {
            Ok(lot) => lot,
            Err(message) => {
                outcome.error(format!("{label}: {message}"));
                continue;
            }
        };

        match repo.find_serial_id(&lot.serial_number) {
            Ok(Some(_)) => {
                outcome.skip(duplicate_message(&label, &lot.serial_number));
                continue;
            }
            Ok(None) => {}
            Err(e) => {
                outcome.error(format!("{label}: {e}"));
                continue;
            }
        }

        match repo.add_stock_lot(&lot) {
            Ok(id) => {
                log::debug!("{label}: created stock lot {id}");
                outcome.succeeded += 1;
                outcome.lots_created += 1;
            }
            Err(InventoryError::DuplicateSerial(serial)) => outcome.skip(duplicate_message(&label, &serial)),
            Err(e) => outcome.error(format!("{label}: {e}")),
        }
    }
    Ok(outcome)
}

fn duplicate_message(label: &str, serial: &str) -> String {
    format!("{label}: Item with S.No \"{serial}\" already exists, skipped")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::RecordCrypto;
    use crate::import::import_inventory;
    use crate::model::Dimension;
    use crate::repository::stock_lots::tests::d;
    use crate::repository::tests::store;

    const HEADER: &str = "Entry Date,S.No,Type,Dimensions,Weight,Coating,Specifications,Item Form,LOT,Quality,Balance";

    #[test]
    fn test_imports_lot_with_dimensions() {
        let (exec, cipher) = store();
        let repo = Repository::new(&exec, RecordCrypto::new(&cipher, true));
        let text = format!(
            "{HEADER}\n01/06/2024,100,E,\"1.50×120; 2×1219.6\",500,'ZincA,Grade1,Coil,LOT-X,Soft,500\n"
        );

        let outcome = import_inventory(&repo, &text).unwrap();
        assert_eq!(outcome.succeeded, 1);
        assert!(outcome.is_clean());

        let lot = repo.find_by_serial("100").unwrap().unwrap();
        assert_eq!(lot.weight, d("500"));
        assert_eq!(lot.coating.as_deref(), Some("ZincA"));
        assert_eq!(
            lot.dimensions,
            vec![Dimension::new(d("1.5"), d("120")), Dimension::new(d("2"), d("1220"))]
        );
    }

    #[test]
    fn test_row_errors_do_not_stop_the_batch() {
        let (exec, cipher) = store();
        let repo = Repository::new(&exec, RecordCrypto::new(&cipher, true));
        let text = format!(
            "{HEADER}\n\
             31/02/2024,1,E,,10,,,,L,Soft,\n\
             01/06/2024,2,E,,abc,,,,L,Soft,\n\
             01/06/2024,3,Q,,10,,,,L,Soft,\n\
             01/06/2024,4,E,,10\n\
             01/06/2024,5,E,,10,,,,L,Hard,\n"
        );

        let outcome = import_inventory(&repo, &text).unwrap();
        assert_eq!(outcome.succeeded, 1);
        assert_eq!(outcome.errored, 4);
        assert!(outcome.messages[0].starts_with("Row 2: Invalid date format"));
        assert!(outcome.messages[1].starts_with("Row 3: Invalid weight"));
        assert!(outcome.messages[2].starts_with("Row 4: Invalid type"));
        assert_eq!(outcome.messages[3], "Row 5: Expected 11 columns, got 5");
    }

    #[test]
    fn test_duplicate_serial_within_file_is_skipped() {
        let (exec, cipher) = store();
        let repo = Repository::new(&exec, RecordCrypto::new(&cipher, true));
        let text = format!("{HEADER}\n01/06/2024,7,E,,10,,,,L,Soft,\n2024-06-02,7,GA,,20,,,,L,Hard,\n");

        let outcome = import_inventory(&repo, &text).unwrap();
        assert_eq!((outcome.succeeded, outcome.skipped), (1, 1));
        assert_eq!(outcome.messages, vec!["Row 3: Item with S.No \"7\" already exists, skipped"]);
        assert_eq!(repo.list_stock_lots().unwrap().len(), 1);
    }

    #[test]
    fn test_header_must_match_exactly() {
        let (exec, cipher) = store();
        let repo = Repository::new(&exec, RecordCrypto::new(&cipher, true));
        let lowercase = format!("{}\n01/06/2024,7,E,,10,,,,L,Soft,\n", HEADER.to_lowercase());
        assert_eq!(import_inventory(&repo, &lowercase).unwrap().succeeded, 1);

        let err = import_inventory(&repo, "Entry Date,S.No\n01/06/2024,8\n").unwrap_err();
        assert!(matches!(err, ImportError::HeaderMismatch(ref m) if m.contains("Entry Date, S.No, Type")));
    }
}
