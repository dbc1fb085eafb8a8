//! Sales layouts: one sale per line, referencing its lot by serial number.

use super::csv_line::{header_matches, split_header, split_line, CsvText};
use super::fields::{is_blank, normalize_date, positive_number, SaleColumns};
use super::outcome::{ImportOutcome, RowVerdict};
use super::ImportError;
use crate::error::InventoryError;
use crate::model::{NewSale, SaleForm};
use crate::repository::Repository;

/// Column order of the dashboard export
pub const DASHBOARD_SALES_HEADER: [&str; 12] = [
    "Sale Date",
    "Entry Number",
    "Item Type",
    "Dimensions",
    "Sold To",
    "Quantity Sold",
    "Form",
    "Item Coating",
    "Item Specifications",
    "Item Form",
    "Item LOT",
    "Item Quality",
];

/// Column order of the sales dialog export
pub const DIALOG_SALES_HEADER: [&str; 12] = [
    "Sale Date",
    "Dimensions",
    "Sold To",
    "Quantity Sold",
    "Form",
    "Entry Number",
    "Item Type",
    "Item Coating",
    "Item Specifications",
    "Item Form",
    "Item LOT",
    "Item Quality",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SalesLayout {
    Dashboard,
    Dialog,
}

impl SalesLayout {
    fn detect(header: &[String]) -> Option<Self> {
        if header_matches(header, &DASHBOARD_SALES_HEADER) {
            Some(SalesLayout::Dashboard)
        } else if header_matches(header, &DIALOG_SALES_HEADER) {
            Some(SalesLayout::Dialog)
        } else {
            None
        }
    }

    /// (sale date, entry number, sold to, quantity, form)
    fn positions(self) -> [usize; 5] {
        match self {
            SalesLayout::Dashboard => [0, 1, 4, 5, 6],
            SalesLayout::Dialog => [0, 5, 2, 3, 4],
        }
    }
}

pub(super) fn run(repo: &Repository<'_>, text: &str) -> Result<ImportOutcome, ImportError> {
    let csv = CsvText::parse(text)?;
    let header = split_header(csv.header, ',');
    let layout = SalesLayout::detect(&header).ok_or_else(|| {
        ImportError::HeaderMismatch(format!(
            "Invalid CSV format. Expected headers either:\n{}\nor:\n{}",
            DASHBOARD_SALES_HEADER.join(", "),
            DIALOG_SALES_HEADER.join(", ")
        ))
    })?;
    log::debug!("Sales import uses the {layout:?} column order");

    let [date_at, serial_at, customer_at, quantity_at, form_at] = layout.positions();
    let mut outcome = ImportOutcome::default();
    for (line_no, line) in csv.rows {
        let label = format!("Row {line_no}");
        let values = split_line(line, ',');
        if values.len() != DASHBOARD_SALES_HEADER.len() {
            outcome.error(format!(
                "{label}: Expected {} columns, got {}",
                DASHBOARD_SALES_HEADER.len(),
                values.len()
            ));
            continue;
        }

        let serial = values[serial_at].as_str();
        let columns = SaleColumns {
            sale_date: &values[date_at],
            customer_name: &values[customer_at],
            quantity_sold: &values[quantity_at],
            form: &values[form_at],
        };
        if [columns.sale_date, serial, columns.customer_name, columns.quantity_sold]
            .iter()
            .any(|v| v.is_empty())
        {
            outcome.error(format!(
                "{label}: Missing required fields (Sale Date, Entry Number, Sold To, Quantity Sold)"
            ));
            continue;
        }

        let lot_id = match repo.find_serial_id(serial) {
            Ok(Some(id)) => id,
            Ok(None) => {
                outcome.error(format!("{label}: No inventory item found with Entry Number \"{serial}\""));
                continue;
            }
            Err(e) => {
                outcome.error(format!("{label}: {e}"));
                continue;
            }
        };

        if import_sale_row(repo, lot_id, serial, columns, &label).apply(&mut outcome) {
            outcome.succeeded += 1;
            outcome.sales_created += 1;
        }
    }
    Ok(outcome)
}

/// Validate one sale line against lot `lot_id` and record it.
///
/// Duplicates are checked before the balance, so re-importing a file skips its sales
/// instead of reporting them as over-sold.
pub(super) fn import_sale_row(
    repo: &Repository<'_>,
    lot_id: i64,
    serial: &str,
    columns: SaleColumns<'_>,
    label: &str,
) -> RowVerdict {
    let Some(sale_date) = normalize_date(columns.sale_date) else {
        return RowVerdict::Failed(format!("{label}: Invalid sale date format \"{}\"", columns.sale_date));
    };
    let Some(quantity) = positive_number(columns.quantity_sold) else {
        return RowVerdict::Failed(format!(
            "{label}: Invalid quantity \"{}\". Must be a positive number",
            columns.quantity_sold
        ));
    };
    let form = if is_blank(columns.form) {
        None
    } else {
        match SaleForm::parse_optional(columns.form) {
            Ok(form) => form,
            Err(message) => return RowVerdict::Failed(format!("{label}: {message}")),
        }
    };
    let customer = columns.customer_name.trim();

    match repo.find_matching_sale(lot_id, sale_date, form, customer, quantity) {
        Ok(Some(_)) => {
            return RowVerdict::Skipped(format!(
                "{label}: Sale already exists for item {serial} on {sale_date} to {customer}"
            ))
        }
        Ok(None) => {}
        Err(e) => return RowVerdict::Failed(format!("{label}: {e}")),
    }

    let sale = NewSale {
        stock_lot_id: lot_id,
        customer_name: customer.to_string(),
        quantity_sold: quantity,
        form,
        sale_date,
        dimensions_snapshot: None,
    };
    match repo.add_sale(&sale) {
        Ok(id) => {
            log::debug!("{label}: recorded sale {id} for item {serial}");
            RowVerdict::Inserted
        }
        Err(e @ InventoryError::OverSell { .. }) => RowVerdict::Failed(format!("{label}: {e} for item {serial}")),
        Err(e) => RowVerdict::Failed(format!("{label}: {e}")),
    }
}
