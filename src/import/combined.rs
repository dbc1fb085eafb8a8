//! Combined layout: lot columns followed by one sale per line.
//!
//! A lot with several sales appears on several lines sharing the same serial number. Lines
//! are grouped by serial first; the first line of a group defines the lot.

use std::collections::HashMap;

use super::csv_line::{header_matches, split_header, split_line, CsvText};
use super::fields::{is_blank, LotColumns, SaleColumns};
use super::outcome::ImportOutcome;
use super::sales::import_sale_row;
use super::ImportError;
use crate::repository::Repository;

pub const COMBINED_HEADER: [&str; 16] = [
    "Entry Date",
    "S.No",
    "Type",
    "Item Dimensions",
    "Weight",
    "Coating",
    "Specifications",
    "Item Form",
    "LOT",
    "Quality",
    "Balance",
    "Sale Date",
    "Sale Dimensions",
    "Sold To",
    "Quantity Sold",
    "Form",
];

/// Tab when the header has the full column count split on tabs, else comma when it does
/// split on commas, else tab.
fn detect_delimiter(header: &str) -> char {
    if split_header(header, '\t').len() == COMBINED_HEADER.len() {
        '\t'
    } else if split_header(header, ',').len() == COMBINED_HEADER.len() {
        ','
    } else {
        '\t'
    }
}

fn mismatch_details(found: &[String]) -> String {
    let details: Vec<String> = (0..found.len().max(COMBINED_HEADER.len()))
        .filter_map(|i| {
            let actual = found.get(i).map(String::as_str);
            let expected = COMBINED_HEADER.get(i).copied();
            match (actual, expected) {
                (Some(a), Some(e)) if a.eq_ignore_ascii_case(e) => None,
                _ => Some(format!(
                    "Column {}: Got \"{}\", Expected \"{}\"",
                    i + 1,
                    actual.unwrap_or("MISSING"),
                    expected.unwrap_or("EXTRA")
                )),
            }
        })
        .collect();
    format!(
        "CSV headers don't match expected format.\nMismatches:\n{}\n\nExpected: {}",
        details.join("\n"),
        COMBINED_HEADER.join(", ")
    )
}

/// Every line of one serial number, in file order
struct LotGroup {
    serial: String,
    lines: Vec<Vec<String>>,
}

impl LotGroup {
    fn lot_columns(&self) -> LotColumns<'_> {
        let v = &self.lines[0];
        LotColumns {
            entry_date: &v[0],
            serial_number: &v[1],
            steel_type: &v[2],
            dimensions: &v[3],
            weight: &v[4],
            coating: &v[5],
            specifications: &v[6],
            form: &v[7],
            lot_code: &v[8],
            quality: &v[9],
        }
    }

    /// Lines that carry a sale: date, buyer and quantity all present
    fn sales(&self) -> impl Iterator<Item = SaleColumns<'_>> {
        self.lines
            .iter()
            .filter(|v| !is_blank(&v[11]) && !is_blank(&v[13]) && !is_blank(&v[14]))
            .map(|v| SaleColumns {
                sale_date: &v[11],
                customer_name: &v[13],
                quantity_sold: &v[14],
                form: &v[15],
            })
    }
}

pub(super) fn run(repo: &Repository<'_>, text: &str) -> Result<ImportOutcome, ImportError> {
    let csv = CsvText::parse(text)?;
    let delimiter = detect_delimiter(csv.header);
    let header = split_header(csv.header, delimiter);
    if !header_matches(&header, &COMBINED_HEADER) {
        return Err(ImportError::HeaderMismatch(mismatch_details(&header)));
    }
    log::debug!(
        "Combined import uses {} separators",
        if delimiter == '\t' { "tab" } else { "comma" }
    );

    let mut outcome = ImportOutcome::default();
    let mut groups: Vec<LotGroup> = Vec::new();
    let mut by_serial: HashMap<String, usize> = HashMap::new();
    for (line_no, line) in csv.rows {
        let values = split_line(line, delimiter);
        if values.len() != COMBINED_HEADER.len() {
            outcome.error(format!(
                "Row {line_no}: Expected {} columns, got {}",
                COMBINED_HEADER.len(),
                values.len()
            ));
            continue;
        }
        let serial = values[1].clone();
        match by_serial.get(&serial) {
            Some(&idx) => groups[idx].lines.push(values),
            None => {
                by_serial.insert(serial.clone(), groups.len());
                groups.push(LotGroup {
                    serial,
                    lines: vec![values],
                });
            }
        }
    }

    for group in &groups {
        import_group(repo, group, &mut outcome);
    }
    Ok(outcome)
}

fn import_group(repo: &Repository<'_>, group: &LotGroup, outcome: &mut ImportOutcome) {
    let label = format!("Item {}", group.serial);
    let columns = group.lot_columns();
    if let Err(message) = columns.check_required() {
        outcome.error(format!("{label}: {message}"));
        return;
    }
    let serial = group.serial.trim();

    // The lot columns of an existing serial are ignored; only its sale lines are read.
    let lot_id = match repo.find_serial_id(serial) {
        Ok(Some(id)) => {
            outcome.skip(format!("{label}: Already exists, importing its sales only"));
            id
        }
        Ok(None) => {
            let lot = match columns.to_new_lot() {
                Ok(lot) => lot,
                Err(message) => {
                    outcome.error(format!("{label}: {message}"));
                    return;
                }
            };
            match repo.add_stock_lot(&lot) {
                Ok(id) => {
                    outcome.succeeded += 1;
                    outcome.lots_created += 1;
                    id
                }
                Err(e) => {
                    outcome.error(format!("{label}: {e}"));
                    return;
                }
            }
        }
        Err(e) => {
            outcome.error(format!("{label}: {e}"));
            return;
        }
    };

    // Each recorded sale lowers the live balance, so later lines of the same group are
    // checked against everything committed before them.
    for sale in group.sales() {
        if import_sale_row(repo, lot_id, serial, sale, &label).apply(outcome) {
            outcome.sales_created += 1;
        }
    }
}
