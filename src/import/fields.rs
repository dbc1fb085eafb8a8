//! Field-level parsing and validation shared by the import layouts.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::crypto::parse_decimal;
use crate::model::{Dimension, NewStockLot, Quality, SteelType, DATE_FORMAT};

/// Spreadsheet exports write this for an empty cell
pub const PLACEHOLDER: &str = "—";

pub fn is_blank(value: &str) -> bool {
    let value = value.trim();
    value.is_empty() || value == PLACEHOLDER
}

/// Accepts `dd/MM/yyyy`, `dd-MM-yyyy` and `yyyy-MM-dd` (day and month may be unpadded).
///
/// Returns `None` for anything else, including dates that do not exist.
pub fn normalize_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    let canonical = if text.contains('/') {
        let parts: Vec<&str> = text.split('/').collect();
        let [day, month, year] = parts.as_slice() else {
            return None;
        };
        format!("{year}-{month:0>2}-{day:0>2}")
    } else if text.contains('-') {
        let parts: Vec<&str> = text.split('-').collect();
        let [first, month, last] = parts.as_slice() else {
            return None;
        };
        if first.len() == 4 {
            format!("{first}-{month:0>2}-{last:0>2}")
        } else {
            format!("{last}-{month:0>2}-{first:0>2}")
        }
    } else {
        text.to_string()
    };
    NaiveDate::parse_from_str(&canonical, DATE_FORMAT).ok()
}

/// A strictly positive number
pub fn positive_number(text: &str) -> Option<Decimal> {
    parse_decimal(text).filter(|n| *n > Decimal::ZERO)
}

/// Drop the leading apostrophe spreadsheets add to force text cells
pub fn clean_coating(value: &str) -> Option<String> {
    let value = value.trim();
    let value = value.strip_prefix('\'').unwrap_or(value);
    (!value.is_empty()).then(|| value.to_string())
}

fn optional(value: &str) -> Option<String> {
    (!is_blank(value)).then(|| value.trim().to_string())
}

/// The stock-lot columns of an inventory or combined line
#[derive(Debug, Clone, Copy)]
pub struct LotColumns<'r> {
    pub entry_date: &'r str,
    pub serial_number: &'r str,
    pub steel_type: &'r str,
    pub dimensions: &'r str,
    pub weight: &'r str,
    pub coating: &'r str,
    pub specifications: &'r str,
    pub form: &'r str,
    pub lot_code: &'r str,
    pub quality: &'r str,
}

impl LotColumns<'_> {
    /// Presence of the columns every lot needs; values are not parsed
    pub fn check_required(&self) -> Result<(), String> {
        let required = [
            self.entry_date,
            self.serial_number,
            self.steel_type,
            self.weight,
            self.lot_code,
            self.quality,
        ];
        if required.iter().any(|v| v.trim().is_empty()) {
            return Err("Missing required fields (Entry Date, S.No, Type, Weight, LOT, Quality)".to_string());
        }
        Ok(())
    }

    /// Validate the columns into a lot; the error is the message without its row label
    pub fn to_new_lot(&self) -> Result<NewStockLot, String> {
        self.check_required()?;
        let entry_date =
            normalize_date(self.entry_date).ok_or_else(|| format!("Invalid date format \"{}\"", self.entry_date))?;
        let weight = positive_number(self.weight)
            .ok_or_else(|| format!("Invalid weight \"{}\". Must be a positive number", self.weight))?;
        let steel_type: SteelType = self.steel_type.trim().parse()?;
        let quality: Quality = self.quality.trim().parse()?;
        let dimensions = if is_blank(self.dimensions) {
            vec![Dimension::zero()]
        } else {
            Dimension::parse_list(self.dimensions)
        };

        Ok(NewStockLot {
            entry_date,
            serial_number: self.serial_number.trim().to_string(),
            steel_type,
            weight,
            lot_code: self.lot_code.trim().to_string(),
            quality,
            coating: clean_coating(self.coating),
            specifications: optional(self.specifications),
            form: optional(self.form),
            customer_name: None,
            dimensions,
        })
    }
}

/// The sale columns of a sales or combined line
#[derive(Debug, Clone, Copy)]
pub struct SaleColumns<'r> {
    pub sale_date: &'r str,
    pub customer_name: &'r str,
    pub quantity_sold: &'r str,
    pub form: &'r str,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_date_layouts() {
        assert_eq!(normalize_date("01/06/2024"), Some(ymd(2024, 6, 1)));
        assert_eq!(normalize_date("1/6/2024"), Some(ymd(2024, 6, 1)));
        assert_eq!(normalize_date("01-06-2024"), Some(ymd(2024, 6, 1)));
        assert_eq!(normalize_date("2024-06-01"), Some(ymd(2024, 6, 1)));
        assert_eq!(normalize_date("2024-6-1"), Some(ymd(2024, 6, 1)));
    }

    #[test]
    fn test_invalid_dates_rejected() {
        assert_eq!(normalize_date("31/02/2024"), None);
        assert_eq!(normalize_date("01/06"), None);
        assert_eq!(normalize_date("2024-06"), None);
        assert_eq!(normalize_date("June 1st"), None);
    }

    #[test]
    fn test_coating_apostrophe_stripped() {
        assert_eq!(clean_coating(" 'Z120 "), Some("Z120".to_string()));
        assert_eq!(clean_coating("'"), None);
        assert_eq!(clean_coating(""), None);
    }

    fn columns<'r>(weight: &'r str, steel_type: &'r str, dims: &'r str) -> LotColumns<'r> {
        LotColumns {
            entry_date: "01/06/2024",
            serial_number: "100",
            steel_type,
            dimensions: dims,
            weight,
            coating: "ZincA",
            specifications: "Grade1",
            form: "Coil",
            lot_code: "LOT-X",
            quality: "Soft",
        }
    }

    #[test]
    fn test_lot_columns_validation() {
        let lot = columns("500", "E", "1.50×120").to_new_lot().unwrap();
        assert_eq!(lot.weight, Decimal::from(500));
        assert_eq!(lot.dimensions, vec![Dimension::parse("1.5×120").unwrap()]);
        assert_eq!(lot.entry_date, ymd(2024, 6, 1));

        assert!(columns("-1", "E", "").to_new_lot().unwrap_err().contains("Invalid weight \"-1\""));
        assert!(columns("5", "X", "").to_new_lot().unwrap_err().contains("Invalid type"));
        assert!(columns("", "E", "").to_new_lot().unwrap_err().starts_with("Missing required fields"));
        assert_eq!(columns("5", "E", "—").to_new_lot().unwrap().dimensions, vec![Dimension::zero()]);
    }
}
