//! Domain types: stock lots, their dimensions, and sales.

pub mod dimension;
pub mod sale;
pub mod stock_lot;

pub use dimension::Dimension;
pub use sale::{NewSale, Sale, SaleForm, SaleUpdate};
pub use stock_lot::{LotFilter, LotWithBalance, NewStockLot, Quality, SteelType, StockLot, StockLotUpdate};

use chrono::{NaiveDate, NaiveDateTime};

use crate::executor::StoreError;

/// Dates are stored as `YYYY-MM-DD` text
pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub(crate) fn parse_stored_date(text: &str) -> Result<NaiveDate, StoreError> {
    NaiveDate::parse_from_str(text.trim(), DATE_FORMAT)
        .map_err(|e| StoreError::ParseError(format!("stored date '{text}': {e}")))
}

/// Parse a SQLite timestamp (`CURRENT_TIMESTAMP` or RFC 3339 style).
pub(crate) fn parse_timestamp(text: &str) -> Result<NaiveDateTime, StoreError> {
    const FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
    ];
    let text = text.trim().trim_end_matches('Z');
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .ok_or_else(|| StoreError::ParseError(format!("Failed to parse timestamp '{text}': unrecognized format")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timestamp_formats() {
        assert!(parse_timestamp("2024-06-01 10:20:30").is_ok());
        assert!(parse_timestamp("2024-06-01T10:20:30.123Z").is_ok());
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn test_parse_stored_date() {
        assert_eq!(parse_stored_date("2024-06-01").unwrap(), NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
        assert!(parse_stored_date("01/06/2024").is_err());
    }
}
