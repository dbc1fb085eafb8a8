use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SaleForm {
    Coil,
    Sheet,
}

impl SaleForm {
    pub fn as_str(&self) -> &'static str {
        match self {
            SaleForm::Coil => "Coil",
            SaleForm::Sheet => "Sheet",
        }
    }

    /// Empty text means "no form recorded"
    pub fn parse_optional(text: &str) -> Result<Option<Self>, String> {
        let text = text.trim();
        if text.is_empty() {
            Ok(None)
        } else {
            text.parse().map(Some)
        }
    }
}

impl FromStr for SaleForm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Coil" => Ok(SaleForm::Coil),
            "Sheet" => Ok(SaleForm::Sheet),
            other => Err(format!("Invalid form \"{other}\". Must be Coil or Sheet")),
        }
    }
}

impl fmt::Display for SaleForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewSale {
    pub stock_lot_id: i64,
    pub customer_name: String,
    pub quantity_sold: Decimal,
    pub form: Option<SaleForm>,
    pub sale_date: NaiveDate,
    /// Taken from the lot's current dimensions when `None`
    pub dimensions_snapshot: Option<Vec<String>>,
}

/// A sale as read back, sensitive fields decrypted
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sale {
    pub id: i64,
    pub stock_lot_id: i64,
    pub customer_name: String,
    pub quantity_sold: Decimal,
    pub form: Option<String>,
    pub sale_date: NaiveDate,
    pub dimensions_snapshot: Vec<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SaleUpdate {
    pub customer_name: Option<String>,
    pub quantity_sold: Option<Decimal>,
    pub form: Option<SaleForm>,
    pub sale_date: Option<NaiveDate>,
}

/// Decode a stored snapshot: a JSON array of strings, or bare `"; "`-joined text.
pub(crate) fn decode_snapshot(text: &str) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }
    match serde_json::from_str::<Vec<String>>(text) {
        Ok(items) => items,
        Err(_) => text.split(';').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect(),
    }
}

pub(crate) fn encode_snapshot(items: &[String]) -> String {
    serde_json::Value::from(items.to_vec()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sale_form() {
        assert_eq!(SaleForm::parse_optional("").unwrap(), None);
        assert_eq!(SaleForm::parse_optional(" Sheet ").unwrap(), Some(SaleForm::Sheet));
        assert!(SaleForm::parse_optional("coil").is_err());
    }

    #[test]
    fn test_snapshot_encoding() {
        let items = vec!["1.50×120".to_string(), "2.00×100".to_string()];
        let encoded = encode_snapshot(&items);
        assert_eq!(encoded, "[\"1.50×120\",\"2.00×100\"]");
        assert_eq!(decode_snapshot(&encoded), items);
        assert_eq!(decode_snapshot("1.50×120; 2.00×100"), items);
        assert!(decode_snapshot("").is_empty());
    }
}
