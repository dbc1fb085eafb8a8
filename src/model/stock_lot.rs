use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use super::Dimension;

/// Steel types a stock lot may carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SteelType {
    E,
    GA,
    GA1,
    #[serde(rename = "4")]
    Four,
    #[serde(rename = "5")]
    Five,
    #[serde(rename = "4N")]
    FourN,
    #[serde(rename = "4G")]
    FourG,
    Scrap,
    Paint,
    Others,
}

impl SteelType {
    pub const ALL: [SteelType; 10] = [
        SteelType::E,
        SteelType::GA,
        SteelType::GA1,
        SteelType::Four,
        SteelType::Five,
        SteelType::FourN,
        SteelType::FourG,
        SteelType::Scrap,
        SteelType::Paint,
        SteelType::Others,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SteelType::E => "E",
            SteelType::GA => "GA",
            SteelType::GA1 => "GA1",
            SteelType::Four => "4",
            SteelType::Five => "5",
            SteelType::FourN => "4N",
            SteelType::FourG => "4G",
            SteelType::Scrap => "Scrap",
            SteelType::Paint => "Paint",
            SteelType::Others => "Others",
        }
    }
}

impl FromStr for SteelType {
    type Err = String;

    /// Exact, case-sensitive match
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SteelType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| {
                let valid: Vec<&str> = SteelType::ALL.iter().map(SteelType::as_str).collect();
                format!("Invalid type \"{s}\". Must be one of: {}", valid.join(", "))
            })
    }
}

impl fmt::Display for SteelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Quality {
    Soft,
    Hard,
    Semi,
}

impl Quality {
    pub const ALL: [Quality; 3] = [Quality::Soft, Quality::Hard, Quality::Semi];

    pub fn as_str(&self) -> &'static str {
        match self {
            Quality::Soft => "Soft",
            Quality::Hard => "Hard",
            Quality::Semi => "Semi",
        }
    }
}

impl FromStr for Quality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Quality::ALL
            .into_iter()
            .find(|q| q.as_str() == s)
            .ok_or_else(|| format!("Invalid quality \"{s}\". Must be one of: Soft, Hard, Semi"))
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stock lot to be created together with its dimensions
#[derive(Debug, Clone, PartialEq)]
pub struct NewStockLot {
    pub entry_date: NaiveDate,
    pub serial_number: String,
    pub steel_type: SteelType,
    pub weight: Decimal,
    pub lot_code: String,
    pub quality: Quality,
    pub coating: Option<String>,
    pub specifications: Option<String>,
    pub form: Option<String>,
    /// Legacy single-customer field; sales are recorded as [`Sale`](super::Sale) rows
    pub customer_name: Option<String>,
    pub dimensions: Vec<Dimension>,
}

/// A stock lot as read back, sensitive fields decrypted.
///
/// Text fields stay `String` because a value that fails to decrypt is returned as stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StockLot {
    pub id: i64,
    pub entry_date: NaiveDate,
    pub serial_number: String,
    pub steel_type: String,
    pub weight: Decimal,
    pub lot_code: String,
    pub quality: String,
    pub coating: Option<String>,
    pub specifications: Option<String>,
    pub form: Option<String>,
    pub customer_name: Option<String>,
    pub completed: bool,
    pub at_dc: bool,
    pub dimensions: Vec<Dimension>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl StockLot {
    /// Sold through the legacy single-customer field
    pub fn has_legacy_customer(&self) -> bool {
        self.customer_name.as_deref().map(|c| !c.trim().is_empty()).unwrap_or(false)
    }
}

/// Partial update; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StockLotUpdate {
    pub entry_date: Option<NaiveDate>,
    pub serial_number: Option<String>,
    pub steel_type: Option<SteelType>,
    pub weight: Option<Decimal>,
    pub lot_code: Option<String>,
    pub quality: Option<Quality>,
    pub coating: Option<String>,
    pub specifications: Option<String>,
    pub form: Option<String>,
    pub customer_name: Option<String>,
    /// Replaces every dimension of the lot when present
    pub dimensions: Option<Vec<Dimension>>,
}

impl StockLotUpdate {
    pub fn is_empty(&self) -> bool {
        *self == StockLotUpdate::default()
    }
}

/// Filters applied after decryption, since most matched columns are ciphertext at rest
#[derive(Debug, Clone, Default)]
pub struct LotFilter {
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    pub steel_types: Vec<String>,
    pub qualities: Vec<String>,
    /// Substring match on the lot code
    pub lot_code: Option<String>,
    pub completed: Option<bool>,
    pub at_dc: Option<bool>,
}

impl LotFilter {
    pub fn matches(&self, lot: &StockLot) -> bool {
        if self.from_date.map(|d| lot.entry_date < d).unwrap_or(false) {
            return false;
        }
        if self.to_date.map(|d| lot.entry_date > d).unwrap_or(false) {
            return false;
        }
        if !self.steel_types.is_empty() && !self.steel_types.contains(&lot.steel_type) {
            return false;
        }
        if !self.qualities.is_empty() && !self.qualities.contains(&lot.quality) {
            return false;
        }
        if let Some(code) = &self.lot_code {
            if !lot.lot_code.contains(code.as_str()) {
                return false;
            }
        }
        if self.completed.map(|c| c != lot.completed).unwrap_or(false) {
            return false;
        }
        if self.at_dc.map(|c| c != lot.at_dc).unwrap_or(false) {
            return false;
        }
        true
    }
}

/// A lot with its remaining balance and the customers of its sales
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LotWithBalance {
    pub lot: StockLot,
    pub total_sold: Decimal,
    pub balance: Decimal,
    pub customers: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_steel_type_parsing_is_exact() {
        assert_eq!("4N".parse::<SteelType>().unwrap(), SteelType::FourN);
        assert_eq!("Scrap".parse::<SteelType>().unwrap(), SteelType::Scrap);
        assert!("scrap".parse::<SteelType>().is_err());
        let err = "X".parse::<SteelType>().unwrap_err();
        assert!(err.contains("E, GA, GA1, 4, 5, 4N, 4G, Scrap, Paint, Others"));
    }

    #[test]
    fn test_quality_parsing() {
        assert_eq!("Semi".parse::<Quality>().unwrap(), Quality::Semi);
        assert!("Medium".parse::<Quality>().is_err());
    }

    #[test]
    fn test_update_is_empty() {
        assert!(StockLotUpdate::default().is_empty());
        let update = StockLotUpdate {
            weight: Some(Decimal::from(10)),
            ..Default::default()
        };
        assert!(!update.is_empty());
    }
}
