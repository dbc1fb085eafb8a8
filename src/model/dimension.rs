use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use std::fmt;

use crate::crypto::parse_decimal;

/// Separator between thickness and width in dimension text
pub const DIMENSION_SEPARATOR: char = '×';

/// One thickness×width cut size of a stock lot.
///
/// Always canonical: thickness rounded to 2 places, width to a whole number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Dimension {
    thickness: Decimal,
    width: i64,
}

impl Dimension {
    pub fn new(thickness: Decimal, width: Decimal) -> Self {
        let width = width
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
            .unwrap_or_default();
        Self {
            thickness: thickness.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
            width,
        }
    }

    /// Placeholder used when an imported row carries no readable dimensions
    pub fn zero() -> Self {
        Self {
            thickness: Decimal::ZERO,
            width: 0,
        }
    }

    /// Build from the stored column types (`REAL` thickness, `INTEGER` width).
    pub fn from_stored(thickness: f64, width: i64) -> Self {
        Self::new(Decimal::from_f64(thickness).unwrap_or_default(), Decimal::from(width))
    }

    pub fn thickness(&self) -> Decimal {
        self.thickness
    }

    pub fn thickness_f64(&self) -> f64 {
        self.thickness.to_f64().unwrap_or_default()
    }

    pub fn width(&self) -> i64 {
        self.width
    }

    /// Parse `"1.50×120"`; both parts must be positive numbers.
    pub fn parse(text: &str) -> Option<Self> {
        let (thickness, width) = text.trim().split_once(DIMENSION_SEPARATOR)?;
        let thickness = parse_decimal(thickness)?;
        let width = parse_decimal(width)?;
        if thickness <= Decimal::ZERO || width <= Decimal::ZERO {
            return None;
        }
        Some(Self::new(thickness, width))
    }

    /// Parse `;`-separated dimensions, skipping unreadable entries.
    ///
    /// Yields a single [`Dimension::zero`] when nothing could be read.
    pub fn parse_list(text: &str) -> Vec<Self> {
        let dims: Vec<Self> = text.split(';').filter_map(Self::parse).collect();
        if dims.is_empty() {
            vec![Self::zero()]
        } else {
            dims
        }
    }

    /// `"1.50×120; 2.00×100"`
    pub fn join(dims: &[Dimension]) -> String {
        dims.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
    }

    /// Text snapshot kept on a sale
    pub fn snapshot(dims: &[Dimension]) -> Vec<String> {
        dims.iter().map(ToString::to_string).collect()
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}{}{}", self.thickness, DIMENSION_SEPARATOR, self.width)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_form() {
        let dim = Dimension::new(Decimal::new(1505, 3), Decimal::new(1195, 1));
        assert_eq!(dim.thickness(), Decimal::new(151, 2));
        assert_eq!(dim.width(), 120);
        assert_eq!(dim.to_string(), "1.51×120");
        assert_eq!(Dimension::from_stored(1.5, 120).to_string(), "1.50×120");
    }

    #[test]
    fn test_parse() {
        assert_eq!(Dimension::parse("1.50×120").unwrap().to_string(), "1.50×120");
        assert_eq!(Dimension::parse(" 2 × 99.6 ").unwrap().to_string(), "2.00×100");
        assert!(Dimension::parse("1.50x120").is_none());
        assert!(Dimension::parse("0×120").is_none());
        assert!(Dimension::parse("abc×1").is_none());
    }

    #[test]
    fn test_parse_list_defaults_to_zero() {
        let dims = Dimension::parse_list("1.50×120; 2×100");
        assert_eq!(Dimension::join(&dims), "1.50×120; 2.00×100");
        assert_eq!(Dimension::parse_list(""), vec![Dimension::zero()]);
        assert_eq!(Dimension::parse_list("n/a"), vec![Dimension::zero()]);
        assert_eq!(Dimension::zero().to_string(), "0.00×0");
    }
}
