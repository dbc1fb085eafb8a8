//! Record crypto adapter: applies the codec across the sensitive columns of a row.

use rusqlite::types::Value;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use std::str::FromStr;

use super::classifier::{is_sensitive, EntityKind, FieldValue};
use super::codec::{CryptoError, DecryptFailure, FieldCipher};
use crate::metrics::METRICS;

/// Sensitive columns that hold numbers in plaintext
const NUMERIC_FIELDS: &[&str] = &["weight", "quantity_sold"];

/// A single column value of a [`Record`]
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Null,
    Text(String),
    Number(Decimal),
    Integer(i64),
}

impl Field {
    pub fn text(value: impl Into<String>) -> Self {
        Field::Text(value.into())
    }

    /// `None` and empty strings become `Null`
    pub fn opt_text(value: Option<&str>) -> Self {
        match value {
            Some(v) if !v.is_empty() => Field::Text(v.to_string()),
            _ => Field::Null,
        }
    }

    pub fn from_sql(value: &Value) -> Self {
        match value {
            Value::Null => Field::Null,
            Value::Integer(i) => Field::Integer(*i),
            Value::Real(r) => Decimal::from_f64(*r).map(Field::Number).unwrap_or(Field::Text(r.to_string())),
            Value::Text(s) => Field::Text(s.clone()),
            Value::Blob(b) => Field::Text(String::from_utf8_lossy(b).into_owned()),
        }
    }

    pub fn to_sql(&self) -> Value {
        match self {
            Field::Null => Value::Null,
            Field::Text(s) => Value::Text(s.clone()),
            Field::Number(d) => Value::Text(d.normalize().to_string()),
            Field::Integer(i) => Value::Integer(*i),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Field::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Field::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Owned text rendering of any non-null value
    pub fn to_text(&self) -> Option<String> {
        match self {
            Field::Null => None,
            Field::Text(s) => Some(s.clone()),
            Field::Number(d) => Some(d.normalize().to_string()),
            Field::Integer(i) => Some(i.to_string()),
        }
    }

    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Field::Number(d) => Some(*d),
            Field::Integer(i) => Some(Decimal::from(*i)),
            Field::Text(s) => parse_decimal(s),
            Field::Null => None,
        }
    }
}

/// Lenient number parsing for quantities: plain, then scientific notation.
pub fn parse_decimal(text: &str) -> Option<Decimal> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .ok()
}

/// Ordered column/value pairs for one row of a table
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    fields: Vec<(String, Field)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: &str, value: Field) -> Self {
        self.set(column, value);
        self
    }

    pub fn set(&mut self, column: &str, value: Field) {
        match self.fields.iter_mut().find(|(name, _)| name == column) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((column.to_string(), value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&Field> {
        self.fields.iter().find(|(name, _)| name == column).map(|(_, v)| v)
    }

    pub fn text(&self, column: &str) -> Option<String> {
        self.get(column).and_then(Field::to_text)
    }

    pub fn decimal(&self, column: &str) -> Option<Decimal> {
        self.get(column).and_then(Field::as_decimal)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Field)> {
        self.fields.iter().map(|(name, v)| (name.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn sql_values(&self) -> Vec<Value> {
        self.fields.iter().map(|(_, v)| v.to_sql()).collect()
    }
}

/// Encrypts and decrypts the sensitive columns of records for one session.
#[derive(Debug, Clone, Copy)]
pub struct RecordCrypto<'a> {
    cipher: &'a FieldCipher,
    legacy_detection: bool,
}

impl<'a> RecordCrypto<'a> {
    pub fn new(cipher: &'a FieldCipher, legacy_detection: bool) -> Self {
        Self {
            cipher,
            legacy_detection,
        }
    }

    pub fn cipher(&self) -> &'a FieldCipher {
        self.cipher
    }

    pub fn classify(&self, stored: &str) -> FieldValue {
        FieldValue::classify(stored, self.legacy_detection)
    }

    /// Encrypt every sensitive, non-empty field of `record`.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError` if the codec fails.
    pub fn encrypt_record(&self, kind: EntityKind, record: &Record) -> Result<Record, CryptoError> {
        let mut out = Record::new();
        for (column, value) in record.iter() {
            let sealed = if is_sensitive(kind, column) {
                self.seal_field(value)?
            } else {
                value.clone()
            };
            out.fields.push((column.to_string(), sealed));
        }
        Ok(out)
    }

    /// Decrypt every sensitive field of `record` that is ciphertext.
    ///
    /// A field that cannot be opened keeps its stored value; the failure is logged and
    /// counted but never returned.
    pub fn decrypt_record(&self, kind: EntityKind, record: &Record) -> Record {
        let mut out = Record::new();
        for (column, value) in record.iter() {
            let opened = if is_sensitive(kind, column) {
                self.open_field(column, value)
            } else {
                value.clone()
            };
            out.fields.push((column.to_string(), opened));
        }
        out
    }

    /// Encrypt one value; empty text and NULL pass through.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError` if the codec fails.
    pub fn seal_text(&self, value: &str) -> Result<String, CryptoError> {
        if value.is_empty() {
            return Ok(String::new());
        }
        self.cipher.encrypt(value)
    }

    fn seal_field(&self, value: &Field) -> Result<Field, CryptoError> {
        match value.to_text() {
            Some(text) if !text.is_empty() => Ok(Field::Text(self.cipher.encrypt(&text)?)),
            _ => Ok(value.clone()),
        }
    }

    fn open_field(&self, column: &str, value: &Field) -> Field {
        let stored = match value {
            Field::Text(s) => s,
            other => return other.clone(),
        };
        let plain = self.open_or_keep(column, stored);
        if NUMERIC_FIELDS.contains(&column) {
            if let Some(number) = parse_decimal(&plain) {
                return Field::Number(number);
            }
        }
        Field::Text(plain)
    }

    /// Decrypt a stored value if it is ciphertext; on failure keep it as stored.
    pub fn open_or_keep(&self, column: &str, stored: &str) -> String {
        match self.classify(stored) {
            FieldValue::Plain(text) => text,
            FieldValue::Encrypted(ct) => match ct.open(self.cipher) {
                Ok(text) => text,
                Err(e) => {
                    METRICS.record_decrypt_fallback();
                    log::warn!("Could not decrypt {column}, keeping stored value: {e}");
                    stored.to_string()
                }
            },
        }
    }

    /// Decrypt a stored value if it is ciphertext, reporting failures.
    ///
    /// # Errors
    ///
    /// Returns the [`DecryptFailure`] for ciphertext that cannot be opened.
    pub fn open_strict(&self, stored: &str) -> Result<String, DecryptFailure> {
        match self.classify(stored) {
            FieldValue::Plain(text) => Ok(text),
            FieldValue::Encrypted(ct) => ct.open(self.cipher),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::codec::tests::{cipher, legacy_blob};

    fn lot_record() -> Record {
        Record::new()
            .with("entry_date", Field::text("2024-06-01"))
            .with("serial_number", Field::text("100"))
            .with("type", Field::text("E"))
            .with("weight", Field::Number(Decimal::from(500)))
            .with("quality", Field::text("Soft"))
            .with("customer_name", Field::Null)
            .with("coating", Field::text(""))
    }

    #[test]
    fn test_encrypt_record_only_touches_sensitive_fields() {
        let fc = cipher("1234");
        let crypto = RecordCrypto::new(&fc, true);
        let sealed = crypto.encrypt_record(EntityKind::StockLot, &lot_record()).unwrap();

        assert_eq!(sealed.text("entry_date").as_deref(), Some("2024-06-01"));
        assert_eq!(sealed.text("quality").as_deref(), Some("Soft"));
        assert!(sealed.text("serial_number").unwrap().starts_with("stv1:"));
        assert!(sealed.text("weight").unwrap().starts_with("stv1:"));
        assert!(sealed.get("customer_name").unwrap().is_null());
        assert_eq!(sealed.text("coating").as_deref(), Some(""));
    }

    #[test]
    fn test_decrypt_record_restores_numbers() {
        let fc = cipher("1234");
        let crypto = RecordCrypto::new(&fc, true);
        let sealed = crypto.encrypt_record(EntityKind::StockLot, &lot_record()).unwrap();
        let opened = crypto.decrypt_record(EntityKind::StockLot, &sealed);

        assert_eq!(opened.get("weight"), Some(&Field::Number(Decimal::from(500))));
        assert_eq!(opened.text("serial_number").as_deref(), Some("100"));
        assert_eq!(opened.text("type").as_deref(), Some("E"));
    }

    #[test]
    fn test_decrypt_record_tolerates_plain_and_foreign_values() {
        let fc = cipher("1234");
        let other = cipher("9999");
        let crypto = RecordCrypto::new(&fc, true);
        let foreign = other.encrypt("Acme Co").unwrap();
        let record = Record::new()
            .with("customer_name", Field::text(foreign.clone()))
            .with("quantity_sold", Field::text("200"))
            .with("dimensions_snapshot", Field::text(legacy_blob("1234", "\"[\\\"1.50×120\\\"]\"")));

        let before = METRICS.snapshot().decrypt_fallbacks_total;
        let opened = crypto.decrypt_record(EntityKind::Sale, &record);
        assert_eq!(opened.text("customer_name"), Some(foreign));
        assert_eq!(opened.get("quantity_sold"), Some(&Field::Number(Decimal::from(200))));
        assert_eq!(opened.text("dimensions_snapshot").as_deref(), Some("[\"1.50×120\"]"));
        assert!(METRICS.snapshot().decrypt_fallbacks_total > before);
    }

    #[test]
    fn test_open_strict_reports_failure() {
        let fc = cipher("1234");
        let crypto = RecordCrypto::new(&fc, false);
        let foreign = cipher("9999").encrypt("x").unwrap();
        assert_eq!(crypto.open_strict(&foreign), Err(DecryptFailure::Authentication));
        assert_eq!(crypto.open_strict("plain").unwrap(), "plain");
    }

    #[test]
    fn test_parse_decimal_forms() {
        assert_eq!(parse_decimal("12.50"), Some(Decimal::new(1250, 2)));
        assert_eq!(parse_decimal(" 1e3 "), Some(Decimal::from(1000)));
        assert_eq!(parse_decimal("abc"), None);
        assert_eq!(parse_decimal(""), None);
    }
}
