//! Which fields are sensitive, and whether a stored value is ciphertext.

use once_cell::sync::Lazy;
use regex::Regex;

use super::codec::{DecryptFailure, FieldCipher, Framing, CIPHERTEXT_TAG};

/// Untagged values longer than this that look like base64 are treated as legacy ciphertext
pub const LEGACY_MIN_LEN: usize = 50;

static BASE64_SHAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9+/]*={0,2}$").expect("base64 shape pattern is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    StockLot,
    Sale,
}

const STOCK_LOT_FIELDS: &[&str] = &[
    "serial_number",
    "type",
    "weight",
    "lot_code",
    "customer_name",
    "coating",
    "specifications",
    "form",
];

const SALE_FIELDS: &[&str] = &["customer_name", "quantity_sold", "dimensions_snapshot"];

/// Column names whose values pass through the codec for `kind`
pub fn sensitive_fields(kind: EntityKind) -> &'static [&'static str] {
    match kind {
        EntityKind::StockLot => STOCK_LOT_FIELDS,
        EntityKind::Sale => SALE_FIELDS,
    }
}

pub fn is_sensitive(kind: EntityKind, field: &str) -> bool {
    sensitive_fields(kind).contains(&field)
}

/// Shape heuristic for untagged ciphertext: base64 alphabet and longer than 50 characters.
///
/// Long plaintext made only of base64 characters is misclassified; tagged values never are.
pub fn looks_encrypted(value: &str) -> bool {
    value.len() > LEGACY_MIN_LEN && BASE64_SHAPE.is_match(value)
}

pub fn is_tagged(value: &str) -> bool {
    value
        .strip_prefix(CIPHERTEXT_TAG)
        .map(|body| !body.is_empty() && BASE64_SHAPE.is_match(body))
        .unwrap_or(false)
}

/// Stored ciphertext together with how it was framed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ciphertext {
    framing: Framing,
    stored: String,
}

impl Ciphertext {
    pub fn framing(&self) -> Framing {
        self.framing
    }

    /// The value exactly as it sits in the column
    pub fn as_stored(&self) -> &str {
        &self.stored
    }

    /// # Errors
    ///
    /// Returns the [`DecryptFailure`] reported by the codec.
    pub fn open(&self, cipher: &FieldCipher) -> Result<String, DecryptFailure> {
        let body = match self.framing {
            Framing::Tagged => self.stored.strip_prefix(CIPHERTEXT_TAG).unwrap_or(&self.stored),
            Framing::Legacy => &self.stored,
        };
        cipher.decrypt_framed(body, self.framing)
    }
}

/// A sensitive column value, classified once on read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Plain(String),
    Encrypted(Ciphertext),
}

impl FieldValue {
    /// Classify a stored value. Untagged blobs only count as ciphertext when
    /// `legacy_detection` is on.
    pub fn classify(stored: &str, legacy_detection: bool) -> Self {
        if is_tagged(stored) {
            FieldValue::Encrypted(Ciphertext {
                framing: Framing::Tagged,
                stored: stored.to_string(),
            })
        } else if legacy_detection && looks_encrypted(stored) {
            FieldValue::Encrypted(Ciphertext {
                framing: Framing::Legacy,
                stored: stored.to_string(),
            })
        } else {
            FieldValue::Plain(stored.to_string())
        }
    }

    pub fn is_encrypted(&self) -> bool {
        matches!(self, FieldValue::Encrypted(_))
    }

    pub fn as_stored(&self) -> &str {
        match self {
            FieldValue::Plain(s) => s,
            FieldValue::Encrypted(c) => c.as_stored(),
        }
    }
}
