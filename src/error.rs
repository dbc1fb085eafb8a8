//! Errors of the inventory operations built on the store.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::crypto::{CryptoError, DecryptFailure};
use crate::executor::StoreError;
use crate::migration::MigrationError;
use crate::transaction::TransactionError;

#[derive(Debug, Error)]
pub enum InventoryError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Migration(#[from] MigrationError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("{0}")]
    Validation(String),

    #[error("Quantity {requested} exceeds remaining weight {remaining}")]
    OverSell { requested: Decimal, remaining: Decimal },

    #[error("Stock lot {serial_number} is at the distribution center")]
    AtDistributionCenter { serial_number: String },

    #[error("Serial number {0} already exists")]
    DuplicateSerial(String),

    #[error("Invalid access code")]
    InvalidAccessCode,

    #[error("An access code is already registered")]
    AlreadyRegistered,

    #[error("No access code registered yet")]
    NotRegistered,

    #[error("{column} of {entity} {id} cannot be decrypted with the current access code: {source}")]
    Undecryptable {
        entity: &'static str,
        id: i64,
        column: String,
        #[source]
        source: DecryptFailure,
    },
}

impl From<TransactionError> for InventoryError {
    fn from(err: TransactionError) -> Self {
        InventoryError::Store(err.into())
    }
}

impl InventoryError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        InventoryError::Validation(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_over_sell_message() {
        let err = InventoryError::OverSell {
            requested: Decimal::from(400),
            remaining: Decimal::from(300),
        };
        assert_eq!(err.to_string(), "Quantity 400 exceeds remaining weight 300");
    }

    #[test]
    fn test_not_found_message() {
        let err = InventoryError::NotFound { entity: "Sale", id: 7 };
        assert_eq!(err.to_string(), "Sale 7 not found");
    }
}
