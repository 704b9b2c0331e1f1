//! Errors raised by the pure domain rules

use rust_decimal::Decimal;
use thiserror::Error;

/// Violations of domain invariants detected without touching storage
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("{field}: {message}")]
    Invalid { field: &'static str, message: String },

    #[error("insufficient stock for {item}: have {available}, need {requested}")]
    InsufficientStock {
        item: String,
        available: Decimal,
        requested: Decimal,
    },

    #[error("dispatch of {requested} {product} exceeds remaining {remaining}")]
    OverDispatch {
        product: String,
        remaining: Decimal,
        requested: Decimal,
    },

    #[error("order has no line for product {0}")]
    MissingOrderLine(String),

    #[error("invalid state transition from {from} to {to}")]
    InvalidTransition { from: &'static str, to: &'static str },
}

impl DomainError {
    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        DomainError::Invalid {
            field,
            message: message.into(),
        }
    }
}
