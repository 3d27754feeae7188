//! Errors raised while turning user input into domain values.

use thiserror::Error;

/// Errors from parsing and converting amounts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// The input was empty or whitespace.
    #[error("amount is empty")]
    EmptyAmount,
    /// The input carried a minus sign.
    #[error("amount must not be negative: {0}")]
    NegativeAmount(String),
    /// The input is not a plain decimal number.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    /// The scaled value does not fit in 256 bits.
    #[error("amount overflows 256 bits: {0}")]
    Overflow(String),
    /// Unknown event filter name.
    #[error("unknown event filter: {0}")]
    UnknownFilter(String),
}
