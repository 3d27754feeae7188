//! Errors raised by the action flows.

use easydefi_domain::DomainError;
use easydefi_protocols::ChainError;
use thiserror::Error;

/// Failure of a flow operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionError {
    /// The flow is not in a state that allows the requested action.
    #[error("{action} is not available while {state}")]
    NotReady { action: String, state: String },
    /// A transaction from this flow is already in flight.
    #[error("a transaction is already in flight")]
    AlreadySubmitting,
    /// No pool exists for the selected pair.
    #[error("no pool for the selected tokens")]
    NoPool,
    /// A token has not been selected.
    #[error("token not selected")]
    TokenNotSelected,
    /// The pool fee is outside `1..10000`.
    #[error("invalid fee: {0}")]
    InvalidFee(u32),
    /// The fee input is not a whole number of basis points.
    #[error("fee is not a whole number: {0:?}")]
    UnparsableFee(String),
    #[error("fee not set")]
    FeeNotSet,
    #[error(transparent)]
    InvalidAmount(#[from] DomainError),
    #[error(transparent)]
    Chain(#[from] ChainError),
}

impl ExecutionError {
    /// Text suitable for a failure notification.
    pub fn short_message(&self) -> String {
        match self {
            ExecutionError::Chain(err) => err.short_message(),
            other => other.to_string(),
        }
    }
}
