//! Errors surfaced by the chain collaborator.

use thiserror::Error;

/// Failure of a read or write against the platform contract.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    /// The wallet refused to sign, or the call failed validation before broadcast.
    #[error("transaction rejected: {0}")]
    Rejected(String),
    /// The transaction was mined but execution failed.
    #[error("transaction {hash} reverted: {reason}")]
    Reverted { hash: String, reason: String },
    /// A read call failed.
    #[error("read failed: {0}")]
    Read(String),
    /// The collaborator answered with a value of the wrong shape.
    #[error("unexpected response to {call}: {detail}")]
    UnexpectedResponse { call: String, detail: String },
    /// No transaction is known under this hash.
    #[error("unknown transaction: {0}")]
    UnknownTransaction(String),
}

impl ChainError {
    /// Short human-readable text for notifications.
    pub fn short_message(&self) -> String {
        match self {
            ChainError::Rejected(reason) => format!("User rejected or invalid request: {reason}"),
            ChainError::Reverted { reason, .. } => format!("Execution reverted: {reason}"),
            ChainError::Read(reason) => format!("Read failed: {reason}"),
            ChainError::UnexpectedResponse { call, .. } => format!("Unexpected response to {call}"),
            ChainError::UnknownTransaction(hash) => format!("Unknown transaction {hash}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_messages_distinguish_rejection_and_revert() {
        let rejected = ChainError::Rejected("user denied".to_string());
        let reverted = ChainError::Reverted {
            hash: "0x01".to_string(),
            reason: "insufficient allowance".to_string(),
        };
        assert!(rejected.short_message().contains("user denied"));
        assert!(reverted.short_message().contains("insufficient allowance"));
    }
}
