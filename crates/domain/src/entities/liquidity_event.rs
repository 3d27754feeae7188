use crate::enums::LiquidityEventKind;
use crate::token::TokenAmount;
use serde::{Deserialize, Serialize};

/// One decoded `LiquidityAdded` / `LiquidityRemoved` log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidityEvent {
    pub kind: LiquidityEventKind,
    pub user: String,
    pub token_a: String,
    pub token_b: String,
    pub amount_a: TokenAmount,
    pub amount_b: TokenAmount,
    /// Unix seconds, as emitted by the contract.
    pub timestamp: u64,
    pub block_number: u64,
    pub tx_hash: String,
}
