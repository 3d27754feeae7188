use crate::token::TokenAmount;
use serde::{Deserialize, Serialize};

/// A liquidity provider's share balance in one pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidityPosition {
    pub owner: String,
    pub pool_id: u64,
    pub shares: TokenAmount,
}

/// The contract reports "no position" as zero shares.
pub fn normalize_shares(raw: TokenAmount) -> Option<TokenAmount> {
    if raw.is_zero() { None } else { Some(raw) }
}
