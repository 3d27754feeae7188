use crate::token::{DEFAULT_DECIMALS, TokenAmount};
use crate::value_objects::{Amount, Percentage};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A pool as returned by `getPoolsList`.
///
/// Snapshots are never patched locally; a refetch replaces the whole list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSnapshot {
    /// 1-based position in the contract's pool list.
    pub id: u64,
    pub token_a: String,
    pub token_b: String,
    pub reserve_a: TokenAmount,
    pub reserve_b: TokenAmount,
    pub fee: u32, // bps
}

impl PoolSnapshot {
    /// True when the pool trades `x` against `y`, in either order.
    pub fn matches_pair(&self, x: &str, y: &str) -> bool {
        (self.token_a == x && self.token_b == y) || (self.token_a == y && self.token_b == x)
    }

    /// Reserves oriented for a swap selling `token_in`: `(reserve_in, reserve_out)`.
    pub fn reserves_for(&self, token_in: &str) -> Option<(TokenAmount, TokenAmount)> {
        if token_in == self.token_a {
            Some((self.reserve_a, self.reserve_b))
        } else if token_in == self.token_b {
            Some((self.reserve_b, self.reserve_a))
        } else {
            None
        }
    }

    /// A pool with an empty side accepts any deposit ratio.
    pub fn is_empty(&self) -> bool {
        self.reserve_a.is_zero() || self.reserve_b.is_zero()
    }

    /// Sum of both reserves in whole units, for the pool list.
    pub fn tvl(&self) -> Option<Decimal> {
        let a = Amount::from_token_amount(self.reserve_a, DEFAULT_DECIMALS).to_decimal()?;
        let b = Amount::from_token_amount(self.reserve_b, DEFAULT_DECIMALS).to_decimal()?;
        a.checked_add(b)
    }

    pub fn fee_percentage(&self) -> Percentage {
        Percentage::from_fee(self.fee)
    }
}

/// Finds the pool trading `x` against `y`, whatever the A/B order.
pub fn find_pool<'a>(pools: &'a [PoolSnapshot], x: &str, y: &str) -> Option<&'a PoolSnapshot> {
    pools.iter().find(|pool| pool.matches_pair(x, y))
}
