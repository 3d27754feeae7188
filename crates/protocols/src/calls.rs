//! Call descriptions exchanged with the gateway.

use easydefi_domain::entities::PoolSnapshot;
use easydefi_domain::enums::LiquidityEventKind;
use easydefi_domain::token::TokenAmount;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ChainError;

/// A side-effect free contract read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReadCall {
    /// `getPoolsList()` on the platform contract.
    PoolsList,
    /// `totalPoolShares()` on the platform contract.
    TotalPoolShares,
    /// `shares(owner, poolId)` on the platform contract.
    Shares { owner: String, pool_id: u64 },
    /// `balanceOf(owner)` on an ERC-20 token.
    BalanceOf { token: String, owner: String },
    /// `allowance(owner, spender)` on an ERC-20 token.
    Allowance {
        token: String,
        owner: String,
        spender: String,
    },
}

impl ReadCall {
    pub fn function_name(&self) -> &'static str {
        match self {
            ReadCall::PoolsList => "getPoolsList",
            ReadCall::TotalPoolShares => "totalPoolShares",
            ReadCall::Shares { .. } => "shares",
            ReadCall::BalanceOf { .. } => "balanceOf",
            ReadCall::Allowance { .. } => "allowance",
        }
    }
}

/// Decoded result of a [`ReadCall`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReadValue {
    Pools(Vec<PoolSnapshot>),
    Amount(TokenAmount),
}

impl ReadValue {
    /// Unwraps an integer result.
    ///
    /// # Errors
    /// Returns `UnexpectedResponse` if the value is a pool list.
    pub fn into_amount(self, call: &ReadCall) -> Result<TokenAmount, ChainError> {
        match self {
            ReadValue::Amount(amount) => Ok(amount),
            ReadValue::Pools(_) => Err(ChainError::UnexpectedResponse {
                call: call.function_name().to_string(),
                detail: "expected an integer, got a pool list".to_string(),
            }),
        }
    }

    /// Unwraps a pool list result.
    ///
    /// # Errors
    /// Returns `UnexpectedResponse` if the value is an integer.
    pub fn into_pools(self, call: &ReadCall) -> Result<Vec<PoolSnapshot>, ChainError> {
        match self {
            ReadValue::Pools(pools) => Ok(pools),
            ReadValue::Amount(_) => Err(ChainError::UnexpectedResponse {
                call: call.function_name().to_string(),
                detail: "expected a pool list, got an integer".to_string(),
            }),
        }
    }
}

/// A state-changing transaction, signed by the connected account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WriteCall {
    /// `approve(spender, amount)` on an ERC-20 token.
    Approve {
        token: String,
        spender: String,
        amount: TokenAmount,
    },
    CreatePool {
        token_a: String,
        token_b: String,
        fee: u32,
    },
    AddLiquidity {
        token_a: String,
        token_b: String,
        amount_a: TokenAmount,
        amount_b: TokenAmount,
    },
    RemoveLiquidity {
        token_a: String,
        token_b: String,
        shares: TokenAmount,
    },
    Swap {
        token_in: String,
        token_out: String,
        amount_in: TokenAmount,
    },
}

impl WriteCall {
    pub fn function_name(&self) -> &'static str {
        match self {
            WriteCall::Approve { .. } => "approve",
            WriteCall::CreatePool { .. } => "createPool",
            WriteCall::AddLiquidity { .. } => "addLiquidity",
            WriteCall::RemoveLiquidity { .. } => "removeLiquidity",
            WriteCall::Swap { .. } => "swap",
        }
    }
}

/// Hash identifying a broadcast transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TxHash(pub String);

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Confirmation of a successfully mined transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub hash: TxHash,
    pub block_number: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockTag {
    Number(u64),
    Latest,
}

/// Event log query over a block range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogQuery {
    pub kind: LiquidityEventKind,
    pub from_block: u64,
    pub to_block: BlockTag,
}

impl LogQuery {
    /// Every event of `kind` since genesis.
    pub fn all(kind: LiquidityEventKind) -> Self {
        Self {
            kind,
            from_block: 0,
            to_block: BlockTag::Latest,
        }
    }

    pub fn contains_block(&self, block: u64) -> bool {
        block >= self.from_block
            && match self.to_block {
                BlockTag::Number(to) => block <= to,
                BlockTag::Latest => true,
            }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_value_shape_checks() {
        let call = ReadCall::TotalPoolShares;
        let amount = ReadValue::Amount(TokenAmount::from(3u64));
        assert_eq!(amount.into_amount(&call), Ok(TokenAmount::from(3u64)));

        let pools = ReadValue::Pools(Vec::new());
        assert!(matches!(
            pools.into_amount(&call),
            Err(ChainError::UnexpectedResponse { .. })
        ));
    }

    #[test]
    fn test_log_query_block_range() {
        let query = LogQuery {
            kind: LiquidityEventKind::Added,
            from_block: 5,
            to_block: BlockTag::Number(10),
        };
        assert!(!query.contains_block(4));
        assert!(query.contains_block(5));
        assert!(query.contains_block(10));
        assert!(!query.contains_block(11));
        assert!(LogQuery::all(LiquidityEventKind::Removed).contains_block(u64::MAX));
    }
}
