use crate::error::DomainError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of state-changing transaction a user can send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    Approval,
    Swap,
    Deposit,
    Withdraw,
    CreatePool,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActionKind::Approval => "approval",
            ActionKind::Swap => "swap",
            ActionKind::Deposit => "deposit",
            ActionKind::Withdraw => "withdraw",
            ActionKind::CreatePool => "create-pool",
        };
        f.write_str(name)
    }
}

/// Which side of a pool a value belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenSide {
    A,
    B,
}

impl TokenSide {
    pub fn other(self) -> Self {
        match self {
            TokenSide::A => TokenSide::B,
            TokenSide::B => TokenSide::A,
        }
    }
}

/// Events emitted by the platform contract when liquidity moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LiquidityEventKind {
    /// `LiquidityAdded(user, tokenA, tokenB, amountA, amountB, timestamp)`
    Added,
    /// `LiquidityRemoved(user, tokenA, tokenB, amountA, amountB, timestamp)`
    Removed,
}

impl LiquidityEventKind {
    pub fn event_name(self) -> &'static str {
        match self {
            LiquidityEventKind::Added => "LiquidityAdded",
            LiquidityEventKind::Removed => "LiquidityRemoved",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            LiquidityEventKind::Added => "Deposit",
            LiquidityEventKind::Removed => "Withdraw",
        }
    }
}

/// Activity feed filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventFilter {
    #[default]
    All,
    Deposits,
    Withdrawals,
}

impl EventFilter {
    pub fn accepts(self, kind: LiquidityEventKind) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::Deposits => kind == LiquidityEventKind::Added,
            EventFilter::Withdrawals => kind == LiquidityEventKind::Removed,
        }
    }

    /// Event kinds that must be queried to satisfy this filter.
    pub fn kinds(self) -> &'static [LiquidityEventKind] {
        match self {
            EventFilter::All => &[LiquidityEventKind::Added, LiquidityEventKind::Removed],
            EventFilter::Deposits => &[LiquidityEventKind::Added],
            EventFilter::Withdrawals => &[LiquidityEventKind::Removed],
        }
    }
}

impl FromStr for EventFilter {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(EventFilter::All),
            "deposits" => Ok(EventFilter::Deposits),
            "withdrawals" => Ok(EventFilter::Withdrawals),
            other => Err(DomainError::UnknownFilter(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_filter_parsing() {
        assert_eq!("all".parse::<EventFilter>(), Ok(EventFilter::All));
        assert_eq!(" Deposits ".parse::<EventFilter>(), Ok(EventFilter::Deposits));
        assert_eq!("withdrawals".parse::<EventFilter>(), Ok(EventFilter::Withdrawals));
        assert!("swaps".parse::<EventFilter>().is_err());
    }

    #[test]
    fn test_event_filter_accepts() {
        assert!(EventFilter::All.accepts(LiquidityEventKind::Removed));
        assert!(EventFilter::Deposits.accepts(LiquidityEventKind::Added));
        assert!(!EventFilter::Deposits.accepts(LiquidityEventKind::Removed));
        assert_eq!(EventFilter::Withdrawals.kinds(), &[LiquidityEventKind::Removed]);
    }
}
