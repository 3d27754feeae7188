use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Days used to annualise a per-period fee rate.
const DAYS_PER_YEAR: u32 = 365;

/// A value already expressed in percent (`0.30` means 0.30%).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Percentage(pub Decimal);

impl Percentage {
    /// Pool fee to percent: the contract stores the fee scaled by `10^2`.
    pub fn from_fee(fee: u32) -> Self {
        Self(Decimal::new(i64::from(fee), 2))
    }

    /// Yearly figure shown next to each pool.
    pub fn annualized(&self) -> Self {
        Self(self.0 * Decimal::from(DAYS_PER_YEAR))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Percentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}%", self.0)
    }
}
