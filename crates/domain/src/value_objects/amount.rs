use crate::error::DomainError;
use crate::token::TokenAmount;
use primitive_types::U256;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A raw amount paired with its decimal scale.
///
/// This is the boundary between what a user types ("1.5") and what the
/// contract receives (`1500000000000000000`). Conversions are exact; no
/// floating point is involved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Amount {
    pub raw: U256,
    pub decimals: u8,
}

impl Amount {
    pub fn new(raw: U256, decimals: u8) -> Self {
        Self { raw, decimals }
    }

    pub fn from_token_amount(amount: TokenAmount, decimals: u8) -> Self {
        Self::new(amount.0, decimals)
    }

    /// Parses a decimal string into a scaled integer.
    ///
    /// Fractional digits beyond `decimals` are rounded half-up on the first
    /// dropped digit.
    ///
    /// # Errors
    /// Returns an error for empty, negative, non-numeric or oversized input.
    pub fn parse(input: &str, decimals: u8) -> Result<Self, DomainError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(DomainError::EmptyAmount);
        }
        if trimmed.starts_with('-') {
            return Err(DomainError::NegativeAmount(trimmed.to_string()));
        }

        let (int_part, frac_part) = trimmed.split_once('.').unwrap_or((trimmed, ""));
        let is_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
        if (int_part.is_empty() && frac_part.is_empty()) || !is_digits(int_part) || !is_digits(frac_part)
        {
            return Err(DomainError::InvalidAmount(trimmed.to_string()));
        }

        let scale = decimals as usize;
        let (kept, round_up) = if frac_part.len() > scale {
            let (kept, dropped) = frac_part.split_at(scale);
            (kept, dropped.as_bytes()[0] >= b'5')
        } else {
            (frac_part, false)
        };

        let digits = format!("{int_part}{kept:0<scale$}");
        let digits = if digits.is_empty() { "0" } else { digits.as_str() };
        let mut raw = U256::from_dec_str(digits)
            .map_err(|_| DomainError::Overflow(trimmed.to_string()))?;
        if round_up {
            raw = raw
                .checked_add(U256::one())
                .ok_or_else(|| DomainError::Overflow(trimmed.to_string()))?;
        }

        Ok(Self::new(raw, decimals))
    }

    pub fn token_amount(&self) -> TokenAmount {
        TokenAmount(self.raw)
    }

    pub fn is_zero(&self) -> bool {
        self.raw.is_zero()
    }

    /// Shortest exact decimal rendering: `1500000000000000000` -> `"1.5"`.
    pub fn format(&self) -> String {
        let (int, frac) = self.split();
        let frac = frac.trim_end_matches('0');
        if frac.is_empty() {
            int
        } else {
            format!("{int}.{frac}")
        }
    }

    /// Fixed number of fractional digits, truncated. Display only.
    pub fn to_fixed(&self, dp: usize) -> String {
        let (int, frac) = self.split();
        if dp == 0 {
            return int;
        }
        let mut frac: String = frac.chars().take(dp).collect();
        while frac.len() < dp {
            frac.push('0');
        }
        format!("{int}.{frac}")
    }

    /// Lossy conversion for ratios and display, `None` when out of range.
    pub fn to_decimal(&self) -> Option<Decimal> {
        Decimal::from_str(&self.format()).ok()
    }

    fn split(&self) -> (String, String) {
        let digits = self.raw.to_string();
        let scale = self.decimals as usize;
        if scale == 0 {
            return (digits, String::new());
        }
        let padded = format!("{digits:0>width$}", width = scale + 1);
        let (int, frac) = padded.split_at(padded.len() - scale);
        (int.to_string(), frac.to_string())
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format())
    }
}

/// Parses a user-typed amount with the platform's 18 decimals.
///
/// # Errors
/// See [`Amount::parse`].
pub fn parse_units(input: &str) -> Result<TokenAmount, DomainError> {
    Amount::parse(input, crate::token::DEFAULT_DECIMALS).map(|a| a.token_amount())
}

/// Formats a raw amount with the platform's 18 decimals.
pub fn format_units(amount: TokenAmount) -> String {
    Amount::from_token_amount(amount, crate::token::DEFAULT_DECIMALS).format()
}
