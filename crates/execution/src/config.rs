//! Session configuration.

use easydefi_domain::Token;
use easydefi_domain::enums::EventFilter;
use easydefi_domain::token::{DEFAULT_DECIMALS, TokenAmount};
use easydefi_domain::value_objects::Percentage;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::activity::DEFAULT_ACTIVITY_LIMIT;

/// Configuration for a user session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Platform contract address (spender of every approval).
    pub contract: String,
    /// Connected account.
    pub account: String,
    /// Tokens shown on the dashboard and the swap screen, in display order.
    pub tokens: Vec<Token>,
    /// Block explorer base URL for transaction links.
    pub explorer_url: String,
    /// Maximum number of events in the activity feed.
    pub activity_limit: usize,
    /// Initial activity filter.
    pub activity_filter: EventFilter,
    /// Amount granted by the create-pool approve buttons.
    pub create_pool_approval: TokenAmount,
    /// Yield advertised for idle balances of the first token.
    pub idle_apr: Percentage,
}

impl SessionConfig {
    /// First listed token, the default swap input.
    pub fn primary_token(&self) -> Option<&Token> {
        self.tokens.first()
    }

    /// Second listed token, the default swap output.
    pub fn secondary_token(&self) -> Option<&Token> {
        self.tokens.get(1)
    }

    pub fn symbol_of<'a>(&'a self, address: &'a str) -> &'a str {
        self.tokens
            .iter()
            .find(|token| token.address == address)
            .map_or(address, |token| token.symbol.as_str())
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            contract: "0x0000000000000000000000000000000000e45e".to_string(),
            account: "0x00000000000000000000000000000000000a11ce".to_string(),
            tokens: vec![
                Token::new(
                    "0x00000000000000000000000000000000000000a1",
                    "ALY",
                    DEFAULT_DECIMALS,
                    "Alyra",
                ),
                Token::new(
                    "0x00000000000000000000000000000000000005a1",
                    "sALY",
                    DEFAULT_DECIMALS,
                    "Liquid Alyra",
                ),
            ],
            explorer_url: "https://sepolia.basescan.org".to_string(),
            activity_limit: DEFAULT_ACTIVITY_LIMIT,
            activity_filter: EventFilter::All,
            create_pool_approval: TokenAmount::from_whole(1000, DEFAULT_DECIMALS),
            idle_apr: Percentage(Decimal::new(294, 2)), // 2.94%
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.primary_token().map(|t| t.symbol.as_str()), Some("ALY"));
        assert_eq!(config.secondary_token().map(|t| t.symbol.as_str()), Some("sALY"));
        assert_eq!(config.activity_limit, 5);
        assert_eq!(config.idle_apr.to_string(), "2.94%");
        assert_eq!(config.symbol_of("0x00000000000000000000000000000000000005a1"), "sALY");
        assert_eq!(config.symbol_of("0xunknown"), "0xunknown");
    }
}
