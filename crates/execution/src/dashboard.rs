//! Balances and positions of the connected account.

use easydefi_domain::Token;
use easydefi_domain::entities::{LiquidityPosition, PoolSnapshot};
use easydefi_domain::token::TokenAmount;
use easydefi_domain::value_objects::{Amount, Percentage};
use easydefi_protocols::PlatformClient;
use tracing::warn;

/// Balance of one tracked token; `None` when the read failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenBalance {
    pub token: Token,
    pub amount: Option<TokenAmount>,
}

impl TokenBalance {
    /// Two decimals, "0" when empty, "unavailable" when the read failed.
    pub fn display(&self) -> String {
        match self.amount {
            Some(amount) if amount.is_zero() => "0".to_string(),
            Some(amount) => Amount::from_token_amount(amount, self.token.decimals).to_fixed(2),
            None => "unavailable".to_string(),
        }
    }
}

/// Suggestion shown when the first token sits idle in the wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdleBalanceHint {
    pub symbol: String,
    pub amount: String,
    pub apr: Percentage,
}

impl IdleBalanceHint {
    pub fn title(&self) -> String {
        format!("Earn {} APR on your idle {}", self.apr, self.symbol)
    }
}

/// Everything the dashboard screen shows.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DashboardSnapshot {
    pub balances: Vec<TokenBalance>,
    /// Pools where the account holds shares.
    pub positions: Vec<LiquidityPosition>,
    pub total_pool_shares: Option<TokenAmount>,
    pub idle_hint: Option<IdleBalanceHint>,
}

impl DashboardSnapshot {
    pub fn has_position(&self) -> bool {
        !self.positions.is_empty()
    }

    /// Shares with six decimals, as the positions card shows them.
    pub fn shares_display(position: &LiquidityPosition) -> String {
        Amount::from_token_amount(position.shares, easydefi_domain::token::DEFAULT_DECIMALS)
            .to_fixed(6)
    }
}

/// Loads dashboard data for the connected account.
pub struct Dashboard {
    client: PlatformClient,
    tokens: Vec<Token>,
    idle_apr: Percentage,
    snapshot: DashboardSnapshot,
}

impl Dashboard {
    #[must_use]
    pub fn new(client: PlatformClient, tokens: Vec<Token>, idle_apr: Percentage) -> Self {
        Self {
            client,
            tokens,
            idle_apr,
            snapshot: DashboardSnapshot::default(),
        }
    }

    pub fn snapshot(&self) -> &DashboardSnapshot {
        &self.snapshot
    }

    /// Re-reads balances, token by token.
    pub async fn refresh_balances(&mut self) {
        let owner = self.client.account().to_string();
        let mut balances = Vec::with_capacity(self.tokens.len());
        for token in &self.tokens {
            let amount = match self.client.balance_of(&token.address, &owner).await {
                Ok(amount) => Some(amount),
                Err(err) => {
                    warn!(token = %token.address, error = %err, "Failed to read balance");
                    None
                }
            };
            balances.push(TokenBalance {
                token: token.clone(),
                amount,
            });
        }
        self.snapshot.idle_hint = idle_hint(&balances, self.idle_apr);
        self.snapshot.balances = balances;
    }

    /// Re-reads the account's shares in every pool and the platform total.
    pub async fn refresh_shares(&mut self, pools: &[PoolSnapshot]) {
        let owner = self.client.account().to_string();
        let mut positions = Vec::new();
        for pool in pools {
            match self.client.shares(&owner, pool.id).await {
                Ok(Some(shares)) => positions.push(LiquidityPosition {
                    owner: owner.clone(),
                    pool_id: pool.id,
                    shares,
                }),
                Ok(None) => {}
                Err(err) => warn!(pool_id = pool.id, error = %err, "Failed to read shares"),
            }
        }
        self.snapshot.positions = positions;

        self.snapshot.total_pool_shares = match self.client.total_pool_shares().await {
            Ok(total) => Some(total),
            Err(err) => {
                warn!(error = %err, "Failed to read total pool shares");
                None
            }
        };
    }
}

fn idle_hint(balances: &[TokenBalance], apr: Percentage) -> Option<IdleBalanceHint> {
    let first = balances.first()?;
    let amount = first.amount.filter(|amount| !amount.is_zero())?;
    Some(IdleBalanceHint {
        symbol: first.token.symbol.clone(),
        amount: Amount::from_token_amount(amount, first.token.decimals).to_fixed(2),
        apr,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flows::testing::*;
    use easydefi_domain::token::DEFAULT_DECIMALS;
    use rust_decimal_macros::dec;

    fn tokens() -> Vec<Token> {
        vec![
            Token::new(ALY, "ALY", DEFAULT_DECIMALS, "Alyra"),
            Token::new(SALY, "sALY", DEFAULT_DECIMALS, "Liquid Alyra"),
        ]
    }

    #[tokio::test]
    async fn test_balances_and_idle_hint() {
        let (_chain, client, _notifications) = setup().await;
        let mut dashboard = Dashboard::new(client, tokens(), Percentage(dec!(2.94)));
        dashboard.refresh_balances().await;

        let snapshot = dashboard.snapshot();
        assert_eq!(snapshot.balances[0].display(), "100.00");
        let hint = snapshot.idle_hint.as_ref().unwrap();
        assert_eq!(hint.title(), "Earn 2.94% APR on your idle ALY");
        assert_eq!(hint.amount, "100.00");
    }

    #[tokio::test]
    async fn test_no_hint_without_first_token() {
        let (chain, client, _notifications) = setup().await;
        let mut dashboard = Dashboard::new(
            client.clone(),
            tokens(),
            Percentage(dec!(2.94)),
        );
        chain.set_allowance(ALY, USER, ether(100)).await;
        let hash = client.swap(ALY, SALY, ether(100)).await.unwrap();
        client.wait_for_receipt(&hash).await.unwrap();

        dashboard.refresh_balances().await;
        assert_eq!(dashboard.snapshot().balances[0].display(), "0");
        assert!(dashboard.snapshot().idle_hint.is_none());
    }

    #[tokio::test]
    async fn test_failed_balance_read_is_not_zero() {
        let (chain, client, _notifications) = setup().await;
        let mut dashboard = Dashboard::new(client, tokens(), Percentage(dec!(2.94)));
        chain.fail_reads(true).await;

        dashboard.refresh_balances().await;
        let balance = &dashboard.snapshot().balances[0];
        assert_eq!(balance.amount, None);
        assert_eq!(balance.display(), "unavailable");
        assert!(dashboard.snapshot().idle_hint.is_none());
    }

    #[tokio::test]
    async fn test_positions_and_read_failures() {
        let (chain, client, _notifications) = setup().await;
        let pools = client.get_pools_list().await.unwrap();
        let mut dashboard = Dashboard::new(client.clone(), tokens(), Percentage(dec!(2.94)));

        dashboard.refresh_shares(&pools).await;
        assert!(!dashboard.snapshot().has_position());
        assert_eq!(dashboard.snapshot().total_pool_shares, Some(ether(1000)));

        chain.set_allowance(ALY, USER, ether(1)).await;
        chain.set_allowance(SALY, USER, ether(2)).await;
        let hash = client.add_liquidity(ALY, SALY, ether(1), ether(2)).await.unwrap();
        client.wait_for_receipt(&hash).await.unwrap();

        dashboard.refresh_shares(&pools).await;
        let position = &dashboard.snapshot().positions[0];
        assert_eq!(DashboardSnapshot::shares_display(position), "1.000000");

        chain.fail_reads(true).await;
        dashboard.refresh_balances().await;
        assert!(dashboard.snapshot().balances.iter().all(|b| b.amount.is_none()));
        assert!(dashboard.snapshot().idle_hint.is_none());
    }
}
