//! One connected user: every flow plus the data they share.

use easydefi_domain::entities::PoolSnapshot;
use easydefi_domain::enums::TokenSide;
use easydefi_protocols::{ContractGateway, PlatformClient};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

use crate::activity::ActivityFeed;
use crate::approval::{Invalidation, Resolution};
use crate::config::SessionConfig;
use crate::dashboard::Dashboard;
use crate::error::ExecutionError;
use crate::flows::{CreatePoolFlow, DepositFlow, SwapFlow, WithdrawFlow};
use crate::lifecycle::NotificationLog;

/// Reads repeated after any confirmed transaction the session cannot attribute
/// to a live flow instance.
const FULL_REFRESH: [Invalidation; 4] = [
    Invalidation::PoolReserves,
    Invalidation::Balances,
    Invalidation::Shares,
    Invalidation::Activity,
];

/// Owns the flows of the swap, pool and dashboard screens.
///
/// After a confirmed action the session performs the reads the action
/// invalidated and hands fresh data to every flow.
pub struct Session {
    config: SessionConfig,
    client: PlatformClient,
    notifications: NotificationLog,
    pools: Vec<PoolSnapshot>,
    pub swap: SwapFlow,
    pub deposit: DepositFlow,
    pub withdraw: WithdrawFlow,
    pub create_pool: CreatePoolFlow,
    pub activity: ActivityFeed,
    pub dashboard: Dashboard,
}

impl Session {
    /// Creates a session over `gateway`. Nothing is read until [`Session::load`].
    pub fn new(gateway: Arc<dyn ContractGateway>, config: SessionConfig) -> Self {
        let client = PlatformClient::new(gateway, config.contract.clone());
        let notifications = NotificationLog::new(config.explorer_url.clone());

        let mut swap = SwapFlow::new(client.clone(), notifications.clone());
        if let (Some(token_in), Some(token_out)) = (config.primary_token(), config.secondary_token()) {
            swap = swap.with_pair(&token_in.address, &token_out.address);
        }

        Self {
            deposit: DepositFlow::new(client.clone(), notifications.clone()),
            withdraw: WithdrawFlow::new(client.clone(), notifications.clone()),
            create_pool: CreatePoolFlow::new(
                client.clone(),
                notifications.clone(),
                config.create_pool_approval,
            ),
            activity: ActivityFeed::new(
                client.clone(),
                config.activity_filter,
                config.activity_limit,
            ),
            dashboard: Dashboard::new(client.clone(), config.tokens.clone(), config.idle_apr),
            swap,
            config,
            client,
            notifications,
            pools: Vec::new(),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn client(&self) -> &PlatformClient {
        &self.client
    }

    pub fn notifications(&self) -> &NotificationLog {
        &self.notifications
    }

    pub fn pools(&self) -> &[PoolSnapshot] {
        &self.pools
    }

    /// Initial reads, as when the screens mount. The first pool is selected
    /// for deposits and withdrawals.
    pub async fn load(&mut self) {
        self.refresh_pools().await;
        if let Some(pool) = self.pools.first().cloned() {
            self.deposit.select_pool(pool.clone());
            self.withdraw.select_pool(pool);
        }
        self.dashboard.refresh_balances().await;
        self.refresh_shares().await;
        self.refresh_activity().await;
        info!(pools = self.pools.len(), account = %self.client.account(), "Session loaded");
    }

    /// Selects the pool used by the deposit and withdraw flows.
    ///
    /// # Errors
    /// `NoPool` when `pool_id` is not in the current list.
    pub async fn select_pool(&mut self, pool_id: u64) -> Result<(), ExecutionError> {
        let pool = self
            .pools
            .iter()
            .find(|pool| pool.id == pool_id)
            .cloned()
            .ok_or(ExecutionError::NoPool)?;
        self.deposit.select_pool(pool.clone());
        self.withdraw.select_pool(pool);
        self.withdraw.refresh_shares().await;
        Ok(())
    }

    /// Approves whatever the swap flow is waiting for.
    ///
    /// # Errors
    /// See [`SwapFlow::approve`].
    pub async fn approve_swap(&mut self) -> Result<Resolution, ExecutionError> {
        let result = self.swap.approve().await;
        self.after(result).await
    }

    /// # Errors
    /// See [`SwapFlow::swap`].
    pub async fn swap(&mut self) -> Result<Resolution, ExecutionError> {
        let result = self.swap.swap().await;
        self.after(result).await
    }

    /// Approves the next token the deposit needs, side A first.
    ///
    /// # Errors
    /// See [`DepositFlow::approve`].
    pub async fn approve_deposit(&mut self) -> Result<Resolution, ExecutionError> {
        let result = self.deposit.approve().await;
        self.after(result).await
    }

    /// # Errors
    /// See [`DepositFlow::deposit`].
    pub async fn deposit(&mut self) -> Result<Resolution, ExecutionError> {
        let result = self.deposit.deposit().await;
        self.after(result).await
    }

    /// # Errors
    /// See [`WithdrawFlow::withdraw`].
    pub async fn withdraw(&mut self) -> Result<Resolution, ExecutionError> {
        let result = self.withdraw.withdraw().await;
        self.after(result).await
    }

    /// # Errors
    /// See [`CreatePoolFlow::approve`].
    pub async fn approve_for_pool(&mut self, side: TokenSide) -> Result<Resolution, ExecutionError> {
        let result = self.create_pool.approve(side).await;
        self.after(result).await
    }

    /// # Errors
    /// See [`CreatePoolFlow::create`].
    pub async fn create_pool(&mut self) -> Result<Resolution, ExecutionError> {
        let result = self.create_pool.create().await;
        self.after(result).await
    }

    /// Performs the reads listed in `invalidations`, each at most once.
    pub async fn apply(&mut self, invalidations: &[Invalidation]) {
        let unique: HashSet<&Invalidation> = invalidations.iter().collect();

        if unique.contains(&Invalidation::PoolReserves) {
            self.refresh_pools().await;
        }
        if unique.contains(&Invalidation::Balances) {
            self.dashboard.refresh_balances().await;
        }
        if unique.contains(&Invalidation::Shares) {
            self.refresh_shares().await;
        }
        for invalidation in &unique {
            if let Invalidation::Allowance(token) = invalidation {
                self.swap.invalidate_allowance(token);
                self.deposit.invalidate_allowance(token);
            }
        }
        self.swap.refresh_allowances().await;
        self.deposit.refresh_allowances().await;
        if unique.contains(&Invalidation::Activity) {
            self.refresh_activity().await;
        }
    }

    /// Refetches the pool list and hands it to every flow.
    pub async fn refresh_pools(&mut self) {
        match self.client.get_pools_list().await {
            Ok(pools) => {
                self.swap.set_pools(pools.clone());
                self.deposit.set_pools(&pools);
                self.withdraw.set_pools(&pools);
                self.pools = pools;
            }
            Err(err) => warn!(error = %err, "Failed to fetch pools"),
        }
    }

    async fn refresh_shares(&mut self) {
        self.dashboard.refresh_shares(&self.pools).await;
        self.withdraw.refresh_shares().await;
    }

    async fn refresh_activity(&mut self) {
        if let Err(err) = self.activity.refresh().await {
            warn!(error = %err, "Activity feed unavailable");
        }
    }

    async fn after(
        &mut self,
        result: Result<Resolution, ExecutionError>,
    ) -> Result<Resolution, ExecutionError> {
        if let Ok(resolution) = &result {
            if resolution.is_stale() {
                self.apply(&FULL_REFRESH).await;
            } else {
                self.apply(resolution.invalidations()).await;
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::approval::PendingAction;
    use crate::flows::testing::*;
    use easydefi_domain::Token;
    use easydefi_domain::enums::EventFilter;
    use easydefi_domain::token::DEFAULT_DECIMALS;
    use easydefi_protocols::SimulatedChain;

    async fn session() -> (SimulatedChain, Session) {
        let (chain, _client, _notifications) = setup().await;
        let config = SessionConfig {
            contract: CONTRACT.to_string(),
            account: USER.to_string(),
            tokens: vec![
                Token::new(ALY, "ALY", DEFAULT_DECIMALS, "Alyra"),
                Token::new(SALY, "sALY", DEFAULT_DECIMALS, "Liquid Alyra"),
            ],
            explorer_url: EXPLORER.to_string(),
            ..SessionConfig::default()
        };
        let mut session = Session::new(Arc::new(chain.clone()), config);
        session.load().await;
        (chain, session)
    }

    #[tokio::test]
    async fn test_load_selects_first_pool() {
        let (_chain, session) = session().await;
        assert_eq!(session.pools().len(), 1);
        assert_eq!(session.deposit.pool().map(|p| p.id), Some(1));
        assert_eq!(session.withdraw.pool().map(|p| p.id), Some(1));
        assert_eq!(session.swap.token_in(), Some(ALY));
        assert!(session.dashboard.snapshot().idle_hint.is_some());
        assert!(session.activity.events().is_empty());
    }

    #[tokio::test]
    async fn test_swap_refreshes_shared_data() {
        let (_chain, mut session) = session().await;
        session.swap.set_amount_in("10");
        session.swap.refresh_allowances().await;
        session.approve_swap().await.unwrap();
        assert!(session.swap.state().is_ready());

        session.swap().await.unwrap();
        assert_eq!(session.swap.state(), &PendingAction::Initial);
        assert_eq!(session.pools()[0].reserve_a, ether(1010));
        assert_eq!(session.dashboard.snapshot().balances[0].display(), "90.00");
        // The deposit flow sees the new reserves.
        assert_eq!(session.deposit.pool().map(|p| p.reserve_a), Some(ether(1010)));
    }

    #[tokio::test]
    async fn test_deposit_then_withdraw_updates_activity() {
        let (_chain, mut session) = session().await;
        session.deposit.set_amount(TokenSide::A, "5");
        session.deposit.refresh_allowances().await;
        assert_eq!(session.deposit.state().to_string(), "needsApprovalA");
        session.approve_deposit().await.unwrap();
        assert_eq!(session.deposit.state().to_string(), "needsApprovalB");
        session.approve_deposit().await.unwrap();
        session.deposit().await.unwrap();

        assert!(session.dashboard.snapshot().has_position());
        assert_eq!(session.withdraw.user_shares(), Some(ether(5)));
        assert_eq!(session.activity.events().len(), 1);

        session.withdraw.max();
        session.withdraw().await.unwrap();
        assert!(!session.dashboard.snapshot().has_position());

        session.activity.set_filter(EventFilter::Withdrawals);
        session.activity.refresh().await.unwrap();
        assert_eq!(session.activity.events().len(), 1);

        let titles: Vec<String> = session
            .notifications()
            .all()
            .await
            .into_iter()
            .map(|n| n.title)
            .collect();
        assert_eq!(
            titles,
            [
                "Approval Submitted",
                "Approval Confirmed",
                "Approval Submitted",
                "Approval Confirmed",
                "Transaction Submitted",
                "Liquidity Successfully Added",
                "Transaction Submitted",
                "Liquidity Successfully Removed",
            ]
        );
    }

    #[tokio::test]
    async fn test_spent_allowance_is_reread_by_other_flows() {
        let (chain, mut session) = session().await;
        chain.set_allowance(ALY, USER, ether(10)).await;

        session.deposit.set_amount(TokenSide::A, "5");
        session.deposit.refresh_allowances().await;
        assert_eq!(session.deposit.state().to_string(), "needsApprovalB");

        session.swap.set_amount_in("8");
        session.swap.refresh_allowances().await;
        session.swap().await.unwrap();

        // Only 2 ALY of allowance remain, so the deposit needs A again.
        assert_eq!(session.deposit.state().to_string(), "needsApprovalA");
    }

    #[tokio::test]
    async fn test_read_failure_blocks_actions() {
        let (chain, mut session) = session().await;
        chain.fail_reads(true).await;
        session.swap.set_amount_in("1");
        session.swap.refresh_allowances().await;
        assert_eq!(session.swap.state(), &PendingAction::Unknown);
        assert!(session.swap().await.is_err());

        chain.fail_reads(false).await;
        session.swap.refresh_allowances().await;
        assert_eq!(session.swap.state().needs_approval(), Some((ALY, ether(1))));
    }
}
