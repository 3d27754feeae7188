//! Add-liquidity flow with ratio lockstep between the two amounts.

use easydefi_domain::entities::PoolSnapshot;
use easydefi_domain::enums::{ActionKind, TokenSide};
use easydefi_domain::math::quote_optimal_paired_amount;
use easydefi_domain::token::TokenAmount;
use easydefi_domain::value_objects::{format_units, parse_units};
use easydefi_protocols::{PlatformClient, WriteCall};
use tracing::debug;

use super::{InFlightTx, refresh_allowances, settle, submit};
use crate::approval::{ActionMachine, PendingAction, Requirement, Resolution};
use crate::error::ExecutionError;
use crate::lifecycle::NotificationLog;

/// Deposit flow state.
pub struct DepositFlow {
    client: PlatformClient,
    notifications: NotificationLog,
    machine: ActionMachine,
    pool: Option<PoolSnapshot>,
    amount_a: String,
    amount_b: String,
    last_edited: Option<TokenSide>,
}

impl DepositFlow {
    #[must_use]
    pub fn new(client: PlatformClient, notifications: NotificationLog) -> Self {
        Self {
            client,
            notifications,
            machine: ActionMachine::new(),
            pool: None,
            amount_a: String::new(),
            amount_b: String::new(),
            last_edited: None,
        }
    }

    pub fn state(&self) -> &PendingAction {
        self.machine.state()
    }

    pub fn machine(&self) -> &ActionMachine {
        &self.machine
    }

    pub fn pool(&self) -> Option<&PoolSnapshot> {
        self.pool.as_ref()
    }

    pub fn amount(&self, side: TokenSide) -> &str {
        match side {
            TokenSide::A => &self.amount_a,
            TokenSide::B => &self.amount_b,
        }
    }

    /// The side whose value is authoritative.
    pub fn last_edited(&self) -> Option<TokenSide> {
        self.last_edited
    }

    /// Selects the pool to deposit into. Choosing another pool starts over.
    pub fn select_pool(&mut self, pool: PoolSnapshot) {
        let same_pool = self.pool.as_ref().is_some_and(|current| current.id == pool.id);
        self.pool = Some(pool);
        if !same_pool {
            self.amount_a.clear();
            self.amount_b.clear();
            self.last_edited = None;
            self.machine.reset_selection();
        }
        self.update_requirements();
    }

    /// Picks up fresh reserves for the selected pool from a refetched list.
    pub fn set_pools(&mut self, pools: &[PoolSnapshot]) {
        let Some(id) = self.pool.as_ref().map(|pool| pool.id) else {
            return;
        };
        let Some(fresh) = pools.iter().find(|pool| pool.id == id) else {
            return;
        };
        self.pool = Some(fresh.clone());
        if let Some(side) = self.last_edited {
            self.recompute_other(side);
        }
        self.update_requirements();
    }

    /// Updates one side and recomputes the other from the pool ratio.
    ///
    /// Clearing a side, or typing something that is not an amount, clears the
    /// other. While the pool holds no reserves the other side is left as
    /// typed, since the first deposit sets the price.
    pub fn set_amount(&mut self, side: TokenSide, input: &str) {
        *self.amount_mut(side) = input.to_string();
        self.last_edited = Some(side);
        self.recompute_other(side);
        self.update_requirements();
    }

    /// Forgets a cached allowance so the next refresh re-reads it.
    pub fn invalidate_allowance(&mut self, token: &str) {
        self.machine.invalidate_allowance(token);
    }

    pub async fn refresh_allowances(&mut self) {
        refresh_allowances(&mut self.machine, &self.client).await;
    }

    /// Sends the approval currently blocking the deposit, side A first.
    ///
    /// # Errors
    /// Fails when no approval is needed, another transaction is in flight, or
    /// the wallet rejects the request.
    pub async fn start_approval(&mut self) -> Result<InFlightTx, ExecutionError> {
        let ticket = self.machine.begin(ActionKind::Approval)?;
        let (token, amount) = ticket.approval.clone().ok_or(ExecutionError::TokenNotSelected)?;
        let call = WriteCall::Approve {
            token,
            spender: self.client.contract_address().to_string(),
            amount,
        };
        submit(&mut self.machine, &self.client, &self.notifications, ticket, call).await
    }

    /// Sends `addLiquidity` for the typed amounts.
    ///
    /// # Errors
    /// Fails unless the flow is ready, or when the wallet rejects the request.
    pub async fn start_deposit(&mut self) -> Result<InFlightTx, ExecutionError> {
        let pool = self.pool.clone().ok_or(ExecutionError::NoPool)?;
        let amount_a = parse_units(&self.amount_a)?;
        let amount_b = parse_units(&self.amount_b)?;
        let ticket = self.machine.begin(ActionKind::Deposit)?;
        let call = WriteCall::AddLiquidity {
            token_a: pool.token_a,
            token_b: pool.token_b,
            amount_a,
            amount_b,
        };
        submit(&mut self.machine, &self.client, &self.notifications, ticket, call).await
    }

    /// Waits for `tx` and applies its outcome.
    ///
    /// # Errors
    /// Returns the chain error when the transaction reverted.
    pub async fn finish(&mut self, tx: InFlightTx) -> Result<Resolution, ExecutionError> {
        let kind = tx.ticket.kind;
        let resolution = settle(&mut self.machine, &self.client, &self.notifications, tx).await?;
        if !resolution.is_stale() && kind != ActionKind::Approval {
            self.amount_a.clear();
            self.amount_b.clear();
            self.last_edited = None;
        }
        self.refresh_allowances().await;
        Ok(resolution)
    }

    /// # Errors
    /// See [`DepositFlow::start_approval`] and [`DepositFlow::finish`].
    pub async fn approve(&mut self) -> Result<Resolution, ExecutionError> {
        let tx = self.start_approval().await?;
        self.finish(tx).await
    }

    /// # Errors
    /// See [`DepositFlow::start_deposit`] and [`DepositFlow::finish`].
    pub async fn deposit(&mut self) -> Result<Resolution, ExecutionError> {
        let tx = self.start_deposit().await?;
        self.finish(tx).await
    }

    fn amount_mut(&mut self, side: TokenSide) -> &mut String {
        match side {
            TokenSide::A => &mut self.amount_a,
            TokenSide::B => &mut self.amount_b,
        }
    }

    /// Derives the side opposite `side` from its typed value.
    fn recompute_other(&mut self, side: TokenSide) {
        let paired = match parse_units(self.amount(side)) {
            Ok(amount) => self.paired_amount(side, amount).map(format_units),
            Err(_) => Some(String::new()),
        };
        if let Some(paired) = paired {
            *self.amount_mut(side.other()) = paired;
        }
        debug!(amount_a = %self.amount_a, amount_b = %self.amount_b, "Deposit recomputed");
    }

    fn paired_amount(&self, side: TokenSide, amount: TokenAmount) -> Option<TokenAmount> {
        let pool = self.pool.as_ref()?;
        let (reserve_self, reserve_other) = match side {
            TokenSide::A => (pool.reserve_a, pool.reserve_b),
            TokenSide::B => (pool.reserve_b, pool.reserve_a),
        };
        quote_optimal_paired_amount(amount, reserve_self, reserve_other)
    }

    fn update_requirements(&mut self) {
        let positive = |input: &str| parse_units(input).ok().filter(|amount| !amount.is_zero());
        let requirements = match (&self.pool, positive(&self.amount_a), positive(&self.amount_b)) {
            (Some(pool), Some(amount_a), Some(amount_b)) => Some(vec![
                Requirement::side(TokenSide::A, pool.token_a.clone(), amount_a),
                Requirement::side(TokenSide::B, pool.token_b.clone(), amount_b),
            ]),
            _ => None,
        };
        self.machine.set_requirements(requirements);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flows::testing::*;
    use easydefi_protocols::SimulatedChain;

    async fn deposit_flow() -> (SimulatedChain, DepositFlow) {
        let (chain, client, notifications) = setup().await;
        let pools = client.get_pools_list().await.unwrap();
        let mut flow = DepositFlow::new(client, notifications);
        flow.select_pool(pools[0].clone());
        (chain, flow)
    }

    #[tokio::test]
    async fn test_ratio_lockstep() {
        let (_chain, mut flow) = deposit_flow().await;
        flow.set_amount(TokenSide::A, "3");
        assert_eq!(flow.amount(TokenSide::B), "6");

        flow.set_amount(TokenSide::B, "1");
        assert_eq!(flow.amount(TokenSide::A), "0.5");
        assert_eq!(flow.last_edited(), Some(TokenSide::B));

        flow.set_amount(TokenSide::B, "");
        assert_eq!(flow.amount(TokenSide::A), "");
        assert_eq!(flow.state(), &PendingAction::Initial);
    }

    #[tokio::test]
    async fn test_reserve_refresh_follows_last_edited_side() {
        let (_chain, mut flow) = deposit_flow().await;
        flow.set_amount(TokenSide::A, "3");
        assert_eq!(flow.amount(TokenSide::B), "6");

        let mut pool = flow.pool().cloned().unwrap();
        pool.reserve_b = ether(1000);
        flow.set_pools(&[pool.clone()]);
        assert_eq!(flow.amount(TokenSide::A), "3");
        assert_eq!(flow.amount(TokenSide::B), "3");

        flow.set_amount(TokenSide::B, "4");
        pool.reserve_a = ether(500);
        flow.set_pools(&[pool]);
        assert_eq!(flow.amount(TokenSide::B), "4");
        assert_eq!(flow.amount(TokenSide::A), "2");
        assert_eq!(
            flow.machine().requirements().map(|reqs| reqs[0].amount),
            Some(ether(2))
        );
    }

    #[tokio::test]
    async fn test_unparsable_input_clears_other_side() {
        let (_chain, mut flow) = deposit_flow().await;
        flow.set_amount(TokenSide::A, "3");
        assert_eq!(flow.amount(TokenSide::B), "6");

        flow.set_amount(TokenSide::A, "3x");
        assert_eq!(flow.amount(TokenSide::A), "3x");
        assert_eq!(flow.amount(TokenSide::B), "");
        assert_eq!(flow.state(), &PendingAction::Initial);
    }

    #[tokio::test]
    async fn test_empty_pool_accepts_any_ratio() {
        let (chain, client, notifications) = setup().await;
        chain
            .seed_pool(ALY, "0xnew", 30, TokenAmount::zero(), TokenAmount::zero())
            .await
            .unwrap();
        let pools = client.get_pools_list().await.unwrap();
        let mut flow = DepositFlow::new(client, notifications);
        flow.select_pool(pools[1].clone());

        flow.set_amount(TokenSide::A, "1");
        assert_eq!(flow.amount(TokenSide::B), "");
        flow.set_amount(TokenSide::B, "7");
        assert_eq!(flow.amount(TokenSide::A), "1");
    }

    #[tokio::test]
    async fn test_approvals_in_order_then_deposit() {
        let (chain, mut flow) = deposit_flow().await;
        flow.set_amount(TokenSide::A, "5");
        flow.refresh_allowances().await;
        assert_eq!(flow.state().to_string(), "needsApprovalA");

        flow.approve().await.unwrap();
        assert_eq!(flow.state().to_string(), "needsApprovalB");
        assert_eq!(flow.state().needs_approval(), Some((SALY, ether(10))));

        flow.approve().await.unwrap();
        assert!(flow.state().is_ready());

        flow.deposit().await.unwrap();
        assert_eq!(flow.state(), &PendingAction::Initial);
        assert_eq!(flow.amount(TokenSide::A), "");

        let state = chain.snapshot().await;
        assert_eq!(state.balance(ALY, USER), ether(95));
        assert_eq!(state.balance(SALY, USER), ether(90));
        assert_eq!(state.shares_of(USER, 1), ether(5));
    }

    #[tokio::test]
    async fn test_switching_pool_resets_inputs() {
        let (chain, client, notifications) = setup().await;
        chain
            .seed_pool(ALY, "0xnew", 30, ether(1), ether(1))
            .await
            .unwrap();
        let pools = client.get_pools_list().await.unwrap();
        let mut flow = DepositFlow::new(client, notifications);
        flow.select_pool(pools[0].clone());
        flow.set_amount(TokenSide::A, "1");
        let generation = flow.machine().generation();

        flow.select_pool(pools[1].clone());
        assert_eq!(flow.amount(TokenSide::A), "");
        assert!(flow.machine().generation() > generation);

        // Reselecting the same pool with fresh reserves keeps the inputs.
        flow.set_amount(TokenSide::A, "1");
        flow.select_pool(pools[1].clone());
        assert_eq!(flow.amount(TokenSide::A), "1");
    }
}
