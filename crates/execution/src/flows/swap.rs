//! Swap screen: token pair selection, live quote, approve then swap.

use easydefi_domain::entities::{PoolSnapshot, find_pool};
use easydefi_domain::enums::ActionKind;
use easydefi_domain::math::{exchange_rate, quote_swap_output};
use easydefi_domain::token::TokenAmount;
use easydefi_domain::value_objects::{Percentage, format_units, parse_units};
use easydefi_protocols::{PlatformClient, WriteCall};
use rust_decimal::Decimal;
use tracing::{debug, info};

use super::{InFlightTx, refresh_allowances, settle, submit};
use crate::approval::{ActionMachine, PendingAction, Requirement, Resolution};
use crate::error::ExecutionError;
use crate::lifecycle::NotificationLog;

/// Swap flow state.
pub struct SwapFlow {
    client: PlatformClient,
    notifications: NotificationLog,
    machine: ActionMachine,
    pools: Vec<PoolSnapshot>,
    token_in: Option<String>,
    token_out: Option<String>,
    amount_in: String,
    quote: Option<TokenAmount>,
}

impl SwapFlow {
    #[must_use]
    pub fn new(client: PlatformClient, notifications: NotificationLog) -> Self {
        Self {
            client,
            notifications,
            machine: ActionMachine::new(),
            pools: Vec::new(),
            token_in: None,
            token_out: None,
            amount_in: String::new(),
            quote: None,
        }
    }

    /// Preselects the pair, as the swap screen opens on ALY -> sALY.
    #[must_use]
    pub fn with_pair(mut self, token_in: &str, token_out: &str) -> Self {
        self.token_in = Some(token_in.to_string());
        self.token_out = Some(token_out.to_string());
        self
    }

    pub fn state(&self) -> &PendingAction {
        self.machine.state()
    }

    pub fn machine(&self) -> &ActionMachine {
        &self.machine
    }

    pub fn token_in(&self) -> Option<&str> {
        self.token_in.as_deref()
    }

    pub fn token_out(&self) -> Option<&str> {
        self.token_out.as_deref()
    }

    pub fn amount_in(&self) -> &str {
        &self.amount_in
    }

    /// Replaces the pool list after a refetch.
    pub fn set_pools(&mut self, pools: Vec<PoolSnapshot>) {
        self.pools = pools;
        self.recompute();
    }

    /// Pool trading the selected pair.
    pub fn pool(&self) -> Option<&PoolSnapshot> {
        find_pool(&self.pools, self.token_in.as_deref()?, self.token_out.as_deref()?)
    }

    /// Selects the input token. Picking the current output token swaps the pair.
    pub fn select_token_in(&mut self, token: &str) {
        if self.token_out.as_deref() == Some(token) {
            self.token_out = self.token_in.take();
        }
        self.token_in = Some(token.to_string());
        self.selection_changed();
    }

    /// Selects the output token. Picking the current input token swaps the pair.
    pub fn select_token_out(&mut self, token: &str) {
        if self.token_in.as_deref() == Some(token) {
            self.token_in = self.token_out.take();
        }
        self.token_out = Some(token.to_string());
        self.selection_changed();
    }

    /// Reverses the direction of the swap.
    pub fn flip(&mut self) {
        std::mem::swap(&mut self.token_in, &mut self.token_out);
        self.selection_changed();
    }

    /// Updates the typed input amount and recomputes the quote immediately.
    pub fn set_amount_in(&mut self, input: &str) {
        self.amount_in = input.to_string();
        self.recompute();
    }

    /// Expected output for the typed amount; `None` when no quote is available.
    pub fn quote(&self) -> Option<TokenAmount> {
        self.quote
    }

    /// Quote as a decimal string, the way the output field shows it.
    pub fn quote_display(&self) -> Option<String> {
        self.quote.map(format_units)
    }

    /// Output per unit of input at the quoted size.
    pub fn exchange_rate(&self) -> Option<Decimal> {
        let amount_in = parse_units(&self.amount_in).ok()?;
        exchange_rate(amount_in, self.quote?)
    }

    pub fn fee(&self) -> Option<Percentage> {
        self.pool().map(PoolSnapshot::fee_percentage)
    }

    /// Forgets a cached allowance so the next refresh re-reads it.
    pub fn invalidate_allowance(&mut self, token: &str) {
        self.machine.invalidate_allowance(token);
    }

    /// Reads the input token's allowance when the machine lacks it.
    pub async fn refresh_allowances(&mut self) {
        refresh_allowances(&mut self.machine, &self.client).await;
    }

    /// Sends the approval the flow is waiting for.
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

    /// Sends the swap for the typed amount.
    ///
    /// # Errors
    /// Fails unless the flow is ready, or when the wallet rejects the request.
    pub async fn start_swap(&mut self) -> Result<InFlightTx, ExecutionError> {
        let (token_in, token_out) = match (&self.token_in, &self.token_out) {
            (Some(token_in), Some(token_out)) => (token_in.clone(), token_out.clone()),
            _ => return Err(ExecutionError::TokenNotSelected),
        };
        let amount_in = parse_units(&self.amount_in)?;
        let ticket = self.machine.begin(ActionKind::Swap)?;
        let call = WriteCall::Swap {
            token_in,
            token_out,
            amount_in,
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
            self.amount_in.clear();
            self.quote = None;
            info!(state = %self.machine.state(), "Swap confirmed");
        }
        self.refresh_allowances().await;
        Ok(resolution)
    }

    /// Approves and waits for confirmation.
    ///
    /// # Errors
    /// See [`SwapFlow::start_approval`] and [`SwapFlow::finish`].
    pub async fn approve(&mut self) -> Result<Resolution, ExecutionError> {
        let tx = self.start_approval().await?;
        self.finish(tx).await
    }

    /// Swaps and waits for confirmation.
    ///
    /// # Errors
    /// See [`SwapFlow::start_swap`] and [`SwapFlow::finish`].
    pub async fn swap(&mut self) -> Result<Resolution, ExecutionError> {
        let tx = self.start_swap().await?;
        self.finish(tx).await
    }

    fn selection_changed(&mut self) {
        self.amount_in.clear();
        self.machine.reset_selection();
        self.recompute();
    }

    fn recompute(&mut self) {
        let amount = parse_units(&self.amount_in).ok().filter(|amount| !amount.is_zero());
        let pool = self.pool().cloned();

        self.quote = match (amount, &pool, &self.token_in) {
            (Some(amount), Some(pool), Some(token_in)) => pool
                .reserves_for(token_in)
                .map(|(reserve_in, reserve_out)| {
                    quote_swap_output(amount, reserve_in, reserve_out, pool.fee)
                })
                .filter(|out| !out.is_zero()),
            _ => None,
        };

        let requirements = match (amount, &pool, &self.token_in) {
            (Some(amount), Some(_), Some(token_in)) => {
                Some(vec![Requirement::single(token_in.clone(), amount)])
            }
            _ => None,
        };
        self.machine.set_requirements(requirements);
        debug!(amount_in = %self.amount_in, quote = ?self.quote, "Swap recomputed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flows::testing::*;
    use easydefi_protocols::ChainError;
    use rust_decimal_macros::dec;

    async fn swap_flow() -> (easydefi_protocols::SimulatedChain, SwapFlow) {
        let (chain, client, notifications) = setup().await;
        let mut flow = SwapFlow::new(client.clone(), notifications).with_pair(ALY, SALY);
        flow.set_pools(client.get_pools_list().await.unwrap());
        (chain, flow)
    }

    #[tokio::test]
    async fn test_quote_updates_with_amount() {
        let (_chain, mut flow) = swap_flow().await;
        flow.set_amount_in("10");
        assert_eq!(flow.quote().unwrap().to_string(), "19743160687941225977");
        assert_eq!(flow.quote_display().unwrap(), "19.743160687941225977");
        assert_eq!(flow.exchange_rate(), Some(dec!(1.974316)));
        assert_eq!(flow.fee().unwrap().to_string(), "0.30%");

        flow.set_amount_in("");
        assert_eq!(flow.quote(), None);
        assert_eq!(flow.state(), &PendingAction::Initial);

        flow.set_amount_in("abc");
        assert_eq!(flow.quote(), None);
    }

    #[tokio::test]
    async fn test_selecting_output_as_input_flips_pair() {
        let (_chain, mut flow) = swap_flow().await;
        flow.set_amount_in("1");
        flow.select_token_in(SALY);
        assert_eq!(flow.token_in(), Some(SALY));
        assert_eq!(flow.token_out(), Some(ALY));
        assert_eq!(flow.amount_in(), "");

        flow.flip();
        assert_eq!(flow.token_in(), Some(ALY));
        assert_eq!(flow.token_out(), Some(SALY));
    }

    #[tokio::test]
    async fn test_approval_then_swap() {
        let (chain, mut flow) = swap_flow().await;
        flow.set_amount_in("5");
        flow.refresh_allowances().await;
        assert_eq!(flow.state().needs_approval(), Some((ALY, ether(5))));

        flow.approve().await.unwrap();
        // The allowance was re-read after confirmation, no further input needed.
        assert!(flow.state().is_ready());

        flow.swap().await.unwrap();
        assert_eq!(flow.state(), &PendingAction::Initial);
        assert_eq!(flow.amount_in(), "");
        assert_eq!(chain.snapshot().await.balance(ALY, USER), ether(95));
    }

    #[tokio::test]
    async fn test_rejected_swap_keeps_amount() {
        let (chain, mut flow) = swap_flow().await;
        chain.set_allowance(ALY, USER, ether(10)).await;
        flow.set_amount_in("5");
        flow.refresh_allowances().await;
        assert!(flow.state().is_ready());

        chain.reject_next("user denied").await;
        let err = flow.swap().await.unwrap_err();
        assert_eq!(
            err,
            ExecutionError::Chain(ChainError::Rejected("user denied".to_string()))
        );
        assert!(flow.state().is_ready());
        assert_eq!(flow.amount_in(), "5");
    }

    #[tokio::test]
    async fn test_amount_change_while_submitting() {
        let (chain, mut flow) = swap_flow().await;
        chain.set_allowance(ALY, USER, ether(5)).await;
        flow.set_amount_in("5");
        flow.refresh_allowances().await;

        let tx = flow.start_swap().await.unwrap();
        flow.set_amount_in("8");
        assert!(flow.state().is_submitting());

        chain.revert_next("slippage").await;
        assert!(flow.finish(tx).await.is_err());
        // Re-evaluated against the new amount: 8 > remaining allowance.
        assert_eq!(flow.state().needs_approval(), Some((ALY, ether(8))));
    }

    #[tokio::test]
    async fn test_switching_tokens_while_submitting_is_isolated() {
        let (chain, mut flow) = swap_flow().await;
        chain.set_allowance(ALY, USER, ether(5)).await;
        flow.set_amount_in("5");
        flow.refresh_allowances().await;

        let tx = flow.start_swap().await.unwrap();
        flow.flip();
        flow.set_amount_in("2");
        flow.refresh_allowances().await;
        let before = flow.state().clone();
        assert_eq!(before.needs_approval(), Some((SALY, ether(2))));

        let resolution = flow.finish(tx).await.unwrap();
        assert!(resolution.is_stale());
        assert_eq!(flow.state(), &before);
        assert_eq!(flow.amount_in(), "2");
        // The old transaction still went through on chain.
        assert_eq!(chain.snapshot().await.balance(ALY, USER), ether(95));
    }

    #[tokio::test]
    async fn test_no_pool_means_no_quote() {
        let (_chain, client, notifications) = setup().await;
        let mut flow = SwapFlow::new(client, notifications).with_pair(ALY, "0xother");
        flow.set_amount_in("1");
        assert_eq!(flow.quote(), None);
        assert_eq!(flow.state(), &PendingAction::Initial);
        assert!(matches!(
            flow.start_swap().await,
            Err(ExecutionError::NotReady { .. })
        ));
    }
}
