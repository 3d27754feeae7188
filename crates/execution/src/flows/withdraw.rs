//! Remove-liquidity flow. Shares need no allowance.

use easydefi_domain::entities::PoolSnapshot;
use easydefi_domain::enums::ActionKind;
use easydefi_domain::token::TokenAmount;
use easydefi_domain::value_objects::{format_units, parse_units};
use easydefi_protocols::{PlatformClient, WriteCall};
use tracing::warn;

use super::{InFlightTx, settle, submit};
use crate::approval::{ActionMachine, PendingAction, Resolution};
use crate::error::ExecutionError;
use crate::lifecycle::NotificationLog;

/// Withdraw flow state.
pub struct WithdrawFlow {
    client: PlatformClient,
    notifications: NotificationLog,
    machine: ActionMachine,
    pool: Option<PoolSnapshot>,
    shares: String,
    user_shares: Option<TokenAmount>,
}

impl WithdrawFlow {
    #[must_use]
    pub fn new(client: PlatformClient, notifications: NotificationLog) -> Self {
        Self {
            client,
            notifications,
            machine: ActionMachine::new(),
            pool: None,
            shares: String::new(),
            user_shares: None,
        }
    }

    pub fn state(&self) -> &PendingAction {
        self.machine.state()
    }

    pub fn pool(&self) -> Option<&PoolSnapshot> {
        self.pool.as_ref()
    }

    pub fn shares(&self) -> &str {
        &self.shares
    }

    /// Shares the user holds in the selected pool, `None` without a position.
    pub fn user_shares(&self) -> Option<TokenAmount> {
        self.user_shares
    }

    pub fn select_pool(&mut self, pool: PoolSnapshot) {
        let same_pool = self.pool.as_ref().is_some_and(|current| current.id == pool.id);
        self.pool = Some(pool);
        if !same_pool {
            self.shares.clear();
            self.user_shares = None;
            self.machine.reset_selection();
        }
        self.update_requirements();
    }

    /// Picks up fresh reserves for the selected pool from a refetched list.
    pub fn set_pools(&mut self, pools: &[PoolSnapshot]) {
        let Some(id) = self.pool.as_ref().map(|pool| pool.id) else {
            return;
        };
        if let Some(fresh) = pools.iter().find(|pool| pool.id == id) {
            self.pool = Some(fresh.clone());
        }
    }

    pub fn set_shares(&mut self, input: &str) {
        self.shares = input.to_string();
        self.update_requirements();
    }

    /// Fills the input with every share the user holds.
    pub fn max(&mut self) {
        if let Some(shares) = self.user_shares {
            self.set_shares(&format_units(shares));
        }
    }

    /// Re-reads the user's position in the selected pool.
    pub async fn refresh_shares(&mut self) {
        let Some(pool_id) = self.pool.as_ref().map(|pool| pool.id) else {
            return;
        };
        match self.client.shares(self.client.account(), pool_id).await {
            Ok(shares) => self.user_shares = shares,
            Err(err) => warn!(pool_id, error = %err, "Failed to read shares"),
        }
    }

    /// Sends `removeLiquidity` for the typed share amount.
    ///
    /// # Errors
    /// Fails unless the flow is ready, or when the wallet rejects the request.
    pub async fn start_withdraw(&mut self) -> Result<InFlightTx, ExecutionError> {
        let pool = self.pool.clone().ok_or(ExecutionError::NoPool)?;
        let shares = parse_units(&self.shares)?;
        let ticket = self.machine.begin(ActionKind::Withdraw)?;
        let call = WriteCall::RemoveLiquidity {
            token_a: pool.token_a,
            token_b: pool.token_b,
            shares,
        };
        submit(&mut self.machine, &self.client, &self.notifications, ticket, call).await
    }

    /// Waits for `tx` and applies its outcome.
    ///
    /// # Errors
    /// Returns the chain error when the transaction reverted.
    pub async fn finish(&mut self, tx: InFlightTx) -> Result<Resolution, ExecutionError> {
        let resolution = settle(&mut self.machine, &self.client, &self.notifications, tx).await?;
        if !resolution.is_stale() {
            self.shares.clear();
            self.refresh_shares().await;
        }
        Ok(resolution)
    }

    /// # Errors
    /// See [`WithdrawFlow::start_withdraw`] and [`WithdrawFlow::finish`].
    pub async fn withdraw(&mut self) -> Result<Resolution, ExecutionError> {
        let tx = self.start_withdraw().await?;
        self.finish(tx).await
    }

    fn update_requirements(&mut self) {
        let positive = parse_units(&self.shares).ok().is_some_and(|shares| !shares.is_zero());
        let requirements = (self.pool.is_some() && positive).then(Vec::new);
        self.machine.set_requirements(requirements);
    }
}
