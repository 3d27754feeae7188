//! Pool creation, with optional pre-approval of both tokens.

use easydefi_domain::enums::{ActionKind, TokenSide};
use easydefi_domain::math::FEE_BASIS;
use easydefi_domain::token::TokenAmount;
use easydefi_protocols::{PlatformClient, WriteCall};

use super::{InFlightTx, settle, submit};
use crate::approval::{ActionMachine, PendingAction, Resolution};
use crate::error::ExecutionError;
use crate::lifecycle::NotificationLog;

/// Create-pool flow state.
pub struct CreatePoolFlow {
    client: PlatformClient,
    notifications: NotificationLog,
    machine: ActionMachine,
    token_a: String,
    token_b: String,
    fee: Option<u32>,
    approval_amount: TokenAmount,
}

impl CreatePoolFlow {
    /// `approval_amount` is what each approve button grants the contract.
    #[must_use]
    pub fn new(
        client: PlatformClient,
        notifications: NotificationLog,
        approval_amount: TokenAmount,
    ) -> Self {
        Self {
            client,
            notifications,
            machine: ActionMachine::new(),
            token_a: String::new(),
            token_b: String::new(),
            fee: None,
            approval_amount,
        }
    }

    pub fn state(&self) -> &PendingAction {
        self.machine.state()
    }

    pub fn set_token(&mut self, side: TokenSide, token: &str) {
        match side {
            TokenSide::A => self.token_a = token.trim().to_string(),
            TokenSide::B => self.token_b = token.trim().to_string(),
        }
        self.update_requirements();
    }

    /// Parses the fee in basis points.
    ///
    /// # Errors
    /// `UnparsableFee` for anything but a whole number, `InvalidFee` unless it is
    /// in `1..10000`.
    pub fn set_fee(&mut self, input: &str) -> Result<u32, ExecutionError> {
        self.fee = None;
        self.update_requirements();
        let fee: u32 = input
            .trim()
            .parse()
            .map_err(|_| ExecutionError::UnparsableFee(input.to_string()))?;
        if fee == 0 || fee >= FEE_BASIS {
            return Err(ExecutionError::InvalidFee(fee));
        }
        self.fee = Some(fee);
        self.update_requirements();
        Ok(fee)
    }

    /// Approves the contract to move `approval_amount` of one token.
    ///
    /// # Errors
    /// Fails when the token is empty, another transaction is in flight, or the
    /// wallet rejects the request.
    pub async fn start_approval(&mut self, side: TokenSide) -> Result<InFlightTx, ExecutionError> {
        let token = match side {
            TokenSide::A => self.token_a.clone(),
            TokenSide::B => self.token_b.clone(),
        };
        if token.is_empty() {
            return Err(ExecutionError::TokenNotSelected);
        }
        let ticket = self.machine.begin_approval(&token, self.approval_amount)?;
        let call = WriteCall::Approve {
            token,
            spender: self.client.contract_address().to_string(),
            amount: self.approval_amount,
        };
        submit(&mut self.machine, &self.client, &self.notifications, ticket, call).await
    }

    /// Sends `createPool` for the entered pair and fee.
    ///
    /// # Errors
    /// Fails unless both tokens and a valid fee are set, or when the wallet
    /// rejects the request.
    pub async fn start_create(&mut self) -> Result<InFlightTx, ExecutionError> {
        let fee = self.fee.ok_or(ExecutionError::FeeNotSet)?;
        let ticket = self.machine.begin(ActionKind::CreatePool)?;
        let call = WriteCall::CreatePool {
            token_a: self.token_a.clone(),
            token_b: self.token_b.clone(),
            fee,
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
        if !resolution.is_stale() && kind == ActionKind::CreatePool {
            self.token_a.clear();
            self.token_b.clear();
            self.fee = None;
            self.update_requirements();
        }
        Ok(resolution)
    }

    /// # Errors
    /// See [`CreatePoolFlow::start_approval`] and [`CreatePoolFlow::finish`].
    pub async fn approve(&mut self, side: TokenSide) -> Result<Resolution, ExecutionError> {
        let tx = self.start_approval(side).await?;
        self.finish(tx).await
    }

    /// # Errors
    /// See [`CreatePoolFlow::start_create`] and [`CreatePoolFlow::finish`].
    pub async fn create(&mut self) -> Result<Resolution, ExecutionError> {
        let tx = self.start_create().await?;
        self.finish(tx).await
    }

    fn update_requirements(&mut self) {
        let complete = !self.token_a.is_empty() && !self.token_b.is_empty() && self.fee.is_some();
        self.machine.set_requirements(complete.then(Vec::new));
    }
}
