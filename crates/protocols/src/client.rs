//! Typed access to the platform contract and its tokens.

use easydefi_domain::entities::{LiquidityEvent, PoolSnapshot, normalize_shares};
use easydefi_domain::enums::LiquidityEventKind;
use easydefi_domain::token::TokenAmount;
use std::sync::Arc;
use tracing::{debug, info};

use crate::calls::{LogQuery, ReadCall, Receipt, TxHash, WriteCall};
use crate::error::ChainError;
use crate::gateway::ContractGateway;

/// One method per contract function the application uses.
#[derive(Clone)]
pub struct PlatformClient {
    gateway: Arc<dyn ContractGateway>,
    contract: String,
}

impl PlatformClient {
    /// Creates a client for the platform contract at `contract`.
    pub fn new(gateway: Arc<dyn ContractGateway>, contract: impl Into<String>) -> Self {
        Self {
            gateway,
            contract: contract.into(),
        }
    }

    /// Address that receives approvals.
    pub fn contract_address(&self) -> &str {
        &self.contract
    }

    /// Connected account.
    pub fn account(&self) -> &str {
        self.gateway.account()
    }

    pub async fn get_pools_list(&self) -> Result<Vec<PoolSnapshot>, ChainError> {
        let call = ReadCall::PoolsList;
        let pools = self.gateway.read(call.clone()).await?.into_pools(&call)?;
        debug!(count = pools.len(), "Fetched pools");
        Ok(pools)
    }

    pub async fn total_pool_shares(&self) -> Result<TokenAmount, ChainError> {
        self.read_amount(ReadCall::TotalPoolShares).await
    }

    /// Shares held by `owner` in `pool_id`; `None` when there is no position.
    pub async fn shares(&self, owner: &str, pool_id: u64) -> Result<Option<TokenAmount>, ChainError> {
        let raw = self
            .read_amount(ReadCall::Shares {
                owner: owner.to_string(),
                pool_id,
            })
            .await?;
        Ok(normalize_shares(raw))
    }

    pub async fn balance_of(&self, token: &str, owner: &str) -> Result<TokenAmount, ChainError> {
        self.read_amount(ReadCall::BalanceOf {
            token: token.to_string(),
            owner: owner.to_string(),
        })
        .await
    }

    /// Allowance `owner` granted to the platform contract on `token`.
    pub async fn allowance(&self, token: &str, owner: &str) -> Result<TokenAmount, ChainError> {
        self.read_amount(ReadCall::Allowance {
            token: token.to_string(),
            owner: owner.to_string(),
            spender: self.contract.clone(),
        })
        .await
    }

    /// Approves the platform contract to move `amount` of `token`.
    pub async fn approve(&self, token: &str, amount: TokenAmount) -> Result<TxHash, ChainError> {
        self.send(WriteCall::Approve {
            token: token.to_string(),
            spender: self.contract.clone(),
            amount,
        })
        .await
    }

    pub async fn create_pool(&self, token_a: &str, token_b: &str, fee: u32) -> Result<TxHash, ChainError> {
        self.send(WriteCall::CreatePool {
            token_a: token_a.to_string(),
            token_b: token_b.to_string(),
            fee,
        })
        .await
    }

    pub async fn add_liquidity(
        &self,
        token_a: &str,
        token_b: &str,
        amount_a: TokenAmount,
        amount_b: TokenAmount,
    ) -> Result<TxHash, ChainError> {
        self.send(WriteCall::AddLiquidity {
            token_a: token_a.to_string(),
            token_b: token_b.to_string(),
            amount_a,
            amount_b,
        })
        .await
    }

    pub async fn remove_liquidity(
        &self,
        token_a: &str,
        token_b: &str,
        shares: TokenAmount,
    ) -> Result<TxHash, ChainError> {
        self.send(WriteCall::RemoveLiquidity {
            token_a: token_a.to_string(),
            token_b: token_b.to_string(),
            shares,
        })
        .await
    }

    pub async fn swap(
        &self,
        token_in: &str,
        token_out: &str,
        amount_in: TokenAmount,
    ) -> Result<TxHash, ChainError> {
        self.send(WriteCall::Swap {
            token_in: token_in.to_string(),
            token_out: token_out.to_string(),
            amount_in,
        })
        .await
    }

    /// Submits an arbitrary write.
    pub async fn send(&self, call: WriteCall) -> Result<TxHash, ChainError> {
        let function = call.function_name();
        let hash = self.gateway.write(call).await?;
        info!(function, hash = %hash, "Transaction submitted");
        Ok(hash)
    }

    pub async fn wait_for_receipt(&self, hash: &TxHash) -> Result<Receipt, ChainError> {
        let receipt = self.gateway.wait_for_receipt(hash).await?;
        info!(hash = %hash, block = receipt.block_number, "Transaction confirmed");
        Ok(receipt)
    }

    /// Every event of `kind` since genesis.
    pub async fn liquidity_events(
        &self,
        kind: LiquidityEventKind,
    ) -> Result<Vec<LiquidityEvent>, ChainError> {
        self.gateway.get_logs(LogQuery::all(kind)).await
    }

    async fn read_amount(&self, call: ReadCall) -> Result<TokenAmount, ChainError> {
        self.gateway.read(call.clone()).await?.into_amount(&call)
    }
}
