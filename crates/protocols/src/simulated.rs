//! In-memory stand-in for the platform contract and its ERC-20 tokens.
//!
//! Writes are accepted into a pending set when submitted and executed when
//! their receipt is awaited, which mirrors the two suspension points of a
//! real wallet (hash first, confirmation later). Failed executions leave the
//! ledger untouched and surface as reverts.

use async_trait::async_trait;
use chrono::Utc;
use easydefi_domain::entities::{LiquidityEvent, PoolSnapshot, find_pool};
use easydefi_domain::enums::LiquidityEventKind;
use easydefi_domain::math::{FEE_BASIS, quote_swap_output};
use easydefi_domain::token::TokenAmount;
use primitive_types::{U256, U512};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::calls::{LogQuery, ReadCall, ReadValue, Receipt, TxHash, WriteCall};
use crate::error::ChainError;
use crate::gateway::ContractGateway;

/// owner -> amount
type Holdings = BTreeMap<String, TokenAmount>;

/// A transaction waiting to be mined.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingTx {
    pub from: String,
    pub call: WriteCall,
}

/// Outcome of a mined transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinedTx {
    pub block_number: u64,
    pub revert_reason: Option<String>,
}

/// Complete ledger of the simulated chain. Serialisable so the command line
/// tool can keep it between invocations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChainState {
    pub contract: String,
    pub block_number: u64,
    /// Unix seconds of the latest block.
    pub timestamp: u64,
    /// token -> owner -> balance
    pub balances: BTreeMap<String, Holdings>,
    /// token -> owner -> spender -> allowance
    pub allowances: BTreeMap<String, BTreeMap<String, Holdings>>,
    pub pools: Vec<PoolSnapshot>,
    /// pool id -> owner -> shares
    pub shares: BTreeMap<u64, Holdings>,
    pub total_shares: BTreeMap<u64, TokenAmount>,
    pub events: Vec<LiquidityEvent>,
    pub pending: BTreeMap<String, PendingTx>,
    pub mined: BTreeMap<String, MinedTx>,
    pub nonce: u64,
}

impl ChainState {
    pub fn new(contract: impl Into<String>) -> Self {
        Self {
            contract: contract.into(),
            ..Default::default()
        }
    }

    pub fn balance(&self, token: &str, owner: &str) -> TokenAmount {
        self.balances
            .get(token)
            .and_then(|holders| holders.get(owner))
            .copied()
            .unwrap_or_default()
    }

    pub fn allowance(&self, token: &str, owner: &str, spender: &str) -> TokenAmount {
        self.allowances
            .get(token)
            .and_then(|owners| owners.get(owner))
            .and_then(|spenders| spenders.get(spender))
            .copied()
            .unwrap_or_default()
    }

    pub fn shares_of(&self, owner: &str, pool_id: u64) -> TokenAmount {
        self.shares
            .get(&pool_id)
            .and_then(|holders| holders.get(owner))
            .copied()
            .unwrap_or_default()
    }

    fn set_balance(&mut self, token: &str, owner: &str, amount: TokenAmount) {
        self.balances
            .entry(token.to_string())
            .or_default()
            .insert(owner.to_string(), amount);
    }

    fn set_allowance(&mut self, token: &str, owner: &str, spender: &str, amount: TokenAmount) {
        self.allowances
            .entry(token.to_string())
            .or_default()
            .entry(owner.to_string())
            .or_default()
            .insert(spender.to_string(), amount);
    }

    fn transfer(&mut self, token: &str, from: &str, to: &str, amount: TokenAmount) -> Result<(), String> {
        let from_balance = self
            .balance(token, from)
            .checked_sub(amount)
            .ok_or_else(|| "ERC20: transfer amount exceeds balance".to_string())?;
        self.set_balance(token, from, from_balance);
        let to_balance = self
            .balance(token, to)
            .checked_add(amount)
            .ok_or_else(|| "ERC20: balance overflow".to_string())?;
        self.set_balance(token, to, to_balance);
        Ok(())
    }

    /// Moves `amount` from `owner` to the contract, spending the contract's allowance.
    fn pull(&mut self, token: &str, owner: &str, amount: TokenAmount) -> Result<(), String> {
        let contract = self.contract.clone();
        let remaining = self
            .allowance(token, owner, &contract)
            .checked_sub(amount)
            .ok_or_else(|| "ERC20: insufficient allowance".to_string())?;
        self.transfer(token, owner, &contract, amount)?;
        self.set_allowance(token, owner, &contract, remaining);
        Ok(())
    }

    fn pay(&mut self, token: &str, to: &str, amount: TokenAmount) -> Result<(), String> {
        let contract = self.contract.clone();
        self.transfer(token, &contract, to, amount)
    }

    fn pool_index(&self, x: &str, y: &str) -> Result<usize, String> {
        self.pools
            .iter()
            .position(|pool| pool.matches_pair(x, y))
            .ok_or_else(|| "pool does not exist".to_string())
    }

    fn add_shares(&mut self, pool_id: u64, owner: &str, amount: TokenAmount) -> Result<(), String> {
        let held = self
            .shares_of(owner, pool_id)
            .checked_add(amount)
            .ok_or_else(|| "share overflow".to_string())?;
        self.shares
            .entry(pool_id)
            .or_default()
            .insert(owner.to_string(), held);
        let total = self
            .total_shares
            .get(&pool_id)
            .copied()
            .unwrap_or_default()
            .checked_add(amount)
            .ok_or_else(|| "share overflow".to_string())?;
        self.total_shares.insert(pool_id, total);
        Ok(())
    }

    fn create_pool(&mut self, token_a: &str, token_b: &str, fee: u32) -> Result<u64, String> {
        if token_a == token_b {
            return Err("identical tokens".to_string());
        }
        if fee == 0 || fee >= FEE_BASIS {
            return Err(format!("fee must be between 1 and {}", FEE_BASIS - 1));
        }
        if find_pool(&self.pools, token_a, token_b).is_some() {
            return Err("pool already exists".to_string());
        }
        let id = self.pools.len() as u64 + 1;
        self.pools.push(PoolSnapshot {
            id,
            token_a: token_a.to_string(),
            token_b: token_b.to_string(),
            reserve_a: TokenAmount::zero(),
            reserve_b: TokenAmount::zero(),
            fee,
        });
        Ok(id)
    }

    fn apply(&mut self, from: &str, call: &WriteCall, hash: &str) -> Result<(), String> {
        match call {
            WriteCall::Approve {
                token,
                spender,
                amount,
            } => {
                self.set_allowance(token, from, spender, *amount);
                Ok(())
            }
            WriteCall::CreatePool {
                token_a,
                token_b,
                fee,
            } => self.create_pool(token_a, token_b, *fee).map(|_| ()),
            WriteCall::AddLiquidity {
                token_a,
                token_b,
                amount_a,
                amount_b,
            } => {
                let index = self.pool_index(token_a, token_b)?;
                let pool = self.pools[index].clone();
                let (deposit_a, deposit_b) = if pool.token_a == *token_a {
                    (*amount_a, *amount_b)
                } else {
                    (*amount_b, *amount_a)
                };
                if deposit_a.is_zero() || deposit_b.is_zero() {
                    return Err("amounts must be positive".to_string());
                }

                let total = self.total_shares.get(&pool.id).copied().unwrap_or_default();
                let minted = if total.is_zero() || pool.is_empty() {
                    deposit_a
                } else {
                    mul_div(deposit_a, total, pool.reserve_a).min(mul_div(
                        deposit_b,
                        total,
                        pool.reserve_b,
                    ))
                };
                if minted.is_zero() {
                    return Err("insufficient liquidity minted".to_string());
                }

                self.pull(&pool.token_a, from, deposit_a)?;
                self.pull(&pool.token_b, from, deposit_b)?;
                self.add_shares(pool.id, from, minted)?;

                let reserves = &mut self.pools[index];
                reserves.reserve_a = checked_add(reserves.reserve_a, deposit_a)?;
                reserves.reserve_b = checked_add(reserves.reserve_b, deposit_b)?;

                self.record_event(LiquidityEventKind::Added, from, &pool, deposit_a, deposit_b, hash);
                Ok(())
            }
            WriteCall::RemoveLiquidity {
                token_a,
                token_b,
                shares,
            } => {
                if shares.is_zero() {
                    return Err("shares must be positive".to_string());
                }
                let index = self.pool_index(token_a, token_b)?;
                let pool = self.pools[index].clone();
                let held = self.shares_of(from, pool.id);
                let remaining = held
                    .checked_sub(*shares)
                    .ok_or_else(|| "insufficient shares".to_string())?;
                let total = self.total_shares.get(&pool.id).copied().unwrap_or_default();

                let out_a = mul_div(*shares, pool.reserve_a, total);
                let out_b = mul_div(*shares, pool.reserve_b, total);

                self.pay(&pool.token_a, from, out_a)?;
                self.pay(&pool.token_b, from, out_b)?;
                self.shares
                    .entry(pool.id)
                    .or_default()
                    .insert(from.to_string(), remaining);
                self.total_shares
                    .insert(pool.id, total.checked_sub(*shares).unwrap_or_default());

                let reserves = &mut self.pools[index];
                reserves.reserve_a = reserves.reserve_a.checked_sub(out_a).unwrap_or_default();
                reserves.reserve_b = reserves.reserve_b.checked_sub(out_b).unwrap_or_default();

                self.record_event(LiquidityEventKind::Removed, from, &pool, out_a, out_b, hash);
                Ok(())
            }
            WriteCall::Swap {
                token_in,
                token_out,
                amount_in,
            } => {
                if token_in == token_out {
                    return Err("identical tokens".to_string());
                }
                let index = self.pool_index(token_in, token_out)?;
                let pool = self.pools[index].clone();
                let (reserve_in, reserve_out) = pool
                    .reserves_for(token_in)
                    .ok_or_else(|| "token not in pool".to_string())?;
                let amount_out = quote_swap_output(*amount_in, reserve_in, reserve_out, pool.fee);
                if amount_out.is_zero() {
                    return Err("insufficient output amount".to_string());
                }

                self.pull(token_in, from, *amount_in)?;
                self.pay(token_out, from, amount_out)?;

                let reserves = &mut self.pools[index];
                if reserves.token_a == *token_in {
                    reserves.reserve_a = checked_add(reserves.reserve_a, *amount_in)?;
                    reserves.reserve_b = reserves.reserve_b.checked_sub(amount_out).unwrap_or_default();
                } else {
                    reserves.reserve_b = checked_add(reserves.reserve_b, *amount_in)?;
                    reserves.reserve_a = reserves.reserve_a.checked_sub(amount_out).unwrap_or_default();
                }
                Ok(())
            }
        }
    }

    fn record_event(
        &mut self,
        kind: LiquidityEventKind,
        user: &str,
        pool: &PoolSnapshot,
        amount_a: TokenAmount,
        amount_b: TokenAmount,
        hash: &str,
    ) {
        self.events.push(LiquidityEvent {
            kind,
            user: user.to_string(),
            token_a: pool.token_a.clone(),
            token_b: pool.token_b.clone(),
            amount_a,
            amount_b,
            timestamp: self.timestamp,
            block_number: self.block_number,
            tx_hash: hash.to_string(),
        });
    }

    fn next_block(&mut self) {
        self.block_number += 1;
        let now = u64::try_from(Utc::now().timestamp()).unwrap_or_default();
        self.timestamp = now.max(self.timestamp + 1);
    }

    /// Mines a pending transaction. Execution happens on a copy that is only
    /// committed on success.
    fn mine(&mut self, hash: &str, forced_revert: Option<String>) -> Result<MinedTx, ChainError> {
        let pending = self
            .pending
            .remove(hash)
            .ok_or_else(|| ChainError::UnknownTransaction(hash.to_string()))?;
        self.next_block();

        let outcome = match forced_revert {
            Some(reason) => Err(reason),
            None => {
                let mut draft = self.clone();
                let outcome = draft.apply(&pending.from, &pending.call, hash);
                if outcome.is_ok() {
                    *self = draft;
                }
                outcome
            }
        };

        let mined = MinedTx {
            block_number: self.block_number,
            revert_reason: outcome.err(),
        };
        self.mined.insert(hash.to_string(), mined.clone());
        Ok(mined)
    }
}

fn mul_div(a: TokenAmount, b: TokenAmount, c: TokenAmount) -> TokenAmount {
    if c.is_zero() {
        return TokenAmount::zero();
    }
    let value = a.0.full_mul(b.0) / U512::from(c.0);
    U256::try_from(value).map(TokenAmount).unwrap_or_default()
}

fn checked_add(a: TokenAmount, b: TokenAmount) -> Result<TokenAmount, String> {
    a.checked_add(b).ok_or_else(|| "reserve overflow".to_string())
}

#[derive(Debug, Default)]
struct Faults {
    reject_next: Option<String>,
    revert_next: Option<String>,
    fail_reads: bool,
}

/// Handle onto a shared [`ChainState`], connected as one account.
#[derive(Debug, Clone)]
pub struct SimulatedChain {
    state: Arc<Mutex<ChainState>>,
    faults: Arc<Mutex<Faults>>,
    account: String,
}

impl SimulatedChain {
    /// Creates an empty chain with the platform contract at `contract`.
    pub fn new(contract: impl Into<String>, account: impl Into<String>) -> Self {
        Self::from_state(ChainState::new(contract), account)
    }

    pub fn from_state(state: ChainState, account: impl Into<String>) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
            faults: Arc::new(Mutex::new(Faults::default())),
            account: account.into(),
        }
    }

    /// Another handle on the same ledger, signing as `account`.
    pub fn connect_as(&self, account: impl Into<String>) -> Self {
        Self {
            state: self.state.clone(),
            faults: self.faults.clone(),
            account: account.into(),
        }
    }

    /// Loads a ledger saved with [`SimulatedChain::save`].
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub async fn load(path: &Path, account: impl Into<String>) -> std::io::Result<Self> {
        let raw = tokio::fs::read_to_string(path).await?;
        let state: ChainState = serde_json::from_str(&raw).map_err(std::io::Error::other)?;
        Ok(Self::from_state(state, account))
    }

    /// Writes the ledger as JSON.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub async fn save(&self, path: &Path) -> std::io::Result<()> {
        let raw = {
            let state = self.state.lock().await;
            serde_json::to_string_pretty(&*state).map_err(std::io::Error::other)?
        };
        tokio::fs::write(path, raw).await
    }

    /// Copy of the current ledger.
    pub async fn snapshot(&self) -> ChainState {
        self.state.lock().await.clone()
    }

    /// Credits `amount` of `token` to `owner` out of thin air.
    pub async fn mint(&self, token: &str, owner: &str, amount: TokenAmount) {
        let mut state = self.state.lock().await;
        let balance = state.balance(token, owner).checked_add(amount).unwrap_or_default();
        state.set_balance(token, owner, balance);
        debug!(token, owner, amount = %amount, "Minted");
    }

    pub async fn set_allowance(&self, token: &str, owner: &str, amount: TokenAmount) {
        let mut state = self.state.lock().await;
        let contract = state.contract.clone();
        state.set_allowance(token, owner, &contract, amount);
    }

    /// Creates a pool holding the given reserves. The seed liquidity's shares
    /// belong to the contract itself.
    ///
    /// Returns the pool id, or `None` if the pool cannot be created.
    pub async fn seed_pool(
        &self,
        token_a: &str,
        token_b: &str,
        fee: u32,
        reserve_a: TokenAmount,
        reserve_b: TokenAmount,
    ) -> Option<u64> {
        let mut state = self.state.lock().await;
        let id = match state.create_pool(token_a, token_b, fee) {
            Ok(id) => id,
            Err(reason) => {
                warn!(token_a, token_b, reason = %reason, "Cannot seed pool");
                return None;
            }
        };
        let contract = state.contract.clone();
        let balance_a = state.balance(token_a, &contract).checked_add(reserve_a)?;
        state.set_balance(token_a, &contract, balance_a);
        let balance_b = state.balance(token_b, &contract).checked_add(reserve_b)?;
        state.set_balance(token_b, &contract, balance_b);
        if !reserve_a.is_zero() && !reserve_b.is_zero() {
            state.add_shares(id, &contract, reserve_a).ok()?;
        }
        let pool = state.pools.last_mut()?;
        pool.reserve_a = reserve_a;
        pool.reserve_b = reserve_b;
        info!(id, token_a, token_b, fee, "Seeded pool");
        Some(id)
    }

    /// The next submitted write is refused as if the user declined to sign.
    pub async fn reject_next(&self, reason: impl Into<String>) {
        self.faults.lock().await.reject_next = Some(reason.into());
    }

    /// The next mined transaction reverts.
    pub async fn revert_next(&self, reason: impl Into<String>) {
        self.faults.lock().await.revert_next = Some(reason.into());
    }

    /// Makes every read fail until cleared.
    pub async fn fail_reads(&self, fail: bool) {
        self.faults.lock().await.fail_reads = fail;
    }

    /// Number of transactions submitted but not yet mined.
    pub async fn pending_count(&self) -> usize {
        self.state.lock().await.pending.len()
    }
}

#[async_trait]
impl ContractGateway for SimulatedChain {
    fn account(&self) -> &str {
        &self.account
    }

    async fn read(&self, call: ReadCall) -> Result<ReadValue, ChainError> {
        if self.faults.lock().await.fail_reads {
            return Err(ChainError::Read(format!(
                "{} unavailable",
                call.function_name()
            )));
        }

        let state = self.state.lock().await;
        let value = match &call {
            ReadCall::PoolsList => ReadValue::Pools(state.pools.clone()),
            ReadCall::TotalPoolShares => {
                let total = state
                    .total_shares
                    .values()
                    .fold(TokenAmount::zero(), |acc, shares| {
                        acc.checked_add(*shares).unwrap_or(acc)
                    });
                ReadValue::Amount(total)
            }
            ReadCall::Shares { owner, pool_id } => ReadValue::Amount(state.shares_of(owner, *pool_id)),
            ReadCall::BalanceOf { token, owner } => ReadValue::Amount(state.balance(token, owner)),
            ReadCall::Allowance {
                token,
                owner,
                spender,
            } => ReadValue::Amount(state.allowance(token, owner, spender)),
        };
        Ok(value)
    }

    async fn write(&self, call: WriteCall) -> Result<TxHash, ChainError> {
        if let Some(reason) = self.faults.lock().await.reject_next.take() {
            warn!(function = call.function_name(), reason = %reason, "Write rejected");
            return Err(ChainError::Rejected(reason));
        }

        let zero_amount = match &call {
            WriteCall::AddLiquidity {
                amount_a, amount_b, ..
            } => amount_a.is_zero() || amount_b.is_zero(),
            WriteCall::RemoveLiquidity { shares, .. } => shares.is_zero(),
            WriteCall::Swap { amount_in, .. } => amount_in.is_zero(),
            WriteCall::Approve { .. } | WriteCall::CreatePool { .. } => false,
        };
        if zero_amount {
            return Err(ChainError::Rejected("amount must be greater than zero".to_string()));
        }

        let mut state = self.state.lock().await;
        state.nonce += 1;
        let hash = format!("0x{:064x}", state.nonce);
        state.pending.insert(
            hash.clone(),
            PendingTx {
                from: self.account.clone(),
                call,
            },
        );
        Ok(TxHash(hash))
    }

    async fn wait_for_receipt(&self, hash: &TxHash) -> Result<Receipt, ChainError> {
        let forced_revert = {
            let mut state = self.state.lock().await;
            if let Some(mined) = state.mined.get(&hash.0).cloned() {
                return receipt_for(hash, mined);
            }
            if !state.pending.contains_key(&hash.0) {
                return Err(ChainError::UnknownTransaction(hash.0.clone()));
            }
            drop(state);
            self.faults.lock().await.revert_next.take()
        };

        let mined = self.state.lock().await.mine(&hash.0, forced_revert)?;
        receipt_for(hash, mined)
    }

    async fn get_logs(&self, query: LogQuery) -> Result<Vec<LiquidityEvent>, ChainError> {
        if self.faults.lock().await.fail_reads {
            return Err(ChainError::Read("getLogs unavailable".to_string()));
        }
        let state = self.state.lock().await;
        Ok(state
            .events
            .iter()
            .filter(|event| event.kind == query.kind && query.contains_block(event.block_number))
            .cloned()
            .collect())
    }
}

fn receipt_for(hash: &TxHash, mined: MinedTx) -> Result<Receipt, ChainError> {
    match mined.revert_reason {
        Some(reason) => Err(ChainError::Reverted {
            hash: hash.0.clone(),
            reason,
        }),
        None => Ok(Receipt {
            hash: hash.clone(),
            block_number: mined.block_number,
        }),
    }
}
