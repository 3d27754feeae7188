use async_trait::async_trait;
use easydefi_domain::entities::LiquidityEvent;

use crate::calls::{LogQuery, ReadCall, ReadValue, Receipt, TxHash, WriteCall};
use crate::error::ChainError;

/// Capability handed to every component that talks to the chain.
///
/// Implementations own the transport, signing and nonce management; callers
/// only see calls, hashes and receipts.
#[async_trait]
pub trait ContractGateway: Send + Sync {
    /// Address of the connected account, used as `msg.sender` for writes.
    fn account(&self) -> &str;

    /// Performs a read.
    async fn read(&self, call: ReadCall) -> Result<ReadValue, ChainError>;

    /// Signs and broadcasts a write, resolving once a hash is known.
    async fn write(&self, call: WriteCall) -> Result<TxHash, ChainError>;

    /// Waits until the transaction is mined. A mined but failed transaction
    /// resolves to [`ChainError::Reverted`].
    async fn wait_for_receipt(&self, hash: &TxHash) -> Result<Receipt, ChainError>;

    /// Fetches decoded liquidity events.
    async fn get_logs(&self, query: LogQuery) -> Result<Vec<LiquidityEvent>, ChainError>;
}
