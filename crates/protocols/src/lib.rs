//! External contract collaborator for the EasyDeFi platform.
//!
//! Everything the application needs from the chain goes through the
//! [`ContractGateway`] trait, which is injected rather than reached through
//! global state:
//! - Typed read calls (pools, shares, balances, allowances)
//! - Write calls returning a transaction hash, then a receipt
//! - Historical liquidity event queries
//!
//! [`SimulatedChain`] implements the gateway in memory and backs the tests
//! and the command line tool.

/// Read/write call descriptions.
pub mod calls;
/// Typed facade over a gateway.
pub mod client;
/// Collaborator error types.
pub mod error;
/// Gateway trait.
pub mod gateway;
/// Prelude module for convenient imports.
pub mod prelude;
/// In-memory chain.
pub mod simulated;

pub use calls::{BlockTag, LogQuery, ReadCall, ReadValue, Receipt, TxHash, WriteCall};
pub use client::PlatformClient;
pub use error::ChainError;
pub use gateway::ContractGateway;
pub use simulated::{ChainState, SimulatedChain};
