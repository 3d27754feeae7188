//! Prelude module for convenient imports.
//!
//! # Example
//!
//! ```rust
//! use easydefi_protocols::prelude::*;
//! ```

pub use crate::calls::{BlockTag, LogQuery, ReadCall, ReadValue, Receipt, TxHash, WriteCall};
pub use crate::client::PlatformClient;
pub use crate::error::ChainError;
pub use crate::gateway::ContractGateway;
pub use crate::simulated::{ChainState, SimulatedChain};
