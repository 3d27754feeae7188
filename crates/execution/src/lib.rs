//! Client-side action engine for the EasyDeFi platform.
//!
//! This crate drives every user action through the allowance-gated state
//! machine and keeps the shared reads in step:
//! - Approval state derivation and the per-flow action machine
//! - Swap, deposit, withdraw and create-pool flows
//! - Transaction notifications with explorer links
//! - Activity feed and dashboard reads
//! - A session wiring all of the above to one contract gateway

/// Prelude module for convenient imports.
pub mod prelude;

/// Recent liquidity activity.
pub mod activity;
/// Allowance-gated action state machine.
pub mod approval;
/// Session configuration.
pub mod config;
/// Balances and positions of the connected account.
pub mod dashboard;
/// Execution error types.
pub mod error;
/// User-facing action flows.
pub mod flows;
/// Transaction notifications.
pub mod lifecycle;
/// All flows of one connected account.
pub mod session;

pub use error::ExecutionError;
