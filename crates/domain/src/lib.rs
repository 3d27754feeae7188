//! Domain model for the EasyDeFi liquidity platform.
//!
//! This crate holds everything that can be computed without talking to the
//! chain:
//! - Token identities and exact fixed-point amounts
//! - Pool snapshots, positions and liquidity events as read from the contract
//! - The swap quote and paired-deposit calculator
//! - Display value objects (decimal strings, fee percentages)

/// Pool, position and event entities.
pub mod entities;
/// Shared enumerations.
pub mod enums;
/// Domain error types.
pub mod error;
/// Pricing math.
pub mod math;
/// Token identity and raw amounts.
pub mod token;
/// Display-oriented value objects.
pub mod value_objects;

pub use error::DomainError;
pub use token::{Token, TokenAmount};
