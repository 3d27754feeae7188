//! Prelude module for convenient imports.
//!
//! This module re-exports the most commonly used types from the crate.
//!
//! # Example
//!
//! ```rust
//! use easydefi_execution::prelude::*;
//! ```

// Activity
pub use crate::activity::{ActivityEntry, ActivityFeed, DEFAULT_ACTIVITY_LIMIT};

// Approval
pub use crate::approval::{
    ActionMachine, AllowanceStatus, ApprovalLeg, FlowId, Invalidation, PendingAction, Requirement,
    Resolution, SubmissionPhase, SubmissionTicket, TxOutcome,
};

// Config
pub use crate::config::SessionConfig;

// Dashboard
pub use crate::dashboard::{Dashboard, DashboardSnapshot, IdleBalanceHint, TokenBalance};

// Error
pub use crate::error::ExecutionError;

// Flows
pub use crate::flows::{CreatePoolFlow, DepositFlow, InFlightTx, SwapFlow, WithdrawFlow};

// Lifecycle
pub use crate::lifecycle::{NotificationLog, NotificationStage, NotificationVariant, TxNotification};

// Session
pub use crate::session::Session;
