//! States of an allowance-gated action and the pure readiness evaluation.

use easydefi_domain::enums::{ActionKind, TokenSide};
use easydefi_domain::token::TokenAmount;
use easydefi_protocols::TxHash;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Which approval a flow is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApprovalLeg {
    /// The only token of a one-sided flow (swap input).
    Single,
    /// One side of a two-sided deposit.
    Side(TokenSide),
}

impl fmt::Display for ApprovalLeg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApprovalLeg::Single => f.write_str("needsApproval"),
            ApprovalLeg::Side(TokenSide::A) => f.write_str("needsApprovalA"),
            ApprovalLeg::Side(TokenSide::B) => f.write_str("needsApprovalB"),
        }
    }
}

/// Amount of `token` the platform contract must be allowed to move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    pub leg: ApprovalLeg,
    pub token: String,
    pub amount: TokenAmount,
}

impl Requirement {
    pub fn single(token: impl Into<String>, amount: TokenAmount) -> Self {
        Self {
            leg: ApprovalLeg::Single,
            token: token.into(),
            amount,
        }
    }

    pub fn side(side: TokenSide, token: impl Into<String>, amount: TokenAmount) -> Self {
        Self {
            leg: ApprovalLeg::Side(side),
            token: token.into(),
            amount,
        }
    }
}

/// What is known about one token's allowance.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AllowanceStatus {
    /// Never fetched.
    #[default]
    Unfetched,
    /// Last successful read.
    Known(TokenAmount),
    /// Invalidated by a confirmed transaction, refetch outstanding.
    Refreshing,
    /// The last read failed.
    Failed(String),
}

impl AllowanceStatus {
    pub fn known(&self) -> Option<TokenAmount> {
        match self {
            AllowanceStatus::Known(amount) => Some(*amount),
            _ => None,
        }
    }

    /// True when the value must be (re)fetched before it can be trusted.
    pub fn is_stale(&self) -> bool {
        !matches!(self, AllowanceStatus::Known(_))
    }
}

/// Progress of an in-flight transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubmissionPhase {
    /// Sent to the wallet, no hash yet.
    AwaitingHash,
    /// Broadcast, waiting for the receipt.
    AwaitingReceipt(TxHash),
}

/// Current state of one flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PendingAction {
    /// Nothing actionable typed.
    Initial,
    /// An allowance read failed or is outstanding.
    Unknown,
    /// The contract needs more allowance for `token`.
    NeedsApproval {
        leg: ApprovalLeg,
        token: String,
        amount: TokenAmount,
    },
    /// The primary action can be submitted.
    Ready,
    Submitting {
        kind: ActionKind,
        phase: SubmissionPhase,
    },
}

impl PendingAction {
    pub fn is_ready(&self) -> bool {
        matches!(self, PendingAction::Ready)
    }

    pub fn is_submitting(&self) -> bool {
        matches!(self, PendingAction::Submitting { .. })
    }

    pub fn needs_approval(&self) -> Option<(&str, TokenAmount)> {
        match self {
            PendingAction::NeedsApproval { token, amount, .. } => Some((token.as_str(), *amount)),
            _ => None,
        }
    }
}

impl fmt::Display for PendingAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PendingAction::Initial => f.write_str("initial"),
            PendingAction::Unknown => f.write_str("unknown"),
            PendingAction::NeedsApproval { leg, .. } => write!(f, "{leg}"),
            PendingAction::Ready => f.write_str("ready"),
            PendingAction::Submitting {
                phase: SubmissionPhase::AwaitingHash,
                ..
            } => f.write_str("submitting"),
            PendingAction::Submitting {
                phase: SubmissionPhase::AwaitingReceipt(_),
                ..
            } => f.write_str("awaiting confirmation"),
        }
    }
}

/// Computes the state of an idle flow.
///
/// `requirements` is `None` when the typed amounts are not actionable. The
/// requirements are checked in order and the first unmet one wins, so a
/// deposit listing side A before side B never asks for both at once.
pub fn evaluate(
    requirements: Option<&[Requirement]>,
    allowances: &HashMap<String, AllowanceStatus>,
) -> PendingAction {
    let Some(requirements) = requirements else {
        return PendingAction::Initial;
    };

    for requirement in requirements {
        let status = allowances.get(&requirement.token).cloned().unwrap_or_default();
        match status.known() {
            None => return PendingAction::Unknown,
            Some(allowance) if allowance < requirement.amount => {
                return PendingAction::NeedsApproval {
                    leg: requirement.leg,
                    token: requirement.token.clone(),
                    amount: requirement.amount,
                };
            }
            Some(_) => {}
        }
    }

    PendingAction::Ready
}
