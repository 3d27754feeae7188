//! Allowance-gated action state machine.

use easydefi_domain::enums::ActionKind;
use easydefi_domain::token::TokenAmount;
use easydefi_protocols::TxHash;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{AllowanceStatus, PendingAction, Requirement, SubmissionPhase, evaluate};
use crate::error::ExecutionError;

/// Identity of one flow instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlowId(Uuid);

impl FlowId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for FlowId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FlowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle for one submission, required to resolve it.
///
/// A ticket is only honoured by the flow instance and selection generation
/// that issued it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionTicket {
    pub flow_id: FlowId,
    pub generation: u64,
    pub sequence: u64,
    pub kind: ActionKind,
    /// Token and amount being approved, for approval submissions.
    pub approval: Option<(String, TokenAmount)>,
}

/// How an in-flight transaction ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxOutcome {
    Confirmed,
    Failed,
}

/// Read that must be redone after a confirmed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Invalidation {
    PoolReserves,
    Balances,
    Shares,
    Allowance(String),
    Activity,
}

/// Result of resolving a ticket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The transition was applied.
    Applied {
        state: PendingAction,
        invalidations: Vec<Invalidation>,
    },
    /// The ticket belongs to a previous selection or flow; nothing changed.
    Stale,
}

impl Resolution {
    pub fn is_stale(&self) -> bool {
        matches!(self, Resolution::Stale)
    }

    pub fn invalidations(&self) -> &[Invalidation] {
        match self {
            Resolution::Applied { invalidations, .. } => invalidations,
            Resolution::Stale => &[],
        }
    }
}

#[derive(Debug, Clone)]
struct InFlight {
    ticket: SubmissionTicket,
    phase: SubmissionPhase,
}

/// Tracks readiness of one mutating flow (swap, deposit, withdraw...).
///
/// The owner reports the typed amounts as [`Requirement`]s and feeds in
/// allowance reads; the machine decides whether an approval, the primary
/// action, or nothing may be submitted.
#[derive(Debug, Clone)]
pub struct ActionMachine {
    flow_id: FlowId,
    generation: u64,
    next_sequence: u64,
    requirements: Option<Vec<Requirement>>,
    allowances: HashMap<String, AllowanceStatus>,
    in_flight: Option<InFlight>,
    state: PendingAction,
}

impl Default for ActionMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionMachine {
    #[must_use]
    pub fn new() -> Self {
        Self {
            flow_id: FlowId::new(),
            generation: 0,
            next_sequence: 0,
            requirements: None,
            allowances: HashMap::new(),
            in_flight: None,
            state: PendingAction::Initial,
        }
    }

    pub fn flow_id(&self) -> FlowId {
        self.flow_id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn state(&self) -> &PendingAction {
        &self.state
    }

    pub fn requirements(&self) -> Option<&[Requirement]> {
        self.requirements.as_deref()
    }

    pub fn allowance(&self, token: &str) -> AllowanceStatus {
        self.allowances.get(token).cloned().unwrap_or_default()
    }

    /// Tokens whose allowance must be read before the machine can decide.
    pub fn stale_allowances(&self) -> Vec<String> {
        let mut tokens: Vec<String> = Vec::new();
        for requirement in self.requirements.iter().flatten() {
            if self.allowance(&requirement.token).is_stale() && !tokens.contains(&requirement.token) {
                tokens.push(requirement.token.clone());
            }
        }
        tokens
    }

    /// Replaces the typed amounts. An in-flight transaction is unaffected; the
    /// new amounts are used once it resolves.
    pub fn set_requirements(&mut self, requirements: Option<Vec<Requirement>>) {
        self.requirements = requirements;
        self.reevaluate();
    }

    /// Starts a new selection (token or pool changed).
    ///
    /// Tickets issued before the call become stale and the flow is no longer
    /// considered submitting, even if the old transaction is still pending.
    pub fn reset_selection(&mut self) {
        self.generation += 1;
        if let Some(in_flight) = self.in_flight.take() {
            debug!(
                flow = %self.flow_id,
                kind = %in_flight.ticket.kind,
                "Selection changed with a transaction in flight"
            );
        }
        self.requirements = None;
        self.allowances.clear();
        self.reevaluate();
    }

    /// Stores the result of an allowance read.
    pub fn record_allowance(&mut self, token: &str, read: Result<TokenAmount, String>) {
        let status = match read {
            Ok(amount) => AllowanceStatus::Known(amount),
            Err(reason) => {
                warn!(flow = %self.flow_id, token, reason = %reason, "Allowance read failed");
                AllowanceStatus::Failed(reason)
            }
        };
        self.allowances.insert(token.to_string(), status);
        self.reevaluate();
    }

    /// Marks a cached allowance as outdated, e.g. after another flow spent it.
    pub fn invalidate_allowance(&mut self, token: &str) {
        if let Some(status) = self.allowances.get_mut(token) {
            *status = AllowanceStatus::Refreshing;
            self.reevaluate();
        }
    }

    /// Claims the flow for a submission of `kind`.
    ///
    /// # Errors
    /// `AlreadySubmitting` while another submission is unresolved, `NotReady`
    /// unless the state permits `kind` (an approval needs `NeedsApproval`,
    /// every other kind needs `Ready`).
    pub fn begin(&mut self, kind: ActionKind) -> Result<SubmissionTicket, ExecutionError> {
        if self.in_flight.is_some() {
            return Err(ExecutionError::AlreadySubmitting);
        }

        let approval = match (kind, &self.state) {
            (ActionKind::Approval, PendingAction::NeedsApproval { token, amount, .. }) => {
                Some((token.clone(), *amount))
            }
            (ActionKind::Approval, _) => return Err(self.not_ready(kind)),
            (_, PendingAction::Ready) => None,
            (_, _) => return Err(self.not_ready(kind)),
        };

        Ok(self.issue(kind, approval))
    }

    /// Claims the flow for an approval the state does not ask for, such as
    /// pre-approving tokens before a pool is created.
    ///
    /// # Errors
    /// `AlreadySubmitting` while another submission is unresolved.
    pub fn begin_approval(
        &mut self,
        token: &str,
        amount: TokenAmount,
    ) -> Result<SubmissionTicket, ExecutionError> {
        if self.in_flight.is_some() {
            return Err(ExecutionError::AlreadySubmitting);
        }
        Ok(self.issue(ActionKind::Approval, Some((token.to_string(), amount))))
    }

    fn issue(&mut self, kind: ActionKind, approval: Option<(String, TokenAmount)>) -> SubmissionTicket {
        self.next_sequence += 1;
        let ticket = SubmissionTicket {
            flow_id: self.flow_id,
            generation: self.generation,
            sequence: self.next_sequence,
            kind,
            approval,
        };
        self.in_flight = Some(InFlight {
            ticket: ticket.clone(),
            phase: SubmissionPhase::AwaitingHash,
        });
        self.reevaluate();
        info!(flow = %self.flow_id, kind = %kind, "Submission started");
        ticket
    }

    /// Records the transaction hash once the wallet has broadcast it.
    pub fn broadcast(&mut self, ticket: &SubmissionTicket, hash: TxHash) -> Resolution {
        let Some(in_flight) = self.in_flight.as_mut().filter(|f| f.ticket == *ticket) else {
            debug!(flow = %self.flow_id, hash = %hash, "Ignoring stale broadcast");
            return Resolution::Stale;
        };
        in_flight.phase = SubmissionPhase::AwaitingReceipt(hash);
        self.reevaluate();
        Resolution::Applied {
            state: self.state.clone(),
            invalidations: Vec::new(),
        }
    }

    /// Resolves the submission identified by `ticket`.
    ///
    /// A confirmed approval marks the approved token's allowance as
    /// refreshing, so the flow stays `Unknown` until the new value is read. A
    /// confirmed primary action clears the amounts. A failure keeps the
    /// amounts and re-evaluates them.
    pub fn complete(&mut self, ticket: &SubmissionTicket, outcome: TxOutcome) -> Resolution {
        if !self.in_flight.as_ref().is_some_and(|f| f.ticket == *ticket) {
            debug!(
                flow = %self.flow_id,
                ticket_generation = ticket.generation,
                generation = self.generation,
                "Ignoring stale resolution"
            );
            return Resolution::Stale;
        }
        self.in_flight = None;

        let mut invalidations = Vec::new();
        match (outcome, ticket.kind) {
            (TxOutcome::Failed, kind) => {
                warn!(flow = %self.flow_id, kind = %kind, "Submission failed");
            }
            (TxOutcome::Confirmed, ActionKind::Approval) => {
                if let Some((token, _)) = &ticket.approval {
                    self.allowances.insert(token.clone(), AllowanceStatus::Refreshing);
                    invalidations.push(Invalidation::Allowance(token.clone()));
                }
            }
            (TxOutcome::Confirmed, _) => {
                for requirement in self.requirements.take().into_iter().flatten() {
                    self.allowances
                        .insert(requirement.token.clone(), AllowanceStatus::Refreshing);
                    invalidations.push(Invalidation::Allowance(requirement.token));
                }
                invalidations.extend([
                    Invalidation::PoolReserves,
                    Invalidation::Balances,
                    Invalidation::Shares,
                    Invalidation::Activity,
                ]);
            }
        }

        self.reevaluate();
        info!(
            flow = %self.flow_id,
            kind = %ticket.kind,
            outcome = ?outcome,
            state = %self.state,
            "Submission resolved"
        );
        Resolution::Applied {
            state: self.state.clone(),
            invalidations,
        }
    }

    fn not_ready(&self, kind: ActionKind) -> ExecutionError {
        ExecutionError::NotReady {
            action: kind.to_string(),
            state: self.state.to_string(),
        }
    }

    fn reevaluate(&mut self) {
        let new_state = match &self.in_flight {
            Some(in_flight) => PendingAction::Submitting {
                kind: in_flight.ticket.kind,
                phase: in_flight.phase.clone(),
            },
            None => evaluate(self.requirements.as_deref(), &self.allowances),
        };
        if new_state != self.state {
            debug!(
                flow = %self.flow_id,
                old_state = %self.state,
                new_state = %new_state,
                "Action state changed"
            );
            self.state = new_state;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use easydefi_domain::enums::TokenSide;

    const ALY: &str = "0xaly";
    const SALY: &str = "0xsaly";

    fn ether(whole: u64) -> TokenAmount {
        TokenAmount::from_whole(whole, 18)
    }

    fn swap_machine(amount: TokenAmount, allowance: TokenAmount) -> ActionMachine {
        let mut machine = ActionMachine::new();
        machine.set_requirements(Some(vec![Requirement::single(ALY, amount)]));
        machine.record_allowance(ALY, Ok(allowance));
        machine
    }

    #[test]
    fn test_approval_then_refetch_becomes_ready() {
        let mut machine = swap_machine(ether(5), TokenAmount::zero());
        assert_eq!(machine.state().needs_approval(), Some((ALY, ether(5))));

        let ticket = machine.begin(ActionKind::Approval).unwrap();
        assert!(machine.state().is_submitting());
        machine.broadcast(&ticket, TxHash("0x01".to_string()));

        let resolution = machine.complete(&ticket, TxOutcome::Confirmed);
        assert_eq!(
            resolution.invalidations(),
            &[Invalidation::Allowance(ALY.to_string())]
        );
        // Not ready until the allowance has actually been re-read.
        assert_eq!(machine.state(), &PendingAction::Unknown);
        assert_eq!(machine.stale_allowances(), vec![ALY.to_string()]);

        machine.record_allowance(ALY, Ok(ether(10)));
        assert!(machine.state().is_ready());
    }

    #[test]
    fn test_submission_phases() {
        let mut machine = swap_machine(ether(5), ether(5));
        let ticket = machine.begin(ActionKind::Swap).unwrap();
        assert_eq!(
            machine.state(),
            &PendingAction::Submitting {
                kind: ActionKind::Swap,
                phase: SubmissionPhase::AwaitingHash,
            }
        );

        let hash = TxHash("0xabc".to_string());
        assert!(!machine.broadcast(&ticket, hash.clone()).is_stale());
        assert_eq!(
            machine.state(),
            &PendingAction::Submitting {
                kind: ActionKind::Swap,
                phase: SubmissionPhase::AwaitingReceipt(hash),
            }
        );
        assert_ne!(
            machine.state(),
            &PendingAction::Submitting {
                kind: ActionKind::Swap,
                phase: SubmissionPhase::AwaitingHash,
            }
        );

        machine.complete(&ticket, TxOutcome::Confirmed);
        assert_eq!(machine.state(), &PendingAction::Initial);
    }

    #[test]
    fn test_primary_success_resets_to_initial() {
        let mut machine = swap_machine(ether(5), ether(5));
        let ticket = machine.begin(ActionKind::Swap).unwrap();
        let resolution = machine.complete(&ticket, TxOutcome::Confirmed);

        assert_eq!(machine.state(), &PendingAction::Initial);
        assert!(machine.requirements().is_none());
        let invalidations = resolution.invalidations();
        assert!(invalidations.contains(&Invalidation::PoolReserves));
        assert!(invalidations.contains(&Invalidation::Balances));
        assert!(invalidations.contains(&Invalidation::Allowance(ALY.to_string())));
    }

    #[test]
    fn test_failure_returns_to_previous_state() {
        let mut machine = swap_machine(ether(5), TokenAmount::zero());
        let ticket = machine.begin(ActionKind::Approval).unwrap();
        machine.complete(&ticket, TxOutcome::Failed);
        assert_eq!(machine.state().needs_approval(), Some((ALY, ether(5))));
        assert_eq!(machine.requirements().map(<[_]>::len), Some(1));
    }

    #[test]
    fn test_failure_evaluates_current_amount() {
        let mut machine = swap_machine(ether(5), ether(5));
        let ticket = machine.begin(ActionKind::Swap).unwrap();

        // Typing while submitting does not cancel the transaction.
        machine.set_requirements(Some(vec![Requirement::single(ALY, ether(8))]));
        assert!(machine.state().is_submitting());

        machine.complete(&ticket, TxOutcome::Failed);
        assert_eq!(machine.state().needs_approval(), Some((ALY, ether(8))));
    }

    #[test]
    fn test_double_submission_is_refused() {
        let mut machine = swap_machine(ether(5), ether(5));
        let _ticket = machine.begin(ActionKind::Swap).unwrap();
        assert_eq!(
            machine.begin(ActionKind::Swap),
            Err(ExecutionError::AlreadySubmitting)
        );
    }

    #[test]
    fn test_begin_requires_matching_state() {
        let mut machine = swap_machine(ether(5), TokenAmount::zero());
        assert!(matches!(
            machine.begin(ActionKind::Swap),
            Err(ExecutionError::NotReady { .. })
        ));

        let mut machine = swap_machine(ether(5), ether(5));
        assert!(matches!(
            machine.begin(ActionKind::Approval),
            Err(ExecutionError::NotReady { .. })
        ));

        let mut machine = ActionMachine::new();
        assert!(machine.begin(ActionKind::Swap).is_err());
    }

    #[test]
    fn test_selection_change_makes_ticket_stale() {
        let mut machine = swap_machine(ether(5), ether(5));
        let ticket = machine.begin(ActionKind::Swap).unwrap();

        machine.reset_selection();
        machine.set_requirements(Some(vec![Requirement::single(SALY, ether(1))]));
        machine.record_allowance(SALY, Ok(TokenAmount::zero()));
        let before = machine.state().clone();

        assert!(machine.broadcast(&ticket, TxHash("0x02".to_string())).is_stale());
        assert!(machine.complete(&ticket, TxOutcome::Confirmed).is_stale());
        assert_eq!(machine.state(), &before);
        assert_eq!(machine.requirements().map(<[_]>::len), Some(1));
    }

    #[test]
    fn test_ticket_from_other_flow_is_stale() {
        let mut first = swap_machine(ether(5), ether(5));
        let mut second = swap_machine(ether(5), ether(5));
        let ticket = first.begin(ActionKind::Swap).unwrap();
        let _ = second.begin(ActionKind::Swap).unwrap();

        assert!(second.complete(&ticket, TxOutcome::Confirmed).is_stale());
        assert!(second.state().is_submitting());
    }

    #[test]
    fn test_deposit_asks_for_a_then_b() {
        let mut machine = ActionMachine::new();
        machine.set_requirements(Some(vec![
            Requirement::side(TokenSide::A, ALY, ether(5)),
            Requirement::side(TokenSide::B, SALY, ether(10)),
        ]));
        machine.record_allowance(ALY, Ok(TokenAmount::zero()));
        machine.record_allowance(SALY, Ok(TokenAmount::zero()));
        assert_eq!(machine.state().to_string(), "needsApprovalA");

        let ticket = machine.begin(ActionKind::Approval).unwrap();
        assert_eq!(ticket.approval, Some((ALY.to_string(), ether(5))));
        machine.complete(&ticket, TxOutcome::Confirmed);
        machine.record_allowance(ALY, Ok(ether(5)));
        assert_eq!(machine.state().to_string(), "needsApprovalB");

        let ticket = machine.begin(ActionKind::Approval).unwrap();
        machine.complete(&ticket, TxOutcome::Confirmed);
        machine.record_allowance(SALY, Ok(ether(10)));
        assert!(machine.state().is_ready());
    }

    #[test]
    fn test_read_failure_is_unknown() {
        let mut machine = ActionMachine::new();
        machine.set_requirements(Some(vec![Requirement::single(ALY, ether(1))]));
        machine.record_allowance(ALY, Err("rpc down".to_string()));
        assert_eq!(machine.state(), &PendingAction::Unknown);
        assert!(machine.begin(ActionKind::Swap).is_err());
        assert!(machine.begin(ActionKind::Approval).is_err());
    }
}
