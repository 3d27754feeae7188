//! Notification records for transaction lifecycle events.

use easydefi_domain::enums::ActionKind;
use serde::{Deserialize, Serialize};

/// Stage of a transaction a notification reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationStage {
    /// Broadcast, awaiting confirmation.
    Submitted,
    /// Mined successfully.
    Confirmed,
    /// Rejected before broadcast or reverted on chain.
    Failed,
}

/// Display variant of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationVariant {
    Default,
    Success,
    Destructive,
}

/// A user-facing notification about one transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxNotification {
    /// Notification ID.
    pub id: String,
    /// Action the transaction performs.
    pub action: ActionKind,
    /// Lifecycle stage.
    pub stage: NotificationStage,
    /// Headline, e.g. "Swap Successful".
    pub title: String,
    /// Explorer link text or error message.
    pub description: String,
    /// Transaction hash, when one is known.
    pub tx_hash: Option<String>,
    /// Block explorer link for the transaction.
    pub explorer_link: Option<String>,
    /// Timestamp.
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl TxNotification {
    /// Creates a notification for `action` at `stage`.
    pub fn new(action: ActionKind, stage: NotificationStage, description: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            action,
            stage,
            title: title_for(action, stage).to_string(),
            description: description.into(),
            tx_hash: None,
            explorer_link: None,
            timestamp: chrono::Utc::now(),
        }
    }

    /// Attaches the transaction hash and its explorer link.
    #[must_use]
    pub fn with_transaction(mut self, hash: &str, explorer_url: &str) -> Self {
        self.tx_hash = Some(hash.to_string());
        self.explorer_link = Some(explorer_link(explorer_url, hash));
        self
    }

    pub fn variant(&self) -> NotificationVariant {
        match self.stage {
            NotificationStage::Submitted => NotificationVariant::Default,
            NotificationStage::Confirmed => NotificationVariant::Success,
            NotificationStage::Failed => NotificationVariant::Destructive,
        }
    }
}

/// `{explorer}/tx/{hash}`, tolerating a trailing slash on the base URL.
pub fn explorer_link(explorer_url: &str, hash: &str) -> String {
    format!("{}/tx/{}", explorer_url.trim_end_matches('/'), hash)
}

/// Headline shown for `action` at `stage`.
pub fn title_for(action: ActionKind, stage: NotificationStage) -> &'static str {
    match (stage, action) {
        (NotificationStage::Submitted, ActionKind::Approval) => "Approval Submitted",
        (NotificationStage::Submitted, _) => "Transaction Submitted",
        (NotificationStage::Confirmed, ActionKind::Approval) => "Approval Confirmed",
        (NotificationStage::Confirmed, ActionKind::Deposit) => "Liquidity Successfully Added",
        (NotificationStage::Confirmed, ActionKind::Withdraw) => "Liquidity Successfully Removed",
        (NotificationStage::Confirmed, ActionKind::Swap) => "Swap Successful",
        (NotificationStage::Confirmed, ActionKind::CreatePool) => "Transaction Confirmed",
        (NotificationStage::Failed, ActionKind::Approval) => "Approval Failed",
        (NotificationStage::Failed, ActionKind::Deposit) => "Liquidity Provision Failed",
        (NotificationStage::Failed, ActionKind::Withdraw) => "Liquidity Removal Failed",
        (NotificationStage::Failed, ActionKind::Swap) => "Swap Failed",
        (NotificationStage::Failed, ActionKind::CreatePool) => "Transaction Failed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_titles() {
        assert_eq!(
            title_for(ActionKind::Approval, NotificationStage::Submitted),
            "Approval Submitted"
        );
        assert_eq!(
            title_for(ActionKind::Withdraw, NotificationStage::Submitted),
            "Transaction Submitted"
        );
        assert_eq!(
            title_for(ActionKind::Deposit, NotificationStage::Confirmed),
            "Liquidity Successfully Added"
        );
        assert_eq!(
            title_for(ActionKind::Deposit, NotificationStage::Failed),
            "Liquidity Provision Failed"
        );
        assert_eq!(
            title_for(ActionKind::CreatePool, NotificationStage::Confirmed),
            "Transaction Confirmed"
        );
    }

    #[test]
    fn test_explorer_link() {
        let notification = TxNotification::new(ActionKind::Swap, NotificationStage::Confirmed, "")
            .with_transaction("0xabc", "https://sepolia.basescan.org/");
        assert_eq!(
            notification.explorer_link.as_deref(),
            Some("https://sepolia.basescan.org/tx/0xabc")
        );
        assert_eq!(notification.variant(), NotificationVariant::Success);
    }
}
