//! Notification log shared by every flow of a session.

use easydefi_domain::enums::ActionKind;
use easydefi_protocols::{ChainError, TxHash};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info};

use super::{NotificationStage, TxNotification};

/// Collects transaction notifications in order of emission.
#[derive(Debug, Clone)]
pub struct NotificationLog {
    entries: Arc<RwLock<Vec<TxNotification>>>,
    explorer_url: String,
}

impl NotificationLog {
    /// Creates an empty log linking hashes to `explorer_url`.
    #[must_use]
    pub fn new(explorer_url: impl Into<String>) -> Self {
        Self {
            entries: Arc::new(RwLock::new(Vec::new())),
            explorer_url: explorer_url.into(),
        }
    }

    pub fn explorer_url(&self) -> &str {
        &self.explorer_url
    }

    /// Records that a transaction was broadcast.
    pub async fn submitted(&self, action: ActionKind, hash: &TxHash) {
        let notification = TxNotification::new(action, NotificationStage::Submitted, "View on explorer")
            .with_transaction(&hash.0, &self.explorer_url);
        info!(action = %action, hash = %hash, "{}", notification.title);
        self.push(notification).await;
    }

    /// Records that a transaction was mined successfully.
    pub async fn confirmed(&self, action: ActionKind, hash: &TxHash) {
        let notification = TxNotification::new(action, NotificationStage::Confirmed, "View on explorer")
            .with_transaction(&hash.0, &self.explorer_url);
        info!(action = %action, hash = %hash, "{}", notification.title);
        self.push(notification).await;
    }

    /// Records a rejected or reverted transaction.
    pub async fn failed(&self, action: ActionKind, hash: Option<&TxHash>, err: &ChainError) {
        let mut notification =
            TxNotification::new(action, NotificationStage::Failed, err.short_message());
        if let Some(hash) = hash {
            notification = notification.with_transaction(&hash.0, &self.explorer_url);
        }
        error!(action = %action, error = %err, "{}", notification.title);
        self.push(notification).await;
    }

    /// All notifications, oldest first.
    pub async fn all(&self) -> Vec<TxNotification> {
        self.entries.read().await.clone()
    }

    pub async fn latest(&self) -> Option<TxNotification> {
        self.entries.read().await.last().cloned()
    }

    /// Removes and returns every notification.
    pub async fn drain(&self) -> Vec<TxNotification> {
        std::mem::take(&mut *self.entries.write().await)
    }

    async fn push(&self, notification: TxNotification) {
        self.entries.write().await.push(notification);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lifecycle_sequence() {
        let log = NotificationLog::new("https://sepolia.basescan.org");
        let hash = TxHash("0x01".to_string());

        log.submitted(ActionKind::Approval, &hash).await;
        log.confirmed(ActionKind::Approval, &hash).await;
        log.failed(
            ActionKind::Swap,
            None,
            &ChainError::Rejected("user denied".to_string()),
        )
        .await;

        let all = log.all().await;
        let titles: Vec<&str> = all.iter().map(|n| n.title.as_str()).collect();
        assert_eq!(titles, ["Approval Submitted", "Approval Confirmed", "Swap Failed"]);
        assert_eq!(
            all[0].explorer_link.as_deref(),
            Some("https://sepolia.basescan.org/tx/0x01")
        );
        assert!(all[2].tx_hash.is_none());
        assert!(all[2].description.contains("user denied"));

        assert_eq!(log.drain().await.len(), 3);
        assert!(log.latest().await.is_none());
    }
}
