//! Best-effort outbound side effects. Everything here runs after the
//! reconciliation transaction commits; failures are logged and never
//! propagate back into the payment flow.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::SubmissionMode;
use crate::error::Result;
use crate::reconcile::CompletedEntitlement;

pub mod analytics;
pub mod email;

/// Flat event describing a committed entitlement, fanned out to every
/// registered notifier.
#[derive(Debug, Clone)]
pub struct EntitlementNotification {
    pub mode: SubmissionMode,
    pub venue_id: Uuid,
    pub venue_name: String,
    pub user_id: Uuid,
    pub user_email: String,
    pub amount: i64,
    pub currency: String,
    pub expires_at: DateTime<Utc>,
    pub claim_id: Option<Uuid>,
    /// External payment reference, doubling as analytics transaction id.
    pub transaction_id: String,
}

impl EntitlementNotification {
    pub fn from_entitlement(entitlement: &CompletedEntitlement, reference: &str) -> Self {
        Self {
            mode: entitlement.mode,
            venue_id: entitlement.venue_id,
            venue_name: entitlement.venue_name.clone(),
            user_id: entitlement.user_id,
            user_email: entitlement.user_email.clone(),
            amount: entitlement.amount,
            currency: entitlement.currency.clone(),
            expires_at: entitlement.expires_at,
            claim_id: entitlement.claim_id,
            transaction_id: reference.to_string(),
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;
    fn is_enabled(&self) -> bool;
    async fn notify(&self, event: &EntitlementNotification) -> Result<()>;
}

pub struct NotificationDispatcher {
    notifiers: RwLock<Vec<Arc<dyn Notifier>>>,
}

impl NotificationDispatcher {
    pub fn new() -> Self {
        Self {
            notifiers: RwLock::new(Vec::new()),
        }
    }

    pub async fn register(&self, notifier: Arc<dyn Notifier>) {
        if notifier.is_enabled() {
            tracing::info!("Registered notifier: {}", notifier.name());
            let mut notifiers = self.notifiers.write().await;
            notifiers.push(notifier);
        }
    }

    /// Fire-and-forget fan-out. Not retried; a notifier failure never
    /// affects the committed outcome.
    pub async fn dispatch(&self, event: EntitlementNotification) {
        let notifiers = self.notifiers.read().await;

        for notifier in notifiers.iter() {
            if !notifier.is_enabled() {
                continue;
            }

            match notifier.notify(&event).await {
                Ok(_) => {
                    tracing::debug!("Notifier {} handled event successfully", notifier.name());
                }
                Err(e) => {
                    tracing::error!(
                        "Notifier {} failed to handle event: {:?}",
                        notifier.name(),
                        e
                    );
                    // Continue with the other notifiers even if one fails
                }
            }
        }
    }
}

impl Default for NotificationDispatcher {
    fn default() -> Self {
        Self::new()
    }
}
