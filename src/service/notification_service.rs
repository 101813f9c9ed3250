// service/notification_service.rs
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use sqlx::types::BigDecimal;
use uuid::Uuid;

/// Events the engines announce after a successful commit.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MarketplaceEvent {
    ProposalSubmitted {
        proposal_id: Uuid,
        project_id: Uuid,
        client_id: Uuid,
    },
    ProposalAccepted {
        proposal_id: Uuid,
        project_id: Uuid,
        freelancer_id: Uuid,
        rejected_count: u64,
    },
    ProposalRejected {
        proposal_id: Uuid,
        freelancer_id: Uuid,
    },
    EscrowFunded {
        escrow_id: Uuid,
        freelancer_id: Uuid,
        amount: BigDecimal,
    },
    EscrowReleased {
        escrow_id: Uuid,
        freelancer_id: Uuid,
        amount: BigDecimal,
    },
    SkillCertified {
        user_id: Uuid,
        skill_id: Uuid,
        score: f64,
    },
}

/// Fire-and-forget delivery. Implementations swallow their own failures.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: MarketplaceEvent);
}

#[derive(Debug, Clone, Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, event: MarketplaceEvent) {
        match serde_json::to_string(&event) {
            Ok(payload) => tracing::info!(target: "notifications", %payload, "notification dispatched"),
            Err(e) => tracing::warn!(target: "notifications", error = %e, "could not encode notification"),
        }
    }
}

#[derive(Clone)]
pub struct NotificationService {
    notifier: Arc<dyn Notifier>,
}

impl std::fmt::Debug for NotificationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationService").finish()
    }
}

impl NotificationService {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }

    pub fn tracing() -> Self {
        Self::new(Arc::new(TracingNotifier))
    }

    pub async fn send(&self, event: MarketplaceEvent) {
        self.notifier.notify(event).await;
    }
}
