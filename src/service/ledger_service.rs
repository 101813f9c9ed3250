// service/ledger_service.rs
use std::sync::Arc;

use bigdecimal::Zero;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::types::BigDecimal;
use uuid::Uuid;

use crate::{
    db::Store,
    models::paymentmodel::{Escrow, LedgerEntry, NewLedgerEntry, TransactionType},
    service::error::ServiceError,
};

#[derive(Debug, Clone, Serialize)]
pub struct ProviderEarnings {
    pub total_earnings: BigDecimal,
    pub last_30_days: BigDecimal,
    pub outstanding: BigDecimal,
}

/// The client's hold when an escrow is funded.
pub fn hold_entry(escrow: &Escrow) -> NewLedgerEntry {
    NewLedgerEntry {
        user_id: escrow.client_id,
        transaction_type: TransactionType::EscrowHold,
        amount: escrow.amount.clone(),
        currency: escrow.currency.clone(),
        fee: BigDecimal::zero(),
        project_id: Some(escrow.project_id),
        proposal_id: Some(escrow.proposal_id),
        escrow_id: Some(escrow.id),
        description: format!("Escrow funded for project {}", escrow.project_id),
    }
}

/// The freelancer's share on release.
pub fn payout_entry(escrow: &Escrow) -> NewLedgerEntry {
    NewLedgerEntry {
        user_id: escrow.freelancer_id,
        transaction_type: TransactionType::EscrowRelease,
        amount: escrow.freelancer_amount.clone(),
        currency: escrow.currency.clone(),
        fee: BigDecimal::zero(),
        project_id: Some(escrow.project_id),
        proposal_id: Some(escrow.proposal_id),
        escrow_id: Some(escrow.id),
        description: format!("Payment released for project {}", escrow.project_id),
    }
}

/// The platform's commission on release, booked against the client.
pub fn commission_entry(escrow: &Escrow) -> NewLedgerEntry {
    NewLedgerEntry {
        user_id: escrow.client_id,
        transaction_type: TransactionType::Commission,
        amount: escrow.platform_fee.clone(),
        currency: escrow.currency.clone(),
        fee: BigDecimal::zero(),
        project_id: Some(escrow.project_id),
        proposal_id: Some(escrow.proposal_id),
        escrow_id: Some(escrow.id),
        description: format!("Platform commission for project {}", escrow.project_id),
    }
}

#[derive(Clone)]
pub struct LedgerService {
    store: Arc<dyn Store>,
}

impl LedgerService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn entries_for(&self, user_id: Uuid) -> Result<Vec<LedgerEntry>, ServiceError> {
        self.store.list_user_entries(user_id).await
    }

    pub async fn entries_for_escrow(&self, escrow_id: Uuid) -> Result<Vec<LedgerEntry>, ServiceError> {
        self.store.list_escrow_entries(escrow_id).await
    }

    pub async fn provider_earnings(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<ProviderEarnings, ServiceError> {
        let total_earnings = self
            .store
            .sum_user_entries(user_id, TransactionType::EscrowRelease, None)
            .await?;
        let last_30_days = self
            .store
            .sum_user_entries(user_id, TransactionType::EscrowRelease, Some(now - Duration::days(30)))
            .await?;
        let outstanding = self.store.outstanding_for_freelancer(user_id).await?;

        Ok(ProviderEarnings {
            total_earnings,
            last_30_days,
            outstanding,
        })
    }
}
