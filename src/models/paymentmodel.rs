use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::BigDecimal;
use uuid::Uuid;

use super::transition::TransitionError;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "escrow_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EscrowStatus {
    Pending,
    Funded,
    InProgress,
    Completed,
    Disputed,
    Released,
    Refunded,
}

impl EscrowStatus {
    pub fn to_str(&self) -> &str {
        match self {
            EscrowStatus::Pending => "pending",
            EscrowStatus::Funded => "funded",
            EscrowStatus::InProgress => "in_progress",
            EscrowStatus::Completed => "completed",
            EscrowStatus::Disputed => "disputed",
            EscrowStatus::Released => "released",
            EscrowStatus::Refunded => "refunded",
        }
    }

    /// Funds are still held by the platform.
    pub fn holds_funds(&self) -> bool {
        matches!(
            self,
            EscrowStatus::Funded | EscrowStatus::InProgress | EscrowStatus::Disputed
        )
    }

    // Disputed has no way back; resolution happens outside the engine.
    fn is_valid_transition(&self, to: EscrowStatus) -> bool {
        matches!(
            (self, to),
            (EscrowStatus::Pending, EscrowStatus::Funded)
                | (EscrowStatus::Pending, EscrowStatus::Refunded)
                | (EscrowStatus::Funded, EscrowStatus::Released)
                | (EscrowStatus::Funded, EscrowStatus::Disputed)
        )
    }

    pub fn transition(self, to: EscrowStatus) -> Result<EscrowStatus, TransitionError> {
        if self.is_valid_transition(to) {
            Ok(to)
        } else {
            Err(TransitionError::new("escrow", self.to_str(), to.to_str()))
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Escrow {
    pub id: Uuid,
    pub project_id: Uuid,
    pub proposal_id: Uuid,
    pub client_id: Uuid,
    pub freelancer_id: Uuid,
    pub amount: BigDecimal,
    pub currency: String,
    pub platform_fee: BigDecimal,
    pub freelancer_amount: BigDecimal,
    pub status: EscrowStatus,
    pub funded_at: Option<DateTime<Utc>>,
    pub released_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub disputed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Escrow {
    pub fn is_party(&self, user_id: Uuid) -> bool {
        self.client_id == user_id || self.freelancer_id == user_id
    }
}

#[derive(Debug, Clone)]
pub struct NewEscrow {
    pub project_id: Uuid,
    pub proposal_id: Uuid,
    pub client_id: Uuid,
    pub freelancer_id: Uuid,
    pub amount: BigDecimal,
    pub currency: String,
    pub platform_fee: BigDecimal,
    pub freelancer_amount: BigDecimal,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "transaction_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Deposit,
    Withdrawal,
    Payment,
    Refund,
    Commission,
    EscrowHold,
    EscrowRelease,
    EscrowRefund,
}

impl TransactionType {
    pub fn to_str(&self) -> &str {
        match self {
            TransactionType::Deposit => "deposit",
            TransactionType::Withdrawal => "withdrawal",
            TransactionType::Payment => "payment",
            TransactionType::Refund => "refund",
            TransactionType::Commission => "commission",
            TransactionType::EscrowHold => "escrow_hold",
            TransactionType::EscrowRelease => "escrow_release",
            TransactionType::EscrowRefund => "escrow_refund",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "transaction_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

/// An immutable ledger row. Corrections are new rows, never edits.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub transaction_type: TransactionType,
    pub status: TransactionStatus,
    pub amount: BigDecimal,
    pub currency: String,
    pub fee: BigDecimal,
    pub net_amount: BigDecimal,
    pub project_id: Option<Uuid>,
    pub proposal_id: Option<Uuid>,
    pub escrow_id: Option<Uuid>,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// A ledger entry about to be appended. `net_amount` is always derived.
#[derive(Debug, Clone)]
pub struct NewLedgerEntry {
    pub user_id: Uuid,
    pub transaction_type: TransactionType,
    pub amount: BigDecimal,
    pub currency: String,
    pub fee: BigDecimal,
    pub project_id: Option<Uuid>,
    pub proposal_id: Option<Uuid>,
    pub escrow_id: Option<Uuid>,
    pub description: String,
}

impl NewLedgerEntry {
    pub fn net_amount(&self) -> BigDecimal {
        &self.amount - &self.fee
    }

    /// Materialise the row as a completed entry stamped at `now`.
    pub fn into_completed(self, id: Uuid, now: DateTime<Utc>) -> LedgerEntry {
        let net_amount = self.net_amount();
        LedgerEntry {
            id,
            user_id: self.user_id,
            transaction_type: self.transaction_type,
            status: TransactionStatus::Completed,
            amount: self.amount,
            currency: self.currency,
            fee: self.fee,
            net_amount,
            project_id: self.project_id,
            proposal_id: self.proposal_id,
            escrow_id: self.escrow_id,
            description: self.description,
            created_at: now,
            completed_at: Some(now),
        }
    }
}

/// Everything a successful release touched, committed as one unit.
#[derive(Debug, Clone, Serialize)]
pub struct ReleaseOutcome {
    pub escrow: Escrow,
    pub payout: LedgerEntry,
    pub commission: LedgerEntry,
    pub project: super::projectmodel::Project,
}

#[derive(Debug, Clone, Serialize)]
pub struct FundOutcome {
    pub escrow: Escrow,
    pub hold: LedgerEntry,
}
