use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::{
    paymentmodel::{Escrow, FundOutcome, LedgerEntry, ReleaseOutcome},
    projectmodel::ProjectStatus,
};

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateEscrowDto {
    pub project_id: Uuid,
    pub proposal_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct FundEscrowResponseDto {
    pub escrow: Escrow,
    pub hold_transaction_id: Uuid,
}

impl From<FundOutcome> for FundEscrowResponseDto {
    fn from(outcome: FundOutcome) -> Self {
        Self {
            hold_transaction_id: outcome.hold.id,
            escrow: outcome.escrow,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReleaseEscrowResponseDto {
    pub escrow: Escrow,
    pub payout_transaction_id: Uuid,
    pub commission_transaction_id: Uuid,
    pub project_status: ProjectStatus,
}

impl From<ReleaseOutcome> for ReleaseEscrowResponseDto {
    fn from(outcome: ReleaseOutcome) -> Self {
        Self {
            payout_transaction_id: outcome.payout.id,
            commission_transaction_id: outcome.commission.id,
            project_status: outcome.project.status,
            escrow: outcome.escrow,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LedgerResponseDto {
    pub transactions: Vec<LedgerEntry>,
    pub count: usize,
}
