use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::{BigDecimal, Json};
use uuid::Uuid;

use super::transition::TransitionError;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "proposal_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    Pending,
    Accepted,
    Rejected,
    Withdrawn,
    Expired,
}

impl ProposalStatus {
    pub fn to_str(&self) -> &str {
        match self {
            ProposalStatus::Pending => "pending",
            ProposalStatus::Accepted => "accepted",
            ProposalStatus::Rejected => "rejected",
            ProposalStatus::Withdrawn => "withdrawn",
            ProposalStatus::Expired => "expired",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ProposalStatus::Pending)
    }

    /// Only pending proposals move, and every move lands in an absorbing state.
    pub fn transition(self, to: ProposalStatus) -> Result<ProposalStatus, TransitionError> {
        if self == ProposalStatus::Pending && to.is_terminal() {
            Ok(to)
        } else {
            Err(TransitionError::new("proposal", self.to_str(), to.to_str()))
        }
    }
}

/// One entry of a proposal's ordered milestone plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Milestone {
    pub title: String,
    pub amount: Option<BigDecimal>,
    pub due_in_days: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Proposal {
    pub id: Uuid,
    pub project_id: Uuid,
    pub freelancer_id: Uuid,
    pub cover_letter: String,
    pub proposed_price: BigDecimal,
    pub proposed_timeline: i32,
    pub currency: String,
    pub status: ProposalStatus,
    pub milestones: Json<Vec<Milestone>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub responded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewProposal {
    pub project_id: Uuid,
    pub freelancer_id: Uuid,
    pub cover_letter: String,
    pub proposed_price: BigDecimal,
    pub proposed_timeline: i32,
    pub currency: String,
    pub milestones: Vec<Milestone>,
}

/// Result of a winning acceptance: the accepted proposal, the project now in
/// progress, and how many sibling proposals were rejected alongside it.
#[derive(Debug, Clone, Serialize)]
pub struct AcceptOutcome {
    pub proposal: Proposal,
    pub project: super::projectmodel::Project,
    pub rejected_count: u64,
}
