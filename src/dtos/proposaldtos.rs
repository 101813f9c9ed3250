use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::{
    models::{
        projectmodel::ProjectStatus,
        proposalmodel::{Milestone, Proposal},
    },
    service::proposal_service::SubmitProposal,
    utils::money::amount_from_f64,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MilestoneDto {
    pub title: String,
    pub amount: Option<f64>,
    pub due_in_days: Option<i32>,
}

fn validate_milestone_list(milestones: &Vec<MilestoneDto>) -> Result<(), ValidationError> {
    if milestones.len() > 20 {
        return Err(ValidationError::new("too_many_milestones"));
    }
    for milestone in milestones {
        if milestone.title.trim().is_empty() || milestone.title.len() > 200 {
            return Err(ValidationError::new("invalid_milestone_title"));
        }
        if milestone.amount.map_or(false, |a| !a.is_finite() || a < 0.0) {
            return Err(ValidationError::new("invalid_milestone_amount"));
        }
        if milestone.due_in_days.map_or(false, |d| d <= 0) {
            return Err(ValidationError::new("invalid_milestone_due_date"));
        }
    }
    Ok(())
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct SubmitProposalDto {
    pub project_id: Uuid,

    #[validate(length(min = 10, max = 5000, message = "Cover letter must be between 10 and 5000 characters"))]
    pub cover_letter: String,

    #[validate(range(min = 0.01, message = "Proposed price must be positive"))]
    pub proposed_price: f64,

    #[validate(range(min = 1, max = 365, message = "Timeline must be between 1 and 365 days"))]
    pub proposed_timeline: i32,

    pub currency: Option<String>,

    #[serde(default)]
    #[validate(custom = "validate_milestone_list")]
    pub milestones: Vec<MilestoneDto>,
}

impl SubmitProposalDto {
    pub fn into_request(self) -> Result<SubmitProposal, String> {
        let milestones = self
            .milestones
            .into_iter()
            .map(|m| {
                Ok(Milestone {
                    title: m.title.trim().to_string(),
                    amount: m.amount.map(amount_from_f64).transpose()?,
                    due_in_days: m.due_in_days,
                })
            })
            .collect::<Result<Vec<_>, String>>()?;

        Ok(SubmitProposal {
            project_id: self.project_id,
            cover_letter: self.cover_letter,
            proposed_price: amount_from_f64(self.proposed_price)?,
            proposed_timeline: self.proposed_timeline,
            currency: self.currency.unwrap_or_default(),
            milestones,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct AcceptProposalResponseDto {
    pub proposal: Proposal,
    pub project_status: ProjectStatus,
    pub rejected_count: u64,
}
