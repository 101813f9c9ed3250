// service/proposal_service.rs
use std::sync::Arc;

use bigdecimal::Zero;
use chrono::{DateTime, Utc};
use sqlx::types::BigDecimal;
use uuid::Uuid;

use crate::{
    db::Store,
    models::{
        proposalmodel::{AcceptOutcome, Milestone, NewProposal, Proposal, ProposalStatus},
        usermodel::{Actor, UserRole},
    },
    service::{
        error::ServiceError,
        notification_service::{MarketplaceEvent, NotificationService},
    },
    utils::money::{round2, sum},
};

#[derive(Debug, Clone)]
pub struct SubmitProposal {
    pub project_id: Uuid,
    pub cover_letter: String,
    pub proposed_price: BigDecimal,
    pub proposed_timeline: i32,
    pub currency: String,
    pub milestones: Vec<Milestone>,
}

/// Checks the milestone plan against the proposed price.
pub fn validate_milestones(milestones: &[Milestone], price: &BigDecimal) -> Result<(), ServiceError> {
    if milestones.iter().any(|m| m.title.trim().is_empty()) {
        return Err(ServiceError::Validation("Milestone titles cannot be empty".to_string()));
    }
    if milestones
        .iter()
        .any(|m| m.amount.as_ref().map_or(false, |a| a < &BigDecimal::zero()))
    {
        return Err(ServiceError::Validation("Milestone amounts cannot be negative".to_string()));
    }
    if milestones.iter().any(|m| m.due_in_days.map_or(false, |d| d <= 0)) {
        return Err(ServiceError::Validation("Milestone due dates must be in the future".to_string()));
    }

    let planned = sum(milestones.iter().filter_map(|m| m.amount.as_ref()));
    if &planned > price {
        return Err(ServiceError::Validation(format!(
            "Milestones total {} exceeds the proposed price {}",
            planned, price
        )));
    }
    Ok(())
}

#[derive(Clone)]
pub struct ProposalService {
    store: Arc<dyn Store>,
    notifications: NotificationService,
    price_ceiling: BigDecimal,
}

impl ProposalService {
    pub fn new(store: Arc<dyn Store>, notifications: NotificationService, price_ceiling: BigDecimal) -> Self {
        Self {
            store,
            notifications,
            price_ceiling,
        }
    }

    async fn load(&self, proposal_id: Uuid) -> Result<Proposal, ServiceError> {
        self.store
            .get_proposal(proposal_id)
            .await?
            .ok_or(ServiceError::ProposalNotFound(proposal_id))
    }

    /// Loads a proposal the actor owns as the project's client.
    async fn load_for_client(&self, proposal_id: Uuid, actor: &Actor) -> Result<Proposal, ServiceError> {
        let proposal = self.load(proposal_id).await?;
        let project = self
            .store
            .get_project(proposal.project_id)
            .await?
            .ok_or(ServiceError::ProjectNotFound(proposal.project_id))?;
        if !project.is_owned_by(actor.id) {
            return Err(ServiceError::UnauthorizedProposalAccess(actor.id, proposal_id));
        }
        Ok(proposal)
    }

    async fn load_for_freelancer(&self, proposal_id: Uuid, actor: &Actor) -> Result<Proposal, ServiceError> {
        let proposal = self.load(proposal_id).await?;
        if proposal.freelancer_id != actor.id {
            return Err(ServiceError::UnauthorizedProposalAccess(actor.id, proposal_id));
        }
        Ok(proposal)
    }

    fn ensure_pending(proposal: &Proposal) -> Result<(), ServiceError> {
        if proposal.status != ProposalStatus::Pending {
            return Err(ServiceError::InvalidProposalStatus(proposal.id, ProposalStatus::Pending));
        }
        Ok(())
    }

    pub async fn submit(&self, actor: &Actor, request: SubmitProposal, now: DateTime<Utc>) -> Result<Proposal, ServiceError> {
        if actor.role != UserRole::ServiceProvider {
            return Err(ServiceError::RoleRequired(UserRole::ServiceProvider));
        }

        let project = self
            .store
            .get_project(request.project_id)
            .await?
            .ok_or(ServiceError::ProjectNotFound(request.project_id))?;
        if project.is_owned_by(actor.id) {
            return Err(ServiceError::Validation(
                "You cannot submit a proposal to your own project".to_string(),
            ));
        }

        let price = round2(&request.proposed_price);
        let ceiling = round2(&(&project.budget_max * &self.price_ceiling));
        if price < project.budget_min || price > ceiling {
            return Err(ServiceError::Validation(format!(
                "Proposed price must be between {} and {}",
                project.budget_min, ceiling
            )));
        }
        if request.proposed_timeline <= 0 {
            return Err(ServiceError::Validation(
                "Proposed timeline must be at least one day".to_string(),
            ));
        }
        validate_milestones(&request.milestones, &price)?;

        let currency = if request.currency.trim().is_empty() {
            project.budget_currency.clone()
        } else {
            request.currency.trim().to_uppercase()
        };

        // Status and duplicate checks are repeated under the project lock.
        let proposal = self
            .store
            .create_proposal(
                NewProposal {
                    project_id: project.id,
                    freelancer_id: actor.id,
                    cover_letter: request.cover_letter.trim().to_string(),
                    proposed_price: price,
                    proposed_timeline: request.proposed_timeline,
                    currency,
                    milestones: request.milestones,
                },
                now,
            )
            .await?;

        tracing::info!(
            proposal_id = %proposal.id,
            project_id = %project.id,
            freelancer_id = %actor.id,
            price = %proposal.proposed_price,
            "proposal submitted"
        );
        self.notifications
            .send(MarketplaceEvent::ProposalSubmitted {
                proposal_id: proposal.id,
                project_id: project.id,
                client_id: project.client_id,
            })
            .await;

        Ok(proposal)
    }

    /// Accepts the proposal, rejects its pending siblings and starts the
    /// project, all in one unit.
    pub async fn accept(&self, proposal_id: Uuid, actor: &Actor, now: DateTime<Utc>) -> Result<AcceptOutcome, ServiceError> {
        let proposal = self.load_for_client(proposal_id, actor).await?;
        Self::ensure_pending(&proposal)?;

        let outcome = self.store.accept_proposal(proposal_id, now).await.map_err(|e| {
            tracing::warn!(proposal_id = %proposal_id, error = %e, "proposal acceptance refused");
            e
        })?;

        tracing::info!(
            proposal_id = %proposal_id,
            project_id = %outcome.project.id,
            rejected = outcome.rejected_count,
            "proposal accepted"
        );
        self.notifications
            .send(MarketplaceEvent::ProposalAccepted {
                proposal_id,
                project_id: outcome.project.id,
                freelancer_id: outcome.proposal.freelancer_id,
                rejected_count: outcome.rejected_count,
            })
            .await;

        Ok(outcome)
    }

    pub async fn reject(&self, proposal_id: Uuid, actor: &Actor, now: DateTime<Utc>) -> Result<Proposal, ServiceError> {
        let proposal = self.load_for_client(proposal_id, actor).await?;
        Self::ensure_pending(&proposal)?;

        let proposal = self.store.reject_proposal(proposal_id, now).await?;
        tracing::info!(proposal_id = %proposal_id, "proposal rejected");
        self.notifications
            .send(MarketplaceEvent::ProposalRejected {
                proposal_id,
                freelancer_id: proposal.freelancer_id,
            })
            .await;

        Ok(proposal)
    }

    pub async fn withdraw(&self, proposal_id: Uuid, actor: &Actor, now: DateTime<Utc>) -> Result<Proposal, ServiceError> {
        let proposal = self.load_for_freelancer(proposal_id, actor).await?;
        Self::ensure_pending(&proposal)?;

        let proposal = self.store.withdraw_proposal(proposal_id, now).await?;
        tracing::info!(proposal_id = %proposal_id, "proposal withdrawn");
        Ok(proposal)
    }

    pub async fn delete(&self, proposal_id: Uuid, actor: &Actor) -> Result<(), ServiceError> {
        let proposal = self.load_for_freelancer(proposal_id, actor).await?;
        Self::ensure_pending(&proposal)?;

        self.store.delete_proposal(proposal_id).await?;
        tracing::info!(proposal_id = %proposal_id, "proposal deleted");
        Ok(())
    }

    pub async fn list_for_project(&self, project_id: Uuid, actor: &Actor) -> Result<Vec<Proposal>, ServiceError> {
        let project = self
            .store
            .get_project(project_id)
            .await?
            .ok_or(ServiceError::ProjectNotFound(project_id))?;
        if !project.is_owned_by(actor.id) {
            return Err(ServiceError::UnauthorizedProjectAccess(actor.id, project_id));
        }
        self.store.list_project_proposals(project_id).await
    }

    pub async fn list_mine(&self, actor: &Actor) -> Result<Vec<Proposal>, ServiceError> {
        self.store.list_freelancer_proposals(actor.id).await
    }
}
