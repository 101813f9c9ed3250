// service/escrow_service.rs
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::types::BigDecimal;
use uuid::Uuid;

use crate::{
    db::Store,
    models::{
        paymentmodel::{Escrow, EscrowStatus, FundOutcome, NewEscrow, ReleaseOutcome},
        projectmodel::ProjectStatus,
        proposalmodel::ProposalStatus,
        usermodel::Actor,
    },
    service::{
        error::ServiceError,
        ledger_service::{commission_entry, hold_entry, payout_entry},
        notification_service::{MarketplaceEvent, NotificationService},
    },
    utils::money::split_commission,
};

#[derive(Clone)]
pub struct EscrowService {
    store: Arc<dyn Store>,
    notifications: NotificationService,
    commission_rate: BigDecimal,
}

impl EscrowService {
    pub fn new(store: Arc<dyn Store>, notifications: NotificationService, commission_rate: BigDecimal) -> Self {
        Self {
            store,
            notifications,
            commission_rate,
        }
    }

    async fn load(&self, escrow_id: Uuid) -> Result<Escrow, ServiceError> {
        self.store
            .get_escrow(escrow_id)
            .await?
            .ok_or(ServiceError::EscrowNotFound(escrow_id))
    }

    async fn load_as_client(&self, escrow_id: Uuid, actor: &Actor) -> Result<Escrow, ServiceError> {
        let escrow = self.load(escrow_id).await?;
        if escrow.client_id != actor.id {
            return Err(ServiceError::UnauthorizedEscrowAccess(actor.id, escrow_id));
        }
        Ok(escrow)
    }

    pub async fn get(&self, escrow_id: Uuid, actor: &Actor) -> Result<Escrow, ServiceError> {
        let escrow = self.load(escrow_id).await?;
        if !escrow.is_party(actor.id) {
            return Err(ServiceError::UnauthorizedEscrowAccess(actor.id, escrow_id));
        }
        Ok(escrow)
    }

    pub async fn get_for_project(&self, project_id: Uuid, actor: &Actor) -> Result<Escrow, ServiceError> {
        let escrow = self
            .store
            .get_escrow_by_project(project_id)
            .await?
            .ok_or(ServiceError::ProjectEscrowNotFound(project_id))?;
        if !escrow.is_party(actor.id) {
            return Err(ServiceError::UnauthorizedEscrowAccess(actor.id, escrow.id));
        }
        Ok(escrow)
    }

    pub async fn create(
        &self,
        actor: &Actor,
        project_id: Uuid,
        proposal_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Escrow, ServiceError> {
        let project = self
            .store
            .get_project(project_id)
            .await?
            .ok_or(ServiceError::ProjectNotFound(project_id))?;
        if !project.is_owned_by(actor.id) {
            return Err(ServiceError::UnauthorizedProjectAccess(actor.id, project_id));
        }

        let proposal = self
            .store
            .get_proposal(proposal_id)
            .await?
            .filter(|p| p.project_id == project_id)
            .ok_or(ServiceError::ProposalNotFound(proposal_id))?;
        if proposal.status != ProposalStatus::Accepted {
            return Err(ServiceError::InvalidProposalStatus(proposal_id, ProposalStatus::Accepted));
        }
        if !project.status.accepts_escrow() {
            return Err(ServiceError::InvalidProjectStatus(project_id, ProjectStatus::InProgress));
        }
        if self.store.get_escrow_by_project(project_id).await?.is_some() {
            return Err(ServiceError::EscrowAlreadyExists(project_id));
        }

        let (platform_fee, freelancer_amount) = split_commission(&proposal.proposed_price, &self.commission_rate);
        let escrow = self
            .store
            .create_escrow(
                NewEscrow {
                    project_id,
                    proposal_id,
                    client_id: project.client_id,
                    freelancer_id: proposal.freelancer_id,
                    amount: &platform_fee + &freelancer_amount,
                    currency: proposal.currency.clone(),
                    platform_fee,
                    freelancer_amount,
                },
                now,
            )
            .await?;

        tracing::info!(
            escrow_id = %escrow.id,
            project_id = %project_id,
            amount = %escrow.amount,
            fee = %escrow.platform_fee,
            "escrow created"
        );
        Ok(escrow)
    }

    pub async fn fund(&self, escrow_id: Uuid, actor: &Actor, now: DateTime<Utc>) -> Result<FundOutcome, ServiceError> {
        let escrow = self.load_as_client(escrow_id, actor).await?;
        escrow.status.transition(EscrowStatus::Funded)?;

        let outcome = self
            .store
            .fund_escrow(escrow_id, hold_entry(&escrow), now)
            .await
            .map_err(|e| {
                tracing::warn!(escrow_id = %escrow_id, error = %e, "escrow funding refused");
                e
            })?;

        tracing::info!(escrow_id = %escrow_id, hold_id = %outcome.hold.id, "escrow funded");
        self.notifications
            .send(MarketplaceEvent::EscrowFunded {
                escrow_id,
                freelancer_id: outcome.escrow.freelancer_id,
                amount: outcome.escrow.amount.clone(),
            })
            .await;

        Ok(outcome)
    }

    pub async fn release(&self, escrow_id: Uuid, actor: &Actor, now: DateTime<Utc>) -> Result<ReleaseOutcome, ServiceError> {
        let escrow = self.load_as_client(escrow_id, actor).await?;
        escrow.status.transition(EscrowStatus::Released)?;

        let outcome = self
            .store
            .release_escrow(escrow_id, payout_entry(&escrow), commission_entry(&escrow), now)
            .await
            .map_err(|e| {
                tracing::warn!(escrow_id = %escrow_id, error = %e, "escrow release refused");
                e
            })?;

        tracing::info!(
            escrow_id = %escrow_id,
            payout_id = %outcome.payout.id,
            commission_id = %outcome.commission.id,
            project_id = %outcome.project.id,
            "escrow released"
        );
        self.notifications
            .send(MarketplaceEvent::EscrowReleased {
                escrow_id,
                freelancer_id: outcome.escrow.freelancer_id,
                amount: outcome.payout.amount.clone(),
            })
            .await;

        Ok(outcome)
    }

    pub async fn dispute(&self, escrow_id: Uuid, actor: &Actor, now: DateTime<Utc>) -> Result<Escrow, ServiceError> {
        let escrow = self.get(escrow_id, actor).await?;
        escrow.status.transition(EscrowStatus::Disputed)?;

        let escrow = self.store.dispute_escrow(escrow_id, now).await?;
        tracing::info!(escrow_id = %escrow_id, raised_by = %actor.id, "escrow disputed");
        Ok(escrow)
    }
}
