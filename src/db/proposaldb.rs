// db/proposaldb.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use uuid::Uuid;

use super::{
    db::DBClient,
    projectdb::{lock_project, set_project_status},
};
use crate::{
    models::{
        projectmodel::ProjectStatus,
        proposalmodel::{AcceptOutcome, NewProposal, Proposal, ProposalStatus},
    },
    service::error::ServiceError,
};

#[async_trait]
pub trait ProposalExt {
    /// Inserts a pending proposal and bumps the project's proposal count.
    async fn create_proposal(&self, proposal: NewProposal, now: DateTime<Utc>) -> Result<Proposal, ServiceError>;

    async fn get_proposal(&self, proposal_id: Uuid) -> Result<Option<Proposal>, ServiceError>;

    async fn list_project_proposals(&self, project_id: Uuid) -> Result<Vec<Proposal>, ServiceError>;

    async fn list_freelancer_proposals(&self, freelancer_id: Uuid) -> Result<Vec<Proposal>, ServiceError>;

    /// Accepts the proposal, rejects every other pending sibling and moves the
    /// project into progress, all in one transaction.
    async fn accept_proposal(&self, proposal_id: Uuid, now: DateTime<Utc>) -> Result<AcceptOutcome, ServiceError>;

    async fn reject_proposal(&self, proposal_id: Uuid, now: DateTime<Utc>) -> Result<Proposal, ServiceError>;

    async fn withdraw_proposal(&self, proposal_id: Uuid, now: DateTime<Utc>) -> Result<Proposal, ServiceError>;

    async fn delete_proposal(&self, proposal_id: Uuid) -> Result<(), ServiceError>;
}

async fn lock_proposal(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    proposal_id: Uuid,
) -> Result<Proposal, ServiceError> {
    sqlx::query_as::<_, Proposal>("SELECT * FROM proposals WHERE id = $1 FOR UPDATE")
        .bind(proposal_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(ServiceError::ProposalNotFound(proposal_id))
}

async fn set_proposal_status(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    proposal_id: Uuid,
    status: ProposalStatus,
    now: DateTime<Utc>,
) -> Result<Proposal, ServiceError> {
    let proposal = sqlx::query_as::<_, Proposal>(
        r#"
        UPDATE proposals
        SET status = $2, responded_at = $3, updated_at = $3
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(proposal_id)
    .bind(status)
    .bind(now)
    .fetch_one(&mut **tx)
    .await?;

    Ok(proposal)
}

async fn decrement_proposals_count(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    project_id: Uuid,
) -> Result<(), ServiceError> {
    sqlx::query("UPDATE projects SET proposals_count = GREATEST(proposals_count - 1, 0) WHERE id = $1")
        .bind(project_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

impl DBClient {
    async fn project_id_of(&self, proposal_id: Uuid) -> Result<Uuid, ServiceError> {
        sqlx::query_scalar::<_, Uuid>("SELECT project_id FROM proposals WHERE id = $1")
            .bind(proposal_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(ServiceError::ProposalNotFound(proposal_id))
    }
}

#[async_trait]
impl ProposalExt for DBClient {
    async fn create_proposal(&self, proposal: NewProposal, now: DateTime<Utc>) -> Result<Proposal, ServiceError> {
        let mut tx = self.pool.begin().await?;

        let project = lock_project(&mut tx, proposal.project_id).await?;
        if project.status != ProjectStatus::Published {
            return Err(ServiceError::Validation(
                "Project is not open for proposals".to_string(),
            ));
        }

        let existing: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM proposals WHERE project_id = $1 AND freelancer_id = $2",
        )
        .bind(proposal.project_id)
        .bind(proposal.freelancer_id)
        .fetch_one(&mut *tx)
        .await?;

        if existing > 0 {
            return Err(ServiceError::Validation(
                "You have already submitted a proposal for this project".to_string(),
            ));
        }

        let created = sqlx::query_as::<_, Proposal>(
            r#"
            INSERT INTO proposals (
                id, project_id, freelancer_id, cover_letter, proposed_price, proposed_timeline,
                currency, status, milestones, created_at, updated_at, submitted_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'pending', $8, $9, $9, $9)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(proposal.project_id)
        .bind(proposal.freelancer_id)
        .bind(proposal.cover_letter)
        .bind(proposal.proposed_price)
        .bind(proposal.proposed_timeline)
        .bind(proposal.currency)
        .bind(Json(proposal.milestones))
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE projects SET proposals_count = proposals_count + 1 WHERE id = $1")
            .bind(proposal.project_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(created)
    }

    async fn get_proposal(&self, proposal_id: Uuid) -> Result<Option<Proposal>, ServiceError> {
        let proposal = sqlx::query_as::<_, Proposal>("SELECT * FROM proposals WHERE id = $1")
            .bind(proposal_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(proposal)
    }

    async fn list_project_proposals(&self, project_id: Uuid) -> Result<Vec<Proposal>, ServiceError> {
        let proposals = sqlx::query_as::<_, Proposal>(
            "SELECT * FROM proposals WHERE project_id = $1 ORDER BY created_at DESC",
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(proposals)
    }

    async fn list_freelancer_proposals(&self, freelancer_id: Uuid) -> Result<Vec<Proposal>, ServiceError> {
        let proposals = sqlx::query_as::<_, Proposal>(
            "SELECT * FROM proposals WHERE freelancer_id = $1 ORDER BY created_at DESC",
        )
        .bind(freelancer_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(proposals)
    }

    async fn accept_proposal(&self, proposal_id: Uuid, now: DateTime<Utc>) -> Result<AcceptOutcome, ServiceError> {
        let project_id = self.project_id_of(proposal_id).await?;
        let mut tx = self.pool.begin().await?;

        // Project first, then proposals: the same order every writer uses.
        let project = lock_project(&mut tx, project_id).await?;
        let proposal = lock_proposal(&mut tx, proposal_id).await?;

        if proposal.status != ProposalStatus::Pending {
            return Err(ServiceError::InvalidProposalStatus(proposal_id, ProposalStatus::Pending));
        }
        if project.status != ProjectStatus::Published {
            return Err(ServiceError::InvalidProjectStatus(project_id, ProjectStatus::Published));
        }

        let accepted_status = proposal.status.transition(ProposalStatus::Accepted)?;
        let project_status = project.status.transition(ProjectStatus::InProgress)?;

        let proposal = set_proposal_status(&mut tx, proposal_id, accepted_status, now).await?;

        sqlx::query("SELECT id FROM proposals WHERE project_id = $1 AND status = $2 AND id <> $3 FOR UPDATE")
            .bind(project_id)
            .bind(ProposalStatus::Pending)
            .bind(proposal_id)
            .fetch_all(&mut *tx)
            .await?;

        let rejected_count = sqlx::query(
            r#"
            UPDATE proposals
            SET status = $4, responded_at = $5, updated_at = $5
            WHERE project_id = $1 AND status = $2 AND id <> $3
            "#,
        )
        .bind(project_id)
        .bind(ProposalStatus::Pending)
        .bind(proposal_id)
        .bind(ProposalStatus::Rejected)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let project = set_project_status(&mut tx, project_id, project_status, None, now).await?;

        tx.commit().await?;

        Ok(AcceptOutcome {
            proposal,
            project,
            rejected_count,
        })
    }

    async fn reject_proposal(&self, proposal_id: Uuid, now: DateTime<Utc>) -> Result<Proposal, ServiceError> {
        let mut tx = self.pool.begin().await?;

        let proposal = lock_proposal(&mut tx, proposal_id).await?;
        if proposal.status != ProposalStatus::Pending {
            return Err(ServiceError::InvalidProposalStatus(proposal_id, ProposalStatus::Pending));
        }
        let status = proposal.status.transition(ProposalStatus::Rejected)?;

        let proposal = set_proposal_status(&mut tx, proposal_id, status, now).await?;
        tx.commit().await?;

        Ok(proposal)
    }

    async fn withdraw_proposal(&self, proposal_id: Uuid, now: DateTime<Utc>) -> Result<Proposal, ServiceError> {
        let project_id = self.project_id_of(proposal_id).await?;
        let mut tx = self.pool.begin().await?;

        lock_project(&mut tx, project_id).await?;
        let proposal = lock_proposal(&mut tx, proposal_id).await?;
        if proposal.status != ProposalStatus::Pending {
            return Err(ServiceError::InvalidProposalStatus(proposal_id, ProposalStatus::Pending));
        }
        let status = proposal.status.transition(ProposalStatus::Withdrawn)?;

        let proposal = set_proposal_status(&mut tx, proposal_id, status, now).await?;
        decrement_proposals_count(&mut tx, project_id).await?;

        tx.commit().await?;
        Ok(proposal)
    }

    async fn delete_proposal(&self, proposal_id: Uuid) -> Result<(), ServiceError> {
        let project_id = self.project_id_of(proposal_id).await?;
        let mut tx = self.pool.begin().await?;

        lock_project(&mut tx, project_id).await?;
        let proposal = lock_proposal(&mut tx, proposal_id).await?;
        if proposal.status != ProposalStatus::Pending {
            return Err(ServiceError::InvalidProposalStatus(proposal_id, ProposalStatus::Pending));
        }

        sqlx::query("DELETE FROM proposals WHERE id = $1")
            .bind(proposal_id)
            .execute(&mut *tx)
            .await?;
        decrement_proposals_count(&mut tx, project_id).await?;

        tx.commit().await?;
        Ok(())
    }
}
