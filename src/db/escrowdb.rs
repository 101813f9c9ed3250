// db/escrowdb.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{
    db::DBClient,
    ledgerdb::insert_entry,
    projectdb::{lock_project, set_project_status},
};
use crate::{
    models::{
        paymentmodel::{Escrow, EscrowStatus, FundOutcome, NewEscrow, NewLedgerEntry, ReleaseOutcome},
        projectmodel::ProjectStatus,
        proposalmodel::ProposalStatus,
    },
    service::error::ServiceError,
};

#[async_trait]
pub trait EscrowExt {
    async fn create_escrow(&self, escrow: NewEscrow, now: DateTime<Utc>) -> Result<Escrow, ServiceError>;

    async fn get_escrow(&self, escrow_id: Uuid) -> Result<Option<Escrow>, ServiceError>;

    async fn get_escrow_by_project(&self, project_id: Uuid) -> Result<Option<Escrow>, ServiceError>;

    /// pending -> funded plus the client's hold entry.
    async fn fund_escrow(
        &self,
        escrow_id: Uuid,
        hold: NewLedgerEntry,
        now: DateTime<Utc>,
    ) -> Result<FundOutcome, ServiceError>;

    /// funded -> released, both payout entries and the project completion in
    /// one transaction.
    async fn release_escrow(
        &self,
        escrow_id: Uuid,
        payout: NewLedgerEntry,
        commission: NewLedgerEntry,
        now: DateTime<Utc>,
    ) -> Result<ReleaseOutcome, ServiceError>;

    async fn dispute_escrow(&self, escrow_id: Uuid, now: DateTime<Utc>) -> Result<Escrow, ServiceError>;
}

async fn lock_escrow(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    escrow_id: Uuid,
) -> Result<Escrow, ServiceError> {
    sqlx::query_as::<_, Escrow>("SELECT * FROM escrows WHERE id = $1 FOR UPDATE")
        .bind(escrow_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(ServiceError::EscrowNotFound(escrow_id))
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

#[async_trait]
impl EscrowExt for DBClient {
    async fn create_escrow(&self, escrow: NewEscrow, now: DateTime<Utc>) -> Result<Escrow, ServiceError> {
        let mut tx = self.pool.begin().await?;

        let project = lock_project(&mut tx, escrow.project_id).await?;

        let proposal_status: Option<ProposalStatus> = sqlx::query_scalar(
            "SELECT status FROM proposals WHERE id = $1 AND project_id = $2",
        )
        .bind(escrow.proposal_id)
        .bind(escrow.project_id)
        .fetch_optional(&mut *tx)
        .await?;

        match proposal_status {
            None => return Err(ServiceError::ProposalNotFound(escrow.proposal_id)),
            Some(ProposalStatus::Accepted) => {}
            Some(_) => {
                return Err(ServiceError::InvalidProposalStatus(
                    escrow.proposal_id,
                    ProposalStatus::Accepted,
                ))
            }
        }
        if !project.status.accepts_escrow() {
            return Err(ServiceError::InvalidProjectStatus(project.id, ProjectStatus::InProgress));
        }

        let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM escrows WHERE project_id = $1")
            .bind(escrow.project_id)
            .fetch_one(&mut *tx)
            .await?;
        if existing > 0 {
            return Err(ServiceError::EscrowAlreadyExists(escrow.project_id));
        }

        let project_id = escrow.project_id;
        let created = sqlx::query_as::<_, Escrow>(
            r#"
            INSERT INTO escrows (
                id, project_id, proposal_id, client_id, freelancer_id, amount, currency,
                platform_fee, freelancer_amount, status, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(escrow.project_id)
        .bind(escrow.proposal_id)
        .bind(escrow.client_id)
        .bind(escrow.freelancer_id)
        .bind(escrow.amount)
        .bind(escrow.currency)
        .bind(escrow.platform_fee)
        .bind(escrow.freelancer_amount)
        .bind(EscrowStatus::Pending)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                ServiceError::EscrowAlreadyExists(project_id)
            } else {
                ServiceError::Database(e)
            }
        })?;

        tx.commit().await?;
        Ok(created)
    }

    async fn get_escrow(&self, escrow_id: Uuid) -> Result<Option<Escrow>, ServiceError> {
        let escrow = sqlx::query_as::<_, Escrow>("SELECT * FROM escrows WHERE id = $1")
            .bind(escrow_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(escrow)
    }

    async fn get_escrow_by_project(&self, project_id: Uuid) -> Result<Option<Escrow>, ServiceError> {
        let escrow = sqlx::query_as::<_, Escrow>("SELECT * FROM escrows WHERE project_id = $1")
            .bind(project_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(escrow)
    }

    async fn fund_escrow(
        &self,
        escrow_id: Uuid,
        hold: NewLedgerEntry,
        now: DateTime<Utc>,
    ) -> Result<FundOutcome, ServiceError> {
        let project_id = sqlx::query_scalar::<_, Uuid>("SELECT project_id FROM escrows WHERE id = $1")
            .bind(escrow_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(ServiceError::EscrowNotFound(escrow_id))?;

        let mut tx = self.pool.begin().await?;

        // Project before escrow, the same order release takes.
        let project = lock_project(&mut tx, project_id).await?;
        let escrow = lock_escrow(&mut tx, escrow_id).await?;

        let status = escrow.status.transition(EscrowStatus::Funded)?;
        if !project.status.accepts_escrow() {
            return Err(ServiceError::InvalidProjectStatus(project_id, ProjectStatus::InProgress));
        }

        let escrow = sqlx::query_as::<_, Escrow>(
            "UPDATE escrows SET status = $2, funded_at = $3, updated_at = $3 WHERE id = $1 RETURNING *",
        )
        .bind(escrow_id)
        .bind(status)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        let hold = insert_entry(&mut tx, hold, now).await?;

        tx.commit().await?;
        Ok(FundOutcome { escrow, hold })
    }

    async fn release_escrow(
        &self,
        escrow_id: Uuid,
        payout: NewLedgerEntry,
        commission: NewLedgerEntry,
        now: DateTime<Utc>,
    ) -> Result<ReleaseOutcome, ServiceError> {
        let project_id = sqlx::query_scalar::<_, Uuid>("SELECT project_id FROM escrows WHERE id = $1")
            .bind(escrow_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(ServiceError::EscrowNotFound(escrow_id))?;

        let mut tx = self.pool.begin().await?;

        let project = lock_project(&mut tx, project_id).await?;
        let escrow = lock_escrow(&mut tx, escrow_id).await?;

        let escrow_status = escrow.status.transition(EscrowStatus::Released)?;
        if project.status != ProjectStatus::InProgress {
            return Err(ServiceError::InvalidProjectStatus(project_id, ProjectStatus::InProgress));
        }
        let project_status = project.status.transition(ProjectStatus::Completed)?;

        let escrow = sqlx::query_as::<_, Escrow>(
            "UPDATE escrows SET status = $2, released_at = $3, updated_at = $3 WHERE id = $1 RETURNING *",
        )
        .bind(escrow_id)
        .bind(escrow_status)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        let payout = insert_entry(&mut tx, payout, now).await?;
        let commission = insert_entry(&mut tx, commission, now).await?;
        let project = set_project_status(&mut tx, project_id, project_status, None, now).await?;

        tx.commit().await?;

        Ok(ReleaseOutcome {
            escrow,
            payout,
            commission,
            project,
        })
    }

    async fn dispute_escrow(&self, escrow_id: Uuid, now: DateTime<Utc>) -> Result<Escrow, ServiceError> {
        let mut tx = self.pool.begin().await?;

        let escrow = lock_escrow(&mut tx, escrow_id).await?;
        let status = escrow.status.transition(EscrowStatus::Disputed)?;

        let escrow = sqlx::query_as::<_, Escrow>(
            "UPDATE escrows SET status = $2, disputed_at = $3, updated_at = $3 WHERE id = $1 RETURNING *",
        )
        .bind(escrow_id)
        .bind(status)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(escrow)
    }
}
