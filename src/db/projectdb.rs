// db/projectdb.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::db::DBClient;
use crate::{
    models::{
        paymentmodel::EscrowStatus,
        projectmodel::{NewProject, Project, ProjectStatus},
        proposalmodel::ProposalStatus,
    },
    service::error::ServiceError,
};

#[async_trait]
pub trait ProjectExt {
    async fn create_project(&self, project: NewProject, now: DateTime<Utc>) -> Result<Project, ServiceError>;

    async fn get_project(&self, project_id: Uuid) -> Result<Option<Project>, ServiceError>;

    /// Moves a project that is still in `from` to `to`. `published_at` is only
    /// written when supplied.
    async fn update_project_status(
        &self,
        project_id: Uuid,
        from: ProjectStatus,
        to: ProjectStatus,
        published_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<Project, ServiceError>;

    /// published -> draft, refused while any proposal on the project is accepted.
    async fn unpublish_project(&self, project_id: Uuid, now: DateTime<Utc>) -> Result<Project, ServiceError>;

    /// Cancels the project and expires its pending proposals. Returns the
    /// number of proposals expired.
    async fn cancel_project(&self, project_id: Uuid, now: DateTime<Utc>) -> Result<(Project, u64), ServiceError>;

    async fn delete_project(&self, project_id: Uuid) -> Result<(), ServiceError>;

    /// Records a view unless the same viewer was seen since `window_start`.
    /// Returns whether the view counted.
    async fn record_project_view(
        &self,
        project_id: Uuid,
        viewer_id: Option<Uuid>,
        viewer_key: &str,
        window_start: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool, ServiceError>;
}

pub(crate) async fn lock_project(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    project_id: Uuid,
) -> Result<Project, ServiceError> {
    sqlx::query_as::<_, Project>("SELECT * FROM projects WHERE id = $1 FOR UPDATE")
        .bind(project_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(ServiceError::ProjectNotFound(project_id))
}

pub(crate) async fn set_project_status(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    project_id: Uuid,
    status: ProjectStatus,
    published_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<Project, ServiceError> {
    let project = sqlx::query_as::<_, Project>(
        r#"
        UPDATE projects
        SET status = $2, published_at = COALESCE($3, published_at), updated_at = $4
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(project_id)
    .bind(status)
    .bind(published_at)
    .bind(now)
    .fetch_one(&mut **tx)
    .await?;

    Ok(project)
}

#[async_trait]
impl ProjectExt for DBClient {
    async fn create_project(&self, project: NewProject, now: DateTime<Utc>) -> Result<Project, ServiceError> {
        let project = sqlx::query_as::<_, Project>(
            r#"
            INSERT INTO projects (
                id, client_id, title, description, category_id, budget_min, budget_max,
                budget_currency, deadline, priority, location, is_remote, status,
                views_count, proposals_count, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, 'draft', 0, 0, $13, $13)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(project.client_id)
        .bind(project.title)
        .bind(project.description)
        .bind(project.category_id)
        .bind(project.budget_min)
        .bind(project.budget_max)
        .bind(project.budget_currency)
        .bind(project.deadline)
        .bind(project.priority)
        .bind(project.location)
        .bind(project.is_remote)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(project)
    }

    async fn get_project(&self, project_id: Uuid) -> Result<Option<Project>, ServiceError> {
        let project = sqlx::query_as::<_, Project>("SELECT * FROM projects WHERE id = $1")
            .bind(project_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(project)
    }

    async fn update_project_status(
        &self,
        project_id: Uuid,
        from: ProjectStatus,
        to: ProjectStatus,
        published_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<Project, ServiceError> {
        let mut tx = self.pool.begin().await?;

        let project = lock_project(&mut tx, project_id).await?;
        if project.status != from {
            return Err(ServiceError::InvalidProjectStatus(project_id, from));
        }
        let to = project.status.transition(to)?;

        let project = set_project_status(&mut tx, project_id, to, published_at, now).await?;
        tx.commit().await?;

        Ok(project)
    }

    async fn unpublish_project(&self, project_id: Uuid, now: DateTime<Utc>) -> Result<Project, ServiceError> {
        let mut tx = self.pool.begin().await?;

        let project = lock_project(&mut tx, project_id).await?;
        if project.status != ProjectStatus::Published {
            return Err(ServiceError::InvalidProjectStatus(project_id, ProjectStatus::Published));
        }

        let accepted: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM proposals WHERE project_id = $1 AND status = $2",
        )
        .bind(project_id)
        .bind(ProposalStatus::Accepted)
        .fetch_one(&mut *tx)
        .await?;

        if accepted > 0 {
            return Err(ServiceError::StateConflict(format!(
                "project {} has an accepted proposal and cannot be unpublished",
                project_id
            )));
        }

        let to = project.status.transition(ProjectStatus::Draft)?;
        let project = set_project_status(&mut tx, project_id, to, None, now).await?;
        tx.commit().await?;

        Ok(project)
    }

    async fn cancel_project(&self, project_id: Uuid, now: DateTime<Utc>) -> Result<(Project, u64), ServiceError> {
        let mut tx = self.pool.begin().await?;

        let project = lock_project(&mut tx, project_id).await?;
        let to = project.status.transition(ProjectStatus::Cancelled)?;

        let held: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM escrows WHERE project_id = $1 AND status IN ($2, $3, $4)",
        )
        .bind(project_id)
        .bind(EscrowStatus::Funded)
        .bind(EscrowStatus::InProgress)
        .bind(EscrowStatus::Disputed)
        .fetch_one(&mut *tx)
        .await?;

        if held > 0 {
            return Err(ServiceError::StateConflict(format!(
                "project {} has funds held in escrow",
                project_id
            )));
        }

        let expired = sqlx::query(
            r#"
            UPDATE proposals
            SET status = $2, responded_at = $3, updated_at = $3
            WHERE project_id = $1 AND status = $4
            "#,
        )
        .bind(project_id)
        .bind(ProposalStatus::Expired)
        .bind(now)
        .bind(ProposalStatus::Pending)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let project = set_project_status(&mut tx, project_id, to, None, now).await?;
        tx.commit().await?;

        Ok((project, expired))
    }

    async fn delete_project(&self, project_id: Uuid) -> Result<(), ServiceError> {
        let mut tx = self.pool.begin().await?;

        let project = lock_project(&mut tx, project_id).await?;
        if project.status == ProjectStatus::InProgress {
            return Err(ServiceError::StateConflict(format!(
                "project {} is in progress and cannot be deleted",
                project_id
            )));
        }

        let escrow_status: Option<EscrowStatus> =
            sqlx::query_scalar("SELECT status FROM escrows WHERE project_id = $1 FOR UPDATE")
                .bind(project_id)
                .fetch_optional(&mut *tx)
                .await?;
        check_escrow_allows_delete(project_id, escrow_status)?;

        // An unfunded escrow carries no money and goes with the project.
        sqlx::query("DELETE FROM escrows WHERE project_id = $1 AND status = $2")
            .bind(project_id)
            .bind(EscrowStatus::Pending)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(project_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn record_project_view(
        &self,
        project_id: Uuid,
        viewer_id: Option<Uuid>,
        viewer_key: &str,
        window_start: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool, ServiceError> {
        let mut tx = self.pool.begin().await?;

        // Serialises concurrent views of the same project.
        lock_project(&mut tx, project_id).await?;

        let seen: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM project_views
            WHERE project_id = $1
              AND viewed_at >= $2
              AND (viewer_key = $3 OR ($4::uuid IS NOT NULL AND viewer_id = $4))
            "#,
        )
        .bind(project_id)
        .bind(window_start)
        .bind(viewer_key)
        .bind(viewer_id)
        .fetch_one(&mut *tx)
        .await?;

        if seen > 0 {
            return Ok(false);
        }

        sqlx::query(
            "INSERT INTO project_views (id, project_id, viewer_id, viewer_key, viewed_at) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(Uuid::new_v4())
        .bind(project_id)
        .bind(viewer_id)
        .bind(viewer_key)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE projects SET views_count = views_count + 1 WHERE id = $1")
            .bind(project_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }
}

/// Held or settled escrows keep their project; only an unfunded one may be
/// removed alongside it.
pub(crate) fn check_escrow_allows_delete(
    project_id: Uuid,
    escrow_status: Option<EscrowStatus>,
) -> Result<(), ServiceError> {
    match escrow_status {
        None | Some(EscrowStatus::Pending) => Ok(()),
        Some(status) if status.holds_funds() => Err(ServiceError::StateConflict(format!(
            "project {} has funds held in escrow and cannot be deleted",
            project_id
        ))),
        Some(status) => Err(ServiceError::StateConflict(format!(
            "project {} has a {} escrow and cannot be deleted",
            project_id,
            status.to_str()
        ))),
    }
}
