// service/project_service.rs
use std::sync::Arc;

use bigdecimal::Zero;
use chrono::{DateTime, Duration, Utc};
use sqlx::types::BigDecimal;
use uuid::Uuid;

use crate::{
    db::Store,
    models::{
        projectmodel::{NewProject, Project, ProjectStatus},
        usermodel::Actor,
    },
    service::error::ServiceError,
    utils::money::round2,
};

/// Owns every project status change. Other engines move projects only
/// through the store operations they share with this one.
#[derive(Clone)]
pub struct ProjectService {
    store: Arc<dyn Store>,
    view_window: Duration,
}

impl ProjectService {
    pub fn new(store: Arc<dyn Store>, view_window_minutes: i64) -> Self {
        Self {
            store,
            view_window: Duration::minutes(view_window_minutes),
        }
    }

    pub async fn get_project(&self, project_id: Uuid) -> Result<Project, ServiceError> {
        self.store
            .get_project(project_id)
            .await?
            .ok_or(ServiceError::ProjectNotFound(project_id))
    }

    async fn owned_project(&self, project_id: Uuid, actor: &Actor) -> Result<Project, ServiceError> {
        let project = self.get_project(project_id).await?;
        if !project.is_owned_by(actor.id) {
            return Err(ServiceError::UnauthorizedProjectAccess(actor.id, project_id));
        }
        Ok(project)
    }

    pub async fn create(&self, actor: &Actor, mut draft: NewProject, now: DateTime<Utc>) -> Result<Project, ServiceError> {
        draft.client_id = actor.id;
        draft.title = draft.title.trim().to_string();
        draft.description = draft.description.trim().to_string();
        draft.budget_min = round2(&draft.budget_min);
        draft.budget_max = round2(&draft.budget_max);

        if draft.title.is_empty() || draft.description.is_empty() {
            return Err(ServiceError::Validation(
                "Title and description are required".to_string(),
            ));
        }
        if draft.budget_min < BigDecimal::zero() || draft.budget_max < BigDecimal::zero() {
            return Err(ServiceError::Validation("Budget cannot be negative".to_string()));
        }
        if draft.budget_min > draft.budget_max {
            return Err(ServiceError::Validation(
                "Minimum budget cannot exceed maximum budget".to_string(),
            ));
        }

        let project = self.store.create_project(draft, now).await?;
        tracing::info!(project_id = %project.id, client_id = %actor.id, "project drafted");
        Ok(project)
    }

    pub async fn publish(&self, project_id: Uuid, actor: &Actor, now: DateTime<Utc>) -> Result<Project, ServiceError> {
        // Every publish precondition, ownership included, is a validation failure.
        let project = self.get_project(project_id).await?;
        if !project.is_owned_by(actor.id) {
            return Err(ServiceError::Validation(
                "Only the project owner can publish it".to_string(),
            ));
        }
        if project.status != ProjectStatus::Draft {
            return Err(ServiceError::Validation(
                "Only draft projects can be published".to_string(),
            ));
        }

        let missing = project.missing_publish_fields();
        if !missing.is_empty() {
            return Err(ServiceError::Validation(format!(
                "Missing required fields: {}",
                missing.join(", ")
            )));
        }
        if project.budget_max <= BigDecimal::zero() {
            return Err(ServiceError::Validation("A budget is required".to_string()));
        }
        if project.budget_min > project.budget_max {
            return Err(ServiceError::Validation(
                "Minimum budget cannot exceed maximum budget".to_string(),
            ));
        }
        if project.deadline.map_or(true, |deadline| deadline <= now) {
            return Err(ServiceError::Validation(
                "Deadline must be in the future".to_string(),
            ));
        }

        let project = self
            .store
            .update_project_status(project_id, ProjectStatus::Draft, ProjectStatus::Published, Some(now), now)
            .await?;
        tracing::info!(project_id = %project_id, "project published");
        Ok(project)
    }

    pub async fn unpublish(&self, project_id: Uuid, actor: &Actor, now: DateTime<Utc>) -> Result<Project, ServiceError> {
        self.owned_project(project_id, actor).await?;
        let project = self.store.unpublish_project(project_id, now).await?;
        tracing::info!(project_id = %project_id, "project returned to draft");
        Ok(project)
    }

    pub async fn hold(&self, project_id: Uuid, actor: &Actor, now: DateTime<Utc>) -> Result<Project, ServiceError> {
        self.owned_project(project_id, actor).await?;
        let project = self
            .store
            .update_project_status(project_id, ProjectStatus::InProgress, ProjectStatus::OnHold, None, now)
            .await?;
        tracing::info!(project_id = %project_id, "project put on hold");
        Ok(project)
    }

    pub async fn resume(&self, project_id: Uuid, actor: &Actor, now: DateTime<Utc>) -> Result<Project, ServiceError> {
        self.owned_project(project_id, actor).await?;
        let project = self
            .store
            .update_project_status(project_id, ProjectStatus::OnHold, ProjectStatus::InProgress, None, now)
            .await?;
        tracing::info!(project_id = %project_id, "project resumed");
        Ok(project)
    }

    /// Returns the cancelled project and how many pending proposals expired.
    pub async fn cancel(&self, project_id: Uuid, actor: &Actor, now: DateTime<Utc>) -> Result<(Project, u64), ServiceError> {
        let project = self.owned_project(project_id, actor).await?;
        project.status.transition(ProjectStatus::Cancelled)?;

        let (project, expired) = self.store.cancel_project(project_id, now).await?;
        tracing::info!(project_id = %project_id, expired, "project cancelled");
        Ok((project, expired))
    }

    pub async fn delete(&self, project_id: Uuid, actor: &Actor) -> Result<(), ServiceError> {
        let project = self.owned_project(project_id, actor).await?;
        if project.status == ProjectStatus::InProgress {
            return Err(ServiceError::StateConflict(
                "Cannot delete a project that is in progress".to_string(),
            ));
        }

        self.store.delete_project(project_id).await?;
        tracing::info!(project_id = %project_id, "project deleted");
        Ok(())
    }

    /// Counts a view once per viewer within the configured window. Returns the
    /// project as it stands after the view.
    pub async fn record_view(
        &self,
        project_id: Uuid,
        viewer: Option<&Actor>,
        viewer_key: &str,
        now: DateTime<Utc>,
    ) -> Result<(Project, bool), ServiceError> {
        let viewer_id = viewer.map(|actor| actor.id);
        let counted = self
            .store
            .record_project_view(project_id, viewer_id, viewer_key, now - self.view_window, now)
            .await?;

        if counted {
            tracing::debug!(project_id = %project_id, viewer_key, "project view recorded");
        }
        let project = self.get_project(project_id).await?;
        Ok((project, counted))
    }
}
