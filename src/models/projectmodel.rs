use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::BigDecimal;
use uuid::Uuid;

use super::transition::TransitionError;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "project_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Draft,
    Published,
    InProgress,
    Completed,
    Cancelled,
    OnHold,
}

impl ProjectStatus {
    pub fn to_str(&self) -> &str {
        match self {
            ProjectStatus::Draft => "draft",
            ProjectStatus::Published => "published",
            ProjectStatus::InProgress => "in_progress",
            ProjectStatus::Completed => "completed",
            ProjectStatus::Cancelled => "cancelled",
            ProjectStatus::OnHold => "on_hold",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ProjectStatus::Completed | ProjectStatus::Cancelled)
    }

    /// Escrows are created and funded only while the hired work is live.
    pub fn accepts_escrow(&self) -> bool {
        matches!(self, ProjectStatus::InProgress | ProjectStatus::OnHold)
    }

    fn is_valid_transition(&self, to: ProjectStatus) -> bool {
        use ProjectStatus::*;
        matches!(
            (self, to),
            (Draft, Published)
                | (Published, Draft)
                | (Published, InProgress)
                | (InProgress, Completed)
                | (InProgress, OnHold)
                | (OnHold, InProgress)
                | (Draft, Cancelled)
                | (Published, Cancelled)
                | (InProgress, Cancelled)
                | (OnHold, Cancelled)
        )
    }

    pub fn transition(self, to: ProjectStatus) -> Result<ProjectStatus, TransitionError> {
        if self.is_valid_transition(to) {
            Ok(to)
        } else {
            Err(TransitionError::new("project", self.to_str(), to.to_str()))
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "project_priority", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ProjectPriority {
    Low,
    Medium,
    High,
    Urgent,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Project {
    pub id: Uuid,
    pub client_id: Uuid,
    pub title: String,
    pub description: String,
    pub category_id: Option<Uuid>,
    pub budget_min: BigDecimal,
    pub budget_max: BigDecimal,
    pub budget_currency: String,
    pub deadline: Option<DateTime<Utc>>,
    pub priority: ProjectPriority,
    pub location: String,
    pub is_remote: bool,
    pub status: ProjectStatus,
    pub views_count: i32,
    pub proposals_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
}

impl Project {
    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.client_id == user_id
    }

    /// Fields that must be present before the project can be published.
    pub fn missing_publish_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.title.trim().is_empty() {
            missing.push("title");
        }
        if self.description.trim().is_empty() {
            missing.push("description");
        }
        if self.deadline.is_none() {
            missing.push("deadline");
        }
        missing
    }
}

/// Draft fields supplied by the client when a project is created.
#[derive(Debug, Clone)]
pub struct NewProject {
    pub client_id: Uuid,
    pub title: String,
    pub description: String,
    pub category_id: Option<Uuid>,
    pub budget_min: BigDecimal,
    pub budget_max: BigDecimal,
    pub budget_currency: String,
    pub deadline: Option<DateTime<Utc>>,
    pub priority: ProjectPriority,
    pub location: String,
    pub is_remote: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProjectView {
    pub id: Uuid,
    pub project_id: Uuid,
    pub viewer_id: Option<Uuid>,
    pub viewer_key: String,
    pub viewed_at: DateTime<Utc>,
}
