use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{
    models::projectmodel::{NewProject, Project, ProjectPriority, ProjectStatus},
    utils::money::amount_from_f64,
};

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateProjectDto {
    #[validate(length(min = 1, max = 200, message = "Title must be between 1 and 200 characters"))]
    pub title: String,

    #[validate(length(min = 1, max = 5000, message = "Description must be between 1 and 5000 characters"))]
    pub description: String,

    pub category_id: Option<Uuid>,

    #[validate(range(min = 0.0, message = "Minimum budget cannot be negative"))]
    pub budget_min: f64,

    #[validate(range(min = 0.0, message = "Maximum budget cannot be negative"))]
    pub budget_max: f64,

    #[validate(length(equal = 3, message = "Currency must be a 3 letter code"))]
    pub budget_currency: Option<String>,

    pub deadline: Option<DateTime<Utc>>,
    pub priority: Option<ProjectPriority>,
    pub location: Option<String>,
    pub is_remote: Option<bool>,
}

impl CreateProjectDto {
    pub fn into_new_project(self, client_id: Uuid) -> Result<NewProject, String> {
        Ok(NewProject {
            client_id,
            title: self.title,
            description: self.description,
            category_id: self.category_id,
            budget_min: amount_from_f64(self.budget_min)?,
            budget_max: amount_from_f64(self.budget_max)?,
            budget_currency: self
                .budget_currency
                .map(|c| c.to_uppercase())
                .unwrap_or_else(|| "USD".to_string()),
            deadline: self.deadline,
            priority: self.priority.unwrap_or(ProjectPriority::Medium),
            location: self.location.unwrap_or_default(),
            is_remote: self.is_remote.unwrap_or(true),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct CancelProjectResponseDto {
    pub project: Project,
    pub expired_proposals: u64,
}

#[derive(Debug, Serialize)]
pub struct ProjectViewResponseDto {
    pub project_id: Uuid,
    pub status: ProjectStatus,
    pub views_count: i32,
    pub counted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dto() -> CreateProjectDto {
        CreateProjectDto {
            title: "Poster design".to_string(),
            description: "A3 poster for the freshers fair".to_string(),
            category_id: None,
            budget_min: 20.0,
            budget_max: 49.999,
            budget_currency: Some("ngn".to_string()),
            deadline: None,
            priority: None,
            location: None,
            is_remote: None,
        }
    }

    #[test]
    fn test_defaults_and_rounding() {
        let project = dto().into_new_project(Uuid::nil()).unwrap();
        assert_eq!(project.budget_max.to_string(), "50.00");
        assert_eq!(project.budget_currency, "NGN");
        assert_eq!(project.priority, ProjectPriority::Medium);
        assert!(project.is_remote);
    }

    #[test]
    fn test_negative_budget_fails_validation() {
        let mut body = dto();
        body.budget_min = -5.0;
        assert!(body.validate().is_err());
    }
}
