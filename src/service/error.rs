use axum::http::StatusCode;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    error::{ErrorMessage, HttpError},
    models::{
        projectmodel::ProjectStatus, proposalmodel::ProposalStatus, transition::TransitionError,
        usermodel::UserRole,
    },
};

/// The caller-visible category of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Permission,
    State,
    NotFound,
    Timeout,
    Internal,
}

impl ErrorKind {
    pub fn to_str(&self) -> &str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Permission => "permission",
            ErrorKind::State => "state",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Internal => "internal",
        }
    }
}

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Project {0} not found")]
    ProjectNotFound(Uuid),

    #[error("Proposal {0} not found")]
    ProposalNotFound(Uuid),

    #[error("Escrow {0} not found")]
    EscrowNotFound(Uuid),

    #[error("No escrow exists for project {0}")]
    ProjectEscrowNotFound(Uuid),

    #[error("Assessment {0} not found")]
    AssessmentNotFound(String),

    #[error("Skill {0} not found")]
    SkillNotFound(Uuid),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("User {0} is not authorized to perform this action on project {1}")]
    UnauthorizedProjectAccess(Uuid, Uuid),

    #[error("User {0} is not authorized to perform this action on proposal {1}")]
    UnauthorizedProposalAccess(Uuid, Uuid),

    #[error("User {0} is not authorized to perform this action on escrow {1}")]
    UnauthorizedEscrowAccess(Uuid, Uuid),

    #[error("This action requires the {} role", .0.to_str())]
    RoleRequired(UserRole),

    #[error("Project {0} is not in status {1:?}")]
    InvalidProjectStatus(Uuid, ProjectStatus),

    #[error("Proposal {0} is not in status {1:?}")]
    InvalidProposalStatus(Uuid, ProposalStatus),

    #[error("Invalid state transition: {0}")]
    InvalidTransition(#[from] TransitionError),

    #[error("An escrow already exists for project {0}")]
    EscrowAlreadyExists(Uuid),

    #[error("No attempt in progress for assessment {0}")]
    NoAttemptInProgress(Uuid),

    #[error("Conflicting update: {0}")]
    StateConflict(String),

    #[error("Attempt {attempt_id} exceeded the {time_limit} minute time limit")]
    AttemptTimedOut { attempt_id: Uuid, time_limit: i32 },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Other error: {0}")]
    Other(String),
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::ProjectNotFound(_)
            | ServiceError::ProposalNotFound(_)
            | ServiceError::EscrowNotFound(_)
            | ServiceError::ProjectEscrowNotFound(_)
            | ServiceError::AssessmentNotFound(_)
            | ServiceError::SkillNotFound(_) => ErrorKind::NotFound,

            ServiceError::Validation(_) => ErrorKind::Validation,

            ServiceError::UnauthorizedProjectAccess(_, _)
            | ServiceError::UnauthorizedProposalAccess(_, _)
            | ServiceError::UnauthorizedEscrowAccess(_, _)
            | ServiceError::RoleRequired(_) => ErrorKind::Permission,

            ServiceError::InvalidProjectStatus(_, _)
            | ServiceError::InvalidProposalStatus(_, _)
            | ServiceError::InvalidTransition(_)
            | ServiceError::EscrowAlreadyExists(_)
            | ServiceError::NoAttemptInProgress(_)
            | ServiceError::StateConflict(_) => ErrorKind::State,

            ServiceError::AttemptTimedOut { .. } => ErrorKind::Timeout,

            ServiceError::Database(_) | ServiceError::Other(_) => ErrorKind::Internal,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Permission => StatusCode::FORBIDDEN,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::State => StatusCode::CONFLICT,
            ErrorKind::Timeout => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ServiceError> for HttpError {
    fn from(error: ServiceError) -> Self {
        let kind = error.kind();
        let status = error.status_code();
        match kind {
            // Storage detail stays in the logs.
            ErrorKind::Internal => {
                tracing::error!(error = %error, "service call failed");
                HttpError::server_error(ErrorMessage::ServerError.to_string()).with_kind(kind.to_str())
            }
            _ => HttpError::new(error.to_string(), status).with_kind(kind.to_str()),
        }
    }
}

impl From<String> for ServiceError {
    fn from(err: String) -> Self {
        ServiceError::Other(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_kind_maps_to_its_status() {
        let id = Uuid::new_v4();
        let cases = [
            (ServiceError::Validation("bad".into()), StatusCode::BAD_REQUEST),
            (ServiceError::UnauthorizedProjectAccess(id, id), StatusCode::FORBIDDEN),
            (ServiceError::ProposalNotFound(id), StatusCode::NOT_FOUND),
            (ServiceError::EscrowAlreadyExists(id), StatusCode::CONFLICT),
            (
                ServiceError::AttemptTimedOut { attempt_id: id, time_limit: 30 },
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (ServiceError::Other("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (error, status) in cases {
            assert_eq!(error.status_code(), status);
        }
    }

    #[test]
    fn test_transition_errors_are_state_errors() {
        let error: ServiceError = TransitionError::new("escrow", "pending", "released").into();
        assert_eq!(error.kind(), ErrorKind::State);
        assert_eq!(
            error.to_string(),
            "Invalid state transition: escrow cannot move from pending to released"
        );
    }

    #[test]
    fn test_internal_errors_hide_detail() {
        let http: HttpError = ServiceError::Other("connection reset".into()).into();
        assert_eq!(http.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!http.message.contains("connection reset"));
        assert_eq!(http.kind.as_deref(), Some("internal"));
    }
}
