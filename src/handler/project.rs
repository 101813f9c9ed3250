use std::sync::Arc;

use axum::{
    extract::Path,
    http::HeaderMap,
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dtos::{
        projectdtos::{CancelProjectResponseDto, CreateProjectDto, ProjectViewResponseDto},
        ApiResponse,
    },
    error::HttpError,
    middleware::JWTAuthMiddeware,
    AppState,
};

pub fn project_handler() -> Router {
    Router::new()
        .route("/", post(create_project))
        .route("/:project_id", get(get_project).delete(delete_project))
        .route("/:project_id/publish", post(publish_project))
        .route("/:project_id/unpublish", post(unpublish_project))
        .route("/:project_id/hold", post(hold_project))
        .route("/:project_id/resume", post(resume_project))
        .route("/:project_id/cancel", post(cancel_project))
        .route("/:project_id/views", post(record_project_view))
        .route("/:project_id/proposals", get(crate::handler::proposal::get_project_proposals))
        .route("/:project_id/escrow", get(crate::handler::escrow::get_project_escrow))
}

pub async fn create_project(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Json(body): Json<CreateProjectDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let draft = body
        .into_new_project(auth.actor.id)
        .map_err(HttpError::bad_request)?;

    let project = app_state.projects.create(&auth.actor, draft, Utc::now()).await?;

    Ok(Json(ApiResponse::success("Project created as draft", project)))
}

pub async fn get_project(
    Extension(app_state): Extension<Arc<AppState>>,
    Path(project_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let project = app_state.projects.get_project(project_id).await?;
    Ok(Json(ApiResponse::success("Project retrieved", project)))
}

pub async fn publish_project(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(project_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let project = app_state.projects.publish(project_id, &auth.actor, Utc::now()).await?;
    Ok(Json(ApiResponse::success("Project published", project)))
}

pub async fn unpublish_project(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(project_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let project = app_state.projects.unpublish(project_id, &auth.actor, Utc::now()).await?;
    Ok(Json(ApiResponse::success("Project moved back to draft", project)))
}

pub async fn hold_project(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(project_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let project = app_state.projects.hold(project_id, &auth.actor, Utc::now()).await?;
    Ok(Json(ApiResponse::success("Project put on hold", project)))
}

pub async fn resume_project(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(project_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let project = app_state.projects.resume(project_id, &auth.actor, Utc::now()).await?;
    Ok(Json(ApiResponse::success("Project resumed", project)))
}

pub async fn cancel_project(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(project_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let (project, expired_proposals) = app_state
        .projects
        .cancel(project_id, &auth.actor, Utc::now())
        .await?;

    Ok(Json(ApiResponse::success(
        "Project cancelled",
        CancelProjectResponseDto {
            project,
            expired_proposals,
        },
    )))
}

pub async fn delete_project(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(project_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    app_state.projects.delete(project_id, &auth.actor).await?;
    Ok(Json(ApiResponse::success("Project deleted", project_id)))
}

pub async fn record_project_view(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(project_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, HttpError> {
    let viewer_key = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|value| value.trim().to_string())
        .unwrap_or_else(|| auth.actor.id.to_string());

    let (project, counted) = app_state
        .projects
        .record_view(project_id, Some(&auth.actor), &viewer_key, Utc::now())
        .await?;

    Ok(Json(ApiResponse::success(
        "View recorded",
        ProjectViewResponseDto {
            project_id: project.id,
            status: project.status,
            views_count: project.views_count,
            counted,
        },
    )))
}
