use std::sync::Arc;

use axum::{
    extract::Path,
    response::IntoResponse,
    routing::{delete, get, post},
    Extension, Json, Router,
};
use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dtos::{
        proposaldtos::{AcceptProposalResponseDto, SubmitProposalDto},
        ApiResponse,
    },
    error::HttpError,
    middleware::JWTAuthMiddeware,
    AppState,
};

pub fn proposal_handler() -> Router {
    Router::new()
        .route("/", post(submit_proposal))
        .route("/mine", get(get_my_proposals))
        .route("/:proposal_id", delete(delete_proposal))
        .route("/:proposal_id/accept", post(accept_proposal))
        .route("/:proposal_id/reject", post(reject_proposal))
        .route("/:proposal_id/withdraw", post(withdraw_proposal))
}

pub async fn submit_proposal(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Json(body): Json<SubmitProposalDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let request = body.into_request().map_err(HttpError::bad_request)?;
    let proposal = app_state.proposals.submit(&auth.actor, request, Utc::now()).await?;

    Ok(Json(ApiResponse::success("Proposal submitted", proposal)))
}

pub async fn get_my_proposals(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let proposals = app_state.proposals.list_mine(&auth.actor).await?;
    Ok(Json(ApiResponse::success("Proposals retrieved", proposals)))
}

pub async fn get_project_proposals(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(project_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let proposals = app_state
        .proposals
        .list_for_project(project_id, &auth.actor)
        .await?;
    Ok(Json(ApiResponse::success("Proposals retrieved", proposals)))
}

pub async fn accept_proposal(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(proposal_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let outcome = app_state
        .proposals
        .accept(proposal_id, &auth.actor, Utc::now())
        .await?;

    Ok(Json(ApiResponse::success(
        "Proposal accepted",
        AcceptProposalResponseDto {
            project_status: outcome.project.status,
            rejected_count: outcome.rejected_count,
            proposal: outcome.proposal,
        },
    )))
}

pub async fn reject_proposal(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(proposal_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let proposal = app_state
        .proposals
        .reject(proposal_id, &auth.actor, Utc::now())
        .await?;
    Ok(Json(ApiResponse::success("Proposal rejected", proposal)))
}

pub async fn withdraw_proposal(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(proposal_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let proposal = app_state
        .proposals
        .withdraw(proposal_id, &auth.actor, Utc::now())
        .await?;
    Ok(Json(ApiResponse::success("Proposal withdrawn", proposal)))
}

pub async fn delete_proposal(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(proposal_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    app_state.proposals.delete(proposal_id, &auth.actor).await?;
    Ok(Json(ApiResponse::success("Proposal deleted", proposal_id)))
}
