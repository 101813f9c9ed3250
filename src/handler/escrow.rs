use std::sync::Arc;

use axum::{
    extract::Path,
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::Utc;
use uuid::Uuid;

use crate::{
    dtos::{
        escrowdtos::{CreateEscrowDto, FundEscrowResponseDto, LedgerResponseDto, ReleaseEscrowResponseDto},
        ApiResponse,
    },
    error::HttpError,
    middleware::JWTAuthMiddeware,
    AppState,
};

pub fn escrow_handler() -> Router {
    Router::new()
        .route("/", post(create_escrow))
        .route("/:escrow_id", get(get_escrow))
        .route("/:escrow_id/fund", post(fund_escrow))
        .route("/:escrow_id/release", post(release_escrow))
        .route("/:escrow_id/dispute", post(dispute_escrow))
        .route("/:escrow_id/transactions", get(get_escrow_transactions))
}

pub fn ledger_handler() -> Router {
    Router::new()
        .route("/", get(get_ledger))
        .route("/earnings", get(get_earnings))
}

pub async fn create_escrow(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Json(body): Json<CreateEscrowDto>,
) -> Result<impl IntoResponse, HttpError> {
    let escrow = app_state
        .escrows
        .create(&auth.actor, body.project_id, body.proposal_id, Utc::now())
        .await?;
    Ok(Json(ApiResponse::success("Escrow created", escrow)))
}

pub async fn get_escrow(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(escrow_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let escrow = app_state.escrows.get(escrow_id, &auth.actor).await?;
    Ok(Json(ApiResponse::success("Escrow retrieved", escrow)))
}

pub async fn get_project_escrow(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(project_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let escrow = app_state.escrows.get_for_project(project_id, &auth.actor).await?;
    Ok(Json(ApiResponse::success("Escrow retrieved", escrow)))
}

pub async fn fund_escrow(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(escrow_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let outcome = app_state.escrows.fund(escrow_id, &auth.actor, Utc::now()).await?;
    Ok(Json(ApiResponse::success(
        "Escrow funded",
        FundEscrowResponseDto::from(outcome),
    )))
}

pub async fn release_escrow(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(escrow_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let outcome = app_state.escrows.release(escrow_id, &auth.actor, Utc::now()).await?;
    Ok(Json(ApiResponse::success(
        "Payment released to freelancer",
        ReleaseEscrowResponseDto::from(outcome),
    )))
}

pub async fn dispute_escrow(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(escrow_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let escrow = app_state.escrows.dispute(escrow_id, &auth.actor, Utc::now()).await?;
    Ok(Json(ApiResponse::success("Dispute raised", escrow)))
}

pub async fn get_escrow_transactions(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(escrow_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    // Visibility follows the escrow itself.
    let escrow = app_state.escrows.get(escrow_id, &auth.actor).await?;
    let transactions = app_state.ledger.entries_for_escrow(escrow.id).await?;
    Ok(Json(ApiResponse::success(
        "Transactions retrieved",
        LedgerResponseDto {
            count: transactions.len(),
            transactions,
        },
    )))
}

pub async fn get_ledger(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let transactions = app_state.ledger.entries_for(auth.actor.id).await?;
    Ok(Json(ApiResponse::success(
        "Transactions retrieved",
        LedgerResponseDto {
            count: transactions.len(),
            transactions,
        },
    )))
}

pub async fn get_earnings(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let earnings = app_state
        .ledger
        .provider_earnings(auth.actor.id, Utc::now())
        .await?;
    Ok(Json(ApiResponse::success("Earnings retrieved", earnings)))
}
