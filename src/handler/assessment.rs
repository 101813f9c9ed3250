use std::sync::Arc;

use axum::{
    extract::Path,
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::Utc;
use validator::Validate;

use crate::{
    dtos::{
        assessmentdtos::{CreateAssessmentDto, CreateSkillDto, ReputationResponseDto, SubmitAssessmentDto},
        ApiResponse,
    },
    error::HttpError,
    middleware::JWTAuthMiddeware,
    models::skillmodel::AssessmentRef,
    AppState,
};

pub fn assessment_handler() -> Router {
    Router::new()
        .route("/", post(create_assessment))
        .route("/history", get(get_assessment_history))
        .route("/:assessment_ref/questions", get(get_assessment_questions))
        .route("/:assessment_ref/submit", post(submit_assessment))
        .route("/:assessment_ref/abandon", post(abandon_assessment))
}

pub async fn create_skill(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Json(body): Json<CreateSkillDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let skill = app_state
        .assessments
        .create_skill(&auth.actor, body.name, body.category, body.description, Utc::now())
        .await?;
    Ok(Json(ApiResponse::success("Skill created", skill)))
}

pub async fn create_assessment(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Json(body): Json<CreateAssessmentDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let assessment = app_state
        .assessments
        .create_assessment(&auth.actor, body.into(), Utc::now())
        .await?;
    Ok(Json(ApiResponse::success("Assessment created", assessment)))
}

pub async fn get_assessment_questions(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(assessment_ref): Path<String>,
) -> Result<impl IntoResponse, HttpError> {
    let reference = AssessmentRef::parse(&assessment_ref);
    let session = app_state
        .assessments
        .get_questions(&reference, &auth.actor, Utc::now())
        .await?;
    Ok(Json(ApiResponse::success("Assessment started", session)))
}

pub async fn submit_assessment(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(assessment_ref): Path<String>,
    Json(body): Json<SubmitAssessmentDto>,
) -> Result<impl IntoResponse, HttpError> {
    let reference = AssessmentRef::parse(&assessment_ref);
    let result = app_state
        .assessments
        .submit(&reference, &auth.actor, body.answers, Utc::now())
        .await?;

    let message = if result.passed {
        "Congratulations! You passed the assessment"
    } else {
        "Assessment completed"
    };
    Ok(Json(ApiResponse::success(message, result)))
}

pub async fn abandon_assessment(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(assessment_ref): Path<String>,
) -> Result<impl IntoResponse, HttpError> {
    let reference = AssessmentRef::parse(&assessment_ref);
    let attempt = app_state
        .assessments
        .abandon(&reference, &auth.actor, Utc::now())
        .await?;
    Ok(Json(ApiResponse::success("Attempt abandoned", attempt)))
}

pub async fn get_assessment_history(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let history = app_state.assessments.history(&auth.actor, Utc::now()).await?;
    Ok(Json(ApiResponse::success("Assessment history retrieved", history)))
}

pub async fn get_reputation(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let score = app_state.reputation.get(auth.actor.id, Utc::now()).await?;
    let history = app_state.reputation.history(auth.actor.id).await?;
    Ok(Json(ApiResponse::success(
        "Reputation retrieved",
        ReputationResponseDto { score, history },
    )))
}
