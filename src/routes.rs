use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Extension, Json, Router,
};
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::{
    handler::{
        assessment::{assessment_handler, create_skill, get_reputation},
        escrow::{escrow_handler, ledger_handler},
        project::project_handler,
        proposal::proposal_handler,
    },
    middleware::auth,
    AppState,
};

async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "message": "Server is running"
    }))
}

pub fn create_router(app_state: Arc<AppState>) -> Router {
    let api_route = Router::new()
        .nest("/projects", project_handler())
        .nest("/proposals", proposal_handler())
        .nest("/escrows", escrow_handler())
        .nest("/ledger", ledger_handler())
        .nest("/assessments", assessment_handler())
        .route("/skills", post(create_skill))
        .route("/reputation", get(get_reputation))
        .layer(middleware::from_fn(auth))
        .layer(TraceLayer::new_for_http())
        .layer(Extension(app_state));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_route)
}
