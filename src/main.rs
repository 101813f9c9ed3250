mod config;
mod db;
mod dtos;
mod error;
mod handler;
mod middleware;
mod models;
mod routes;
mod service;
mod utils;

use std::sync::Arc;

use axum::http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    HeaderValue, Method,
};
use config::Config;
use db::{db::DBClient, Store};
use dotenv::dotenv;
use routes::create_router;
use service::{
    assessment_service::AssessmentService, escrow_service::EscrowService, ledger_service::LedgerService,
    notification_service::NotificationService, project_service::ProjectService,
    proposal_service::ProposalService, reputation_service::ReputationService,
};
use models::scoremodel::ClampedSum;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing_subscriber::filter::LevelFilter;
use utils::money::rate_from_f64;

#[derive(Clone)]
pub struct AppState {
    pub env: Config,
    pub projects: ProjectService,
    pub proposals: ProposalService,
    pub escrows: EscrowService,
    pub ledger: LedgerService,
    pub assessments: AssessmentService,
    pub reputation: ReputationService,
}

impl AppState {
    pub fn new(env: Config, store: Arc<dyn Store>, notifications: NotificationService) -> Result<Self, String> {
        let commission_rate = rate_from_f64(env.commission_rate)?;
        let price_ceiling = rate_from_f64(env.proposal_price_ceiling)?;

        Ok(AppState {
            projects: ProjectService::new(store.clone(), env.view_window_minutes),
            proposals: ProposalService::new(store.clone(), notifications.clone(), price_ceiling),
            escrows: EscrowService::new(store.clone(), notifications.clone(), commission_rate),
            ledger: LedgerService::new(store.clone()),
            assessments: AssessmentService::new(store.clone(), notifications, Arc::new(ClampedSum)),
            reputation: ReputationService::new(store),
            env,
        })
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_max_level(LevelFilter::DEBUG)
        .init();

    dotenv().ok();

    let config = match Config::init() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "invalid configuration");
            std::process::exit(1);
        }
    };

    let pool = match PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
    {
        Ok(pool) => {
            tracing::info!("connection to the database is successful");
            pool
        }
        Err(err) => {
            tracing::error!(error = %err, "failed to connect to the database");
            std::process::exit(1);
        }
    };

    let db_client = DBClient::new(pool);
    if let Err(err) = db_client.run_migrations().await {
        tracing::error!(error = %err, "failed to apply migrations");
        std::process::exit(1);
    }

    let app_state = match AppState::new(config.clone(), Arc::new(db_client), NotificationService::tracing()) {
        Ok(state) => state,
        Err(err) => {
            tracing::error!(error = %err, "invalid marketplace settings");
            std::process::exit(1);
        }
    };

    let allowed_origins = vec![
        HeaderValue::from_static("http://localhost:5173"),
        HeaderValue::from_static("http://localhost:8000"),
    ];

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed_origins))
        .allow_headers([AUTHORIZATION, ACCEPT, CONTENT_TYPE])
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::DELETE]);

    let app = create_router(Arc::new(app_state)).layer(cors);

    let listener = match tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(error = %err, port = config.port, "could not bind listener");
            std::process::exit(1);
        }
    };

    tracing::info!("server is running on http://localhost:{}", config.port);
    if let Err(err) = axum::serve(listener, app).await {
        tracing::error!(error = %err, "server stopped");
    }
}
