// service/reputation_service.rs
use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    db::Store,
    models::scoremodel::{ProviderScore, ScoreHistory},
    service::error::ServiceError,
};

/// Read side of provider reputation. Writes happen inside the assessment
/// recording unit so they commit with the attempt.
#[derive(Clone)]
pub struct ReputationService {
    store: Arc<dyn Store>,
}

impl ReputationService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// A provider with no recorded activity reads as a fresh newcomer.
    pub async fn get(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<ProviderScore, ServiceError> {
        Ok(self
            .store
            .get_provider_score(user_id)
            .await?
            .unwrap_or_else(|| ProviderScore::new(user_id, now)))
    }

    pub async fn history(&self, user_id: Uuid) -> Result<Vec<ScoreHistory>, ServiceError> {
        self.store.list_score_history(user_id).await
    }
}
