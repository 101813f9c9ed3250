// db/scoredb.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::db::DBClient;
use crate::{
    models::scoremodel::{ProviderScore, ScoreAggregator, ScoreHistory},
    service::error::ServiceError,
};

#[async_trait]
pub trait ScoreExt {
    async fn get_provider_score(&self, user_id: Uuid) -> Result<Option<ProviderScore>, ServiceError>;

    async fn list_score_history(&self, user_id: Uuid) -> Result<Vec<ScoreHistory>, ServiceError>;
}

/// Folds an attempt into the user's provider score inside `tx`, creating the
/// score row on first use, and appends the matching history row.
pub(crate) async fn apply_assessment_result_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    user_id: Uuid,
    percentage: f64,
    passed: bool,
    reference_id: Option<Uuid>,
    aggregator: &dyn ScoreAggregator,
    now: DateTime<Utc>,
) -> Result<(ProviderScore, ScoreHistory), ServiceError> {
    let fresh = ProviderScore::new(user_id, now);
    sqlx::query(
        r#"
        INSERT INTO provider_scores (
            id, user_id, review_score, assessment_score, completion_score, reliability_score,
            total_score, level, level_title, assessments_passed, assessments_failed,
            average_assessment_score, created_at, updated_at
        )
        VALUES ($1, $2, 0, 0, 0, 0, 0, $3, $4, 0, 0, 0, $5, $5)
        ON CONFLICT (user_id) DO NOTHING
        "#,
    )
    .bind(fresh.id)
    .bind(user_id)
    .bind(fresh.level)
    .bind(&fresh.level_title)
    .bind(now)
    .execute(&mut **tx)
    .await?;

    let mut score = sqlx::query_as::<_, ProviderScore>(
        "SELECT * FROM provider_scores WHERE user_id = $1 FOR UPDATE",
    )
    .bind(user_id)
    .fetch_one(&mut **tx)
    .await?;

    let history = score.apply_assessment_result(percentage, passed, reference_id, aggregator, now);

    let score = sqlx::query_as::<_, ProviderScore>(
        r#"
        UPDATE provider_scores
        SET assessment_score = $2, total_score = $3, level = $4, level_title = $5,
            assessments_passed = $6, assessments_failed = $7,
            average_assessment_score = $8, updated_at = $9
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(score.id)
    .bind(score.assessment_score)
    .bind(score.total_score)
    .bind(score.level)
    .bind(&score.level_title)
    .bind(score.assessments_passed)
    .bind(score.assessments_failed)
    .bind(score.average_assessment_score)
    .bind(now)
    .fetch_one(&mut **tx)
    .await?;

    let history = sqlx::query_as::<_, ScoreHistory>(
        r#"
        INSERT INTO score_history (
            id, user_id, change_type, points_change, old_score, new_score, reference_id, reason, created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING *
        "#,
    )
    .bind(history.id)
    .bind(history.user_id)
    .bind(&history.change_type)
    .bind(history.points_change)
    .bind(history.old_score)
    .bind(history.new_score)
    .bind(history.reference_id)
    .bind(&history.reason)
    .bind(history.created_at)
    .fetch_one(&mut **tx)
    .await?;

    Ok((score, history))
}

#[async_trait]
impl ScoreExt for DBClient {
    async fn get_provider_score(&self, user_id: Uuid) -> Result<Option<ProviderScore>, ServiceError> {
        let score = sqlx::query_as::<_, ProviderScore>("SELECT * FROM provider_scores WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(score)
    }

    async fn list_score_history(&self, user_id: Uuid) -> Result<Vec<ScoreHistory>, ServiceError> {
        let history = sqlx::query_as::<_, ScoreHistory>(
            "SELECT * FROM score_history WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(history)
    }
}
