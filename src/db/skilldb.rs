// db/skilldb.rs
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{db::DBClient, scoredb::apply_assessment_result_tx};
use crate::{
    models::{
        scoremodel::ScoreAggregator,
        skillmodel::*,
    },
    service::error::ServiceError,
};

#[async_trait]
pub trait AssessmentExt {
    async fn create_skill(
        &self,
        name: String,
        category: String,
        description: String,
        now: DateTime<Utc>,
    ) -> Result<Skill, ServiceError>;

    async fn get_skill(&self, skill_id: Uuid) -> Result<Option<Skill>, ServiceError>;

    /// Stores the assessment with its questions and options.
    async fn create_assessment(&self, assessment: NewAssessment, now: DateTime<Utc>) -> Result<SkillAssessment, ServiceError>;

    async fn find_assessment(&self, reference: &AssessmentRef) -> Result<Option<SkillAssessment>, ServiceError>;

    /// Active questions in display order, each with its ordered options.
    async fn get_active_questions(&self, assessment_id: Uuid) -> Result<Vec<QuestionWithOptions>, ServiceError>;

    async fn find_open_attempt(&self, user_id: Uuid, assessment_id: Uuid) -> Result<Option<AssessmentAttempt>, ServiceError>;

    /// Returns the user's in-progress attempt, starting one if none is open.
    async fn open_attempt(&self, user_id: Uuid, assessment_id: Uuid, now: DateTime<Utc>) -> Result<AssessmentAttempt, ServiceError>;

    /// Ends an in-progress attempt without grading it.
    async fn close_attempt(
        &self,
        attempt_id: Uuid,
        status: AttemptStatus,
        now: DateTime<Utc>,
    ) -> Result<AssessmentAttempt, ServiceError>;

    /// Persists a graded attempt, its answers, the ratcheted user skill and
    /// the reputation update as one unit.
    async fn record_graded_attempt(
        &self,
        graded: GradedAttempt,
        aggregator: &dyn ScoreAggregator,
    ) -> Result<RecordedAttempt, ServiceError>;

    async fn list_user_skills(&self, user_id: Uuid) -> Result<Vec<UserSkill>, ServiceError>;
}

#[async_trait]
impl AssessmentExt for DBClient {
    async fn create_skill(
        &self,
        name: String,
        category: String,
        description: String,
        now: DateTime<Utc>,
    ) -> Result<Skill, ServiceError> {
        let skill = sqlx::query_as::<_, Skill>(
            r#"
            INSERT INTO skills (id, name, category, description, is_verified, created_at)
            VALUES ($1, $2, $3, $4, false, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(category)
        .bind(description)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(skill)
    }

    async fn get_skill(&self, skill_id: Uuid) -> Result<Option<Skill>, ServiceError> {
        let skill = sqlx::query_as::<_, Skill>("SELECT * FROM skills WHERE id = $1")
            .bind(skill_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(skill)
    }

    async fn create_assessment(&self, assessment: NewAssessment, now: DateTime<Utc>) -> Result<SkillAssessment, ServiceError> {
        let mut tx = self.pool.begin().await?;

        let key = assessment.key.clone();
        let created = sqlx::query_as::<_, SkillAssessment>(
            r#"
            INSERT INTO skill_assessments (
                id, skill_id, key, title, description, passing_score, total_questions,
                time_limit, is_active, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, true, $9, $9)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(assessment.skill_id)
        .bind(assessment.key)
        .bind(assessment.title)
        .bind(assessment.description)
        .bind(assessment.passing_score)
        .bind(assessment.questions.len() as i32)
        .bind(assessment.time_limit)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => ServiceError::Validation(
                format!("An assessment with key {} already exists", key.unwrap_or_default()),
            ),
            other => ServiceError::Database(other),
        })?;

        for (position, question) in assessment.questions.into_iter().enumerate() {
            let question_id = Uuid::new_v4();
            sqlx::query(
                r#"
                INSERT INTO assessment_questions (
                    id, assessment_id, question_text, question_type, points, explanation, position, is_active
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, true)
                "#,
            )
            .bind(question_id)
            .bind(created.id)
            .bind(question.question_text)
            .bind(question.question_type)
            .bind(question.points)
            .bind(question.explanation)
            .bind(position as i32)
            .execute(&mut *tx)
            .await?;

            for (option_position, option) in question.options.into_iter().enumerate() {
                sqlx::query(
                    r#"
                    INSERT INTO question_options (id, question_id, option_text, is_correct, position)
                    VALUES ($1, $2, $3, $4, $5)
                    "#,
                )
                .bind(Uuid::new_v4())
                .bind(question_id)
                .bind(option.option_text)
                .bind(option.is_correct)
                .bind(option_position as i32)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(created)
    }

    async fn find_assessment(&self, reference: &AssessmentRef) -> Result<Option<SkillAssessment>, ServiceError> {
        let assessment = match reference {
            AssessmentRef::ById(id) => {
                sqlx::query_as::<_, SkillAssessment>("SELECT * FROM skill_assessments WHERE id = $1")
                    .bind(*id)
                    .fetch_optional(&self.pool)
                    .await?
            }
            AssessmentRef::ByKey(key) => {
                sqlx::query_as::<_, SkillAssessment>("SELECT * FROM skill_assessments WHERE key = $1")
                    .bind(key)
                    .fetch_optional(&self.pool)
                    .await?
            }
        };

        Ok(assessment)
    }

    async fn get_active_questions(&self, assessment_id: Uuid) -> Result<Vec<QuestionWithOptions>, ServiceError> {
        let questions = sqlx::query_as::<_, AssessmentQuestion>(
            r#"
            SELECT * FROM assessment_questions
            WHERE assessment_id = $1 AND is_active = true
            ORDER BY position, id
            "#,
        )
        .bind(assessment_id)
        .fetch_all(&self.pool)
        .await?;

        let question_ids: Vec<Uuid> = questions.iter().map(|q| q.id).collect();
        let options = sqlx::query_as::<_, QuestionOption>(
            "SELECT * FROM question_options WHERE question_id = ANY($1) ORDER BY position, id",
        )
        .bind(&question_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_question: HashMap<Uuid, Vec<QuestionOption>> = HashMap::new();
        for option in options {
            by_question.entry(option.question_id).or_default().push(option);
        }

        Ok(questions
            .into_iter()
            .map(|question| {
                let options = by_question.remove(&question.id).unwrap_or_default();
                QuestionWithOptions { question, options }
            })
            .collect())
    }

    async fn find_open_attempt(&self, user_id: Uuid, assessment_id: Uuid) -> Result<Option<AssessmentAttempt>, ServiceError> {
        let attempt = sqlx::query_as::<_, AssessmentAttempt>(
            r#"
            SELECT * FROM assessment_attempts
            WHERE user_id = $1 AND assessment_id = $2 AND status = $3
            "#,
        )
        .bind(user_id)
        .bind(assessment_id)
        .bind(AttemptStatus::InProgress)
        .fetch_optional(&self.pool)
        .await?;

        Ok(attempt)
    }

    async fn open_attempt(&self, user_id: Uuid, assessment_id: Uuid, now: DateTime<Utc>) -> Result<AssessmentAttempt, ServiceError> {
        // A partial unique index keeps at most one in-progress attempt per
        // (user, assessment); a concurrent opener falls through to the select.
        sqlx::query(
            r#"
            INSERT INTO assessment_attempts (id, user_id, assessment_id, passed, status, started_at)
            VALUES ($1, $2, $3, false, $4, $5)
            ON CONFLICT (user_id, assessment_id) WHERE status = 'in_progress' DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(assessment_id)
        .bind(AttemptStatus::InProgress)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.find_open_attempt(user_id, assessment_id)
            .await?
            .ok_or_else(|| ServiceError::StateConflict("attempt closed while it was being opened".to_string()))
    }

    async fn close_attempt(
        &self,
        attempt_id: Uuid,
        status: AttemptStatus,
        now: DateTime<Utc>,
    ) -> Result<AssessmentAttempt, ServiceError> {
        let attempt = sqlx::query_as::<_, AssessmentAttempt>(
            r#"
            UPDATE assessment_attempts
            SET status = $2, completed_at = $3,
                time_taken = EXTRACT(EPOCH FROM ($3 - started_at))::int
            WHERE id = $1 AND status = $4
            RETURNING *
            "#,
        )
        .bind(attempt_id)
        .bind(status)
        .bind(now)
        .bind(AttemptStatus::InProgress)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ServiceError::StateConflict(format!("attempt {} is no longer in progress", attempt_id)))?;

        Ok(attempt)
    }

    async fn record_graded_attempt(
        &self,
        graded: GradedAttempt,
        aggregator: &dyn ScoreAggregator,
    ) -> Result<RecordedAttempt, ServiceError> {
        let now = graded.completed_at;
        let mut tx = self.pool.begin().await?;

        // Claiming the attempt row serialises double submits of one attempt.
        let attempt = sqlx::query_as::<_, AssessmentAttempt>(
            r#"
            UPDATE assessment_attempts
            SET status = $2, score = $3, percentage = $4, passed = $5, completed_at = $6, time_taken = $7
            WHERE id = $1 AND status = $8
            RETURNING *
            "#,
        )
        .bind(graded.attempt_id)
        .bind(AttemptStatus::Completed)
        .bind(graded.correct)
        .bind(graded.percentage)
        .bind(graded.passed)
        .bind(now)
        .bind(graded.time_taken)
        .bind(AttemptStatus::InProgress)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| {
            ServiceError::StateConflict(format!("attempt {} is no longer in progress", graded.attempt_id))
        })?;

        for answer in &graded.answers {
            sqlx::query(
                r#"
                INSERT INTO attempt_answers (
                    id, attempt_id, question_id, selected_option_ids, is_correct, points_earned, answered_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(graded.attempt_id)
            .bind(answer.question_id)
            .bind(&answer.selected_option_ids)
            .bind(answer.is_correct)
            .bind(answer.points_earned)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        let select_skill = r#"
            SELECT * FROM user_skills WHERE user_id = $1 AND skill_id = $2 FOR UPDATE
        "#;

        let mut existing = sqlx::query_as::<_, UserSkill>(select_skill)
            .bind(graded.user_id)
            .bind(graded.skill_id)
            .fetch_optional(&mut *tx)
            .await?;

        let mut inserted = None;
        if existing.is_none() {
            let first = UserSkill::ratchet(None, graded.user_id, graded.skill_id, graded.percentage, graded.passed, now);
            let row = &first.user_skill;
            inserted = sqlx::query_as::<_, UserSkill>(
                r#"
                INSERT INTO user_skills (
                    id, user_id, skill_id, level, is_certified, assessment_score,
                    last_assessment_date, created_at, updated_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
                ON CONFLICT (user_id, skill_id) DO NOTHING
                RETURNING *
                "#,
            )
            .bind(row.id)
            .bind(row.user_id)
            .bind(row.skill_id)
            .bind(row.level)
            .bind(row.is_certified)
            .bind(row.assessment_score)
            .bind(row.last_assessment_date)
            .bind(now)
            .fetch_optional(&mut *tx)
            .await?
            .map(|user_skill| RatchetOutcome { user_skill, ..first });

            if inserted.is_none() {
                // Lost the insert race; ratchet against the winner's row.
                existing = sqlx::query_as::<_, UserSkill>(select_skill)
                    .bind(graded.user_id)
                    .bind(graded.skill_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            }
        }

        let was_certified = existing.as_ref().map_or(false, |row| row.is_certified);
        let outcome = match inserted {
            Some(outcome) => outcome,
            None => {
                let outcome = UserSkill::ratchet(existing, graded.user_id, graded.skill_id, graded.percentage, graded.passed, now);
                if outcome.changed {
                    let row = &outcome.user_skill;
                    let user_skill = sqlx::query_as::<_, UserSkill>(
                        r#"
                        UPDATE user_skills
                        SET assessment_score = $2, last_assessment_date = $3, is_certified = $4, updated_at = $5
                        WHERE id = $1
                        RETURNING *
                        "#,
                    )
                    .bind(row.id)
                    .bind(row.assessment_score)
                    .bind(row.last_assessment_date)
                    .bind(row.is_certified)
                    .bind(now)
                    .fetch_one(&mut *tx)
                    .await?;
                    RatchetOutcome { user_skill, ..outcome }
                } else {
                    outcome
                }
            }
        };

        let (provider_score, score_history) = if outcome.feeds_reputation(graded.passed) {
            let (score, history) = apply_assessment_result_tx(
                &mut tx,
                graded.user_id,
                graded.percentage,
                graded.passed,
                Some(graded.attempt_id),
                aggregator,
                now,
            )
            .await?;
            (Some(score), Some(history))
        } else {
            (None, None)
        };

        tx.commit().await?;

        Ok(RecordedAttempt {
            attempt,
            score_updated: outcome.score_updated(graded.passed),
            newly_certified: !was_certified && outcome.user_skill.is_certified,
            user_skill: outcome.user_skill,
            provider_score,
            score_history,
        })
    }

    async fn list_user_skills(&self, user_id: Uuid) -> Result<Vec<UserSkill>, ServiceError> {
        let skills = sqlx::query_as::<_, UserSkill>(
            r#"
            SELECT * FROM user_skills
            WHERE user_id = $1 AND assessment_score IS NOT NULL
            ORDER BY assessment_score DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(skills)
    }
}
