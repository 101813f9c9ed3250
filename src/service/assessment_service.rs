// service/assessment_service.rs
use std::{
    collections::{BTreeSet, HashMap},
    sync::Arc,
};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    db::Store,
    models::{
        scoremodel::{ProviderScore, ScoreAggregator},
        skillmodel::{
            normalize_key, AssessmentAttempt, AssessmentRef, AttemptStatus, GradedAnswer, GradedAttempt,
            NewAssessment, QuestionType, QuestionWithOptions, Skill, SkillAssessment, UserSkill,
        },
        usermodel::{Actor, UserRole},
    },
    service::{
        error::ServiceError,
        notification_service::{MarketplaceEvent, NotificationService},
    },
};

/// Outcome of grading one set of answers.
#[derive(Debug, Clone)]
pub struct Grade {
    pub answers: Vec<GradedAnswer>,
    pub correct: i32,
    pub total: i32,
    pub percentage: f64,
}

fn round_percentage(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Grades `answers` (question id to selected option indexes) against the
/// active questions. Unanswered questions and out-of-range indexes are wrong.
pub fn grade(questions: &[QuestionWithOptions], answers: &HashMap<Uuid, Vec<usize>>) -> Grade {
    let mut graded = Vec::with_capacity(questions.len());
    let mut correct = 0;

    for entry in questions {
        let question = &entry.question;
        let selected: BTreeSet<usize> = answers
            .get(&question.id)
            .map(|picks| picks.iter().copied().collect())
            .unwrap_or_default();
        let in_range = selected.iter().all(|&i| i < entry.options.len());
        let expected: BTreeSet<usize> = entry
            .options
            .iter()
            .enumerate()
            .filter(|(_, option)| option.is_correct)
            .map(|(i, _)| i)
            .collect();

        let is_correct = in_range
            && !selected.is_empty()
            && selected == expected
            && match question.question_type {
                QuestionType::Single | QuestionType::TrueFalse => selected.len() == 1,
                QuestionType::Multiple => true,
            };
        if is_correct {
            correct += 1;
        }

        graded.push(GradedAnswer {
            question_id: question.id,
            selected_option_ids: selected
                .iter()
                .filter_map(|&i| entry.options.get(i).map(|o| o.id))
                .collect(),
            is_correct,
            points_earned: if is_correct { question.points } else { 0 },
        });
    }

    let total = questions.len() as i32;
    let percentage = if total == 0 {
        0.0
    } else {
        round_percentage(f64::from(correct) * 100.0 / f64::from(total))
    };

    Grade {
        answers: graded,
        correct,
        total,
        percentage,
    }
}

/// Checks an assessment definition before it is stored.
pub fn validate_definition(definition: &NewAssessment) -> Result<(), ServiceError> {
    if definition.title.trim().is_empty() {
        return Err(ServiceError::Validation("Assessment title is required".to_string()));
    }
    if !(0.0..=100.0).contains(&definition.passing_score) {
        return Err(ServiceError::Validation(
            "Passing score must be between 0 and 100".to_string(),
        ));
    }
    if definition.time_limit <= 0 {
        return Err(ServiceError::Validation("Time limit must be positive".to_string()));
    }
    if definition.questions.is_empty() {
        return Err(ServiceError::Validation("An assessment needs at least one question".to_string()));
    }

    for (n, question) in definition.questions.iter().enumerate() {
        let number = n + 1;
        if question.question_text.trim().is_empty() {
            return Err(ServiceError::Validation(format!("Question {} has no text", number)));
        }
        if question.points <= 0 {
            return Err(ServiceError::Validation(format!("Question {} must be worth points", number)));
        }
        if question.options.len() < 2 {
            return Err(ServiceError::Validation(format!(
                "Question {} needs at least two options",
                number
            )));
        }
        let correct = question.options.iter().filter(|o| o.is_correct).count();
        if correct == 0 {
            return Err(ServiceError::Validation(format!(
                "Question {} has no correct option",
                number
            )));
        }
        match question.question_type {
            QuestionType::Single | QuestionType::TrueFalse if correct != 1 => {
                return Err(ServiceError::Validation(format!(
                    "Question {} must have exactly one correct option",
                    number
                )));
            }
            QuestionType::TrueFalse if question.options.len() != 2 => {
                return Err(ServiceError::Validation(format!(
                    "Question {} must have exactly two options",
                    number
                )));
            }
            _ => {}
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize)]
pub struct OptionView {
    pub index: usize,
    pub option_text: String,
}

/// A question as shown to someone taking the assessment.
#[derive(Debug, Clone, Serialize)]
pub struct QuestionView {
    pub id: Uuid,
    pub question_text: String,
    pub question_type: QuestionType,
    pub points: i32,
    pub options: Vec<OptionView>,
}

impl From<&QuestionWithOptions> for QuestionView {
    fn from(entry: &QuestionWithOptions) -> Self {
        Self {
            id: entry.question.id,
            question_text: entry.question.question_text.clone(),
            question_type: entry.question.question_type,
            points: entry.question.points,
            options: entry
                .options
                .iter()
                .enumerate()
                .map(|(index, option)| OptionView {
                    index,
                    option_text: option.option_text.clone(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AssessmentSession {
    pub attempt_id: Uuid,
    pub assessment_id: Uuid,
    pub title: String,
    pub time_limit: i32,
    pub started_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub questions: Vec<QuestionView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssessmentResult {
    pub attempt_id: Uuid,
    pub score: f64,
    pub correct: i32,
    pub total: i32,
    pub passed: bool,
    pub passing_score: f64,
    pub skill_name: String,
    pub score_updated: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkillHistory {
    pub skills: Vec<UserSkill>,
    pub provider_score: ProviderScore,
}

#[derive(Clone)]
pub struct AssessmentService {
    store: Arc<dyn Store>,
    notifications: NotificationService,
    aggregator: Arc<dyn ScoreAggregator>,
}

impl AssessmentService {
    pub fn new(store: Arc<dyn Store>, notifications: NotificationService, aggregator: Arc<dyn ScoreAggregator>) -> Self {
        Self {
            store,
            notifications,
            aggregator,
        }
    }

    fn require_admin(actor: &Actor) -> Result<(), ServiceError> {
        if actor.role != UserRole::Admin {
            return Err(ServiceError::RoleRequired(UserRole::Admin));
        }
        Ok(())
    }

    async fn find(&self, reference: &AssessmentRef) -> Result<SkillAssessment, ServiceError> {
        self.store
            .find_assessment(reference)
            .await?
            .filter(|a| a.is_active)
            .ok_or_else(|| ServiceError::AssessmentNotFound(reference.to_string()))
    }

    async fn active_questions(&self, assessment: &SkillAssessment) -> Result<Vec<QuestionWithOptions>, ServiceError> {
        let questions = self.store.get_active_questions(assessment.id).await?;
        if questions.is_empty() {
            return Err(ServiceError::Validation(format!(
                "Assessment {} has no active questions",
                assessment.title
            )));
        }
        Ok(questions)
    }

    pub async fn create_skill(
        &self,
        actor: &Actor,
        name: String,
        category: String,
        description: String,
        now: DateTime<Utc>,
    ) -> Result<Skill, ServiceError> {
        Self::require_admin(actor)?;
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(ServiceError::Validation("Skill name is required".to_string()));
        }

        let skill = self
            .store
            .create_skill(name, category.trim().to_string(), description, now)
            .await?;
        tracing::info!(skill_id = %skill.id, name = %skill.name, "skill added to catalog");
        Ok(skill)
    }

    pub async fn create_assessment(
        &self,
        actor: &Actor,
        mut definition: NewAssessment,
        now: DateTime<Utc>,
    ) -> Result<SkillAssessment, ServiceError> {
        Self::require_admin(actor)?;
        validate_definition(&definition)?;
        self.store
            .get_skill(definition.skill_id)
            .await?
            .ok_or(ServiceError::SkillNotFound(definition.skill_id))?;

        definition.title = definition.title.trim().to_string();
        definition.key = definition
            .key
            .as_deref()
            .map(normalize_key)
            .filter(|key| !key.is_empty());

        let assessment = self.store.create_assessment(definition, now).await?;
        tracing::info!(
            assessment_id = %assessment.id,
            skill_id = %assessment.skill_id,
            questions = assessment.total_questions,
            "assessment created"
        );
        Ok(assessment)
    }

    /// Opens or resumes the actor's attempt and returns the questions with
    /// correctness withheld.
    pub async fn get_questions(
        &self,
        reference: &AssessmentRef,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<AssessmentSession, ServiceError> {
        let assessment = self.find(reference).await?;
        let questions = self.active_questions(&assessment).await?;

        if let Some(open) = self.store.find_open_attempt(actor.id, assessment.id).await? {
            if open.is_expired(assessment.time_limit, now) {
                self.store.close_attempt(open.id, AttemptStatus::TimedOut, now).await?;
                tracing::info!(attempt_id = %open.id, "stale attempt timed out");
            }
        }
        let attempt = self.store.open_attempt(actor.id, assessment.id, now).await?;
        tracing::debug!(attempt_id = %attempt.id, assessment_id = %assessment.id, user_id = %actor.id, "attempt open");

        Ok(AssessmentSession {
            attempt_id: attempt.id,
            assessment_id: assessment.id,
            title: assessment.title,
            time_limit: assessment.time_limit,
            started_at: attempt.started_at,
            expires_at: attempt.started_at + Duration::minutes(i64::from(assessment.time_limit)),
            questions: questions.iter().map(QuestionView::from).collect(),
        })
    }

    pub async fn submit(
        &self,
        reference: &AssessmentRef,
        actor: &Actor,
        answers: HashMap<Uuid, Vec<usize>>,
        now: DateTime<Utc>,
    ) -> Result<AssessmentResult, ServiceError> {
        let assessment = self.find(reference).await?;
        let attempt = self
            .store
            .find_open_attempt(actor.id, assessment.id)
            .await?
            .ok_or(ServiceError::NoAttemptInProgress(assessment.id))?;

        if attempt.is_expired(assessment.time_limit, now) {
            self.store.close_attempt(attempt.id, AttemptStatus::TimedOut, now).await?;
            tracing::warn!(attempt_id = %attempt.id, user_id = %actor.id, "attempt submitted after its time limit");
            return Err(ServiceError::AttemptTimedOut {
                attempt_id: attempt.id,
                time_limit: assessment.time_limit,
            });
        }

        let questions = self.active_questions(&assessment).await?;
        let skill = self
            .store
            .get_skill(assessment.skill_id)
            .await?
            .ok_or(ServiceError::SkillNotFound(assessment.skill_id))?;

        let grade = grade(&questions, &answers);
        let passed = grade.percentage >= assessment.passing_score;
        let graded = GradedAttempt {
            attempt_id: attempt.id,
            user_id: actor.id,
            assessment_id: assessment.id,
            skill_id: skill.id,
            answers: grade.answers,
            correct: grade.correct,
            total: grade.total,
            percentage: grade.percentage,
            passed,
            completed_at: now,
            time_taken: now.signed_duration_since(attempt.started_at).num_seconds() as i32,
        };

        let recorded = self
            .store
            .record_graded_attempt(graded, self.aggregator.as_ref())
            .await
            .map_err(|e| {
                tracing::warn!(attempt_id = %attempt.id, error = %e, "graded attempt not recorded");
                e
            })?;

        tracing::info!(
            attempt_id = %attempt.id,
            user_id = %actor.id,
            percentage = grade.percentage,
            passed,
            score_updated = recorded.score_updated,
            "assessment graded"
        );
        if let Some(history) = &recorded.score_history {
            tracing::info!(
                user_id = %actor.id,
                old_score = history.old_score,
                new_score = history.new_score,
                "provider score updated"
            );
        }
        if recorded.newly_certified {
            self.notifications
                .send(MarketplaceEvent::SkillCertified {
                    user_id: actor.id,
                    skill_id: skill.id,
                    score: grade.percentage,
                })
                .await;
        }

        Ok(AssessmentResult {
            attempt_id: attempt.id,
            score: grade.percentage,
            correct: grade.correct,
            total: grade.total,
            passed,
            passing_score: assessment.passing_score,
            skill_name: skill.name,
            score_updated: recorded.score_updated,
        })
    }

    pub async fn abandon(
        &self,
        reference: &AssessmentRef,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<AssessmentAttempt, ServiceError> {
        let assessment = self.find(reference).await?;
        let attempt = self
            .store
            .find_open_attempt(actor.id, assessment.id)
            .await?
            .ok_or(ServiceError::NoAttemptInProgress(assessment.id))?;

        let attempt = self.store.close_attempt(attempt.id, AttemptStatus::Abandoned, now).await?;
        tracing::info!(attempt_id = %attempt.id, user_id = %actor.id, "attempt abandoned");
        Ok(attempt)
    }

    pub async fn history(&self, actor: &Actor, now: DateTime<Utc>) -> Result<SkillHistory, ServiceError> {
        let skills = self.store.list_user_skills(actor.id).await?;
        let provider_score = self
            .store
            .get_provider_score(actor.id)
            .await?
            .unwrap_or_else(|| ProviderScore::new(actor.id, now));
        Ok(SkillHistory { skills, provider_score })
    }
}
