use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "skill_level", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SkillLevel {
    Beginner,
    Intermediate,
    Advanced,
    Expert,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "question_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    Single,
    Multiple,
    TrueFalse,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "attempt_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    InProgress,
    Completed,
    TimedOut,
    Abandoned,
}

impl AttemptStatus {
    pub fn to_str(&self) -> &str {
        match self {
            AttemptStatus::InProgress => "in_progress",
            AttemptStatus::Completed => "completed",
            AttemptStatus::TimedOut => "timed_out",
            AttemptStatus::Abandoned => "abandoned",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Skill {
    pub id: Uuid,
    pub name: String,
    pub category: String,
    pub description: String,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SkillAssessment {
    pub id: Uuid,
    pub skill_id: Uuid,
    pub key: Option<String>,
    pub title: String,
    pub description: String,
    pub passing_score: f64,
    pub total_questions: i32,
    pub time_limit: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AssessmentQuestion {
    pub id: Uuid,
    pub assessment_id: Uuid,
    pub question_text: String,
    pub question_type: QuestionType,
    pub points: i32,
    pub explanation: String,
    pub position: i32,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct QuestionOption {
    pub id: Uuid,
    pub question_id: Uuid,
    pub option_text: String,
    pub is_correct: bool,
    pub position: i32,
}

/// A question together with its options in display order.
#[derive(Debug, Clone)]
pub struct QuestionWithOptions {
    pub question: AssessmentQuestion,
    pub options: Vec<QuestionOption>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AssessmentAttempt {
    pub id: Uuid,
    pub user_id: Uuid,
    pub assessment_id: Uuid,
    pub score: Option<i32>,
    pub percentage: Option<f64>,
    pub passed: bool,
    pub status: AttemptStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub time_taken: Option<i32>,
}

impl AssessmentAttempt {
    /// Elapsed wall-clock time exceeds the assessment's limit (in minutes).
    pub fn is_expired(&self, time_limit_minutes: i32, now: DateTime<Utc>) -> bool {
        let elapsed = now.signed_duration_since(self.started_at);
        elapsed > chrono::Duration::minutes(i64::from(time_limit_minutes))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AttemptAnswer {
    pub id: Uuid,
    pub attempt_id: Uuid,
    pub question_id: Uuid,
    pub selected_option_ids: Vec<Uuid>,
    pub is_correct: bool,
    pub points_earned: i32,
    pub answered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserSkill {
    pub id: Uuid,
    pub user_id: Uuid,
    pub skill_id: Uuid,
    pub level: SkillLevel,
    pub is_certified: bool,
    pub assessment_score: Option<f64>,
    pub last_assessment_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What recording an assessment score did to the (user, skill) row.
#[derive(Debug, Clone)]
pub struct RatchetOutcome {
    pub user_skill: UserSkill,
    pub created: bool,
    pub improved: bool,
    pub changed: bool,
}

impl RatchetOutcome {
    /// A passing attempt that created or raised the stored score.
    pub fn score_updated(&self, passed: bool) -> bool {
        passed && (self.created || self.improved)
    }

    /// Failed attempts always count toward the provider's averages; passes
    /// only when they moved the stored score.
    pub fn feeds_reputation(&self, passed: bool) -> bool {
        !passed || self.score_updated(passed)
    }
}

impl UserSkill {
    /// Applies a new percentage to the existing row (or creates one). The stored
    /// score only moves up and certification, once granted, is never revoked.
    pub fn ratchet(
        existing: Option<UserSkill>,
        user_id: Uuid,
        skill_id: Uuid,
        percentage: f64,
        passed: bool,
        now: DateTime<Utc>,
    ) -> RatchetOutcome {
        match existing {
            None => RatchetOutcome {
                user_skill: UserSkill {
                    id: Uuid::new_v4(),
                    user_id,
                    skill_id,
                    level: SkillLevel::Intermediate,
                    is_certified: passed,
                    assessment_score: Some(percentage),
                    last_assessment_date: Some(now),
                    created_at: now,
                    updated_at: now,
                },
                created: true,
                improved: true,
                changed: true,
            },
            Some(mut row) => {
                let stored = row.assessment_score;
                let at_least_stored = stored.map_or(true, |s| percentage >= s);
                if !at_least_stored {
                    return RatchetOutcome {
                        user_skill: row,
                        created: false,
                        improved: false,
                        changed: false,
                    };
                }

                let improved = stored.map_or(true, |s| percentage > s);
                row.assessment_score = Some(percentage);
                row.last_assessment_date = Some(now);
                row.is_certified = row.is_certified || passed;
                row.updated_at = now;

                RatchetOutcome {
                    user_skill: row,
                    created: false,
                    improved,
                    changed: true,
                }
            }
        }
    }
}

/// How a caller names an assessment: by stored id or by its catalog key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssessmentRef {
    ById(Uuid),
    ByKey(String),
}

impl AssessmentRef {
    /// Resolves a path segment once: a UUID is an id, anything else a key.
    pub fn parse(raw: &str) -> Self {
        match Uuid::parse_str(raw.trim()) {
            Ok(id) => AssessmentRef::ById(id),
            Err(_) => AssessmentRef::ByKey(normalize_key(raw)),
        }
    }
}

impl fmt::Display for AssessmentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssessmentRef::ById(id) => write!(f, "{}", id),
            AssessmentRef::ByKey(key) => write!(f, "{}", key),
        }
    }
}

pub fn normalize_key(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            ' ' | '/' | '-' => '_',
            other => other,
        })
        .collect()
}

/// A graded attempt ready to be persisted.
#[derive(Debug, Clone)]
pub struct GradedAttempt {
    pub attempt_id: Uuid,
    pub user_id: Uuid,
    pub assessment_id: Uuid,
    pub skill_id: Uuid,
    pub answers: Vec<GradedAnswer>,
    pub correct: i32,
    pub total: i32,
    pub percentage: f64,
    pub passed: bool,
    pub completed_at: DateTime<Utc>,
    pub time_taken: i32,
}

#[derive(Debug, Clone)]
pub struct GradedAnswer {
    pub question_id: Uuid,
    pub selected_option_ids: Vec<Uuid>,
    pub is_correct: bool,
    pub points_earned: i32,
}

/// Everything persisted for one graded attempt.
#[derive(Debug, Clone)]
pub struct RecordedAttempt {
    pub attempt: AssessmentAttempt,
    pub user_skill: UserSkill,
    pub score_updated: bool,
    pub newly_certified: bool,
    pub provider_score: Option<super::scoremodel::ProviderScore>,
    pub score_history: Option<super::scoremodel::ScoreHistory>,
}

#[derive(Debug, Clone)]
pub struct NewAssessment {
    pub skill_id: Uuid,
    pub key: Option<String>,
    pub title: String,
    pub description: String,
    pub passing_score: f64,
    pub time_limit: i32,
    pub questions: Vec<NewQuestion>,
}

#[derive(Debug, Clone)]
pub struct NewQuestion {
    pub question_text: String,
    pub question_type: QuestionType,
    pub points: i32,
    pub explanation: String,
    pub options: Vec<NewOption>,
}

#[derive(Debug, Clone)]
pub struct NewOption {
    pub option_text: String,
    pub is_correct: bool,
}
