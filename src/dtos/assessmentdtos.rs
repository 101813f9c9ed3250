use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::{
    scoremodel::{ProviderScore, ScoreHistory},
    skillmodel::{NewAssessment, NewOption, NewQuestion, QuestionType},
};

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateSkillDto {
    #[validate(length(min = 1, max = 100, message = "Skill name must be between 1 and 100 characters"))]
    pub name: String,

    #[validate(length(min = 1, max = 100, message = "Category is required"))]
    pub category: String,

    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateOptionDto {
    pub option_text: String,
    #[serde(default)]
    pub is_correct: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateQuestionDto {
    pub question_text: String,
    pub question_type: QuestionType,
    pub points: Option<i32>,
    pub explanation: Option<String>,
    pub options: Vec<CreateOptionDto>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateAssessmentDto {
    pub skill_id: Uuid,

    pub key: Option<String>,

    #[validate(length(min = 1, max = 200, message = "Title must be between 1 and 200 characters"))]
    pub title: String,

    #[serde(default)]
    pub description: String,

    #[validate(range(min = 0.0, max = 100.0, message = "Passing score must be between 0 and 100"))]
    pub passing_score: f64,

    #[validate(range(min = 1, max = 240, message = "Time limit must be between 1 and 240 minutes"))]
    pub time_limit: i32,

    #[validate(length(min = 1, max = 100, message = "Between 1 and 100 questions are required"))]
    pub questions: Vec<CreateQuestionDto>,
}

impl From<CreateAssessmentDto> for NewAssessment {
    fn from(dto: CreateAssessmentDto) -> Self {
        NewAssessment {
            skill_id: dto.skill_id,
            key: dto.key,
            title: dto.title,
            description: dto.description,
            passing_score: dto.passing_score,
            time_limit: dto.time_limit,
            questions: dto
                .questions
                .into_iter()
                .map(|q| NewQuestion {
                    question_text: q.question_text,
                    question_type: q.question_type,
                    points: q.points.unwrap_or(1),
                    explanation: q.explanation.unwrap_or_default(),
                    options: q
                        .options
                        .into_iter()
                        .map(|o| NewOption {
                            option_text: o.option_text,
                            is_correct: o.is_correct,
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

/// Selected option indexes per question, in the order the options were shown.
#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitAssessmentDto {
    pub answers: HashMap<Uuid, Vec<usize>>,
}

#[derive(Debug, Serialize)]
pub struct ReputationResponseDto {
    pub score: ProviderScore,
    pub history: Vec<ScoreHistory>,
}
