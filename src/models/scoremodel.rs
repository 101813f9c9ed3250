use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const LEVELS: [(f64, i32, &str); 5] = [
    (80.0, 5, "Elite"),
    (60.0, 4, "Expert"),
    (40.0, 3, "Established"),
    (20.0, 2, "Rising"),
    (0.0, 1, "Newcomer"),
];

pub fn level_for(total_score: f64) -> (i32, &'static str) {
    LEVELS
        .iter()
        .find(|(threshold, _, _)| total_score >= *threshold)
        .map(|(_, level, title)| (*level, *title))
        .unwrap_or((1, "Newcomer"))
}

/// Points added to the assessment component for a passing attempt.
pub fn assessment_bonus(percentage: f64) -> f64 {
    if percentage >= 90.0 {
        5.0
    } else if percentage >= 80.0 {
        3.0
    } else {
        2.0
    }
}

/// Turns the component scores into a provider's total.
pub trait ScoreAggregator: Send + Sync {
    fn aggregate(&self, score: &ProviderScore) -> f64;
}

/// Sum of every component, clamped to 0..=100.
#[derive(Debug, Clone, Default)]
pub struct ClampedSum;

impl ScoreAggregator for ClampedSum {
    fn aggregate(&self, score: &ProviderScore) -> f64 {
        let sum = score.review_score
            + score.assessment_score
            + score.completion_score
            + score.reliability_score;
        sum.clamp(0.0, 100.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProviderScore {
    pub id: Uuid,
    pub user_id: Uuid,
    pub review_score: f64,
    pub assessment_score: f64,
    pub completion_score: f64,
    pub reliability_score: f64,
    pub total_score: f64,
    pub level: i32,
    pub level_title: String,
    pub assessments_passed: i32,
    pub assessments_failed: i32,
    pub average_assessment_score: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProviderScore {
    pub fn new(user_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            review_score: 0.0,
            assessment_score: 0.0,
            completion_score: 0.0,
            reliability_score: 0.0,
            total_score: 0.0,
            level: 1,
            level_title: "Newcomer".to_string(),
            assessments_passed: 0,
            assessments_failed: 0,
            average_assessment_score: 0.0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn assessments_taken(&self) -> i32 {
        self.assessments_passed + self.assessments_failed
    }

    pub fn recalculate(&mut self, aggregator: &dyn ScoreAggregator) {
        self.total_score = aggregator.aggregate(self);
        let (level, title) = level_for(self.total_score);
        self.level = level;
        self.level_title = title.to_string();
    }

    /// Folds one graded attempt into the score and returns the history row
    /// describing the change.
    pub fn apply_assessment_result(
        &mut self,
        percentage: f64,
        passed: bool,
        reference_id: Option<Uuid>,
        aggregator: &dyn ScoreAggregator,
        now: DateTime<Utc>,
    ) -> ScoreHistory {
        let old_score = self.total_score;

        let points = if passed {
            self.assessments_passed += 1;
            assessment_bonus(percentage)
        } else {
            self.assessments_failed += 1;
            0.0
        };
        self.assessment_score += points;

        let taken = f64::from(self.assessments_taken());
        self.average_assessment_score =
            (self.average_assessment_score * (taken - 1.0) + percentage) / taken;

        self.recalculate(aggregator);
        self.updated_at = now;

        let reason = if passed {
            let grade = if percentage >= 90.0 {
                "Excellent"
            } else if percentage >= 80.0 {
                "Strong"
            } else {
                "Passing"
            };
            format!("{} assessment score ({:.2}%) - +{} points", grade, percentage, points)
        } else {
            format!("Failed assessment ({:.2}%) - no points", percentage)
        };

        ScoreHistory {
            id: Uuid::new_v4(),
            user_id: self.user_id,
            change_type: if passed { "assessment_passed" } else { "assessment_failed" }.to_string(),
            points_change: points,
            old_score,
            new_score: self.total_score,
            reference_id,
            reason,
            created_at: now,
        }
    }
}

/// Immutable audit row for one change to a provider score.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ScoreHistory {
    pub id: Uuid,
    pub user_id: Uuid,
    pub change_type: String,
    pub points_change: f64,
    pub old_score: f64,
    pub new_score: f64,
    pub reference_id: Option<Uuid>,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}
