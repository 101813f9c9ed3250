//! Shared fixtures for the engine tests: every engine wired to one
//! in-memory store, plus shortcuts for the usual setup steps.

use std::{collections::HashMap, str::FromStr, sync::Arc};

use chrono::{DateTime, Duration, Utc};
use sqlx::types::BigDecimal;
use uuid::Uuid;

use crate::{
    db::{memorydb::MemoryStore, skilldb::AssessmentExt, Store},
    models::{
        paymentmodel::Escrow,
        projectmodel::{NewProject, Project, ProjectPriority},
        proposalmodel::Proposal,
        scoremodel::ClampedSum,
        skillmodel::{NewAssessment, NewOption, NewQuestion, QuestionType, Skill, SkillAssessment},
        usermodel::Actor,
    },
    service::{
        assessment_service::AssessmentService,
        escrow_service::EscrowService,
        ledger_service::LedgerService,
        notification_service::{testing::RecordingNotifier, NotificationService},
        project_service::ProjectService,
        proposal_service::{ProposalService, SubmitProposal},
        reputation_service::ReputationService,
    },
};

pub fn dec(value: &str) -> BigDecimal {
    BigDecimal::from_str(value).unwrap()
}

pub struct Harness {
    pub now: DateTime<Utc>,
    pub store: Arc<MemoryStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub projects: ProjectService,
    pub proposals: ProposalService,
    pub escrows: EscrowService,
    pub ledger: LedgerService,
    pub assessments: AssessmentService,
    pub reputation: ReputationService,
}

impl Harness {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let shared: Arc<dyn Store> = store.clone();
        let notifications = NotificationService::new(notifier.clone());

        Self {
            now: Utc::now(),
            projects: ProjectService::new(shared.clone(), 60),
            proposals: ProposalService::new(shared.clone(), notifications.clone(), dec("1.5")),
            escrows: EscrowService::new(shared.clone(), notifications.clone(), dec("0.10")),
            ledger: LedgerService::new(shared.clone()),
            assessments: AssessmentService::new(shared.clone(), notifications, Arc::new(ClampedSum)),
            reputation: ReputationService::new(shared),
            store,
            notifier,
        }
    }

    pub fn draft(&self, client: &Actor, min: &str, max: &str) -> NewProject {
        NewProject {
            client_id: client.id,
            title: "Society event landing page".to_string(),
            description: "One page site with a sign-up form".to_string(),
            category_id: None,
            budget_min: dec(min),
            budget_max: dec(max),
            budget_currency: "USD".to_string(),
            deadline: Some(self.now + Duration::days(14)),
            priority: ProjectPriority::Medium,
            location: "Remote".to_string(),
            is_remote: true,
        }
    }

    pub async fn published_project(&self, client: &Actor, min: &str, max: &str) -> Project {
        let project = self
            .projects
            .create(client, self.draft(client, min, max), self.now)
            .await
            .unwrap();
        self.projects.publish(project.id, client, self.now).await.unwrap()
    }

    pub async fn submit(&self, freelancer: &Actor, project_id: Uuid, price: &str) -> Proposal {
        self.proposals
            .submit(
                freelancer,
                SubmitProposal {
                    project_id,
                    cover_letter: "Happy to take this on".to_string(),
                    proposed_price: dec(price),
                    proposed_timeline: 10,
                    currency: "USD".to_string(),
                    milestones: vec![],
                },
                self.now,
            )
            .await
            .unwrap()
    }

    /// A project with one accepted proposal from a fresh freelancer.
    pub async fn in_progress_project(&self, client: &Actor, min: &str, max: &str, price: &str) -> (Project, Proposal) {
        let freelancer = Actor::provider(Uuid::new_v4());
        self.in_progress_project_with(client, &freelancer, min, max, price).await
    }

    pub async fn in_progress_project_with(
        &self,
        client: &Actor,
        freelancer: &Actor,
        min: &str,
        max: &str,
        price: &str,
    ) -> (Project, Proposal) {
        let project = self.published_project(client, min, max).await;
        let proposal = self.submit(freelancer, project.id, price).await;
        let outcome = self.proposals.accept(proposal.id, client, self.now).await.unwrap();
        (outcome.project, outcome.proposal)
    }

    /// A funded escrow for a project priced at exactly `amount`.
    pub async fn funded_escrow_for(&self, client: &Actor, freelancer: &Actor, amount: &str) -> Escrow {
        let (project, proposal) = self
            .in_progress_project_with(client, freelancer, amount, amount, amount)
            .await;
        let escrow = self
            .escrows
            .create(client, project.id, proposal.id, self.now)
            .await
            .unwrap();
        self.escrows.fund(escrow.id, client, self.now).await.unwrap().escrow
    }

    pub async fn skill(&self, name: &str) -> Skill {
        self.store
            .create_skill(name.to_string(), "Technology".to_string(), String::new(), self.now)
            .await
            .unwrap()
    }

    /// `count` single-choice questions with four options each; the correct
    /// option moves around so no fixed index is always right.
    pub fn single_choice_questions(count: usize) -> Vec<NewQuestion> {
        (0..count)
            .map(|i| NewQuestion {
                question_text: format!("Question {}", i + 1),
                question_type: QuestionType::Single,
                points: 1,
                explanation: String::new(),
                options: (0..4)
                    .map(|o| NewOption {
                        option_text: format!("Option {}", o + 1),
                        is_correct: o == i % 4,
                    })
                    .collect(),
            })
            .collect()
    }

    pub async fn seed_assessment(&self, skill: &Skill, key: &str, questions: usize, passing_score: f64) -> SkillAssessment {
        self.store
            .create_assessment(
                NewAssessment {
                    skill_id: skill.id,
                    key: Some(key.to_string()),
                    title: format!("{} assessment", skill.name),
                    description: String::new(),
                    passing_score,
                    time_limit: 30,
                    questions: Self::single_choice_questions(questions),
                },
                self.now,
            )
            .await
            .unwrap()
    }

    /// Answers the first `right` questions correctly and the rest wrongly.
    pub async fn answer_sheet(&self, assessment_id: Uuid, right: usize) -> HashMap<Uuid, Vec<usize>> {
        let questions = self.store.get_active_questions(assessment_id).await.unwrap();
        questions
            .iter()
            .enumerate()
            .map(|(i, q)| {
                let correct = q.options.iter().position(|o| o.is_correct).unwrap();
                let pick = if i < right { correct } else { (correct + 1) % q.options.len() };
                (q.question.id, vec![pick])
            })
            .collect()
    }
}
