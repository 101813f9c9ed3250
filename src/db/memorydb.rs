//! In-memory implementation of the store traits.
//!
//! Backs the engine and router tests. One mutex guards the whole state, so
//! every operation observes and applies its effects atomically, the same
//! guarantee the Postgres transactions give.

use std::collections::HashMap;

use async_trait::async_trait;
use bigdecimal::Zero;
use chrono::{DateTime, Utc};
use sqlx::types::{BigDecimal, Json};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    escrowdb::EscrowExt,
    ledgerdb::LedgerExt,
    projectdb::{check_escrow_allows_delete, ProjectExt},
    proposaldb::ProposalExt,
    scoredb::ScoreExt,
    skilldb::AssessmentExt,
};
use crate::{
    models::{
        paymentmodel::*,
        projectmodel::{NewProject, Project, ProjectStatus, ProjectView},
        proposalmodel::{AcceptOutcome, NewProposal, Proposal, ProposalStatus},
        scoremodel::{ProviderScore, ScoreAggregator, ScoreHistory},
        skillmodel::*,
    },
    service::error::ServiceError,
};

#[derive(Default)]
struct MemoryState {
    projects: HashMap<Uuid, Project>,
    views: Vec<ProjectView>,
    proposals: Vec<Proposal>,
    escrows: HashMap<Uuid, Escrow>,
    ledger: Vec<LedgerEntry>,
    skills: HashMap<Uuid, Skill>,
    assessments: HashMap<Uuid, SkillAssessment>,
    questions: Vec<AssessmentQuestion>,
    options: Vec<QuestionOption>,
    attempts: HashMap<Uuid, AssessmentAttempt>,
    answers: Vec<AttemptAnswer>,
    user_skills: Vec<UserSkill>,
    scores: HashMap<Uuid, ProviderScore>,
    history: Vec<ScoreHistory>,
}

impl MemoryState {
    fn project(&self, project_id: Uuid) -> Result<&Project, ServiceError> {
        self.projects
            .get(&project_id)
            .ok_or(ServiceError::ProjectNotFound(project_id))
    }

    fn proposal_index(&self, proposal_id: Uuid) -> Result<usize, ServiceError> {
        self.proposals
            .iter()
            .position(|p| p.id == proposal_id)
            .ok_or(ServiceError::ProposalNotFound(proposal_id))
    }

    fn escrow(&self, escrow_id: Uuid) -> Result<&Escrow, ServiceError> {
        self.escrows
            .get(&escrow_id)
            .ok_or(ServiceError::EscrowNotFound(escrow_id))
    }

    fn set_project_status(
        &mut self,
        project_id: Uuid,
        status: ProjectStatus,
        published_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<Project, ServiceError> {
        let project = self
            .projects
            .get_mut(&project_id)
            .ok_or(ServiceError::ProjectNotFound(project_id))?;
        project.status = status;
        if published_at.is_some() {
            project.published_at = published_at;
        }
        project.updated_at = now;
        Ok(project.clone())
    }

    fn adjust_proposals_count(&mut self, project_id: Uuid, delta: i32) {
        if let Some(project) = self.projects.get_mut(&project_id) {
            project.proposals_count = (project.proposals_count + delta).max(0);
        }
    }

    fn append_entry(&mut self, entry: NewLedgerEntry, now: DateTime<Utc>) -> LedgerEntry {
        let entry = entry.into_completed(Uuid::new_v4(), now);
        self.ledger.push(entry.clone());
        entry
    }

    fn open_attempt_for(&self, user_id: Uuid, assessment_id: Uuid) -> Option<&AssessmentAttempt> {
        self.attempts.values().find(|a| {
            a.user_id == user_id && a.assessment_id == assessment_id && a.status == AttemptStatus::InProgress
        })
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrites a stored project; lets tests stage states directly.
    pub async fn put_project(&self, project: Project) {
        self.state.lock().await.projects.insert(project.id, project);
    }

    pub async fn put_attempt(&self, attempt: AssessmentAttempt) {
        self.state.lock().await.attempts.insert(attempt.id, attempt);
    }

    pub async fn ledger_len(&self) -> usize {
        self.state.lock().await.ledger.len()
    }

    pub async fn attempt_answers(&self, attempt_id: Uuid) -> Vec<AttemptAnswer> {
        self.state
            .lock()
            .await
            .answers
            .iter()
            .filter(|a| a.attempt_id == attempt_id)
            .cloned()
            .collect()
    }

    pub async fn get_attempt(&self, attempt_id: Uuid) -> Option<AssessmentAttempt> {
        self.state.lock().await.attempts.get(&attempt_id).cloned()
    }
}

#[async_trait]
impl ProjectExt for MemoryStore {
    async fn create_project(&self, project: NewProject, now: DateTime<Utc>) -> Result<Project, ServiceError> {
        let created = Project {
            id: Uuid::new_v4(),
            client_id: project.client_id,
            title: project.title,
            description: project.description,
            category_id: project.category_id,
            budget_min: project.budget_min,
            budget_max: project.budget_max,
            budget_currency: project.budget_currency,
            deadline: project.deadline,
            priority: project.priority,
            location: project.location,
            is_remote: project.is_remote,
            status: ProjectStatus::Draft,
            views_count: 0,
            proposals_count: 0,
            created_at: now,
            updated_at: now,
            published_at: None,
        };
        self.state.lock().await.projects.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_project(&self, project_id: Uuid) -> Result<Option<Project>, ServiceError> {
        Ok(self.state.lock().await.projects.get(&project_id).cloned())
    }

    async fn update_project_status(
        &self,
        project_id: Uuid,
        from: ProjectStatus,
        to: ProjectStatus,
        published_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<Project, ServiceError> {
        let mut state = self.state.lock().await;
        let project = state.project(project_id)?;
        if project.status != from {
            return Err(ServiceError::InvalidProjectStatus(project_id, from));
        }
        let to = project.status.transition(to)?;
        state.set_project_status(project_id, to, published_at, now)
    }

    async fn unpublish_project(&self, project_id: Uuid, now: DateTime<Utc>) -> Result<Project, ServiceError> {
        let mut state = self.state.lock().await;
        let project = state.project(project_id)?;
        if project.status != ProjectStatus::Published {
            return Err(ServiceError::InvalidProjectStatus(project_id, ProjectStatus::Published));
        }
        let accepted = state
            .proposals
            .iter()
            .any(|p| p.project_id == project_id && p.status == ProposalStatus::Accepted);
        if accepted {
            return Err(ServiceError::StateConflict(format!(
                "project {} has an accepted proposal and cannot be unpublished",
                project_id
            )));
        }
        let to = project.status.transition(ProjectStatus::Draft)?;
        state.set_project_status(project_id, to, None, now)
    }

    async fn cancel_project(&self, project_id: Uuid, now: DateTime<Utc>) -> Result<(Project, u64), ServiceError> {
        let mut state = self.state.lock().await;
        let to = state.project(project_id)?.status.transition(ProjectStatus::Cancelled)?;

        let held = state
            .escrows
            .values()
            .any(|e| e.project_id == project_id && e.status.holds_funds());
        if held {
            return Err(ServiceError::StateConflict(format!(
                "project {} has funds held in escrow",
                project_id
            )));
        }

        let mut expired = 0;
        for proposal in state
            .proposals
            .iter_mut()
            .filter(|p| p.project_id == project_id && p.status == ProposalStatus::Pending)
        {
            proposal.status = ProposalStatus::Expired;
            proposal.responded_at = Some(now);
            proposal.updated_at = now;
            expired += 1;
        }

        let project = state.set_project_status(project_id, to, None, now)?;
        Ok((project, expired))
    }

    async fn delete_project(&self, project_id: Uuid) -> Result<(), ServiceError> {
        let mut state = self.state.lock().await;
        if state.project(project_id)?.status == ProjectStatus::InProgress {
            return Err(ServiceError::StateConflict(format!(
                "project {} is in progress and cannot be deleted",
                project_id
            )));
        }
        let escrow_status = state
            .escrows
            .values()
            .find(|e| e.project_id == project_id)
            .map(|e| e.status);
        check_escrow_allows_delete(project_id, escrow_status)?;

        state.projects.remove(&project_id);
        state.proposals.retain(|p| p.project_id != project_id);
        state.escrows.retain(|_, e| e.project_id != project_id);
        state.views.retain(|v| v.project_id != project_id);
        Ok(())
    }

    async fn record_project_view(
        &self,
        project_id: Uuid,
        viewer_id: Option<Uuid>,
        viewer_key: &str,
        window_start: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool, ServiceError> {
        let mut state = self.state.lock().await;
        state.project(project_id)?;

        let seen = state.views.iter().any(|v| {
            v.project_id == project_id
                && v.viewed_at >= window_start
                && (v.viewer_key == viewer_key || (viewer_id.is_some() && v.viewer_id == viewer_id))
        });
        if seen {
            return Ok(false);
        }

        state.views.push(ProjectView {
            id: Uuid::new_v4(),
            project_id,
            viewer_id,
            viewer_key: viewer_key.to_string(),
            viewed_at: now,
        });
        if let Some(project) = state.projects.get_mut(&project_id) {
            project.views_count += 1;
        }
        Ok(true)
    }
}

#[async_trait]
impl ProposalExt for MemoryStore {
    async fn create_proposal(&self, proposal: NewProposal, now: DateTime<Utc>) -> Result<Proposal, ServiceError> {
        let mut state = self.state.lock().await;
        let project = state.project(proposal.project_id)?;
        if project.status != ProjectStatus::Published {
            return Err(ServiceError::Validation(
                "Project is not open for proposals".to_string(),
            ));
        }
        let duplicate = state
            .proposals
            .iter()
            .any(|p| p.project_id == proposal.project_id && p.freelancer_id == proposal.freelancer_id);
        if duplicate {
            return Err(ServiceError::Validation(
                "You have already submitted a proposal for this project".to_string(),
            ));
        }

        let created = Proposal {
            id: Uuid::new_v4(),
            project_id: proposal.project_id,
            freelancer_id: proposal.freelancer_id,
            cover_letter: proposal.cover_letter,
            proposed_price: proposal.proposed_price,
            proposed_timeline: proposal.proposed_timeline,
            currency: proposal.currency,
            status: ProposalStatus::Pending,
            milestones: Json(proposal.milestones),
            created_at: now,
            updated_at: now,
            submitted_at: Some(now),
            responded_at: None,
        };
        state.proposals.push(created.clone());
        state.adjust_proposals_count(created.project_id, 1);
        Ok(created)
    }

    async fn get_proposal(&self, proposal_id: Uuid) -> Result<Option<Proposal>, ServiceError> {
        let state = self.state.lock().await;
        Ok(state.proposals.iter().find(|p| p.id == proposal_id).cloned())
    }

    async fn list_project_proposals(&self, project_id: Uuid) -> Result<Vec<Proposal>, ServiceError> {
        let state = self.state.lock().await;
        Ok(state
            .proposals
            .iter()
            .rev()
            .filter(|p| p.project_id == project_id)
            .cloned()
            .collect())
    }

    async fn list_freelancer_proposals(&self, freelancer_id: Uuid) -> Result<Vec<Proposal>, ServiceError> {
        let state = self.state.lock().await;
        Ok(state
            .proposals
            .iter()
            .rev()
            .filter(|p| p.freelancer_id == freelancer_id)
            .cloned()
            .collect())
    }

    async fn accept_proposal(&self, proposal_id: Uuid, now: DateTime<Utc>) -> Result<AcceptOutcome, ServiceError> {
        let mut state = self.state.lock().await;
        let index = state.proposal_index(proposal_id)?;
        let proposal = &state.proposals[index];
        let project = state.project(proposal.project_id)?;

        if proposal.status != ProposalStatus::Pending {
            return Err(ServiceError::InvalidProposalStatus(proposal_id, ProposalStatus::Pending));
        }
        if project.status != ProjectStatus::Published {
            return Err(ServiceError::InvalidProjectStatus(project.id, ProjectStatus::Published));
        }
        let accepted_status = proposal.status.transition(ProposalStatus::Accepted)?;
        let project_status = project.status.transition(ProjectStatus::InProgress)?;
        let project_id = project.id;

        let mut rejected_count = 0;
        for sibling in state
            .proposals
            .iter_mut()
            .filter(|p| p.project_id == project_id && p.id != proposal_id && p.status == ProposalStatus::Pending)
        {
            sibling.status = ProposalStatus::Rejected;
            sibling.responded_at = Some(now);
            sibling.updated_at = now;
            rejected_count += 1;
        }

        let proposal = &mut state.proposals[index];
        proposal.status = accepted_status;
        proposal.responded_at = Some(now);
        proposal.updated_at = now;
        let proposal = proposal.clone();

        let project = state.set_project_status(project_id, project_status, None, now)?;

        Ok(AcceptOutcome {
            proposal,
            project,
            rejected_count,
        })
    }

    async fn reject_proposal(&self, proposal_id: Uuid, now: DateTime<Utc>) -> Result<Proposal, ServiceError> {
        let mut state = self.state.lock().await;
        let index = state.proposal_index(proposal_id)?;
        let proposal = &mut state.proposals[index];
        if proposal.status != ProposalStatus::Pending {
            return Err(ServiceError::InvalidProposalStatus(proposal_id, ProposalStatus::Pending));
        }
        proposal.status = proposal.status.transition(ProposalStatus::Rejected)?;
        proposal.responded_at = Some(now);
        proposal.updated_at = now;
        Ok(proposal.clone())
    }

    async fn withdraw_proposal(&self, proposal_id: Uuid, now: DateTime<Utc>) -> Result<Proposal, ServiceError> {
        let mut state = self.state.lock().await;
        let index = state.proposal_index(proposal_id)?;
        let proposal = &mut state.proposals[index];
        if proposal.status != ProposalStatus::Pending {
            return Err(ServiceError::InvalidProposalStatus(proposal_id, ProposalStatus::Pending));
        }
        proposal.status = proposal.status.transition(ProposalStatus::Withdrawn)?;
        proposal.responded_at = Some(now);
        proposal.updated_at = now;
        let proposal = proposal.clone();

        state.adjust_proposals_count(proposal.project_id, -1);
        Ok(proposal)
    }

    async fn delete_proposal(&self, proposal_id: Uuid) -> Result<(), ServiceError> {
        let mut state = self.state.lock().await;
        let index = state.proposal_index(proposal_id)?;
        if state.proposals[index].status != ProposalStatus::Pending {
            return Err(ServiceError::InvalidProposalStatus(proposal_id, ProposalStatus::Pending));
        }
        let removed = state.proposals.remove(index);
        state.adjust_proposals_count(removed.project_id, -1);
        Ok(())
    }
}

#[async_trait]
impl EscrowExt for MemoryStore {
    async fn create_escrow(&self, escrow: NewEscrow, now: DateTime<Utc>) -> Result<Escrow, ServiceError> {
        let mut state = self.state.lock().await;
        let project_status = state.project(escrow.project_id)?.status;

        let proposal = state
            .proposals
            .iter()
            .find(|p| p.id == escrow.proposal_id && p.project_id == escrow.project_id)
            .ok_or(ServiceError::ProposalNotFound(escrow.proposal_id))?;
        if proposal.status != ProposalStatus::Accepted {
            return Err(ServiceError::InvalidProposalStatus(
                escrow.proposal_id,
                ProposalStatus::Accepted,
            ));
        }
        if !project_status.accepts_escrow() {
            return Err(ServiceError::InvalidProjectStatus(escrow.project_id, ProjectStatus::InProgress));
        }
        if state.escrows.values().any(|e| e.project_id == escrow.project_id) {
            return Err(ServiceError::EscrowAlreadyExists(escrow.project_id));
        }

        let created = Escrow {
            id: Uuid::new_v4(),
            project_id: escrow.project_id,
            proposal_id: escrow.proposal_id,
            client_id: escrow.client_id,
            freelancer_id: escrow.freelancer_id,
            amount: escrow.amount,
            currency: escrow.currency,
            platform_fee: escrow.platform_fee,
            freelancer_amount: escrow.freelancer_amount,
            status: EscrowStatus::Pending,
            funded_at: None,
            released_at: None,
            refunded_at: None,
            disputed_at: None,
            created_at: now,
            updated_at: now,
        };
        state.escrows.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_escrow(&self, escrow_id: Uuid) -> Result<Option<Escrow>, ServiceError> {
        Ok(self.state.lock().await.escrows.get(&escrow_id).cloned())
    }

    async fn get_escrow_by_project(&self, project_id: Uuid) -> Result<Option<Escrow>, ServiceError> {
        let state = self.state.lock().await;
        Ok(state.escrows.values().find(|e| e.project_id == project_id).cloned())
    }

    async fn fund_escrow(
        &self,
        escrow_id: Uuid,
        hold: NewLedgerEntry,
        now: DateTime<Utc>,
    ) -> Result<FundOutcome, ServiceError> {
        let mut state = self.state.lock().await;
        let escrow = state.escrow(escrow_id)?;
        let status = escrow.status.transition(EscrowStatus::Funded)?;
        let project_id = escrow.project_id;
        if !state.project(project_id)?.status.accepts_escrow() {
            return Err(ServiceError::InvalidProjectStatus(project_id, ProjectStatus::InProgress));
        }

        let hold = state.append_entry(hold, now);
        let escrow = state
            .escrows
            .get_mut(&escrow_id)
            .ok_or(ServiceError::EscrowNotFound(escrow_id))?;
        escrow.status = status;
        escrow.funded_at = Some(now);
        escrow.updated_at = now;

        Ok(FundOutcome {
            escrow: escrow.clone(),
            hold,
        })
    }

    async fn release_escrow(
        &self,
        escrow_id: Uuid,
        payout: NewLedgerEntry,
        commission: NewLedgerEntry,
        now: DateTime<Utc>,
    ) -> Result<ReleaseOutcome, ServiceError> {
        let mut state = self.state.lock().await;
        let escrow = state.escrow(escrow_id)?;
        let escrow_status = escrow.status.transition(EscrowStatus::Released)?;
        let project = state.project(escrow.project_id)?;
        if project.status != ProjectStatus::InProgress {
            return Err(ServiceError::InvalidProjectStatus(project.id, ProjectStatus::InProgress));
        }
        let project_status = project.status.transition(ProjectStatus::Completed)?;
        let project_id = project.id;

        // Every check passed; nothing below can fail.
        let payout = state.append_entry(payout, now);
        let commission = state.append_entry(commission, now);
        let project = state.set_project_status(project_id, project_status, None, now)?;
        let escrow = state
            .escrows
            .get_mut(&escrow_id)
            .ok_or(ServiceError::EscrowNotFound(escrow_id))?;
        escrow.status = escrow_status;
        escrow.released_at = Some(now);
        escrow.updated_at = now;

        Ok(ReleaseOutcome {
            escrow: escrow.clone(),
            payout,
            commission,
            project,
        })
    }

    async fn dispute_escrow(&self, escrow_id: Uuid, now: DateTime<Utc>) -> Result<Escrow, ServiceError> {
        let mut state = self.state.lock().await;
        let status = state.escrow(escrow_id)?.status.transition(EscrowStatus::Disputed)?;
        let escrow = state
            .escrows
            .get_mut(&escrow_id)
            .ok_or(ServiceError::EscrowNotFound(escrow_id))?;
        escrow.status = status;
        escrow.disputed_at = Some(now);
        escrow.updated_at = now;
        Ok(escrow.clone())
    }
}

#[async_trait]
impl LedgerExt for MemoryStore {
    async fn list_user_entries(&self, user_id: Uuid) -> Result<Vec<LedgerEntry>, ServiceError> {
        let state = self.state.lock().await;
        Ok(state.ledger.iter().rev().filter(|e| e.user_id == user_id).cloned().collect())
    }

    async fn list_escrow_entries(&self, escrow_id: Uuid) -> Result<Vec<LedgerEntry>, ServiceError> {
        let state = self.state.lock().await;
        Ok(state
            .ledger
            .iter()
            .filter(|e| e.escrow_id == Some(escrow_id))
            .cloned()
            .collect())
    }

    async fn sum_user_entries(
        &self,
        user_id: Uuid,
        transaction_type: TransactionType,
        since: Option<DateTime<Utc>>,
    ) -> Result<BigDecimal, ServiceError> {
        let state = self.state.lock().await;
        Ok(state
            .ledger
            .iter()
            .filter(|e| {
                e.user_id == user_id
                    && e.transaction_type == transaction_type
                    && e.status == TransactionStatus::Completed
                    && since.map_or(true, |since| e.completed_at.map_or(false, |at| at >= since))
            })
            .fold(BigDecimal::zero(), |acc, e| acc + &e.net_amount))
    }

    async fn outstanding_for_freelancer(&self, freelancer_id: Uuid) -> Result<BigDecimal, ServiceError> {
        let state = self.state.lock().await;
        Ok(state
            .escrows
            .values()
            .filter(|e| e.freelancer_id == freelancer_id && e.status == EscrowStatus::Funded)
            .fold(BigDecimal::zero(), |acc, e| acc + &e.freelancer_amount))
    }
}

#[async_trait]
impl AssessmentExt for MemoryStore {
    async fn create_skill(
        &self,
        name: String,
        category: String,
        description: String,
        now: DateTime<Utc>,
    ) -> Result<Skill, ServiceError> {
        let skill = Skill {
            id: Uuid::new_v4(),
            name,
            category,
            description,
            is_verified: false,
            created_at: now,
        };
        self.state.lock().await.skills.insert(skill.id, skill.clone());
        Ok(skill)
    }

    async fn get_skill(&self, skill_id: Uuid) -> Result<Option<Skill>, ServiceError> {
        Ok(self.state.lock().await.skills.get(&skill_id).cloned())
    }

    async fn create_assessment(&self, assessment: NewAssessment, now: DateTime<Utc>) -> Result<SkillAssessment, ServiceError> {
        let mut state = self.state.lock().await;
        if let Some(key) = &assessment.key {
            if state.assessments.values().any(|a| a.key.as_ref() == Some(key)) {
                return Err(ServiceError::Validation(format!(
                    "An assessment with key {} already exists",
                    key
                )));
            }
        }

        let created = SkillAssessment {
            id: Uuid::new_v4(),
            skill_id: assessment.skill_id,
            key: assessment.key,
            title: assessment.title,
            description: assessment.description,
            passing_score: assessment.passing_score,
            total_questions: assessment.questions.len() as i32,
            time_limit: assessment.time_limit,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        for (position, question) in assessment.questions.into_iter().enumerate() {
            let question_id = Uuid::new_v4();
            state.questions.push(AssessmentQuestion {
                id: question_id,
                assessment_id: created.id,
                question_text: question.question_text,
                question_type: question.question_type,
                points: question.points,
                explanation: question.explanation,
                position: position as i32,
                is_active: true,
            });
            for (option_position, option) in question.options.into_iter().enumerate() {
                state.options.push(QuestionOption {
                    id: Uuid::new_v4(),
                    question_id,
                    option_text: option.option_text,
                    is_correct: option.is_correct,
                    position: option_position as i32,
                });
            }
        }

        state.assessments.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_assessment(&self, reference: &AssessmentRef) -> Result<Option<SkillAssessment>, ServiceError> {
        let state = self.state.lock().await;
        Ok(match reference {
            AssessmentRef::ById(id) => state.assessments.get(id).cloned(),
            AssessmentRef::ByKey(key) => state
                .assessments
                .values()
                .find(|a| a.key.as_deref() == Some(key.as_str()))
                .cloned(),
        })
    }

    async fn get_active_questions(&self, assessment_id: Uuid) -> Result<Vec<QuestionWithOptions>, ServiceError> {
        let state = self.state.lock().await;
        let mut questions: Vec<AssessmentQuestion> = state
            .questions
            .iter()
            .filter(|q| q.assessment_id == assessment_id && q.is_active)
            .cloned()
            .collect();
        questions.sort_by_key(|q| (q.position, q.id));

        Ok(questions
            .into_iter()
            .map(|question| {
                let mut options: Vec<QuestionOption> = state
                    .options
                    .iter()
                    .filter(|o| o.question_id == question.id)
                    .cloned()
                    .collect();
                options.sort_by_key(|o| (o.position, o.id));
                QuestionWithOptions { question, options }
            })
            .collect())
    }

    async fn find_open_attempt(&self, user_id: Uuid, assessment_id: Uuid) -> Result<Option<AssessmentAttempt>, ServiceError> {
        let state = self.state.lock().await;
        Ok(state.open_attempt_for(user_id, assessment_id).cloned())
    }

    async fn open_attempt(&self, user_id: Uuid, assessment_id: Uuid, now: DateTime<Utc>) -> Result<AssessmentAttempt, ServiceError> {
        let mut state = self.state.lock().await;
        if let Some(open) = state.open_attempt_for(user_id, assessment_id) {
            return Ok(open.clone());
        }
        let attempt = AssessmentAttempt {
            id: Uuid::new_v4(),
            user_id,
            assessment_id,
            score: None,
            percentage: None,
            passed: false,
            status: AttemptStatus::InProgress,
            started_at: now,
            completed_at: None,
            time_taken: None,
        };
        state.attempts.insert(attempt.id, attempt.clone());
        Ok(attempt)
    }

    async fn close_attempt(
        &self,
        attempt_id: Uuid,
        status: AttemptStatus,
        now: DateTime<Utc>,
    ) -> Result<AssessmentAttempt, ServiceError> {
        let mut state = self.state.lock().await;
        let attempt = state
            .attempts
            .get_mut(&attempt_id)
            .filter(|a| a.status == AttemptStatus::InProgress)
            .ok_or_else(|| ServiceError::StateConflict(format!("attempt {} is no longer in progress", attempt_id)))?;
        attempt.status = status;
        attempt.completed_at = Some(now);
        attempt.time_taken = Some(now.signed_duration_since(attempt.started_at).num_seconds() as i32);
        Ok(attempt.clone())
    }

    async fn record_graded_attempt(
        &self,
        graded: GradedAttempt,
        aggregator: &dyn ScoreAggregator,
    ) -> Result<RecordedAttempt, ServiceError> {
        let now = graded.completed_at;
        let mut state = self.state.lock().await;

        let open = state
            .attempts
            .get(&graded.attempt_id)
            .map_or(false, |a| a.status == AttemptStatus::InProgress);
        if !open {
            return Err(ServiceError::StateConflict(format!(
                "attempt {} is no longer in progress",
                graded.attempt_id
            )));
        }

        let existing_index = state
            .user_skills
            .iter()
            .position(|s| s.user_id == graded.user_id && s.skill_id == graded.skill_id);
        let existing = existing_index.map(|i| state.user_skills[i].clone());
        let was_certified = existing.as_ref().map_or(false, |s| s.is_certified);

        let outcome = UserSkill::ratchet(existing, graded.user_id, graded.skill_id, graded.percentage, graded.passed, now);
        match existing_index {
            Some(i) => state.user_skills[i] = outcome.user_skill.clone(),
            None => state.user_skills.push(outcome.user_skill.clone()),
        }

        for answer in &graded.answers {
            state.answers.push(AttemptAnswer {
                id: Uuid::new_v4(),
                attempt_id: graded.attempt_id,
                question_id: answer.question_id,
                selected_option_ids: answer.selected_option_ids.clone(),
                is_correct: answer.is_correct,
                points_earned: answer.points_earned,
                answered_at: now,
            });
        }

        let attempt = {
            let attempt = state
                .attempts
                .get_mut(&graded.attempt_id)
                .ok_or_else(|| ServiceError::StateConflict("attempt vanished".to_string()))?;
            attempt.status = AttemptStatus::Completed;
            attempt.score = Some(graded.correct);
            attempt.percentage = Some(graded.percentage);
            attempt.passed = graded.passed;
            attempt.completed_at = Some(now);
            attempt.time_taken = Some(graded.time_taken);
            attempt.clone()
        };

        let (provider_score, score_history) = if outcome.feeds_reputation(graded.passed) {
            let score = state
                .scores
                .entry(graded.user_id)
                .or_insert_with(|| ProviderScore::new(graded.user_id, now));
            let history = score.apply_assessment_result(
                graded.percentage,
                graded.passed,
                Some(graded.attempt_id),
                aggregator,
                now,
            );
            let score = score.clone();
            state.history.push(history.clone());
            (Some(score), Some(history))
        } else {
            (None, None)
        };

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
        let state = self.state.lock().await;
        let mut skills: Vec<UserSkill> = state
            .user_skills
            .iter()
            .filter(|s| s.user_id == user_id && s.assessment_score.is_some())
            .cloned()
            .collect();
        skills.sort_by(|a, b| {
            b.assessment_score
                .partial_cmp(&a.assessment_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(skills)
    }
}

#[async_trait]
impl ScoreExt for MemoryStore {
    async fn get_provider_score(&self, user_id: Uuid) -> Result<Option<ProviderScore>, ServiceError> {
        Ok(self.state.lock().await.scores.get(&user_id).cloned())
    }

    async fn list_score_history(&self, user_id: Uuid) -> Result<Vec<ScoreHistory>, ServiceError> {
        let state = self.state.lock().await;
        Ok(state.history.iter().rev().filter(|h| h.user_id == user_id).cloned().collect())
    }
}
