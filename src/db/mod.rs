pub mod db;
pub mod escrowdb;
pub mod ledgerdb;
#[cfg(test)]
pub mod memorydb;
pub mod projectdb;
pub mod proposaldb;
pub mod scoredb;
pub mod skilldb;

use escrowdb::EscrowExt;
use ledgerdb::LedgerExt;
use projectdb::ProjectExt;
use proposaldb::ProposalExt;
use scoredb::ScoreExt;
use skilldb::AssessmentExt;

/// Everything the engines need from persistence.
pub trait Store:
    ProjectExt + ProposalExt + EscrowExt + LedgerExt + AssessmentExt + ScoreExt + Send + Sync
{
}

impl<T> Store for T where
    T: ProjectExt + ProposalExt + EscrowExt + LedgerExt + AssessmentExt + ScoreExt + Send + Sync
{
}
