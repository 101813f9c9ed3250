pub mod assessment_service;
pub mod error;
pub mod escrow_service;
pub mod ledger_service;
pub mod notification_service;
pub mod project_service;
pub mod proposal_service;
pub mod reputation_service;
#[cfg(test)]
pub mod testkit;
