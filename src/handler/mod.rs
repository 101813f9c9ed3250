pub mod assessment;
pub mod escrow;
pub mod project;
pub mod proposal;
