pub mod paymentmodel;
pub mod projectmodel;
pub mod proposalmodel;
pub mod scoremodel;
pub mod skillmodel;
pub mod transition;
pub mod usermodel;
