pub mod registration;
pub mod reviewer;

pub use registration::{RegistrationStore, SqliteRegistrationStore};
pub use reviewer::{ReviewerRepository, SqliteReviewerRepository};
