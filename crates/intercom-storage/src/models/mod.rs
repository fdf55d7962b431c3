pub mod reviewer;

pub use reviewer::ReviewerRecord;
