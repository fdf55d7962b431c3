//! Storage layer for the intercom gateway.
//!
//! SQLite-backed persistence for the unit registry (which reviewer answers
//! for which unit) and for the per-reviewer registration flag.
//!
//! # Architecture
//!
//! - [`Database`] - Connection pool manager with automatic migrations
//! - [`ReviewerRepository`], [`RegistrationStore`] - Data access traits
//! - [`SqliteReviewerRepository`], [`SqliteRegistrationStore`] - SQLite implementations
//!
//! All data access goes through the repository traits so the gateway can be
//! tested against in-process fakes.
//!
//! # Example
//!
//! ```no_run
//! use intercom_core::{ReviewerId, UnitNumber};
//! use intercom_storage::{Database, DatabaseConfig, ReviewerRepository, SqliteReviewerRepository};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::new(DatabaseConfig::new("intercom.db")).await?;
//! let registry = SqliteReviewerRepository::new(db.pool().clone());
//!
//! registry.upsert(ReviewerId::new(1001), UnitNumber::new(42)).await?;
//!
//! for reviewer in registry.find_reviewers(UnitNumber::new(42)).await? {
//!     println!("Reviewer {} answers for unit 42", reviewer);
//! }
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod error;
pub mod models;
pub mod repositories;

pub use connection::{Database, DatabaseConfig, RegistryHealth};
pub use error::{StorageError, StorageResult};
pub use models::ReviewerRecord;
pub use repositories::{
    RegistrationStore, ReviewerRepository, SqliteRegistrationStore, SqliteReviewerRepository,
};
