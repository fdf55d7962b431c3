use chrono::{DateTime, Utc};
use intercom_core::{Reviewer, ReviewerId, UnitNumber};
use serde::{Deserialize, Serialize};

use crate::error::{StorageError, StorageResult};

/// Row of the `reviewers` table.
///
/// A reviewer is a messaging identity (the chat id) linked to exactly one
/// unit. Several reviewers may share a unit; changing the unit overwrites
/// the row and bumps `updated_at`.
///
/// # Examples
///
/// ```
/// use intercom_storage::models::ReviewerRecord;
/// use chrono::Utc;
///
/// let record = ReviewerRecord {
///     reviewer_id: 1001,
///     unit_number: 42,
///     created_at: Utc::now(),
///     updated_at: Utc::now(),
/// };
///
/// let reviewer = record.to_reviewer().unwrap();
/// assert_eq!(reviewer.unit.as_u32(), 42);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ReviewerRecord {
    /// Messaging identity, primary key
    pub reviewer_id: i64,

    /// Registered unit number
    pub unit_number: i64,

    /// Record creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last time the unit was changed
    pub updated_at: DateTime<Utc>,
}

impl ReviewerRecord {
    /// Convert the row into the domain type.
    ///
    /// Fails if the stored unit number does not fit a [`UnitNumber`].
    pub fn to_reviewer(&self) -> StorageResult<Reviewer> {
        let unit = u32::try_from(self.unit_number).map_err(|_| {
            StorageError::Validation(format!(
                "unit number {} of reviewer {} is out of range",
                self.unit_number, self.reviewer_id
            ))
        })?;

        Ok(Reviewer {
            id: ReviewerId::new(self.reviewer_id),
            unit: UnitNumber::new(unit),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn record(unit_number: i64) -> ReviewerRecord {
        ReviewerRecord {
            reviewer_id: 7,
            unit_number,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_to_reviewer() {
        let reviewer = record(105).to_reviewer().unwrap();
        assert_eq!(reviewer.id, ReviewerId::new(7));
        assert_eq!(reviewer.unit, UnitNumber::new(105));
    }

    #[rstest]
    #[case(-1)]
    #[case(i64::from(u32::MAX) + 1)]
    fn test_to_reviewer_out_of_range(#[case] unit_number: i64) {
        let result = record(unit_number).to_reviewer();
        assert!(matches!(result, Err(StorageError::Validation(_))));
    }
}
