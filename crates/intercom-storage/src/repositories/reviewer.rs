use std::future::Future;

use crate::error::{StorageError, StorageResult};
use crate::models::ReviewerRecord;
use intercom_core::{Reviewer, ReviewerId, UnitNumber};
use sqlx::SqlitePool;

/// Unit registry: which reviewer belongs to which unit.
///
/// The returned futures are `Send` so callers can drive them from spawned
/// tasks without knowing the concrete repository.
pub trait ReviewerRepository: Send + Sync {
    /// Unit the reviewer is registered to, if any
    fn find_unit(
        &self,
        reviewer: ReviewerId,
    ) -> impl Future<Output = StorageResult<Option<UnitNumber>>> + Send;

    /// All reviewers registered to `unit`, ordered by id. Possibly empty.
    fn find_reviewers(
        &self,
        unit: UnitNumber,
    ) -> impl Future<Output = StorageResult<Vec<ReviewerId>>> + Send;

    /// Link the reviewer to `unit`, replacing any previous unit
    fn upsert(
        &self,
        reviewer: ReviewerId,
        unit: UnitNumber,
    ) -> impl Future<Output = StorageResult<()>> + Send;

    /// Unlink the reviewer
    fn remove(&self, reviewer: ReviewerId) -> impl Future<Output = StorageResult<()>> + Send;
}

/// SQLite implementation of ReviewerRepository
#[derive(Debug, Clone)]
pub struct SqliteReviewerRepository {
    pool: SqlitePool,
}

impl SqliteReviewerRepository {
    /// Create a new SQLite reviewer repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Full row for a reviewer
    pub async fn find_record(&self, reviewer: ReviewerId) -> StorageResult<Option<ReviewerRecord>> {
        let record = sqlx::query_as::<_, ReviewerRecord>(
            r#"
            SELECT reviewer_id, unit_number, created_at, updated_at
            FROM reviewers
            WHERE reviewer_id = ?
            "#,
        )
        .bind(reviewer.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    /// Every registered reviewer, ordered by unit
    pub async fn find_all(&self) -> StorageResult<Vec<Reviewer>> {
        let records = sqlx::query_as::<_, ReviewerRecord>(
            r#"
            SELECT reviewer_id, unit_number, created_at, updated_at
            FROM reviewers
            ORDER BY unit_number, reviewer_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        records.iter().map(ReviewerRecord::to_reviewer).collect()
    }
}

impl ReviewerRepository for SqliteReviewerRepository {
    async fn find_unit(&self, reviewer: ReviewerId) -> StorageResult<Option<UnitNumber>> {
        self.find_record(reviewer)
            .await?
            .map(|record| record.to_reviewer().map(|r| r.unit))
            .transpose()
    }

    async fn find_reviewers(&self, unit: UnitNumber) -> StorageResult<Vec<ReviewerId>> {
        let ids: Vec<(i64,)> = sqlx::query_as(
            r#"
            SELECT reviewer_id
            FROM reviewers
            WHERE unit_number = ?
            ORDER BY reviewer_id
            "#,
        )
        .bind(i64::from(unit))
        .fetch_all(&self.pool)
        .await?;

        Ok(ids.into_iter().map(|(id,)| ReviewerId::new(id)).collect())
    }

    async fn upsert(&self, reviewer: ReviewerId, unit: UnitNumber) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO reviewers (reviewer_id, unit_number)
            VALUES (?, ?)
            ON CONFLICT (reviewer_id) DO UPDATE
            SET unit_number = excluded.unit_number,
                updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
            "#,
        )
        .bind(reviewer.as_i64())
        .bind(i64::from(unit))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn remove(&self, reviewer: ReviewerId) -> StorageResult<()> {
        let result = sqlx::query("DELETE FROM reviewers WHERE reviewer_id = ?")
            .bind(reviewer.as_i64())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound {
                entity_type: "Reviewer".to_string(),
                field: "reviewer_id".to_string(),
                value: reviewer.to_string(),
            });
        }

        Ok(())
    }
}
