use std::future::Future;

use crate::error::StorageResult;
use intercom_core::ReviewerId;
use sqlx::SqlitePool;

/// Per-reviewer progress counter of the registration dialogue.
///
/// Step `0` means "not registering"; it is also what an unknown reviewer
/// reads back.
pub trait RegistrationStore: Send + Sync {
    fn get_step(&self, reviewer: ReviewerId) -> impl Future<Output = StorageResult<u32>> + Send;

    fn set_step(
        &self,
        reviewer: ReviewerId,
        step: u32,
    ) -> impl Future<Output = StorageResult<()>> + Send;
}

/// SQLite implementation of RegistrationStore
#[derive(Debug, Clone)]
pub struct SqliteRegistrationStore {
    pool: SqlitePool,
}

impl SqliteRegistrationStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl RegistrationStore for SqliteRegistrationStore {
    async fn get_step(&self, reviewer: ReviewerId) -> StorageResult<u32> {
        let step: Option<(i64,)> =
            sqlx::query_as("SELECT step FROM registration_flags WHERE reviewer_id = ?")
                .bind(reviewer.as_i64())
                .fetch_optional(&self.pool)
                .await?;

        Ok(step
            .and_then(|(step,)| u32::try_from(step).ok())
            .unwrap_or(0))
    }

    async fn set_step(&self, reviewer: ReviewerId, step: u32) -> StorageResult<()> {
        if step == 0 {
            sqlx::query("DELETE FROM registration_flags WHERE reviewer_id = ?")
                .bind(reviewer.as_i64())
                .execute(&self.pool)
                .await?;
            return Ok(());
        }

        sqlx::query(
            r#"
            INSERT INTO registration_flags (reviewer_id, step)
            VALUES (?, ?)
            ON CONFLICT (reviewer_id) DO UPDATE
            SET step = excluded.step,
                updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
            "#,
        )
        .bind(reviewer.as_i64())
        .bind(i64::from(step))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
