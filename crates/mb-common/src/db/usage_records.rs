use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::instrument;

use crate::db::PgPool;
use crate::quota::{ActionKind, UsageRecord, UsageStorageError, UsageStore};

/// Append-only usage log backing the admission gate. Window queries hit the
/// `(candidate_id, action, created_at)` index.
pub struct PgUsageStore {
    pool: PgPool,
}

impl PgUsageStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UsageStore for PgUsageStore {
    #[instrument(skip(self, record), fields(candidate_id = record.candidate_id, action = %record.action))]
    async fn record(&self, record: &UsageRecord) -> Result<(), UsageStorageError> {
        let client = self.pool.get().await?;
        let stmt = client
            .prepare_cached(
                "INSERT INTO mb.usage_records (candidate_id, job_id, action, created_at, origin)
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .await?;

        client
            .execute(
                &stmt,
                &[
                    &record.candidate_id,
                    &record.job_id,
                    &record.action.as_str(),
                    &record.created_at,
                    &record.origin,
                ],
            )
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn count_in_window(
        &self,
        candidate_id: i64,
        action: ActionKind,
        since: DateTime<Utc>,
    ) -> Result<i64, UsageStorageError> {
        let client = self.pool.get().await?;
        let stmt = client
            .prepare_cached(
                "SELECT COUNT(*) FROM mb.usage_records
                 WHERE candidate_id = $1 AND action = $2 AND created_at >= $3",
            )
            .await?;

        let row = client
            .query_one(&stmt, &[&candidate_id, &action.as_str(), &since])
            .await?;
        Ok(row.get(0))
    }

    #[instrument(skip(self))]
    async fn oldest_in_window(
        &self,
        candidate_id: i64,
        action: ActionKind,
        since: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, UsageStorageError> {
        let client = self.pool.get().await?;
        let stmt = client
            .prepare_cached(
                "SELECT MIN(created_at) FROM mb.usage_records
                 WHERE candidate_id = $1 AND action = $2 AND created_at >= $3",
            )
            .await?;

        let row = client
            .query_one(&stmt, &[&candidate_id, &action.as_str(), &since])
            .await?;
        Ok(row.get(0))
    }
}
