use async_trait::async_trait;
use tokio_postgres::Row;
use tracing::instrument;

use crate::db::PgPool;
use crate::matching::{MatchClass, ScoredMatch};
use crate::store::{
    BulkUpsertOutcome, MatchPage, MatchQuery, MatchRecord, MatchStatus, MatchStorageError,
    MatchStore, MatchUpsert, PageMeta, UpsertOutcome,
};

/// Postgres-backed [`MatchStore`] over `mb.match_results`. The
/// `(candidate_id, job_id)` unique constraint is the uniqueness invariant;
/// upserts are last-writer-wins and never touch lifecycle fields.
pub struct PgMatchStore {
    pool: PgPool,
}

impl PgMatchStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const UPSERT_SQL: &str = "INSERT INTO mb.match_results (
        candidate_id, job_id,
        skill_score, role_score, level_score, experience_score,
        location_score, work_mode_score, total_score, class,
        matched_skills, missing_skills, used_skill_fallback, confidence
    ) VALUES (
        $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14
    )
    ON CONFLICT (candidate_id, job_id) DO UPDATE SET
        skill_score = EXCLUDED.skill_score,
        role_score = EXCLUDED.role_score,
        level_score = EXCLUDED.level_score,
        experience_score = EXCLUDED.experience_score,
        location_score = EXCLUDED.location_score,
        work_mode_score = EXCLUDED.work_mode_score,
        total_score = EXCLUDED.total_score,
        class = EXCLUDED.class,
        matched_skills = EXCLUDED.matched_skills,
        missing_skills = EXCLUDED.missing_skills,
        used_skill_fallback = EXCLUDED.used_skill_fallback,
        confidence = EXCLUDED.confidence,
        updated_at = NOW()
    RETURNING (xmax = 0) AS inserted";

const SELECT_COLUMNS: &str = "id, candidate_id, job_id, skill_score, role_score, level_score, \
     experience_score, location_score, work_mode_score, total_score, class, matched_skills, \
     missing_skills, used_skill_fallback, confidence, status, created_at, updated_at, viewed_at";

fn row_to_record(row: &Row) -> Result<MatchRecord, MatchStorageError> {
    let class_raw: String = row.get("class");
    let class = MatchClass::parse(&class_raw)
        .ok_or_else(|| MatchStorageError::Mapping(format!("unknown class: {class_raw}")))?;

    let status_raw: String = row.get("status");
    let status = MatchStatus::parse(&status_raw)
        .ok_or_else(|| MatchStorageError::Mapping(format!("unknown status: {status_raw}")))?;

    Ok(MatchRecord {
        id: row.get("id"),
        candidate_id: row.get("candidate_id"),
        job_id: row.get("job_id"),
        score: ScoredMatch {
            skill_score: row.get("skill_score"),
            role_score: row.get("role_score"),
            level_score: row.get("level_score"),
            experience_score: row.get("experience_score"),
            location_score: row.get("location_score"),
            work_mode_score: row.get("work_mode_score"),
            total: row.get("total_score"),
            class,
            matched_skills: row.get("matched_skills"),
            missing_skills: row.get("missing_skills"),
            used_skill_fallback: row.get("used_skill_fallback"),
            confidence: row.get("confidence"),
        },
        status,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        viewed_at: row.get("viewed_at"),
    })
}

fn upsert_params<'a>(
    upsert: &'a MatchUpsert,
    class: &'a &'a str,
) -> [&'a (dyn tokio_postgres::types::ToSql + Sync); 14] {
    [
        &upsert.candidate_id,
        &upsert.job_id,
        &upsert.score.skill_score,
        &upsert.score.role_score,
        &upsert.score.level_score,
        &upsert.score.experience_score,
        &upsert.score.location_score,
        &upsert.score.work_mode_score,
        &upsert.score.total,
        class,
        &upsert.score.matched_skills,
        &upsert.score.missing_skills,
        &upsert.score.used_skill_fallback,
        &upsert.score.confidence,
    ]
}

#[async_trait]
impl MatchStore for PgMatchStore {
    #[instrument(skip(self, upsert), fields(candidate_id = upsert.candidate_id, job_id = upsert.job_id))]
    async fn upsert(&self, upsert: &MatchUpsert) -> Result<UpsertOutcome, MatchStorageError> {
        let client = self.pool.get().await?;
        let stmt = client.prepare_cached(UPSERT_SQL).await?;

        let class = upsert.score.class.as_str();
        let row = client
            .query_one(&stmt, &upsert_params(upsert, &class))
            .await?;
        let inserted: bool = row.get("inserted");

        Ok(if inserted {
            UpsertOutcome::Created
        } else {
            UpsertOutcome::Updated
        })
    }

    /// All rows of the batch land in one transaction so a reader never
    /// observes a candidate's match set mid-update.
    #[instrument(skip(self, batch), fields(batch_len = batch.len()))]
    async fn bulk_upsert(
        &self,
        batch: &[MatchUpsert],
    ) -> Result<BulkUpsertOutcome, MatchStorageError> {
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;
        let stmt = tx.prepare_cached(UPSERT_SQL).await?;

        let mut outcome = BulkUpsertOutcome::default();
        for upsert in batch {
            let class = upsert.score.class.as_str();
            let row = tx.query_one(&stmt, &upsert_params(upsert, &class)).await?;
            let inserted: bool = row.get("inserted");
            if inserted {
                outcome.created += 1;
            } else {
                outcome.updated += 1;
            }
        }

        tx.commit().await?;
        Ok(outcome)
    }

    #[instrument(skip(self, query))]
    async fn query_by_candidate(
        &self,
        candidate_id: i64,
        query: &MatchQuery,
    ) -> Result<MatchPage, MatchStorageError> {
        query.validate()?;

        let client = self.pool.get().await?;

        let count_stmt = client
            .prepare_cached(
                "SELECT COUNT(*) FROM mb.match_results
                 WHERE candidate_id = $1 AND total_score >= $2",
            )
            .await?;
        let total: i64 = client
            .query_one(&count_stmt, &[&candidate_id, &query.min_score])
            .await?
            .get(0);

        let order = if query.sort_descending { "DESC" } else { "ASC" };
        let page_sql = format!(
            "SELECT {SELECT_COLUMNS} FROM mb.match_results
             WHERE candidate_id = $1 AND total_score >= $2
             ORDER BY total_score {order}, id
             LIMIT $3 OFFSET $4"
        );
        let stmt = client.prepare_cached(&page_sql).await?;
        let rows = client
            .query(
                &stmt,
                &[
                    &candidate_id,
                    &query.min_score,
                    &query.page_size,
                    &query.offset(),
                ],
            )
            .await?;

        let items = rows
            .iter()
            .map(row_to_record)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(MatchPage {
            items,
            meta: PageMeta::compute(query.page, query.page_size, total),
        })
    }

    #[instrument(skip(self))]
    async fn fetch_by_id(&self, match_id: i64) -> Result<Option<MatchRecord>, MatchStorageError> {
        let client = self.pool.get().await?;
        let stmt = client
            .prepare_cached(&format!(
                "SELECT {SELECT_COLUMNS} FROM mb.match_results WHERE id = $1"
            ))
            .await?;

        let row = client.query_opt(&stmt, &[&match_id]).await?;
        row.as_ref().map(row_to_record).transpose()
    }

    #[instrument(skip(self))]
    async fn update_status(
        &self,
        match_id: i64,
        next: MatchStatus,
    ) -> Result<MatchRecord, MatchStorageError> {
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;

        let current_stmt = tx
            .prepare_cached("SELECT status FROM mb.match_results WHERE id = $1 FOR UPDATE")
            .await?;
        let row = tx
            .query_opt(&current_stmt, &[&match_id])
            .await?
            .ok_or(MatchStorageError::NotFound(match_id))?;

        let current_raw: String = row.get("status");
        let current = MatchStatus::parse(&current_raw)
            .ok_or_else(|| MatchStorageError::Mapping(format!("unknown status: {current_raw}")))?;

        if !current.can_transition(next) {
            return Err(MatchStorageError::InvalidTransition {
                from: current,
                to: next,
            });
        }

        let update_stmt = tx
            .prepare_cached(&format!(
                "UPDATE mb.match_results
                 SET status = $2,
                     updated_at = NOW(),
                     viewed_at = CASE WHEN $2 = 'viewed' THEN NOW() ELSE viewed_at END
                 WHERE id = $1
                 RETURNING {SELECT_COLUMNS}"
            ))
            .await?;
        let updated = tx.query_one(&update_stmt, &[&match_id, &next.as_str()]).await?;
        let record = row_to_record(&updated)?;

        tx.commit().await?;
        Ok(record)
    }
}
