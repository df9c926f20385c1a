use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_postgres::PoolError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_postgres::Error as PgError;

use crate::matching::ScoredMatch;

/// Hard cap on page size for match listings.
pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Error)]
pub enum MatchStorageError {
    #[error("failed to get postgres connection: {0}")]
    Pool(#[from] PoolError),
    #[error("postgres error: {0}")]
    Postgres(#[from] PgError),
    #[error("match not found: {0}")]
    NotFound(i64),
    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition { from: MatchStatus, to: MatchStatus },
    #[error("invalid query: {0}")]
    Validation(String),
    #[error("failed to map match row: {0}")]
    Mapping(String),
}

/// Lifecycle of a persisted match. Forward-only: matched -> viewed ->
/// applied | rejected. The matched -> viewed step is applied automatically on
/// the first detail read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Matched,
    Viewed,
    Applied,
    Rejected,
}

impl MatchStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchStatus::Matched => "matched",
            MatchStatus::Viewed => "viewed",
            MatchStatus::Applied => "applied",
            MatchStatus::Rejected => "rejected",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "matched" => Some(MatchStatus::Matched),
            "viewed" => Some(MatchStatus::Viewed),
            "applied" => Some(MatchStatus::Applied),
            "rejected" => Some(MatchStatus::Rejected),
            _ => None,
        }
    }

    pub fn can_transition(self, next: MatchStatus) -> bool {
        matches!(
            (self, next),
            (MatchStatus::Matched, MatchStatus::Viewed)
                | (MatchStatus::Matched, MatchStatus::Applied)
                | (MatchStatus::Matched, MatchStatus::Rejected)
                | (MatchStatus::Viewed, MatchStatus::Applied)
                | (MatchStatus::Viewed, MatchStatus::Rejected)
        )
    }
}

impl std::fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One create-or-replace unit for the (candidate, job) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchUpsert {
    pub candidate_id: i64,
    pub job_id: i64,
    pub score: ScoredMatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkUpsertOutcome {
    pub created: u64,
    pub updated: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchRecord {
    pub id: i64,
    pub candidate_id: i64,
    pub job_id: i64,
    #[serde(flatten)]
    pub score: ScoredMatch,
    pub status: MatchStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub viewed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchQuery {
    pub min_score: f64,
    pub sort_descending: bool,
    /// 1-based page number.
    pub page: i64,
    pub page_size: i64,
}

impl Default for MatchQuery {
    fn default() -> Self {
        Self {
            min_score: 0.0,
            sort_descending: true,
            page: 1,
            page_size: 20,
        }
    }
}

impl MatchQuery {
    pub fn validate(&self) -> Result<(), MatchStorageError> {
        if self.page < 1 {
            return Err(MatchStorageError::Validation("page must be >= 1".into()));
        }
        if !(1..=MAX_PAGE_SIZE).contains(&self.page_size) {
            return Err(MatchStorageError::Validation(format!(
                "page_size must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        if !(0.0..=100.0).contains(&self.min_score) {
            return Err(MatchStorageError::Validation(
                "min_score must be between 0 and 100".into(),
            ));
        }
        Ok(())
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.page_size
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageMeta {
    pub page: i64,
    pub page_size: i64,
    pub total: i64,
    pub total_pages: i64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl PageMeta {
    pub fn compute(page: i64, page_size: i64, total: i64) -> Self {
        let total_pages = if total == 0 {
            0
        } else {
            (total + page_size - 1) / page_size
        };

        Self {
            page,
            page_size,
            total,
            total_pages,
            has_next: page < total_pages,
            has_prev: page > 1 && total_pages > 0,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchPage {
    pub items: Vec<MatchRecord>,
    #[serde(flatten)]
    pub meta: PageMeta,
}

/// Persistence contract for match results. Exactly one record may exist per
/// (candidate, job) pair; upserts replace, never duplicate.
#[async_trait]
pub trait MatchStore: Send + Sync {
    /// Create or replace the record for the pair. Last writer wins.
    async fn upsert(&self, upsert: &MatchUpsert) -> Result<UpsertOutcome, MatchStorageError>;

    /// Apply many upserts as one atomic batch; readers never observe a
    /// partially-applied batch. Returns created/updated counts.
    async fn bulk_upsert(
        &self,
        batch: &[MatchUpsert],
    ) -> Result<BulkUpsertOutcome, MatchStorageError>;

    /// Page through one candidate's matches with a server-side minimum-score
    /// filter.
    async fn query_by_candidate(
        &self,
        candidate_id: i64,
        query: &MatchQuery,
    ) -> Result<MatchPage, MatchStorageError>;

    async fn fetch_by_id(&self, match_id: i64) -> Result<Option<MatchRecord>, MatchStorageError>;

    /// Apply a lifecycle transition, stamping `viewed_at` when moving to
    /// viewed. Backward transitions are rejected.
    async fn update_status(
        &self,
        match_id: i64,
        next: MatchStatus,
    ) -> Result<MatchRecord, MatchStorageError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_is_forward_only() {
        assert!(MatchStatus::Matched.can_transition(MatchStatus::Viewed));
        assert!(MatchStatus::Matched.can_transition(MatchStatus::Applied));
        assert!(MatchStatus::Viewed.can_transition(MatchStatus::Rejected));

        assert!(!MatchStatus::Applied.can_transition(MatchStatus::Matched));
        assert!(!MatchStatus::Viewed.can_transition(MatchStatus::Matched));
        assert!(!MatchStatus::Rejected.can_transition(MatchStatus::Applied));
        assert!(!MatchStatus::Viewed.can_transition(MatchStatus::Viewed));
    }

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            MatchStatus::Matched,
            MatchStatus::Viewed,
            MatchStatus::Applied,
            MatchStatus::Rejected,
        ] {
            assert_eq!(MatchStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(MatchStatus::parse("archived"), None);
    }

    #[test]
    fn page_meta_handles_boundaries() {
        let meta = PageMeta::compute(1, 20, 0);
        assert_eq!(meta.total_pages, 0);
        assert!(!meta.has_next);
        assert!(!meta.has_prev);

        let meta = PageMeta::compute(1, 20, 41);
        assert_eq!(meta.total_pages, 3);
        assert!(meta.has_next);
        assert!(!meta.has_prev);

        let meta = PageMeta::compute(3, 20, 41);
        assert!(!meta.has_next);
        assert!(meta.has_prev);
    }

    #[test]
    fn query_validation_rejects_malformed_parameters() {
        let bad_page = MatchQuery {
            page: 0,
            ..MatchQuery::default()
        };
        assert!(bad_page.validate().is_err());

        let bad_size = MatchQuery {
            page_size: MAX_PAGE_SIZE + 1,
            ..MatchQuery::default()
        };
        assert!(bad_size.validate().is_err());

        let bad_score = MatchQuery {
            min_score: 101.0,
            ..MatchQuery::default()
        };
        assert!(bad_score.validate().is_err());

        assert!(MatchQuery::default().validate().is_ok());
        assert_eq!(
            MatchQuery {
                page: 3,
                page_size: 25,
                ..MatchQuery::default()
            }
            .offset(),
            50
        );
    }
}
