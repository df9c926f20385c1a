//! In-memory implementations of the collaborator traits, used by unit tests
//! across the workspace and by the API router tests. Kept in the crate proper
//! (not behind `cfg(test)`) so downstream crates can build test states.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::matching::pipeline::{CatalogError, JobCatalog, ProfileReader};
use crate::quota::{ActionKind, UsageRecord, UsageStorageError, UsageStore};
use crate::store::{
    BulkUpsertOutcome, MatchPage, MatchQuery, MatchRecord, MatchStatus, MatchStorageError,
    MatchStore, MatchUpsert, PageMeta, UpsertOutcome,
};
use crate::{CandidateProfile, JobRecord, JobStatus};

#[derive(Default)]
pub struct MemoryProfiles {
    profiles: BTreeMap<i64, CandidateProfile>,
    active_ids: Option<Vec<i64>>,
}

impl MemoryProfiles {
    pub fn with_profiles(profiles: Vec<CandidateProfile>) -> Self {
        Self {
            profiles: profiles.into_iter().map(|p| (p.id, p)).collect(),
            active_ids: None,
        }
    }

    /// Override the active-candidate listing, e.g. to include ids without a
    /// stored profile.
    pub fn with_active_ids(mut self, ids: Vec<i64>) -> Self {
        self.active_ids = Some(ids);
        self
    }
}

#[async_trait]
impl ProfileReader for MemoryProfiles {
    async fn get_profile(
        &self,
        candidate_id: i64,
    ) -> Result<Option<CandidateProfile>, CatalogError> {
        Ok(self.profiles.get(&candidate_id).cloned())
    }

    async fn list_active_candidates(&self, limit: i64) -> Result<Vec<i64>, CatalogError> {
        let mut ids = match &self.active_ids {
            Some(ids) => ids.clone(),
            None => self.profiles.keys().copied().collect(),
        };
        ids.truncate(limit.max(0) as usize);
        Ok(ids)
    }
}

#[derive(Default)]
pub struct MemoryJobs {
    jobs: Vec<JobRecord>,
}

impl MemoryJobs {
    pub fn with_jobs(jobs: Vec<JobRecord>) -> Self {
        Self { jobs }
    }
}

#[async_trait]
impl JobCatalog for MemoryJobs {
    async fn list_active_jobs(&self, limit: i64) -> Result<Vec<JobRecord>, CatalogError> {
        let mut jobs: Vec<JobRecord> = self
            .jobs
            .iter()
            .filter(|job| job.status != JobStatus::Archived)
            .cloned()
            .collect();
        jobs.truncate(limit.max(0) as usize);
        Ok(jobs)
    }

    async fn get_active_job(&self, job_id: i64) -> Result<Option<JobRecord>, CatalogError> {
        Ok(self
            .jobs
            .iter()
            .find(|job| job.id == job_id && job.status == JobStatus::Active)
            .cloned())
    }
}

#[derive(Default)]
struct MatchStoreInner {
    records: Vec<MatchRecord>,
    next_id: i64,
}

/// In-memory [`MatchStore`] upholding the same (candidate, job) uniqueness
/// invariant as the Postgres implementation.
#[derive(Default)]
pub struct MemoryMatchStore {
    inner: Mutex<MatchStoreInner>,
    fail_next_bulk: AtomicBool,
}

impl MemoryMatchStore {
    pub fn record_count(&self) -> usize {
        self.inner.lock().unwrap().records.len()
    }

    /// Make the next `bulk_upsert` fail with a storage error.
    pub fn fail_next_bulk_upsert(&self) {
        self.fail_next_bulk.store(true, Ordering::SeqCst);
    }

    fn apply_upsert(inner: &mut MatchStoreInner, upsert: &MatchUpsert) -> UpsertOutcome {
        let now = Utc::now();
        if let Some(existing) = inner
            .records
            .iter_mut()
            .find(|r| r.candidate_id == upsert.candidate_id && r.job_id == upsert.job_id)
        {
            existing.score = upsert.score.clone();
            existing.updated_at = now;
            return UpsertOutcome::Updated;
        }

        inner.next_id += 1;
        inner.records.push(MatchRecord {
            id: inner.next_id,
            candidate_id: upsert.candidate_id,
            job_id: upsert.job_id,
            score: upsert.score.clone(),
            status: MatchStatus::Matched,
            created_at: now,
            updated_at: now,
            viewed_at: None,
        });
        UpsertOutcome::Created
    }
}

#[async_trait]
impl MatchStore for MemoryMatchStore {
    async fn upsert(&self, upsert: &MatchUpsert) -> Result<UpsertOutcome, MatchStorageError> {
        let mut inner = self.inner.lock().unwrap();
        Ok(Self::apply_upsert(&mut inner, upsert))
    }

    async fn bulk_upsert(
        &self,
        batch: &[MatchUpsert],
    ) -> Result<BulkUpsertOutcome, MatchStorageError> {
        if self.fail_next_bulk.swap(false, Ordering::SeqCst) {
            return Err(MatchStorageError::Mapping("injected bulk failure".into()));
        }

        let mut inner = self.inner.lock().unwrap();
        let mut outcome = BulkUpsertOutcome::default();
        for upsert in batch {
            match Self::apply_upsert(&mut inner, upsert) {
                UpsertOutcome::Created => outcome.created += 1,
                UpsertOutcome::Updated => outcome.updated += 1,
            }
        }
        Ok(outcome)
    }

    async fn query_by_candidate(
        &self,
        candidate_id: i64,
        query: &MatchQuery,
    ) -> Result<MatchPage, MatchStorageError> {
        query.validate()?;

        let inner = self.inner.lock().unwrap();
        let mut matches: Vec<MatchRecord> = inner
            .records
            .iter()
            .filter(|r| r.candidate_id == candidate_id && r.score.total >= query.min_score)
            .cloned()
            .collect();

        matches.sort_by(|a, b| {
            let ord = a
                .score
                .total
                .partial_cmp(&b.score.total)
                .unwrap_or(std::cmp::Ordering::Equal);
            if query.sort_descending {
                ord.reverse()
            } else {
                ord
            }
        });

        let total = matches.len() as i64;
        let items: Vec<MatchRecord> = matches
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.page_size as usize)
            .collect();

        Ok(MatchPage {
            items,
            meta: PageMeta::compute(query.page, query.page_size, total),
        })
    }

    async fn fetch_by_id(&self, match_id: i64) -> Result<Option<MatchRecord>, MatchStorageError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.records.iter().find(|r| r.id == match_id).cloned())
    }

    async fn update_status(
        &self,
        match_id: i64,
        next: MatchStatus,
    ) -> Result<MatchRecord, MatchStorageError> {
        let mut inner = self.inner.lock().unwrap();
        let record = inner
            .records
            .iter_mut()
            .find(|r| r.id == match_id)
            .ok_or(MatchStorageError::NotFound(match_id))?;

        if !record.status.can_transition(next) {
            return Err(MatchStorageError::InvalidTransition {
                from: record.status,
                to: next,
            });
        }

        record.status = next;
        record.updated_at = Utc::now();
        if next == MatchStatus::Viewed {
            record.viewed_at = Some(record.updated_at);
        }
        Ok(record.clone())
    }
}

#[derive(Default)]
pub struct MemoryUsageStore {
    records: Mutex<Vec<UsageRecord>>,
}

impl MemoryUsageStore {
    /// Seed the log directly, e.g. with backdated entries.
    pub fn push(&self, record: UsageRecord) {
        self.records.lock().unwrap().push(record);
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl UsageStore for MemoryUsageStore {
    async fn record(&self, record: &UsageRecord) -> Result<(), UsageStorageError> {
        self.push(record.clone());
        Ok(())
    }

    async fn count_in_window(
        &self,
        candidate_id: i64,
        action: ActionKind,
        since: DateTime<Utc>,
    ) -> Result<i64, UsageStorageError> {
        let records = self.records.lock().unwrap();
        Ok(records
            .iter()
            .filter(|r| {
                r.candidate_id == candidate_id && r.action == action && r.created_at >= since
            })
            .count() as i64)
    }

    async fn oldest_in_window(
        &self,
        candidate_id: i64,
        action: ActionKind,
        since: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, UsageStorageError> {
        let records = self.records.lock().unwrap();
        Ok(records
            .iter()
            .filter(|r| {
                r.candidate_id == candidate_id && r.action == action && r.created_at >= since
            })
            .map(|r| r.created_at)
            .min())
    }
}
