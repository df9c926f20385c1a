use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use deadpool_postgres::PoolError;
use futures::StreamExt;
use serde::Serialize;
use thiserror::Error;
use tokio_postgres::Error as PgError;
use tracing::{info, instrument, warn};

use crate::matching::{score, ScoredMatch};
use crate::settings::{SettingsError, SettingsProvider};
use crate::store::{MatchStorageError, MatchStore, MatchUpsert};
use crate::{CandidateProfile, JobRecord, JobStatus};

const DEFAULT_JOB_LIMIT: i64 = 500;
const DEFAULT_FLEET_CONCURRENCY: usize = 4;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to get postgres connection: {0}")]
    Pool(#[from] PoolError),
    #[error("postgres error: {0}")]
    Postgres(#[from] PgError),
    #[error("failed to map row: {0}")]
    Mapping(String),
}

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("candidate not found: {0}")]
    CandidateNotFound(i64),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Storage(#[from] MatchStorageError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
}

/// Read-only view of candidate profiles, owned by the user-management side.
#[async_trait]
pub trait ProfileReader: Send + Sync {
    async fn get_profile(&self, candidate_id: i64)
        -> Result<Option<CandidateProfile>, CatalogError>;

    async fn list_active_candidates(&self, limit: i64) -> Result<Vec<i64>, CatalogError>;
}

/// Read-only view of the job corpus, owned by the ingestion side. Archived
/// jobs are excluded by contract.
#[async_trait]
pub trait JobCatalog: Send + Sync {
    async fn list_active_jobs(&self, limit: i64) -> Result<Vec<JobRecord>, CatalogError>;

    /// Fetch one job by id if it is still active. Used by the single-job
    /// trigger, which must reach jobs older than the newest-jobs window.
    async fn get_active_job(&self, job_id: i64) -> Result<Option<JobRecord>, CatalogError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CandidateBatchOptions {
    /// Overrides the configured minimum match score when set.
    pub min_score: Option<f64>,
    /// Bounds the job corpus scan; defaults to [`DEFAULT_JOB_LIMIT`].
    pub job_limit: Option<i64>,
    /// Restrict scoring to a single job (the new-job-ingested trigger).
    pub job_filter: Option<i64>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct CandidateBatchStats {
    pub candidate_id: i64,
    pub jobs_processed: u64,
    pub jobs_matched: u64,
    pub created: u64,
    pub updated: u64,
    /// Average total score over retained matches; 0 when nothing matched.
    pub average_score: f64,
    pub errors: u64,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FleetBatchOptions {
    pub candidate_limit: i64,
    pub min_score: Option<f64>,
    pub job_limit: Option<i64>,
    pub job_filter: Option<i64>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq)]
pub struct FleetBatchStats {
    pub candidates_processed: u64,
    pub candidates_failed: u64,
    pub total_matches: u64,
    /// Match-weighted average score across the fleet.
    pub average_score: f64,
    pub duration_ms: u64,
    pub cancelled: bool,
}

#[derive(Debug, Error)]
#[error("job {job_id}: {reason}")]
struct JobScoreError {
    job_id: i64,
    reason: &'static str,
}

/// Drives the scoring function across the job corpus and persists results.
/// All collaborators are injected at construction time.
#[derive(Clone)]
pub struct MatchPipeline {
    profiles: Arc<dyn ProfileReader>,
    jobs: Arc<dyn JobCatalog>,
    store: Arc<dyn MatchStore>,
    settings: Arc<dyn SettingsProvider>,
    fleet_concurrency: usize,
}

impl MatchPipeline {
    pub fn new(
        profiles: Arc<dyn ProfileReader>,
        jobs: Arc<dyn JobCatalog>,
        store: Arc<dyn MatchStore>,
        settings: Arc<dyn SettingsProvider>,
    ) -> Self {
        Self {
            profiles,
            jobs,
            store,
            settings,
            fleet_concurrency: DEFAULT_FLEET_CONCURRENCY,
        }
    }

    pub fn with_fleet_concurrency(mut self, workers: usize) -> Self {
        self.fleet_concurrency = workers.max(1);
        self
    }

    pub fn store(&self) -> &Arc<dyn MatchStore> {
        &self.store
    }

    /// Score one candidate against the active job corpus and persist every
    /// match at or above the minimum score in a single atomic batch.
    ///
    /// Safe to invoke repeatedly: recomputation updates existing records
    /// instead of accumulating duplicates. Per-job failures are counted and
    /// logged, never abort the batch; storage failures propagate.
    #[instrument(skip(self, opts), fields(candidate_id))]
    pub async fn match_candidate_to_all_jobs(
        &self,
        candidate_id: i64,
        opts: &CandidateBatchOptions,
    ) -> Result<CandidateBatchStats, BatchError> {
        let started = Instant::now();

        let min_score = match opts.min_score {
            Some(value) => value,
            None => self.settings.minimum_match_score().await?,
        };

        let profile = self
            .profiles
            .get_profile(candidate_id)
            .await?
            .ok_or(BatchError::CandidateNotFound(candidate_id))?;

        let mut jobs = match opts.job_filter {
            // Single-job trigger: fetch directly instead of scanning the
            // newest-jobs window, which may not contain an older posting.
            Some(job_id) => self.jobs.get_active_job(job_id).await?.into_iter().collect(),
            None => {
                let job_limit = opts.job_limit.unwrap_or(DEFAULT_JOB_LIMIT);
                self.jobs.list_active_jobs(job_limit).await?
            }
        };
        // The catalog contract excludes archived jobs; enforce it anyway so a
        // stale corpus snapshot cannot resurrect archived postings.
        jobs.retain(|job| job.status != JobStatus::Archived);

        let mut retained: Vec<MatchUpsert> = Vec::new();
        let mut processed = 0u64;
        let mut errors = 0u64;

        for job in &jobs {
            processed += 1;
            match score_job(&profile, job) {
                Ok(scored) => {
                    if scored.total >= min_score {
                        retained.push(MatchUpsert {
                            candidate_id,
                            job_id: job.id,
                            score: scored,
                        });
                    }
                }
                Err(err) => {
                    errors += 1;
                    warn!(candidate_id, error = %err, "skipping unscorable job");
                }
            }
        }

        let matched = retained.len() as u64;
        let average_score = if retained.is_empty() {
            0.0
        } else {
            retained.iter().map(|m| m.score.total).sum::<f64>() / retained.len() as f64
        };

        let outcome = self.store.bulk_upsert(&retained).await?;

        let stats = CandidateBatchStats {
            candidate_id,
            jobs_processed: processed,
            jobs_matched: matched,
            created: outcome.created,
            updated: outcome.updated,
            average_score,
            errors,
            duration_ms: started.elapsed().as_millis() as u64,
        };

        info!(
            candidate_id,
            jobs_processed = stats.jobs_processed,
            jobs_matched = stats.jobs_matched,
            created = stats.created,
            updated = stats.updated,
            errors = stats.errors,
            "candidate batch complete"
        );

        Ok(stats)
    }

    /// Rescore every active candidate with a bounded worker pool. A single
    /// candidate's failure is isolated; the stop flag aborts between
    /// candidate completions without corrupting partially-written state,
    /// since each candidate's matches land in one atomic bulk upsert.
    #[instrument(skip(self, opts, stop))]
    pub async fn match_all_candidates(
        &self,
        opts: &FleetBatchOptions,
        stop: &AtomicBool,
    ) -> Result<FleetBatchStats, BatchError> {
        let started = Instant::now();

        let candidate_ids = self
            .profiles
            .list_active_candidates(opts.candidate_limit)
            .await?;

        let per_candidate = CandidateBatchOptions {
            min_score: opts.min_score,
            job_limit: opts.job_limit,
            job_filter: opts.job_filter,
        };

        let mut stats = FleetBatchStats::default();
        let mut weighted_score_sum = 0.0;

        let mut runs = futures::stream::iter(candidate_ids.into_iter().map(|candidate_id| {
            let per_candidate = per_candidate;
            async move {
                (
                    candidate_id,
                    self.match_candidate_to_all_jobs(candidate_id, &per_candidate)
                        .await,
                )
            }
        }))
        .buffer_unordered(self.fleet_concurrency);

        while let Some((candidate_id, result)) = runs.next().await {
            match result {
                Ok(candidate_stats) => {
                    stats.candidates_processed += 1;
                    stats.total_matches += candidate_stats.jobs_matched;
                    weighted_score_sum +=
                        candidate_stats.average_score * candidate_stats.jobs_matched as f64;
                }
                Err(err) => {
                    stats.candidates_failed += 1;
                    warn!(candidate_id, error = %err, "candidate batch failed");
                }
            }

            if stop.load(Ordering::Relaxed) {
                stats.cancelled = true;
                break;
            }
        }
        drop(runs);

        if stats.total_matches > 0 {
            stats.average_score = weighted_score_sum / stats.total_matches as f64;
        }
        stats.duration_ms = started.elapsed().as_millis() as u64;

        info!(
            candidates_processed = stats.candidates_processed,
            candidates_failed = stats.candidates_failed,
            total_matches = stats.total_matches,
            cancelled = stats.cancelled,
            "fleet batch complete"
        );

        Ok(stats)
    }
}

/// Guard in front of the pure scorer: records that cannot be persisted (no
/// identity) are rejected here so one bad row never aborts the batch.
fn score_job(profile: &CandidateProfile, job: &JobRecord) -> Result<ScoredMatch, JobScoreError> {
    if job.id <= 0 {
        return Err(JobScoreError {
            job_id: job.id,
            reason: "missing job id",
        });
    }

    Ok(score(profile, job))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::StaticSettings;
    use crate::testing::{MemoryJobs, MemoryMatchStore, MemoryProfiles};
    use crate::{CandidateProfile, CareerLevel};
    use std::collections::BTreeMap;

    fn sample_job(id: i64, title: &str, requirements: &[&str]) -> JobRecord {
        JobRecord {
            id,
            title: title.into(),
            description: "Build and maintain production services".into(),
            requirements: requirements.iter().map(|s| s.to_string()).collect(),
            location: Some("Remote".into()),
            employment_type: Some("Full-time".into()),
            ..JobRecord::default()
        }
    }

    fn sample_profile(id: i64) -> CandidateProfile {
        CandidateProfile {
            id,
            skills: BTreeMap::from([("python".to_string(), 4u8), ("sql".to_string(), 3u8)]),
            preferred_roles: vec!["Backend Engineer".into()],
            preferred_locations: vec!["Remote".into()],
            experience_years: 4,
            career_level: CareerLevel::Mid,
            ..CandidateProfile::default()
        }
    }

    fn pipeline_with(
        profiles: MemoryProfiles,
        jobs: MemoryJobs,
        store: Arc<MemoryMatchStore>,
    ) -> MatchPipeline {
        MatchPipeline::new(
            Arc::new(profiles),
            Arc::new(jobs),
            store,
            Arc::new(StaticSettings::default()),
        )
    }

    #[tokio::test]
    async fn missing_candidate_fails_fast() {
        let pipeline = pipeline_with(
            MemoryProfiles::default(),
            MemoryJobs::default(),
            Arc::new(MemoryMatchStore::default()),
        );

        let err = pipeline
            .match_candidate_to_all_jobs(42, &CandidateBatchOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, BatchError::CandidateNotFound(42)));
    }

    #[tokio::test]
    async fn rerun_updates_instead_of_duplicating() {
        let profiles = MemoryProfiles::with_profiles(vec![sample_profile(1)]);
        let jobs = MemoryJobs::with_jobs(vec![
            sample_job(10, "Backend Engineer", &["Python", "SQL"]),
            sample_job(11, "Data Engineer", &["SQL", "Airflow"]),
        ]);
        let store = Arc::new(MemoryMatchStore::default());
        let pipeline = pipeline_with(profiles, jobs, store.clone());

        let first = pipeline
            .match_candidate_to_all_jobs(1, &CandidateBatchOptions::default())
            .await
            .unwrap();
        assert_eq!(first.jobs_processed, 2);
        assert_eq!(first.created, first.jobs_matched);
        assert_eq!(first.updated, 0);
        assert!(first.jobs_matched >= 1);

        let second = pipeline
            .match_candidate_to_all_jobs(1, &CandidateBatchOptions::default())
            .await
            .unwrap();
        assert_eq!(second.created, 0);
        assert_eq!(second.updated, first.jobs_matched);
        assert_eq!(second.jobs_matched, first.jobs_matched);
        assert!((second.average_score - first.average_score).abs() < f64::EPSILON);

        assert_eq!(store.record_count(), first.jobs_matched as usize);
    }

    #[tokio::test]
    async fn malformed_job_is_isolated() {
        let profiles = MemoryProfiles::with_profiles(vec![sample_profile(1)]);
        let mut bad_job = sample_job(0, "Backend Engineer", &["Python"]);
        bad_job.id = 0;
        let jobs = MemoryJobs::with_jobs(vec![
            sample_job(10, "Backend Engineer", &["Python", "SQL"]),
            bad_job,
            sample_job(11, "Platform Engineer", &["Python"]),
        ]);
        let store = Arc::new(MemoryMatchStore::default());
        let pipeline = pipeline_with(profiles, jobs, store.clone());

        let stats = pipeline
            .match_candidate_to_all_jobs(1, &CandidateBatchOptions::default())
            .await
            .unwrap();

        assert_eq!(stats.jobs_processed, 3);
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.jobs_matched, 2);
    }

    #[tokio::test]
    async fn archived_jobs_never_enter_scoring() {
        let profiles = MemoryProfiles::with_profiles(vec![sample_profile(1)]);
        let mut archived = sample_job(12, "Backend Engineer", &["Python"]);
        archived.status = JobStatus::Archived;
        let jobs = MemoryJobs::with_jobs(vec![
            sample_job(10, "Backend Engineer", &["Python"]),
            archived,
        ]);
        let pipeline = pipeline_with(profiles, jobs, Arc::new(MemoryMatchStore::default()));

        let stats = pipeline
            .match_candidate_to_all_jobs(1, &CandidateBatchOptions::default())
            .await
            .unwrap();

        assert_eq!(stats.jobs_processed, 1);
    }

    #[tokio::test]
    async fn min_score_filters_before_persisting() {
        let profiles = MemoryProfiles::with_profiles(vec![sample_profile(1)]);
        let jobs = MemoryJobs::with_jobs(vec![
            sample_job(10, "Backend Engineer", &["Python", "SQL"]),
            sample_job(11, "Farm Hand", &["Tractor"]),
        ]);
        let store = Arc::new(MemoryMatchStore::default());
        let pipeline = pipeline_with(profiles, jobs, store.clone());

        let stats = pipeline
            .match_candidate_to_all_jobs(
                1,
                &CandidateBatchOptions {
                    min_score: Some(60.0),
                    ..CandidateBatchOptions::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(stats.jobs_processed, 2);
        assert_eq!(stats.jobs_matched, 1);
        assert_eq!(store.record_count(), 1);
    }

    #[tokio::test]
    async fn job_filter_restricts_the_corpus() {
        let profiles = MemoryProfiles::with_profiles(vec![sample_profile(1)]);
        let jobs = MemoryJobs::with_jobs(vec![
            sample_job(10, "Backend Engineer", &["Python"]),
            sample_job(11, "Backend Engineer", &["Python"]),
        ]);
        let pipeline = pipeline_with(profiles, jobs, Arc::new(MemoryMatchStore::default()));

        let stats = pipeline
            .match_candidate_to_all_jobs(
                1,
                &CandidateBatchOptions {
                    job_filter: Some(11),
                    ..CandidateBatchOptions::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(stats.jobs_processed, 1);
    }

    #[tokio::test]
    async fn job_filter_reaches_jobs_outside_the_listing_window() {
        // The listing window only returns the newest job, but the single-job
        // trigger must still find the older posting by direct fetch.
        let profiles = MemoryProfiles::with_profiles(vec![sample_profile(1)]);
        let jobs = MemoryJobs::with_jobs(vec![
            sample_job(11, "Backend Engineer", &["Python"]),
            sample_job(10, "Backend Engineer", &["Python"]),
        ]);
        let pipeline = pipeline_with(profiles, jobs, Arc::new(MemoryMatchStore::default()));

        let stats = pipeline
            .match_candidate_to_all_jobs(
                1,
                &CandidateBatchOptions {
                    job_limit: Some(1),
                    job_filter: Some(10),
                    ..CandidateBatchOptions::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(stats.jobs_processed, 1);
        assert_eq!(stats.jobs_matched, 1);
    }

    #[tokio::test]
    async fn job_filter_skips_inactive_targets() {
        let profiles = MemoryProfiles::with_profiles(vec![sample_profile(1)]);
        let mut archived = sample_job(12, "Backend Engineer", &["Python"]);
        archived.status = JobStatus::Archived;
        let jobs = MemoryJobs::with_jobs(vec![archived]);
        let pipeline = pipeline_with(profiles, jobs, Arc::new(MemoryMatchStore::default()));

        let stats = pipeline
            .match_candidate_to_all_jobs(
                1,
                &CandidateBatchOptions {
                    job_filter: Some(12),
                    ..CandidateBatchOptions::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(stats.jobs_processed, 0);
        assert_eq!(stats.jobs_matched, 0);
    }

    #[tokio::test]
    async fn storage_failure_propagates() {
        let profiles = MemoryProfiles::with_profiles(vec![sample_profile(1)]);
        let jobs = MemoryJobs::with_jobs(vec![sample_job(10, "Backend Engineer", &["Python"])]);
        let store = Arc::new(MemoryMatchStore::default());
        store.fail_next_bulk_upsert();
        let pipeline = pipeline_with(profiles, jobs, store);

        let err = pipeline
            .match_candidate_to_all_jobs(1, &CandidateBatchOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, BatchError::Storage(_)));
    }

    #[tokio::test]
    async fn fleet_isolates_per_candidate_failures() {
        // Candidate 2 is listed as active but has no profile: its run fails
        // with NotFound while the others complete.
        let profiles = MemoryProfiles::with_profiles(vec![sample_profile(1), sample_profile(3)])
            .with_active_ids(vec![1, 2, 3]);
        let jobs = MemoryJobs::with_jobs(vec![sample_job(10, "Backend Engineer", &["Python"])]);
        let store = Arc::new(MemoryMatchStore::default());
        let pipeline = pipeline_with(profiles, jobs, store);

        let stats = pipeline
            .match_all_candidates(
                &FleetBatchOptions {
                    candidate_limit: 10,
                    ..FleetBatchOptions::default()
                },
                &AtomicBool::new(false),
            )
            .await
            .unwrap();

        assert_eq!(stats.candidates_processed, 2);
        assert_eq!(stats.candidates_failed, 1);
        assert_eq!(stats.total_matches, 2);
        assert!(!stats.cancelled);
        assert!(stats.average_score > 0.0);
    }

    #[tokio::test]
    async fn fleet_honors_the_stop_flag() {
        let profiles = MemoryProfiles::with_profiles(vec![
            sample_profile(1),
            sample_profile(2),
            sample_profile(3),
        ]);
        let jobs = MemoryJobs::with_jobs(vec![sample_job(10, "Backend Engineer", &["Python"])]);
        let pipeline = pipeline_with(profiles, jobs, Arc::new(MemoryMatchStore::default()))
            .with_fleet_concurrency(1);

        let stop = AtomicBool::new(true);
        let stats = pipeline
            .match_all_candidates(
                &FleetBatchOptions {
                    candidate_limit: 10,
                    ..FleetBatchOptions::default()
                },
                &stop,
            )
            .await
            .unwrap();

        assert!(stats.cancelled);
        assert_eq!(stats.candidates_processed, 1);
    }
}
