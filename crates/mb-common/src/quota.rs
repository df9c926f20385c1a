//! Usage-quota admission gate for gated actions (apply, view full details).
//!
//! The gate is evaluated at request time from the append-only usage log plus
//! the candidate's tier; quotas apply per (candidate, action kind) over a
//! rolling window. `check_permission` and `record_action` are deliberately
//! separate calls, matching the reference behavior: two concurrent requests
//! from the same free-tier candidate can both pass the check before either
//! logs, permitting at most one extra action per race. Callers must only
//! record after an allowed check.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use deadpool_postgres::PoolError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_postgres::Error as PgError;
use tracing::{debug, instrument};

use crate::matching::pipeline::{CatalogError, ProfileReader};
use crate::settings::{SettingsError, SettingsProvider};
use crate::SubscriptionTier;

#[derive(Debug, Error)]
pub enum UsageStorageError {
    #[error("failed to get postgres connection: {0}")]
    Pool(#[from] PoolError),
    #[error("postgres error: {0}")]
    Postgres(#[from] PgError),
    #[error("failed to map usage row: {0}")]
    Mapping(String),
}

#[derive(Debug, Error)]
pub enum AdmissionError {
    #[error("candidate not found: {0}")]
    CandidateNotFound(i64),
    #[error(transparent)]
    Usage(#[from] UsageStorageError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Apply,
    ViewDetails,
}

impl ActionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::Apply => "apply",
            ActionKind::ViewDetails => "view_details",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "apply" => Some(ActionKind::Apply),
            "view_details" | "view-details" => Some(ActionKind::ViewDetails),
            _ => None,
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry in the append-only usage log. Never updated or deleted by
/// normal operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageRecord {
    pub candidate_id: i64,
    pub job_id: i64,
    pub action: ActionKind,
    pub created_at: DateTime<Utc>,
    pub origin: Option<String>,
}

#[async_trait]
pub trait UsageStore: Send + Sync {
    async fn record(&self, record: &UsageRecord) -> Result<(), UsageStorageError>;

    async fn count_in_window(
        &self,
        candidate_id: i64,
        action: ActionKind,
        since: DateTime<Utc>,
    ) -> Result<i64, UsageStorageError>;

    async fn oldest_in_window(
        &self,
        candidate_id: i64,
        action: ActionKind,
        since: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, UsageStorageError>;
}

/// Outcome of a permission check. A denial is a negative result, not an
/// error; it carries a display-ready reason and the date the window frees up.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdmissionDecision {
    pub allowed: bool,
    /// Remaining actions in the current window; `None` for unlimited access.
    pub remaining: Option<i64>,
    pub reason: Option<String>,
    pub reset_at: Option<DateTime<Utc>>,
}

impl AdmissionDecision {
    fn unlimited() -> Self {
        Self {
            allowed: true,
            remaining: None,
            reason: None,
            reset_at: None,
        }
    }

    fn allowed_with_remaining(remaining: i64) -> Self {
        Self {
            allowed: true,
            remaining: Some(remaining),
            reason: None,
            reset_at: None,
        }
    }

    fn denied(reason: String, reset_at: DateTime<Utc>) -> Self {
        Self {
            allowed: false,
            remaining: Some(0),
            reason: Some(reason),
            reset_at: Some(reset_at),
        }
    }
}

#[derive(Clone)]
pub struct AdmissionGate {
    usage: Arc<dyn UsageStore>,
    settings: Arc<dyn SettingsProvider>,
    profiles: Arc<dyn ProfileReader>,
}

impl AdmissionGate {
    pub fn new(
        usage: Arc<dyn UsageStore>,
        settings: Arc<dyn SettingsProvider>,
        profiles: Arc<dyn ProfileReader>,
    ) -> Self {
        Self {
            usage,
            settings,
            profiles,
        }
    }

    /// Decide whether the candidate may perform the action right now.
    /// Unlimited when the quota is disabled, the candidate is allowlisted, or
    /// the candidate is on the premium tier; otherwise counted against the
    /// rolling window.
    #[instrument(skip(self))]
    pub async fn check_permission(
        &self,
        candidate_id: i64,
        job_id: i64,
        action: ActionKind,
    ) -> Result<AdmissionDecision, AdmissionError> {
        let quota = self.settings.quota_settings().await?;

        if !quota.enabled {
            return Ok(AdmissionDecision::unlimited());
        }

        if quota.tier_override_allowlist.contains(&candidate_id) {
            debug!(candidate_id, "tier override allowlist hit");
            return Ok(AdmissionDecision::unlimited());
        }

        let profile = self
            .profiles
            .get_profile(candidate_id)
            .await?
            .ok_or(AdmissionError::CandidateNotFound(candidate_id))?;

        if profile.tier == SubscriptionTier::Premium {
            return Ok(AdmissionDecision::unlimited());
        }

        let since = Utc::now() - Duration::days(quota.window_days);
        let count = self
            .usage
            .count_in_window(candidate_id, action, since)
            .await?;

        if count < quota.limit {
            return Ok(AdmissionDecision::allowed_with_remaining(
                quota.limit - count,
            ));
        }

        let oldest = self
            .usage
            .oldest_in_window(candidate_id, action, since)
            .await?
            .unwrap_or_else(Utc::now);
        let reset_at = oldest + Duration::days(quota.window_days);

        Ok(AdmissionDecision::denied(
            format!(
                "free tier allows {} {} action(s) per {} days; next slot opens {}",
                quota.limit,
                action,
                quota.window_days,
                reset_at.format("%Y-%m-%d")
            ),
            reset_at,
        ))
    }

    /// Append one usage entry. Must be called only after an allowed
    /// `check_permission`; see the module docs for the accepted race.
    #[instrument(skip(self, origin))]
    pub async fn record_action(
        &self,
        candidate_id: i64,
        job_id: i64,
        action: ActionKind,
        origin: Option<String>,
    ) -> Result<UsageRecord, AdmissionError> {
        let record = UsageRecord {
            candidate_id,
            job_id,
            action,
            created_at: Utc::now(),
            origin,
        };
        self.usage.record(&record).await?;
        Ok(record)
    }
}
