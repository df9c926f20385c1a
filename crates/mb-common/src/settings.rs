use std::collections::HashSet;

use async_trait::async_trait;
use deadpool_postgres::PoolError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_postgres::Error as PgError;

pub const DEFAULT_MINIMUM_MATCH_SCORE: f64 = 40.0;
pub const DEFAULT_QUOTA_WINDOW_DAYS: i64 = 15;
pub const DEFAULT_QUOTA_LIMIT: i64 = 1;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to get postgres connection: {0}")]
    Pool(#[from] PoolError),
    #[error("postgres error: {0}")]
    Postgres(#[from] PgError),
}

/// Admission-gate tunables managed outside this subsystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotaSettings {
    pub enabled: bool,
    pub window_days: i64,
    pub limit: i64,
    /// Candidates granted premium-equivalent access without a paid tier.
    pub tier_override_allowlist: HashSet<i64>,
}

impl Default for QuotaSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            window_days: DEFAULT_QUOTA_WINDOW_DAYS,
            limit: DEFAULT_QUOTA_LIMIT,
            tier_override_allowlist: HashSet::new(),
        }
    }
}

/// Injected source of admin-managed tunables. Constructed once and passed to
/// the pipeline and the admission gate; scoring code never reads ambient
/// configuration.
#[async_trait]
pub trait SettingsProvider: Send + Sync {
    async fn minimum_match_score(&self) -> Result<f64, SettingsError>;
    async fn quota_settings(&self) -> Result<QuotaSettings, SettingsError>;
}

/// Fixed settings for tests and CLI overrides.
#[derive(Debug, Clone)]
pub struct StaticSettings {
    pub minimum_match_score: f64,
    pub quota: QuotaSettings,
}

impl Default for StaticSettings {
    fn default() -> Self {
        Self {
            minimum_match_score: DEFAULT_MINIMUM_MATCH_SCORE,
            quota: QuotaSettings::default(),
        }
    }
}

#[async_trait]
impl SettingsProvider for StaticSettings {
    async fn minimum_match_score(&self) -> Result<f64, SettingsError> {
        Ok(self.minimum_match_score)
    }

    async fn quota_settings(&self) -> Result<QuotaSettings, SettingsError> {
        Ok(self.quota.clone())
    }
}
