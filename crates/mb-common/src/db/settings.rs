use async_trait::async_trait;
use tracing::{instrument, warn};

use crate::db::PgPool;
use crate::settings::{
    QuotaSettings, SettingsError, SettingsProvider, DEFAULT_MINIMUM_MATCH_SCORE,
};

/// Admin-managed tunables stored as JSONB rows in `mb.app_settings`. A
/// missing or malformed row falls back to the compiled-in default so a bad
/// admin edit degrades instead of taking matching down.
pub struct PgSettingsProvider {
    pool: PgPool,
}

const MINIMUM_MATCH_SCORE_KEY: &str = "minimum_match_score";
const QUOTA_KEY: &str = "quota";

impl PgSettingsProvider {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_value(&self, key: &str) -> Result<Option<serde_json::Value>, SettingsError> {
        let client = self.pool.get().await?;
        let stmt = client
            .prepare_cached("SELECT value FROM mb.app_settings WHERE key = $1")
            .await?;

        let row = client.query_opt(&stmt, &[&key]).await?;
        Ok(row.map(|row| row.get("value")))
    }
}

#[async_trait]
impl SettingsProvider for PgSettingsProvider {
    #[instrument(skip(self))]
    async fn minimum_match_score(&self) -> Result<f64, SettingsError> {
        let value = self.fetch_value(MINIMUM_MATCH_SCORE_KEY).await?;
        Ok(match value.as_ref().and_then(|v| v.as_f64()) {
            Some(score) if (0.0..=100.0).contains(&score) => score,
            Some(_) | None => {
                if let Some(value) = value {
                    warn!(%value, "minimum_match_score setting out of range; using default");
                }
                DEFAULT_MINIMUM_MATCH_SCORE
            }
        })
    }

    #[instrument(skip(self))]
    async fn quota_settings(&self) -> Result<QuotaSettings, SettingsError> {
        let Some(value) = self.fetch_value(QUOTA_KEY).await? else {
            return Ok(QuotaSettings::default());
        };

        match serde_json::from_value(value) {
            Ok(quota) => Ok(quota),
            Err(err) => {
                warn!(error = %err, "quota setting malformed; using default");
                Ok(QuotaSettings::default())
            }
        }
    }
}
