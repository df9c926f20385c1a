use async_trait::async_trait;
use tokio_postgres::Row;
use tracing::{instrument, warn};

use crate::db::PgPool;
use crate::matching::pipeline::{CatalogError, ProfileReader};
use crate::{CandidateProfile, CareerLevel, SubscriptionTier, WorkMode};

pub struct PgProfileReader {
    pool: PgPool,
}

impl PgProfileReader {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const PROFILE_COLUMNS: &str = "id, preferred_roles, preferred_locations, preferred_tech, \
     preferred_domains, experience_years, career_level, work_mode, skills, tier";

fn row_to_profile(row: &Row) -> Result<CandidateProfile, CatalogError> {
    let id: i64 = row.get("id");

    let level_raw: String = row.get("career_level");
    let career_level = CareerLevel::parse(&level_raw).ok_or_else(|| {
        CatalogError::Mapping(format!("candidate {id}: unknown career_level: {level_raw}"))
    })?;

    let mode_raw: String = row.get("work_mode");
    let work_mode = WorkMode::parse(&mode_raw).ok_or_else(|| {
        CatalogError::Mapping(format!("candidate {id}: unknown work_mode: {mode_raw}"))
    })?;

    let tier_raw: String = row.get("tier");
    let tier = SubscriptionTier::parse(&tier_raw).ok_or_else(|| {
        CatalogError::Mapping(format!("candidate {id}: unknown tier: {tier_raw}"))
    })?;

    let experience: i32 = row.get("experience_years");

    let skills_json: serde_json::Value = row.get("skills");
    let skills = match skills_json {
        serde_json::Value::Object(map) => map
            .into_iter()
            .filter_map(|(name, rating)| {
                let rating = rating.as_u64()?;
                Some((name, rating.min(u8::MAX as u64) as u8))
            })
            .collect(),
        other => {
            warn!(candidate_id = id, skills = %other, "skills column is not an object; ignoring");
            Default::default()
        }
    };

    Ok(CandidateProfile {
        id,
        preferred_roles: row.get("preferred_roles"),
        preferred_locations: row.get("preferred_locations"),
        preferred_tech: row.get("preferred_tech"),
        preferred_domains: row.get("preferred_domains"),
        experience_years: experience.max(0) as u32,
        career_level,
        work_mode,
        skills,
        tier,
    })
}

#[async_trait]
impl ProfileReader for PgProfileReader {
    #[instrument(skip(self))]
    async fn get_profile(
        &self,
        candidate_id: i64,
    ) -> Result<Option<CandidateProfile>, CatalogError> {
        let client = self.pool.get().await?;
        let stmt = client
            .prepare_cached(&format!(
                "SELECT {PROFILE_COLUMNS} FROM mb.candidates WHERE id = $1"
            ))
            .await?;

        let row = client.query_opt(&stmt, &[&candidate_id]).await?;
        row.as_ref().map(row_to_profile).transpose()
    }

    #[instrument(skip(self))]
    async fn list_active_candidates(&self, limit: i64) -> Result<Vec<i64>, CatalogError> {
        let client = self.pool.get().await?;
        let stmt = client
            .prepare_cached(
                "SELECT id FROM mb.candidates
                 WHERE is_active
                 ORDER BY id
                 LIMIT $1",
            )
            .await?;

        let rows = client.query(&stmt, &[&limit]).await?;
        Ok(rows.iter().map(|row| row.get("id")).collect())
    }
}
