use async_trait::async_trait;
use tokio_postgres::Row;
use tracing::instrument;

use crate::db::PgPool;
use crate::matching::pipeline::{CatalogError, JobCatalog};
use crate::{JobRecord, JobStatus};

pub struct PgJobCatalog {
    pool: PgPool,
}

impl PgJobCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_to_job(row: &Row) -> Result<JobRecord, CatalogError> {
    let id: i64 = row.get("id");

    let status_raw: String = row.get("status");
    let status = JobStatus::parse(&status_raw).ok_or_else(|| {
        CatalogError::Mapping(format!("job {id}: unknown status: {status_raw}"))
    })?;

    Ok(JobRecord {
        id,
        title: row.get("title"),
        description: row.get("description"),
        requirements: row.get("requirements"),
        tech_stack: row.get("tech_stack"),
        location: row.get("location"),
        employment_type: row.get("employment_type"),
        status,
    })
}

#[async_trait]
impl JobCatalog for PgJobCatalog {
    /// Newest active jobs first; paused and archived postings never reach the
    /// scorer.
    #[instrument(skip(self))]
    async fn list_active_jobs(&self, limit: i64) -> Result<Vec<JobRecord>, CatalogError> {
        let client = self.pool.get().await?;
        let stmt = client
            .prepare_cached(
                "SELECT id, title, description, requirements, tech_stack,
                        location, employment_type, status
                 FROM mb.jobs
                 WHERE status = 'active'
                 ORDER BY created_at DESC
                 LIMIT $1",
            )
            .await?;

        let rows = client.query(&stmt, &[&limit]).await?;
        rows.iter().map(row_to_job).collect()
    }

    #[instrument(skip(self))]
    async fn get_active_job(&self, job_id: i64) -> Result<Option<JobRecord>, CatalogError> {
        let client = self.pool.get().await?;
        let stmt = client
            .prepare_cached(
                "SELECT id, title, description, requirements, tech_stack,
                        location, employment_type, status
                 FROM mb.jobs
                 WHERE id = $1 AND status = 'active'",
            )
            .await?;

        let row = client.query_opt(&stmt, &[&job_id]).await?;
        row.as_ref().map(row_to_job).transpose()
    }
}
