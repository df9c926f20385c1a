use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use dotenvy::dotenv;
use thiserror::Error;
use tracing::{info, warn};

use mb_common::db::{
    create_pool_from_url_checked, run_migrations, DbPoolError, MigrationError, PgJobCatalog,
    PgMatchStore, PgProfileReader, PgSettingsProvider,
};
use mb_common::matching::{BatchError, FleetBatchOptions, MatchPipeline};

#[derive(Debug, Clone, Parser)]
#[command(name = "mb-batch", about = "Rescore all active candidates against the job corpus")]
struct Cli {
    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,

    /// Upper bound on candidates per run
    #[arg(long, env = "MB_BATCH_CANDIDATE_LIMIT", default_value_t = 1000)]
    candidate_limit: i64,

    /// Override the stored minimum match score for this run
    #[arg(long, env = "MB_BATCH_MIN_SCORE")]
    min_score: Option<f64>,

    /// Upper bound on jobs scored per candidate
    #[arg(long, env = "MB_BATCH_JOB_LIMIT")]
    job_limit: Option<i64>,

    /// Score only against this job, e.g. right after posting it
    #[arg(long, env = "MB_BATCH_JOB_ID")]
    job_id: Option<i64>,

    /// Concurrent candidate workers
    #[arg(long, env = "MB_BATCH_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,
}

#[derive(Debug, Error)]
enum BatchRunError {
    #[error("invalid arguments: {0}")]
    InvalidArgs(String),
    #[error(transparent)]
    Pool(#[from] DbPoolError),
    #[error(transparent)]
    Migration(#[from] MigrationError),
    #[error(transparent)]
    Batch(#[from] BatchError),
}

/// Reject bad overrides before anything touches the database; a negative
/// limit would otherwise surface as a Postgres error from `LIMIT $1`.
fn validate(cli: &Cli) -> Result<(), BatchRunError> {
    if cli.candidate_limit < 1 {
        return Err(BatchRunError::InvalidArgs(
            "candidate limit must be positive".into(),
        ));
    }
    if let Some(score) = cli.min_score {
        if !(0.0..=100.0).contains(&score) {
            return Err(BatchRunError::InvalidArgs(
                "min score must be between 0 and 100".into(),
            ));
        }
    }
    if matches!(cli.job_limit, Some(limit) if limit < 1) {
        return Err(BatchRunError::InvalidArgs(
            "job limit must be positive".into(),
        ));
    }
    if matches!(cli.job_id, Some(id) if id < 1) {
        return Err(BatchRunError::InvalidArgs("job id must be positive".into()));
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<(), BatchRunError> {
    validate(&cli)?;

    let pool = create_pool_from_url_checked(&cli.database_url).await?;
    run_migrations(&pool).await?;

    let pipeline = MatchPipeline::new(
        Arc::new(PgProfileReader::new(pool.clone())),
        Arc::new(PgJobCatalog::new(pool.clone())),
        Arc::new(PgMatchStore::new(pool.clone())),
        Arc::new(PgSettingsProvider::new(pool.clone())),
    )
    .with_fleet_concurrency(cli.concurrency);

    let stop = Arc::new(AtomicBool::new(false));
    let signal_stop = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; finishing in-flight candidates");
            signal_stop.store(true, Ordering::SeqCst);
        }
    });

    let opts = FleetBatchOptions {
        candidate_limit: cli.candidate_limit,
        min_score: cli.min_score,
        job_limit: cli.job_limit,
        job_filter: cli.job_id,
    };

    let stats = pipeline.match_all_candidates(&opts, &stop).await?;

    info!(
        candidates_processed = stats.candidates_processed,
        candidates_failed = stats.candidates_failed,
        total_matches = stats.total_matches,
        average_score = stats.average_score,
        duration_ms = stats.duration_ms,
        cancelled = stats.cancelled,
        "batch run finished"
    );

    Ok(())
}

#[tokio::main]
async fn main() {
    dotenv().ok();
    mb_common::logging::init(env!("CARGO_PKG_NAME"));

    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        tracing::error!(error = %err, "mb-batch failed");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli_with(extra: &[&str]) -> Cli {
        let mut args = vec!["mb-batch", "--database-url", "postgres://localhost/mb"];
        args.extend_from_slice(extra);
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn default_arguments_pass_validation() {
        assert!(validate(&cli_with(&[])).is_ok());
        assert!(validate(&cli_with(&["--job-limit", "50", "--job-id", "7"])).is_ok());
    }

    #[test]
    fn negative_job_limit_is_rejected_before_any_query() {
        let err = validate(&cli_with(&["--job-limit=-5"])).unwrap_err();
        assert!(matches!(err, BatchRunError::InvalidArgs(_)));
    }

    #[test]
    fn non_positive_job_id_is_rejected() {
        let err = validate(&cli_with(&["--job-id", "0"])).unwrap_err();
        assert!(matches!(err, BatchRunError::InvalidArgs(_)));
    }

    #[test]
    fn out_of_range_min_score_is_rejected() {
        let err = validate(&cli_with(&["--min-score", "250"])).unwrap_err();
        assert!(matches!(err, BatchRunError::InvalidArgs(_)));
    }
}
