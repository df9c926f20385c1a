use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;

use mb_common::matching::{
    CandidateBatchOptions, CandidateBatchStats, FleetBatchOptions, FleetBatchStats,
};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::SharedState;

const MAX_CANDIDATE_LIMIT: i64 = 10_000;
const DEFAULT_CANDIDATE_LIMIT: i64 = 1_000;

#[derive(Debug, Deserialize, Default)]
pub struct RescoreRequest {
    /// Overrides the stored minimum match score for this run only.
    pub min_score: Option<f64>,
    pub job_limit: Option<i64>,
    /// Score against a single job, e.g. right after it was posted.
    pub job_id: Option<i64>,
}

pub async fn rescore_candidate(
    State(state): State<SharedState>,
    Path(candidate_id): Path<i64>,
    _auth: AuthUser,
    payload: Option<Json<RescoreRequest>>,
) -> Result<Json<CandidateBatchStats>, ApiError> {
    let request = payload.map(|Json(body)| body).unwrap_or_default();
    validate_overrides(request.min_score, request.job_limit)?;

    let opts = CandidateBatchOptions {
        min_score: request.min_score,
        job_limit: request.job_limit,
        job_filter: request.job_id,
    };

    let stats = state
        .pipeline
        .match_candidate_to_all_jobs(candidate_id, &opts)
        .await?;

    Ok(Json(stats))
}

#[derive(Debug, Deserialize, Default)]
pub struct FleetRescoreRequest {
    pub candidate_limit: Option<i64>,
    pub min_score: Option<f64>,
    pub job_limit: Option<i64>,
}

pub async fn rescore_all(
    State(state): State<SharedState>,
    _auth: AuthUser,
    payload: Option<Json<FleetRescoreRequest>>,
) -> Result<Json<FleetBatchStats>, ApiError> {
    let request = payload.map(|Json(body)| body).unwrap_or_default();
    validate_overrides(request.min_score, request.job_limit)?;

    let candidate_limit = request.candidate_limit.unwrap_or(DEFAULT_CANDIDATE_LIMIT);
    if !(1..=MAX_CANDIDATE_LIMIT).contains(&candidate_limit) {
        return Err(ApiError::BadRequest(format!(
            "candidate_limit must be between 1 and {MAX_CANDIDATE_LIMIT}"
        )));
    }

    let opts = FleetBatchOptions {
        candidate_limit,
        min_score: request.min_score,
        job_limit: request.job_limit,
        job_filter: None,
    };

    let stats = state
        .pipeline
        .match_all_candidates(&opts, &state.batch_stop)
        .await?;

    Ok(Json(stats))
}

fn validate_overrides(min_score: Option<f64>, job_limit: Option<i64>) -> Result<(), ApiError> {
    if let Some(score) = min_score {
        if !(0.0..=100.0).contains(&score) {
            return Err(ApiError::BadRequest(
                "min_score must be between 0 and 100".into(),
            ));
        }
    }

    if let Some(limit) = job_limit {
        if limit < 1 {
            return Err(ApiError::BadRequest("job_limit must be positive".into()));
        }
    }

    Ok(())
}
