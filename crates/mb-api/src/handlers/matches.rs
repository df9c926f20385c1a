use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;

use mb_common::store::{MatchPage, MatchQuery, MatchRecord, MatchStatus};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::SharedState;

#[derive(Debug, Deserialize)]
pub struct ListMatchesQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
    #[serde(default)]
    pub min_score: f64,
    /// "desc" (default) or "asc" by total score.
    #[serde(default)]
    pub order: Option<String>,
}

const fn default_page() -> i64 {
    1
}

const fn default_page_size() -> i64 {
    20
}

pub async fn list_matches(
    State(state): State<SharedState>,
    Path(candidate_id): Path<i64>,
    Query(query): Query<ListMatchesQuery>,
    _auth: AuthUser,
) -> Result<Json<MatchPage>, ApiError> {
    let sort_descending = match query.order.as_deref() {
        None | Some("desc") => true,
        Some("asc") => false,
        Some(other) => {
            return Err(ApiError::BadRequest(format!(
                "order must be asc or desc, got {other}"
            )));
        }
    };

    let match_query = MatchQuery {
        min_score: query.min_score,
        sort_descending,
        page: query.page,
        page_size: query.page_size,
    };

    let page = state
        .pipeline
        .store()
        .query_by_candidate(candidate_id, &match_query)
        .await?;

    Ok(Json(page))
}

/// Fetch one match. The first read of a freshly computed match flips it to
/// viewed, so the frontend never has to issue a separate status call.
pub async fn get_match(
    State(state): State<SharedState>,
    Path((candidate_id, match_id)): Path<(i64, i64)>,
    _auth: AuthUser,
) -> Result<Json<MatchRecord>, ApiError> {
    let record = fetch_owned(&state, candidate_id, match_id).await?;

    let record = if record.status == MatchStatus::Matched {
        state
            .pipeline
            .store()
            .update_status(match_id, MatchStatus::Viewed)
            .await?
    } else {
        record
    };

    Ok(Json(record))
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: String,
}

pub async fn update_match_status(
    State(state): State<SharedState>,
    Path((candidate_id, match_id)): Path<(i64, i64)>,
    _auth: AuthUser,
    Json(payload): Json<StatusUpdateRequest>,
) -> Result<Json<MatchRecord>, ApiError> {
    let next = MatchStatus::parse(&payload.status).ok_or_else(|| {
        ApiError::BadRequest(format!("unknown match status: {}", payload.status))
    })?;

    fetch_owned(&state, candidate_id, match_id).await?;

    let record = state.pipeline.store().update_status(match_id, next).await?;
    Ok(Json(record))
}

/// A match belonging to another candidate is reported as absent, not
/// forbidden, so match ids cannot be probed across accounts.
async fn fetch_owned(
    state: &SharedState,
    candidate_id: i64,
    match_id: i64,
) -> Result<MatchRecord, ApiError> {
    let record = state
        .pipeline
        .store()
        .fetch_by_id(match_id)
        .await?
        .filter(|record| record.candidate_id == candidate_id)
        .ok_or_else(|| ApiError::NotFound(format!("match {match_id} not found")))?;

    Ok(record)
}
