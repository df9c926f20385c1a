use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use mb_common::quota::{ActionKind, AdmissionDecision};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::SharedState;

#[derive(Debug, Deserialize)]
pub struct AdmissionRequest {
    pub candidate_id: i64,
    pub job_id: i64,
    pub action: String,
}

impl AdmissionRequest {
    fn action_kind(&self) -> Result<ActionKind, ApiError> {
        ActionKind::parse(&self.action)
            .ok_or_else(|| ApiError::BadRequest(format!("unknown action: {}", self.action)))
    }
}

pub async fn check_permission(
    State(state): State<SharedState>,
    _auth: AuthUser,
    Json(payload): Json<AdmissionRequest>,
) -> Result<Json<AdmissionDecision>, ApiError> {
    let action = payload.action_kind()?;

    let decision = state
        .gate
        .check_permission(payload.candidate_id, payload.job_id, action)
        .await?;

    Ok(Json(decision))
}

#[derive(Debug, Serialize)]
pub struct RecordActionResponse {
    pub recorded: bool,
    pub candidate_id: i64,
    pub job_id: i64,
    pub action: ActionKind,
}

/// Append a usage entry after the caller performed an allowed action. The
/// check and the record are separate requests; see the quota module docs for
/// the race this admits.
pub async fn record_action(
    State(state): State<SharedState>,
    auth: AuthUser,
    Json(payload): Json<AdmissionRequest>,
) -> Result<Json<RecordActionResponse>, ApiError> {
    let action = payload.action_kind()?;

    let record = state
        .gate
        .record_action(
            payload.candidate_id,
            payload.job_id,
            action,
            Some(auth.subject.clone()),
        )
        .await?;

    Ok(Json(RecordActionResponse {
        recorded: true,
        candidate_id: record.candidate_id,
        job_id: record.job_id,
        action: record.action,
    }))
}
