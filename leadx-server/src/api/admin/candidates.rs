use axum::{Json, extract::Path, http::StatusCode, response::IntoResponse};
use compact_str::CompactString;
use leadx_core::entities::CandidateId;
use leadx_sdk::objects::{RegisterCandidate, UpdateCandidateStatus};

use crate::api::extractors::AdminAuth;
use crate::state::AppState;

use super::AdminApiError;

/// `POST /candidates`: register an intermediary or replace its profile.
pub async fn register_candidate(
    state: axum::extract::State<AppState>,
    _auth: AdminAuth,
    Json(request): Json<RegisterCandidate>,
) -> Result<impl IntoResponse, AdminApiError> {
    let candidate = state.coordinator.directory().register(request).await?;
    Ok((StatusCode::CREATED, Json(candidate.to_response())))
}

/// `GET /candidates`: list the directory.
pub async fn list_candidates(
    state: axum::extract::State<AppState>,
    _auth: AdminAuth,
) -> Result<impl IntoResponse, AdminApiError> {
    let candidates = state.coordinator.directory().snapshot().await?;
    let response: Vec<_> = candidates.iter().map(|c| c.to_response()).collect();
    Ok(Json(response))
}

/// `POST /candidates/{candidate_id}/status`: verify or suspend a candidate.
pub async fn update_candidate_status(
    state: axum::extract::State<AppState>,
    _auth: AdminAuth,
    Path(candidate_id): Path<CompactString>,
    Json(request): Json<UpdateCandidateStatus>,
) -> Result<impl IntoResponse, AdminApiError> {
    let candidate = state
        .coordinator
        .directory()
        .set_status(&CandidateId::from(candidate_id), request.status.into())
        .await?;
    Ok(Json(candidate.to_response()))
}
