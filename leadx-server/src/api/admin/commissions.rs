use axum::{Json, extract::Path, response::IntoResponse};
use uuid::Uuid;

use crate::api::extractors::AdminAuth;
use crate::state::AppState;

use super::AdminApiError;

/// `GET /requirements/{requirement_id}/commissions`: entitlement and any
/// reversal recorded for the requirement.
pub async fn list_commissions(
    state: axum::extract::State<AppState>,
    _auth: AdminAuth,
    Path(requirement_id): Path<Uuid>,
) -> Result<impl IntoResponse, AdminApiError> {
    if state.coordinator.requirement(requirement_id).await?.is_none() {
        return Err(AdminApiError::NotFound);
    }
    let records = state.coordinator.commissions(requirement_id).await?;
    let response: Vec<_> = records.iter().map(|r| r.to_response()).collect();
    Ok(Json(response))
}
