use axum::{Json, extract::Path, response::IntoResponse};
use uuid::Uuid;

use crate::api::extractors::AdminAuth;
use crate::state::AppState;

use super::AdminApiError;

/// `GET /auctions/{auction_id}`: current session state.
pub async fn get_auction(
    state: axum::extract::State<AppState>,
    _auth: AdminAuth,
    Path(auction_id): Path<Uuid>,
) -> Result<impl IntoResponse, AdminApiError> {
    let session = state
        .coordinator
        .session(auction_id)
        .await?
        .ok_or(AdminApiError::NotFound)?;
    Ok(Json(session.to_response()))
}

/// `GET /auctions/{auction_id}/claims`: every claim, winning or not, in
/// arrival order.
pub async fn list_claims(
    state: axum::extract::State<AppState>,
    _auth: AdminAuth,
    Path(auction_id): Path<Uuid>,
) -> Result<impl IntoResponse, AdminApiError> {
    if state.coordinator.session(auction_id).await?.is_none() {
        return Err(AdminApiError::NotFound);
    }
    let claims = state.coordinator.claims(auction_id).await?;
    let response: Vec<_> = claims.iter().map(|c| c.to_response()).collect();
    Ok(Json(response))
}

/// `GET /auctions/{auction_id}/audit`: the audit trail in sequence order.
pub async fn audit_trail(
    state: axum::extract::State<AppState>,
    _auth: AdminAuth,
    Path(auction_id): Path<Uuid>,
) -> Result<impl IntoResponse, AdminApiError> {
    let events = state.coordinator.audit_trail(auction_id).await?;
    let response: Vec<_> = events.iter().map(|e| e.to_response()).collect();
    Ok(Json(response))
}
