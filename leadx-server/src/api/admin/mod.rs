//! Admin API handlers.
//!
//! These endpoints are called by operators and require the
//! `Leadx-Admin-Authorization` header with the plaintext admin secret.
//!
//! # Endpoints
//!
//! - `POST /commands`                                – cancel or force-expire an auction
//! - `POST /candidates`                              – register or update an intermediary
//! - `GET  /candidates`                              – list the candidate directory
//! - `POST /candidates/{candidate_id}/status`        – change verification status
//! - `GET  /auctions/{auction_id}`                   – auction session
//! - `GET  /auctions/{auction_id}/claims`            – claims in arrival order
//! - `GET  /auctions/{auction_id}/audit`             – audit trail
//! - `GET  /requirements/{requirement_id}/commissions` – commission records
//! - `GET  /market?location=..&limit=..`             – per-location market report

use axum::{
    Router,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use leadx_core::processors::EngineError;
use leadx_core::store::StoreError;

use crate::api::engine_error_status;
use crate::state::AppState;

mod auctions;
mod candidates;
mod commands;
mod commissions;
mod market;

/// Build the Admin API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/commands", post(commands::execute_command))
        .route(
            "/candidates",
            post(candidates::register_candidate).get(candidates::list_candidates),
        )
        .route(
            "/candidates/{candidate_id}/status",
            post(candidates::update_candidate_status),
        )
        .route("/auctions/{auction_id}", get(auctions::get_auction))
        .route("/auctions/{auction_id}/claims", get(auctions::list_claims))
        .route("/auctions/{auction_id}/audit", get(auctions::audit_trail))
        .route(
            "/requirements/{requirement_id}/commissions",
            get(commissions::list_commissions),
        )
        .route("/market", get(market::market_report))
}

// ---------------------------------------------------------------------------
// Shared error type
// ---------------------------------------------------------------------------

/// Errors that can occur in Admin API handlers.
#[derive(Debug)]
pub(crate) enum AdminApiError {
    Engine(EngineError),
    NotFound,
}

impl From<EngineError> for AdminApiError {
    fn from(err: EngineError) -> Self {
        Self::Engine(err)
    }
}

impl From<StoreError> for AdminApiError {
    fn from(err: StoreError) -> Self {
        Self::Engine(EngineError::Store(err))
    }
}

impl IntoResponse for AdminApiError {
    fn into_response(self) -> axum::response::Response {
        match self {
            AdminApiError::Engine(e) => engine_error_status(&e, "admin").into_response(),
            AdminApiError::NotFound => {
                (StatusCode::NOT_FOUND, "resource not found").into_response()
            }
        }
    }
}
