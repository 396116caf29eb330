//! Service API handlers.
//!
//! These endpoints are called by the intake and transport adapters and
//! require a signed body verified via the `Leadx-Signature` header.
//!
//! # Endpoints
//!
//! - `POST /requirements`          – open an auction for a completed requirement
//! - `POST /requirements/withdraw` – the client withdrew the requirement
//! - `POST /claims`                – a candidate claims an auction

use axum::{Json, Router, http::StatusCode, response::IntoResponse, routing::post};
use leadx_core::entities::CandidateId;
use leadx_core::processors::EngineError;
use leadx_sdk::objects::{ClaimSubmission, RequirementIntake, WithdrawRequirement};

use crate::api::engine_error_status;
use crate::api::extractors::SignedBody;
use crate::state::AppState;

/// Build the Service API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/requirements", post(open_auction))
        .route("/requirements/withdraw", post(withdraw_requirement))
        .route("/claims", post(submit_claim))
}

/// `POST /requirements`: open an auction.
///
/// Repeating an intake with the same `requirement_id` returns the auction
/// that already exists.
async fn open_auction(
    state: axum::extract::State<AppState>,
    SignedBody(payload): SignedBody<RequirementIntake>,
) -> Result<impl IntoResponse, ServiceApiError> {
    let session = state.coordinator.open_auction(payload).await?;
    Ok((StatusCode::CREATED, Json(session.to_response())))
}

/// `POST /requirements/withdraw`: cancel the requirement's auction.
async fn withdraw_requirement(
    state: axum::extract::State<AppState>,
    SignedBody(payload): SignedBody<WithdrawRequirement>,
) -> Result<impl IntoResponse, ServiceApiError> {
    let session = state
        .coordinator
        .withdraw_requirement(payload.requirement_id)
        .await?;
    Ok(Json(session.to_response()))
}

/// `POST /claims`: submit a claim.
///
/// Rejected claims are a normal answer, not an error: the response carries
/// the decision and the reason.
async fn submit_claim(
    state: axum::extract::State<AppState>,
    SignedBody(payload): SignedBody<ClaimSubmission>,
) -> Result<impl IntoResponse, ServiceApiError> {
    let outcome = state
        .coordinator
        .submit_claim(payload.auction_id, CandidateId::from(payload.candidate_id))
        .await?;
    Ok(Json(outcome.to_response()))
}

/// Errors that can occur in Service API handlers.
#[derive(Debug)]
pub(crate) struct ServiceApiError(EngineError);

impl From<EngineError> for ServiceApiError {
    fn from(err: EngineError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ServiceApiError {
    fn into_response(self) -> axum::response::Response {
        engine_error_status(&self.0, "service").into_response()
    }
}
