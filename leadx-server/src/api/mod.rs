//! HTTP API.
//!
//! - `service` – signed calls from the intake and transport adapters
//! - `admin`   – operator endpoints behind the admin secret

pub mod admin;
pub mod extractors;
pub mod service;

use axum::http::StatusCode;
use leadx_core::processors::EngineError;
use leadx_core::store::StoreError;

/// Map an engine failure to a status code and a client-safe message.
///
/// Internal failures are logged here; their detail never reaches the client.
pub(crate) fn engine_error_status(err: &EngineError, api: &'static str) -> (StatusCode, String) {
    match err {
        EngineError::InvalidRequirement(e) => (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()),
        EngineError::AuctionNotFound(_)
        | EngineError::RequirementNotFound(_)
        | EngineError::Store(StoreError::NotFound(_)) => (StatusCode::NOT_FOUND, err.to_string()),
        EngineError::Contended(_) => (StatusCode::CONFLICT, err.to_string()),
        EngineError::Store(_) | EngineError::Transition(_) => {
            tracing::error!(error = %err, api, "Engine error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error".to_string(),
            )
        }
    }
}
