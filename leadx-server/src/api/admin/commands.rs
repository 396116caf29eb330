use axum::{Json, response::IntoResponse};
use leadx_sdk::objects::AdminCommand;

use crate::api::extractors::AdminAuth;
use crate::state::AppState;

use super::AdminApiError;

/// `POST /commands`: run an administrative command.
///
/// Commands on an auction that has already reached a terminal state leave
/// it unchanged and return it as is.
pub async fn execute_command(
    state: axum::extract::State<AppState>,
    _auth: AdminAuth,
    Json(command): Json<AdminCommand>,
) -> Result<impl IntoResponse, AdminApiError> {
    let session = state.coordinator.execute(command).await?;
    Ok(Json(session.to_response()))
}
