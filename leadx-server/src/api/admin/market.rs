use axum::{Json, extract::Query, response::IntoResponse};
use leadx_sdk::objects::{MarketReportQuery, clamp_market_window};

use crate::api::extractors::AdminAuth;
use crate::state::AppState;

use super::AdminApiError;

/// `GET /market?location=..&limit=..`: closed-deal activity for a location.
pub async fn market_report(
    state: axum::extract::State<AppState>,
    _auth: AdminAuth,
    Query(query): Query<MarketReportQuery>,
) -> Result<impl IntoResponse, AdminApiError> {
    let window = clamp_market_window(query.limit);
    let report = state
        .coordinator
        .market_report(&query.location, window)
        .await?;
    Ok(Json(report.to_response()))
}
