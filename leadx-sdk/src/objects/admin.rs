//! Admin API request and response types.

use compact_str::CompactString;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Administrative commands accepted by the engine.
///
/// Both go through the same conditional-update path as every other
/// transition, so racing an award or the expiry sweep is safe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum AdminCommand {
    CancelAuction { requirement_id: Uuid },
    ForceExpire { requirement_id: Uuid },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEventResponse {
    pub sequence: i64,
    pub auction_id: Uuid,
    pub kind: String,
    pub detail: serde_json::Value,
    pub recorded_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommissionResponse {
    pub requirement_id: Uuid,
    pub auction_id: Uuid,
    pub candidate_id: CompactString,
    pub kind: String,
    pub category: String,
    pub basis: Decimal,
    pub rate: Decimal,
    pub amount: Decimal,
    pub candidate_share: Decimal,
    pub platform_share: Decimal,
    pub settlement_status: String,
    pub created_at: i64,
}

/// Closed deals a market report covers when no `limit` is given.
pub const DEFAULT_MARKET_WINDOW: u32 = 10;
pub const MAX_MARKET_WINDOW: u32 = 100;

/// Query parameters for `GET /market`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketReportQuery {
    pub location: String,
    #[serde(default)]
    pub limit: Option<u32>,
}

/// Clamp a requested report window to `1..=MAX_MARKET_WINDOW`.
pub fn clamp_market_window(limit: Option<u32>) -> u32 {
    limit
        .unwrap_or(DEFAULT_MARKET_WINDOW)
        .clamp(1, MAX_MARKET_WINDOW)
}

/// Activity in one location over its most recent closed deals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketReportResponse {
    pub location: String,
    /// Verified candidates serving the location right now.
    pub verified_candidates: usize,
    /// Closed deals the averages are taken over.
    pub recent_deals: usize,
    pub avg_response_time_secs: Option<f64>,
    pub fastest_response_time_secs: Option<f64>,
    pub average_budget: Option<Decimal>,
}
