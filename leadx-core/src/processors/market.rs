//! Per-location market report over recently closed deals.

use crate::entities::candidate::Candidate;
use crate::entities::market::ClosedDeal;
use leadx_sdk::objects::MarketReportResponse;
use rust_decimal::{Decimal, RoundingStrategy};

#[derive(Debug, Clone, PartialEq)]
pub struct MarketReport {
    pub location: String,
    pub verified_candidates: usize,
    pub recent_deals: usize,
    pub avg_response_time: Option<time::Duration>,
    pub fastest_response_time: Option<time::Duration>,
    pub average_budget: Option<Decimal>,
}

impl MarketReport {
    /// Summarize `deals` for `location`. Candidates are counted when they are
    /// verified and serve the location.
    pub fn summarize(location: &str, deals: &[ClosedDeal], directory: &[Candidate]) -> Self {
        let verified_candidates = directory
            .iter()
            .filter(|c| c.is_verified() && c.serves_area(location))
            .count();

        let response_times: Vec<time::Duration> =
            deals.iter().map(ClosedDeal::response_time).collect();
        let avg_response_time = (!response_times.is_empty()).then(|| {
            let total: time::Duration = response_times.iter().copied().sum();
            total / response_times.len() as u32
        });
        let fastest_response_time = response_times.iter().copied().min();

        let average_budget = (!deals.is_empty()).then(|| {
            let total: Decimal = deals.iter().map(|d| d.basis).sum();
            (total / Decimal::from(deals.len()))
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
        });

        Self {
            location: location.trim().to_owned(),
            verified_candidates,
            recent_deals: deals.len(),
            avg_response_time,
            fastest_response_time,
            average_budget,
        }
    }

    pub fn to_response(&self) -> MarketReportResponse {
        MarketReportResponse {
            location: self.location.clone(),
            verified_candidates: self.verified_candidates,
            recent_deals: self.recent_deals,
            avg_response_time_secs: self.avg_response_time.map(rounded_secs),
            fastest_response_time_secs: self.fastest_response_time.map(rounded_secs),
            average_budget: self.average_budget,
        }
    }
}

/// Seconds to one decimal place.
pub(crate) fn rounded_secs(duration: time::Duration) -> f64 {
    (duration.as_seconds_f64() * 10.0).round() / 10.0
}
