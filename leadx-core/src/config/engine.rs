//! Auction and fanout settings.

use std::time::Duration;

/// Auction lifecycle settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuctionSettings {
    /// SLA window: time from opening until the sweeper expires the auction.
    pub sla: Duration,
    /// Upper bound on candidates invited per auction.
    pub max_invited: usize,
    /// How often the expiry sweeper runs.
    pub sweep_interval: Duration,
    /// How long a session may sit in `AWARDED` before the sweeper re-drives
    /// its verification.
    pub award_grace: Duration,
    /// Compare-and-set attempts per claim before giving up as `already_awarded`.
    pub max_claim_attempts: u32,
}

impl Default for AuctionSettings {
    fn default() -> Self {
        Self {
            sla: Duration::from_secs(30 * 60),
            max_invited: 10,
            sweep_interval: Duration::from_secs(15),
            award_grace: Duration::from_secs(60),
            max_claim_attempts: 8,
        }
    }
}

impl AuctionSettings {
    pub fn sla_duration(&self) -> time::Duration {
        time::Duration::try_from(self.sla).unwrap_or(time::Duration::MAX)
    }
}

/// Invitation delivery settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FanoutSettings {
    /// Total attempts per candidate, including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Bound on a single delivery attempt.
    pub attempt_timeout: Duration,
}

impl Default for FanoutSettings {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            attempt_timeout: Duration::from_secs(5),
        }
    }
}
