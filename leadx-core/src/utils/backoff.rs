use std::time::Duration;

/// Exponential backoff: `base * 2^attempt`, capped at `max`.
///
/// `attempt` is zero based, so the first retry waits `base`.
pub fn backoff_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
    let factor = 2u32.saturating_pow(attempt.min(31));
    base.saturating_mul(factor).min(max)
}
