//! Time source for the engine.
//!
//! Sessions store UTC `PrimitiveDateTime`s. Going through [`Clock`] lets the
//! expiry logic be driven deterministically in tests.

use std::sync::RwLock;
use time::{OffsetDateTime, PrimitiveDateTime};

pub trait Clock: Send + Sync {
    fn now(&self) -> PrimitiveDateTime;
}

/// Wall clock, UTC.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> PrimitiveDateTime {
        let now = OffsetDateTime::now_utc();
        PrimitiveDateTime::new(now.date(), now.time())
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: RwLock<PrimitiveDateTime>,
}

impl ManualClock {
    pub fn new(start: PrimitiveDateTime) -> Self {
        Self {
            now: RwLock::new(start),
        }
    }

    /// Start at the current wall-clock time.
    pub fn starting_now() -> Self {
        Self::new(SystemClock.now())
    }

    pub fn advance(&self, by: std::time::Duration) {
        let mut guard = self.now.write().unwrap_or_else(|e| e.into_inner());
        *guard += by;
    }

    pub fn set(&self, to: PrimitiveDateTime) {
        *self.now.write().unwrap_or_else(|e| e.into_inner()) = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> PrimitiveDateTime {
        *self.now.read().unwrap_or_else(|e| e.into_inner())
    }
}
