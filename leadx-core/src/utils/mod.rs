pub mod backoff;
pub mod clock;

pub use backoff::backoff_delay;
pub use clock::{Clock, ManualClock, SystemClock};
