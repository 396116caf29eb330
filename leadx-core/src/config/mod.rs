//! Runtime configuration shared by the engine processors.
//!
//! These are validated types; parsing the TOML file is the server's job.
//! Settings that may change on reload live in [`EngineConfig`] behind a
//! [`ConfigStore`].

mod commission;
mod config_store;
mod endpoints;
mod engine;

pub use commission::{CommissionRate, CommissionSettings};
pub use config_store::{ConfigStore, ConfigWatcher};
pub use endpoints::{OutcomeConfig, TransportConfig};
pub use engine::{AuctionSettings, FanoutSettings};

/// Reloadable engine settings. Each operation reads one snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineConfig {
    pub auction: AuctionSettings,
    pub fanout: FanoutSettings,
    pub commission: CommissionSettings,
}
