//! Application state shared across all request handlers.

use crate::config::runtime::SharedConfig;
use leadx_core::processors::AuctionCoordinator;
use std::sync::Arc;

/// Application state that is shared across all request handlers.
///
/// This is cloneable and cheap to pass around (everything is behind Arc).
#[derive(Clone)]
pub struct AppState {
    /// The auction engine.
    pub coordinator: Arc<AuctionCoordinator>,
    /// HTTP-layer configuration (reloaded via SIGHUP).
    pub config: SharedConfig,
}

impl AppState {
    pub fn new(coordinator: Arc<AuctionCoordinator>, config: SharedConfig) -> Self {
        Self {
            coordinator,
            config,
        }
    }
}
