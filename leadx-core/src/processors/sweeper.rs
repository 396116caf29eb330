//! ExpirySweeper processor.
//!
//! Periodically expires `OPEN`/`BROADCAST` sessions whose SLA deadline has
//! passed, and re-drives sessions stuck in `AWARDED` (a claim whose inline
//! verification never finished, e.g. the process died mid-award).
//!
//! The sweep interval follows the engine config and is re-read on reload.

use crate::processors::coordinator::AuctionCoordinator;
use crate::utils::Clock;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info};

/// Counts from one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub expired: usize,
    pub recovered: usize,
}

pub struct ExpirySweeper {
    coordinator: Arc<AuctionCoordinator>,
    clock: Arc<dyn Clock>,
}

impl ExpirySweeper {
    pub fn new(coordinator: Arc<AuctionCoordinator>, clock: Arc<dyn Clock>) -> Self {
        Self { coordinator, clock }
    }

    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        let mut watcher = self.coordinator.config().subscribe();
        let mut interval = self.coordinator.config().read().await.auction.sweep_interval;
        info!(interval_ms = interval.as_millis() as u64, "ExpirySweeper started");

        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("ExpirySweeper received shutdown signal");
                        break;
                    }
                }

                Ok(()) = watcher.changed() => {
                    interval = self.coordinator.config().read().await.auction.sweep_interval;
                    info!(interval_ms = interval.as_millis() as u64, "Sweep interval reloaded");
                }

                _ = tokio::time::sleep(interval) => {
                    self.sweep().await;
                }
            }
        }

        info!("ExpirySweeper shutdown complete");
    }

    /// Run one sweep at the clock's current time.
    pub async fn sweep(&self) -> SweepReport {
        let now = self.clock.now();
        let mut report = SweepReport::default();

        match self.coordinator.expire_overdue(now).await {
            Ok(n) => report.expired = n,
            Err(e) => error!(error = %e, "Failed to sweep overdue auctions"),
        }
        match self.coordinator.recover_stalled_awards(now).await {
            Ok(n) => report.recovered = n,
            Err(e) => error!(error = %e, "Failed to recover stalled awards"),
        }

        if report != SweepReport::default() {
            info!(expired = report.expired, recovered = report.recovered, "Sweep finished");
        } else {
            debug!("Sweep found nothing to do");
        }
        report
    }
}
