//! NotificationFanout processor.
//!
//! Receives `BroadcastRequested` events and pushes one invitation per
//! candidate through the [`Transport`]. Every candidate gets its own task in
//! a `JoinSet`; a slow or failing candidate never holds up the others.
//! Each attempt is bounded by a timeout and retried with exponential
//! backoff. Exhausted candidates are audited as `DELIVERY_FAILED` and simply
//! do not participate. Delivering an invitation is never a claim.

use crate::config::{ConfigStore, EngineConfig, FanoutSettings};
use crate::entities::CandidateId;
use crate::entities::audit_event::AuditKind;
use crate::entities::auction_session::{AuctionSession, AuctionState};
use crate::entities::requirement::Requirement;
use crate::events::{BroadcastRequested, BroadcastRequestedReceiver};
use crate::processors::audit::AuditTrail;
use crate::store::{AuctionStore, StoreError};
use crate::transport::{Transport, TransportError};
use crate::utils::backoff_delay;
use leadx_sdk::objects::AuctionInvitation;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

pub const INVITATION_EVENT_TYPE: &str = "auction_invitation";

/// Result of delivering to one candidate.
#[derive(Debug)]
pub struct DeliveryReport {
    pub candidate_id: CandidateId,
    /// Attempts made, including the successful one.
    pub attempts: u32,
    pub result: Result<(), TransportError>,
}

impl DeliveryReport {
    pub fn is_delivered(&self) -> bool {
        self.result.is_ok()
    }
}

#[derive(Clone)]
pub struct NotificationFanout {
    store: Arc<dyn AuctionStore>,
    transport: Arc<dyn Transport>,
    audit: AuditTrail,
    config: ConfigStore<EngineConfig>,
}

impl NotificationFanout {
    pub fn new(
        store: Arc<dyn AuctionStore>,
        transport: Arc<dyn Transport>,
        audit: AuditTrail,
        config: ConfigStore<EngineConfig>,
    ) -> Self {
        Self {
            store,
            transport,
            audit,
            config,
        }
    }

    /// Run the fanout until shutdown or until the event channel closes.
    ///
    /// Broadcasts are delivered concurrently with each other; in-flight
    /// deliveries are allowed to finish before returning.
    pub async fn run(
        self,
        mut broadcast_rx: BroadcastRequestedReceiver,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        info!("NotificationFanout started");
        let mut in_flight = JoinSet::new();

        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("NotificationFanout received shutdown signal");
                        break;
                    }
                }

                Some(event) = broadcast_rx.recv() => {
                    debug!(auction_id = %event.auction_id, round = event.round, "Received BroadcastRequested");
                    let fanout = self.clone();
                    in_flight.spawn(async move {
                        let auction_id = event.auction_id;
                        if let Err(e) = fanout.deliver(event).await {
                            error!(auction_id = %auction_id, error = %e, "Failed to process BroadcastRequested");
                        }
                    });
                }

                Some(_) = in_flight.join_next(), if !in_flight.is_empty() => {}

                else => {
                    info!("BroadcastRequested channel closed");
                    break;
                }
            }
        }

        while in_flight.join_next().await.is_some() {}
        info!("NotificationFanout shutdown complete");
    }

    /// Deliver one broadcast round and wait for every candidate's result.
    ///
    /// Events for a round the session has already left are dropped.
    pub async fn deliver(&self, event: BroadcastRequested) -> Result<Vec<DeliveryReport>, StoreError> {
        let Some(session) = self.store.get_session(event.auction_id).await? else {
            warn!(auction_id = %event.auction_id, "Broadcast for unknown auction");
            return Ok(Vec::new());
        };
        if session.state != AuctionState::Broadcast || session.round != event.round {
            debug!(
                auction_id = %event.auction_id,
                round = event.round,
                state = %session.state,
                "Skipping stale broadcast"
            );
            return Ok(Vec::new());
        }
        let requirement = self
            .store
            .get_requirement(session.requirement_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("requirement {}", session.requirement_id)))?;
        let settings = self.config.snapshot().await.fanout;

        let mut tasks = JoinSet::new();
        for candidate in event.candidates {
            let invitation = build_invitation(&session, &requirement, &candidate);
            let transport = Arc::clone(&self.transport);
            let settings = settings.clone();
            tasks.spawn(async move {
                deliver_with_retry(transport.as_ref(), candidate, invitation, &settings).await
            });
        }

        let mut reports = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(report) => {
                    self.audit_report(&session, &report).await;
                    reports.push(report);
                }
                Err(e) => error!(auction_id = %session.auction_id, error = %e, "Delivery task failed"),
            }
        }

        let delivered = reports.iter().filter(|r| r.is_delivered()).count();
        info!(
            auction_id = %session.auction_id,
            round = session.round,
            delivered,
            failed = reports.len() - delivered,
            "Broadcast round delivered"
        );
        Ok(reports)
    }

    async fn audit_report(&self, session: &AuctionSession, report: &DeliveryReport) {
        let (kind, detail) = match &report.result {
            Ok(()) => (
                AuditKind::InvitationDelivered,
                json!({
                    "candidate": report.candidate_id,
                    "round": session.round,
                    "attempts": report.attempts,
                }),
            ),
            Err(e) => (
                AuditKind::DeliveryFailed,
                json!({
                    "candidate": report.candidate_id,
                    "round": session.round,
                    "attempts": report.attempts,
                    "error": e.to_string(),
                }),
            ),
        };
        self.audit.record(session.auction_id, kind, detail).await;
    }
}

pub fn build_invitation(
    session: &AuctionSession,
    requirement: &Requirement,
    candidate: &CandidateId,
) -> AuctionInvitation {
    AuctionInvitation {
        event_type: INVITATION_EVENT_TYPE.to_string(),
        auction_id: session.auction_id,
        candidate_id: candidate.0.clone(),
        round: session.round,
        location: requirement.location.clone(),
        category: requirement.category.clone(),
        budget_min: requirement.budget_min,
        budget_max: requirement.budget_max,
        bedrooms: requirement.bedrooms,
        deadline: session.deadline.assume_utc().unix_timestamp(),
    }
}

/// Deliver to one candidate, retrying retryable failures with backoff.
pub async fn deliver_with_retry(
    transport: &dyn Transport,
    candidate_id: CandidateId,
    invitation: AuctionInvitation,
    settings: &FanoutSettings,
) -> DeliveryReport {
    let max_attempts = settings.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        let result = match tokio::time::timeout(
            settings.attempt_timeout,
            transport.send_invitation(&invitation),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout),
        };

        match result {
            Ok(()) => {
                debug!(candidate = %candidate_id, attempt, "Invitation delivered");
                return DeliveryReport {
                    candidate_id,
                    attempts: attempt,
                    result: Ok(()),
                };
            }
            Err(e) if attempt < max_attempts && e.is_retryable() => {
                let delay = backoff_delay(attempt - 1, settings.base_delay, settings.max_delay);
                warn!(
                    candidate = %candidate_id,
                    attempt,
                    error = %e,
                    retry_in_ms = delay.as_millis() as u64,
                    "Invitation delivery failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                warn!(candidate = %candidate_id, attempt, error = %e, "Invitation delivery exhausted");
                return DeliveryReport {
                    candidate_id,
                    attempts: attempt,
                    result: Err(e),
                };
            }
        }
    }
}
