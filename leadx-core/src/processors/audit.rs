//! Append-only audit trail.

use crate::entities::audit_event::{AuditEvent, AuditKind, NewAuditEvent};
use crate::store::{AuctionStore, StoreError};
use crate::utils::Clock;
use std::sync::Arc;
use tracing::{debug, error, warn};
use uuid::Uuid;

/// Attempts per append before the event is given up on.
const APPEND_ATTEMPTS: u32 = 3;

#[derive(Clone)]
pub struct AuditTrail {
    store: Arc<dyn AuctionStore>,
    clock: Arc<dyn Clock>,
}

impl AuditTrail {
    pub fn new(store: Arc<dyn AuctionStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Append an event.
    ///
    /// Audit writes never fail the operation being audited: after a few
    /// attempts the event is logged at error level and dropped.
    pub async fn record(&self, auction_id: Uuid, kind: AuditKind, detail: serde_json::Value) {
        let event = NewAuditEvent {
            auction_id,
            kind,
            detail,
            recorded_at: self.clock.now(),
        };
        for attempt in 1..=APPEND_ATTEMPTS {
            match self.store.append_audit_event(event.clone()).await {
                Ok(stored) => {
                    debug!(
                        auction_id = %auction_id,
                        kind = %kind,
                        sequence = stored.sequence,
                        "Audit event recorded"
                    );
                    return;
                }
                Err(e) if attempt < APPEND_ATTEMPTS => {
                    warn!(auction_id = %auction_id, kind = %kind, error = %e, attempt, "Audit append failed, retrying");
                }
                Err(e) => {
                    error!(
                        auction_id = %auction_id,
                        kind = %kind,
                        detail = %event.detail,
                        error = %e,
                        "Audit event lost"
                    );
                }
            }
        }
    }

    pub async fn history(&self, auction_id: Uuid) -> Result<Vec<AuditEvent>, StoreError> {
        self.store.list_audit_events(auction_id).await
    }
}
