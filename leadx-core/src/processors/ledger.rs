//! Commission ledger.
//!
//! Entitlements are a deterministic function of the requirement and the rate
//! table, written once per requirement and winner. Cancelling a closed deal,
//! or dropping a winner whose entitlement was already written, adds a
//! separate reversal; nothing is ever updated in place.

use crate::config::CommissionSettings;
use crate::entities::CandidateId;
use crate::entities::auction_session::AuctionSession;
use crate::entities::commission::{CommissionKind, CommissionRecord, SettlementStatus};
use crate::entities::requirement::Requirement;
use crate::store::{AuctionStore, PutOutcome, StoreError};
use crate::utils::Clock;
use rust_decimal::{Decimal, RoundingStrategy};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entitlement {
    pub basis: Decimal,
    pub rate: Decimal,
    pub amount: Decimal,
    pub candidate_share: Decimal,
    pub platform_share: Decimal,
}

fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// `amount = max(basis * rate, minimum)` on the requirement's budget
/// ceiling (its floor when no ceiling was given), rounded to cents, then
/// split between candidate and platform.
pub fn compute_entitlement(requirement: &Requirement, settings: &CommissionSettings) -> Entitlement {
    let basis = requirement.commission_basis();
    let rate = settings.rate_for(&requirement.category);
    let amount = round_money((basis * rate.rate).max(rate.minimum));
    let candidate_share = round_money(amount * settings.candidate_share);
    Entitlement {
        basis,
        rate: rate.rate,
        amount,
        candidate_share,
        platform_share: amount - candidate_share,
    }
}

#[derive(Clone)]
pub struct CommissionLedger {
    store: Arc<dyn AuctionStore>,
    clock: Arc<dyn Clock>,
}

impl CommissionLedger {
    pub fn new(store: Arc<dyn AuctionStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Write the entitlement for an awarded session.
    ///
    /// Re-invocation returns the stored record untouched.
    pub async fn record_entitlement(
        &self,
        session: &AuctionSession,
        requirement: &Requirement,
        settings: &CommissionSettings,
    ) -> Result<PutOutcome<CommissionRecord>, StoreError> {
        let winner = session.winner.clone().ok_or_else(|| {
            StoreError::Corruption(format!("auction {} has no winner", session.auction_id))
        })?;
        let entitlement = compute_entitlement(requirement, settings);
        let record = CommissionRecord {
            requirement_id: requirement.requirement_id,
            auction_id: session.auction_id,
            candidate_id: winner,
            kind: CommissionKind::Entitlement,
            category: requirement.category.clone(),
            basis: entitlement.basis,
            rate: entitlement.rate,
            amount: entitlement.amount,
            candidate_share: entitlement.candidate_share,
            platform_share: entitlement.platform_share,
            settlement_status: SettlementStatus::Pending,
            created_at: self.clock.now(),
        };
        let outcome = self.store.put_commission_record(record).await?;
        if let PutOutcome::Inserted(r) = &outcome {
            info!(
                requirement_id = %r.requirement_id,
                candidate = %r.candidate_id,
                amount = %r.amount,
                "Commission entitlement recorded"
            );
        }
        Ok(outcome)
    }

    /// Offset the entitlement written for `candidate_id`. `None` if there is
    /// none to offset.
    pub async fn record_reversal(
        &self,
        requirement_id: Uuid,
        candidate_id: &CandidateId,
    ) -> Result<Option<PutOutcome<CommissionRecord>>, StoreError> {
        let Some(entitlement) = self
            .store
            .get_commission_record(requirement_id, candidate_id, CommissionKind::Entitlement)
            .await?
        else {
            return Ok(None);
        };
        let outcome = self
            .store
            .put_commission_record(entitlement.reversal(self.clock.now()))
            .await?;
        if outcome.is_inserted() {
            info!(requirement_id = %requirement_id, candidate = %candidate_id, "Commission reversed");
        }
        Ok(Some(outcome))
    }

    pub async fn records(&self, requirement_id: Uuid) -> Result<Vec<CommissionRecord>, StoreError> {
        self.store.list_commission_records(requirement_id).await
    }
}
