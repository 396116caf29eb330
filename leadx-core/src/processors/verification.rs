//! Award-time re-check of the winning claim.

use crate::entities::auction_session::AuctionSession;
use crate::entities::candidate::{Candidate, VerificationStatus};
use crate::entities::requirement::Requirement;
use crate::store::{AuctionStore, StoreError};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationOutcome {
    Passed,
    /// The winner is no longer `VERIFIED`. `None` when it left the directory.
    CandidateIneligible(Option<VerificationStatus>),
    /// The requirement was withdrawn or a cancellation is pending.
    RequirementWithdrawn,
}

/// Decide the outcome from freshly read records. Withdrawal takes precedence.
pub fn evaluate(
    session: &AuctionSession,
    requirement: &Requirement,
    winner: Option<&Candidate>,
) -> VerificationOutcome {
    if session.pending_cancel.is_some() || requirement.is_withdrawn() {
        return VerificationOutcome::RequirementWithdrawn;
    }
    match winner {
        Some(c) if c.is_verified() => VerificationOutcome::Passed,
        Some(c) => VerificationOutcome::CandidateIneligible(Some(c.status)),
        None => VerificationOutcome::CandidateIneligible(None),
    }
}

#[derive(Clone)]
pub struct VerificationGate {
    store: Arc<dyn AuctionStore>,
}

impl VerificationGate {
    pub fn new(store: Arc<dyn AuctionStore>) -> Self {
        Self { store }
    }

    pub async fn verify(&self, session: &AuctionSession) -> Result<VerificationOutcome, StoreError> {
        let requirement = self
            .store
            .get_requirement(session.requirement_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("requirement {}", session.requirement_id)))?;
        let winner = match &session.winner {
            Some(id) => self.store.get_candidate(id).await?,
            None => None,
        };
        Ok(evaluate(session, &requirement, winner.as_ref()))
    }
}
