//! Response arbiter: turns concurrent claims into exactly one winner.
//!
//! The decision is taken against a freshly read session and committed with a
//! single compare-and-set on its version. A lost race re-reads and decides
//! again, so "first" is whatever order the store serialized the writes in.
//!
//! Once an award has committed, its winning claim must be stored. The write
//! is retried with backoff; if it still fails the error is returned and the
//! sweeper backfills the claim when it re-drives the stalled award.

use crate::entities::CandidateId;
use crate::entities::audit_event::AuditKind;
use crate::entities::auction_session::AuctionSession;
use crate::entities::claim::{Claim, ClaimDecision, NewClaim, RejectionReason};
use crate::processors::audit::AuditTrail;
use crate::processors::market::rounded_secs;
use crate::store::{AuctionStore, StoreError};
use crate::utils::{Clock, backoff_delay};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Attempts at storing the winning claim of a committed award.
const WINNING_CLAIM_ATTEMPTS: u32 = 4;
const WINNING_CLAIM_BASE_DELAY: Duration = Duration::from_millis(50);
const WINNING_CLAIM_MAX_DELAY: Duration = Duration::from_secs(1);

/// Decide a claim against one session snapshot.
pub fn evaluate_claim(session: &AuctionSession, candidate: &CandidateId) -> ClaimDecision {
    if !session.is_invited(candidate) {
        return ClaimDecision::Rejected(RejectionReason::NotInvited);
    }
    if session.claimants.contains(candidate) {
        return ClaimDecision::Rejected(RejectionReason::Duplicate);
    }
    if session.winner.is_some() {
        return ClaimDecision::Rejected(RejectionReason::AlreadyAwarded);
    }
    if !session.accepts_claims() {
        return ClaimDecision::Rejected(RejectionReason::AuctionClosed);
    }
    ClaimDecision::Winning
}

/// What the arbiter decided for one claim.
#[derive(Debug, Clone)]
pub struct ClaimVerdict {
    /// The recorded claim. `None` for unknown auctions, which are not stored.
    pub claim: Option<Claim>,
    pub decision: ClaimDecision,
    /// Session as observed when the decision was committed.
    pub session: Option<AuctionSession>,
}

#[derive(Clone)]
pub struct ResponseArbiter {
    store: Arc<dyn AuctionStore>,
    clock: Arc<dyn Clock>,
    audit: AuditTrail,
}

impl ResponseArbiter {
    pub fn new(store: Arc<dyn AuctionStore>, clock: Arc<dyn Clock>, audit: AuditTrail) -> Self {
        Self {
            store,
            clock,
            audit,
        }
    }

    /// Arbitrate one claim. A win moves the session to `AWARDED` and bumps the
    /// winner's load; verification is the caller's next step.
    #[tracing::instrument(skip_all, fields(auction_id = %auction_id, candidate = %candidate))]
    pub async fn arbitrate(
        &self,
        auction_id: Uuid,
        candidate: &CandidateId,
        max_attempts: u32,
    ) -> Result<ClaimVerdict, StoreError> {
        let received_at = self.clock.now();
        let mut last_seen = None;

        for attempt in 1..=max_attempts.max(1) {
            let Some(session) = self.store.get_session(auction_id).await? else {
                info!("Claim for unknown auction");
                return Ok(ClaimVerdict {
                    claim: None,
                    decision: ClaimDecision::Rejected(RejectionReason::AuctionNotFound),
                    session: None,
                });
            };

            let decision = evaluate_claim(&session, candidate);
            if !decision.is_winning() {
                return self.reject(session, candidate, decision, received_at).await;
            }

            let next = match session.award(candidate.clone(), self.clock.now()) {
                Ok(next) => next,
                Err(e) => {
                    // evaluate_claim only returns Winning for BROADCAST without a winner
                    error!(error = %e, "Winning claim could not be applied");
                    return self
                        .reject(
                            session,
                            candidate,
                            ClaimDecision::Rejected(RejectionReason::AuctionClosed),
                            received_at,
                        )
                        .await;
                }
            };

            match self
                .store
                .conditional_update_session(session.version, next.clone())
                .await
            {
                Ok(()) => return self.accept(next, candidate, received_at).await,
                Err(StoreError::VersionConflict { .. }) => {
                    debug!(attempt, "Lost award race, re-evaluating");
                    last_seen = Some(session);
                }
                Err(e) => return Err(e),
            }
        }

        warn!(max_attempts, "Claim gave up after repeated conflicts");
        let session = match self.store.get_session(auction_id).await? {
            Some(s) => s,
            None => last_seen.ok_or_else(|| StoreError::NotFound(format!("auction {auction_id}")))?,
        };
        self.reject(
            session,
            candidate,
            ClaimDecision::Rejected(RejectionReason::AlreadyAwarded),
            received_at,
        )
        .await
    }

    async fn accept(
        &self,
        session: AuctionSession,
        candidate: &CandidateId,
        received_at: time::PrimitiveDateTime,
    ) -> Result<ClaimVerdict, StoreError> {
        info!(round = session.round, "Claim won the auction");

        if let Err(e) = self.store.update_candidate_load(candidate, 1).await {
            error!(error = %e, "Failed to increment candidate load");
        }
        let claim = self
            .record_winning_claim(&session, candidate, received_at)
            .await?;
        self.audit_accepted(&session, &claim, false).await;

        Ok(ClaimVerdict {
            claim: Some(claim),
            decision: ClaimDecision::Winning,
            session: Some(session),
        })
    }

    /// Store the winning claim for `session`'s round, retrying with backoff.
    ///
    /// A write that failed after landing is recognised on the next attempt
    /// and the stored claim is returned.
    async fn record_winning_claim(
        &self,
        session: &AuctionSession,
        candidate: &CandidateId,
        received_at: time::PrimitiveDateTime,
    ) -> Result<Claim, StoreError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = self
                .store
                .record_claim(NewClaim {
                    auction_id: session.auction_id,
                    candidate_id: candidate.clone(),
                    round: session.round,
                    decision: ClaimDecision::Winning,
                    received_at,
                })
                .await;
            let err = match result {
                Ok(claim) => return Ok(claim),
                Err(e) => e,
            };
            match self.winning_claim(session).await {
                Ok(Some(existing)) if &existing.candidate_id == candidate => return Ok(existing),
                Ok(Some(existing)) => {
                    return Err(StoreError::Corruption(format!(
                        "auction {} round {} already has winning claim {} for {}",
                        session.auction_id, session.round, existing.claim_id, existing.candidate_id
                    )));
                }
                Ok(None) | Err(_) => {}
            }
            if attempt >= WINNING_CLAIM_ATTEMPTS {
                error!(attempts = attempt, error = %err, "Failed to record winning claim");
                return Err(err);
            }
            let delay =
                backoff_delay(attempt - 1, WINNING_CLAIM_BASE_DELAY, WINNING_CLAIM_MAX_DELAY);
            warn!(
                attempt,
                error = %err,
                retry_in_ms = delay.as_millis() as u64,
                "Winning claim write failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// The winning claim recorded for the session's current round.
    pub async fn winning_claim(&self, session: &AuctionSession) -> Result<Option<Claim>, StoreError> {
        Ok(self
            .store
            .list_claims(session.auction_id)
            .await?
            .into_iter()
            .find(|c| c.round == session.round && c.decision.is_winning()))
    }

    /// Write the winning claim of an `AWARDED` session if it is missing.
    ///
    /// Returns `true` when a claim was written. The award time stands in for
    /// the lost arrival time.
    pub async fn backfill_winning_claim(&self, session: &AuctionSession) -> Result<bool, StoreError> {
        let Some(winner) = &session.winner else {
            return Ok(false);
        };
        if self.winning_claim(session).await?.is_some() {
            return Ok(false);
        }
        let received_at = session.awarded_at.unwrap_or(session.updated_at);
        let claim = self
            .record_winning_claim(session, winner, received_at)
            .await?;
        warn!(
            auction_id = %session.auction_id,
            candidate = %winner,
            claim_id = claim.claim_id,
            "Backfilled missing winning claim"
        );
        self.audit_accepted(session, &claim, true).await;
        Ok(true)
    }

    async fn audit_accepted(&self, session: &AuctionSession, claim: &Claim, backfilled: bool) {
        let response_time = claim.received_at - session.opened_at;
        self.audit
            .record(
                session.auction_id,
                AuditKind::ClaimAccepted,
                json!({
                    "candidate": claim.candidate_id,
                    "round": session.round,
                    "claim_id": claim.claim_id,
                    "response_time_secs": rounded_secs(response_time),
                    "backfilled": backfilled,
                }),
            )
            .await;
    }

    async fn reject(
        &self,
        session: AuctionSession,
        candidate: &CandidateId,
        decision: ClaimDecision,
        received_at: time::PrimitiveDateTime,
    ) -> Result<ClaimVerdict, StoreError> {
        debug!(decision = ?decision, state = %session.state, "Claim rejected");
        let claim = self
            .store
            .record_claim(NewClaim {
                auction_id: session.auction_id,
                candidate_id: candidate.clone(),
                round: session.round,
                decision,
                received_at,
            })
            .await?;
        let reason = match decision {
            ClaimDecision::Rejected(reason) => Some(reason.to_string()),
            ClaimDecision::Winning => None,
        };
        self.audit
            .record(
                session.auction_id,
                AuditKind::ClaimRejected,
                json!({
                    "candidate": candidate,
                    "round": session.round,
                    "reason": reason,
                    "claim_id": claim.claim_id,
                }),
            )
            .await;
        Ok(ClaimVerdict {
            claim: Some(claim),
            decision,
            session: Some(session),
        })
    }
}
