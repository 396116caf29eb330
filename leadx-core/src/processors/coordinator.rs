//! Auction coordinator: drives each requirement through
//! `OPEN -> BROADCAST -> AWARDED -> CLOSED | EXPIRED | CANCELLED`.
//!
//! Every session mutation is a compare-and-set through the store. When a
//! write loses, the coordinator re-reads the session and decides again
//! from what it finds, so concurrent claims, cancellations and the expiry
//! sweep can interleave freely.

use crate::config::{ConfigStore, EngineConfig};
use crate::entities::CandidateId;
use crate::entities::audit_event::{AuditEvent, AuditKind};
use crate::entities::auction_session::{
    AuctionSession, AuctionState, TerminalReason, TransitionError,
};
use crate::entities::claim::{Claim, ClaimDecision};
use crate::entities::commission::CommissionRecord;
use crate::entities::requirement::{Requirement, RequirementError, RequirementStatus};
use crate::events::{AuctionSettled, BroadcastRequested, EventSenders};
use crate::processors::arbiter::ResponseArbiter;
use crate::processors::audit::AuditTrail;
use crate::processors::directory::CandidateDirectory;
use crate::processors::ledger::CommissionLedger;
use crate::processors::market::{MarketReport, rounded_secs};
use crate::processors::selector::select_candidates;
use crate::processors::verification::{VerificationGate, VerificationOutcome};
use crate::store::{AuctionStore, PutOutcome, StoreError};
use crate::utils::Clock;
use leadx_sdk::objects::{AdminCommand, AuctionOutcome, ClaimResponse, RequirementIntake};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Re-read-and-retry rounds for coordinator-driven transitions.
const MAX_TRANSITION_ATTEMPTS: u32 = 8;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("invalid requirement: {0}")]
    InvalidRequirement(#[from] RequirementError),

    #[error("auction not found: {0}")]
    AuctionNotFound(Uuid),

    #[error("requirement not found: {0}")]
    RequirementNotFound(Uuid),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// The session kept changing under every retry.
    #[error("auction {0} is too contended, try again")]
    Contended(Uuid),
}

/// Answer to a claim submission.
#[derive(Debug, Clone)]
pub struct ClaimOutcome {
    pub claim: Option<Claim>,
    pub auction_id: Uuid,
    pub candidate_id: CandidateId,
    pub decision: ClaimDecision,
    /// Session after the claim was fully handled.
    pub session: Option<AuctionSession>,
    /// Time from opening the auction to the winning claim.
    pub response_time: Option<time::Duration>,
}

impl ClaimOutcome {
    pub fn to_response(&self) -> ClaimResponse {
        ClaimResponse {
            claim_id: self.claim.as_ref().map(|c| c.claim_id),
            auction_id: self.auction_id,
            candidate_id: self.candidate_id.0.clone(),
            decision: self.decision.into(),
            auction_state: self.session.as_ref().map(|s| s.state.into()),
            response_time_secs: self.response_time.map(rounded_secs),
        }
    }
}

pub struct AuctionCoordinator {
    store: Arc<dyn AuctionStore>,
    clock: Arc<dyn Clock>,
    config: ConfigStore<EngineConfig>,
    events: EventSenders,
    audit: AuditTrail,
    directory: CandidateDirectory,
    arbiter: ResponseArbiter,
    gate: VerificationGate,
    ledger: CommissionLedger,
}

impl AuctionCoordinator {
    pub fn new(
        store: Arc<dyn AuctionStore>,
        clock: Arc<dyn Clock>,
        config: ConfigStore<EngineConfig>,
        events: EventSenders,
    ) -> Self {
        let audit = AuditTrail::new(Arc::clone(&store), Arc::clone(&clock));
        Self {
            directory: CandidateDirectory::new(Arc::clone(&store), Arc::clone(&clock)),
            arbiter: ResponseArbiter::new(Arc::clone(&store), Arc::clone(&clock), audit.clone()),
            gate: VerificationGate::new(Arc::clone(&store)),
            ledger: CommissionLedger::new(Arc::clone(&store), Arc::clone(&clock)),
            audit,
            store,
            clock,
            config,
            events,
        }
    }

    pub fn directory(&self) -> &CandidateDirectory {
        &self.directory
    }

    pub fn audit(&self) -> &AuditTrail {
        &self.audit
    }

    pub fn config(&self) -> &ConfigStore<EngineConfig> {
        &self.config
    }

    // -- Opening -----------------------------------------------------------

    /// Open an auction for a completed requirement.
    ///
    /// Idempotent on the requirement id: a repeated intake returns the
    /// session that already exists.
    #[tracing::instrument(skip_all, err, fields(requirement_id = tracing::field::Empty))]
    pub async fn open_auction(
        &self,
        intake: RequirementIntake,
    ) -> Result<AuctionSession, EngineError> {
        let now = self.clock.now();
        let requirement = Requirement::from_intake(intake, now)?;
        let requirement_id = requirement.requirement_id;
        tracing::Span::current().record("requirement_id", tracing::field::display(requirement_id));

        if let Some(existing) = self.store.get_session_by_requirement(requirement_id).await? {
            debug!(auction_id = %existing.auction_id, "Requirement already has an auction");
            return Ok(existing);
        }
        let requirement = if self.store.put_requirement(requirement.clone()).await? {
            requirement
        } else {
            self.store
                .get_requirement(requirement_id)
                .await?
                .ok_or(EngineError::RequirementNotFound(requirement_id))?
        };

        let settings = self.config.snapshot().await;
        let session = AuctionSession::open(requirement_id, now, settings.auction.sla_duration());
        match self.store.insert_session(session.clone()).await {
            Ok(()) => {}
            Err(StoreError::Duplicate(_)) => {
                return self
                    .store
                    .get_session_by_requirement(requirement_id)
                    .await?
                    .ok_or(EngineError::RequirementNotFound(requirement_id));
            }
            Err(e) => return Err(e.into()),
        }
        info!(auction_id = %session.auction_id, deadline = %session.deadline, "Auction opened");
        self.audit
            .record(
                session.auction_id,
                AuditKind::AuctionOpened,
                json!({
                    "requirement_id": requirement_id,
                    "location": requirement.location,
                    "category": requirement.category,
                    "budget_min": requirement.budget_min,
                    "budget_max": requirement.budget_max,
                    "deadline": session.deadline.assume_utc().unix_timestamp(),
                }),
            )
            .await;

        let directory = self.directory.snapshot().await?;
        let selected = select_candidates(&requirement, &directory, settings.auction.max_invited);

        if selected.is_empty() {
            let expired = session.expire(TerminalReason::NoEligibleCandidate, self.clock.now())?;
            return match self.commit(&session, expired).await? {
                Some(expired) => {
                    warn!(auction_id = %expired.auction_id, "No eligible candidate");
                    self.finish_expired(&expired).await?;
                    Ok(expired)
                }
                None => self.reload(session.auction_id).await,
            };
        }

        let invited: Vec<CandidateId> = selected.into_iter().map(|c| c.candidate_id).collect();
        let broadcasting = session.begin_broadcast(invited.clone(), self.clock.now())?;
        let Some(broadcasting) = self.commit(&session, broadcasting).await? else {
            // cancelled between insert and broadcast
            return self.reload(session.auction_id).await;
        };
        info!(
            auction_id = %broadcasting.auction_id,
            candidates = invited.len(),
            "Broadcast started"
        );
        self.audit
            .record(
                broadcasting.auction_id,
                AuditKind::BroadcastStarted,
                json!({ "round": broadcasting.round, "candidates": invited }),
            )
            .await;
        self.emit_broadcast(&broadcasting, invited).await;
        Ok(broadcasting)
    }

    // -- Claims ------------------------------------------------------------

    /// Arbitrate a claim and, for the winner, verify and close inline.
    #[tracing::instrument(skip_all, err, fields(auction_id = %auction_id, candidate = %candidate_id))]
    pub async fn submit_claim(
        &self,
        auction_id: Uuid,
        candidate_id: CandidateId,
    ) -> Result<ClaimOutcome, EngineError> {
        let settings = self.config.snapshot().await;
        let verdict = self
            .arbiter
            .arbitrate(auction_id, &candidate_id, settings.auction.max_claim_attempts)
            .await?;

        let (session, response_time) = match (verdict.decision, verdict.session) {
            (ClaimDecision::Winning, Some(awarded)) => {
                let response_time = verdict
                    .claim
                    .as_ref()
                    .map(|c| c.received_at - awarded.opened_at);
                if let Some(elapsed) = response_time {
                    info!(response_time_secs = rounded_secs(elapsed), "Winning claim timed");
                }
                (Some(self.settle_award(awarded).await?), response_time)
            }
            (_, session) => (session, None),
        };

        Ok(ClaimOutcome {
            claim: verdict.claim,
            auction_id,
            candidate_id,
            decision: verdict.decision,
            session,
            response_time,
        })
    }

    /// Finish an `AWARDED` session: verify the winner, then close, cancel
    /// (pending cancellation or withdrawn requirement) or re-broadcast.
    ///
    /// Safe to run concurrently for the same session; only one run's
    /// transition commits and the others return the committed state.
    pub async fn settle_award(&self, session: AuctionSession) -> Result<AuctionSession, EngineError> {
        let auction_id = session.auction_id;
        let mut session = session;

        for _ in 0..MAX_TRANSITION_ATTEMPTS {
            if session.state != AuctionState::Awarded {
                return Ok(session);
            }
            let Some(winner) = session.winner.clone() else {
                return Err(StoreError::Corruption(format!(
                    "auction {auction_id} is awarded without a winner"
                ))
                .into());
            };

            let outcome = self.gate.verify(&session).await?;
            let committed = match outcome {
                VerificationOutcome::Passed => self.close_award(&session, &winner).await?,
                VerificationOutcome::RequirementWithdrawn => {
                    self.cancel_award(&session, &winner).await?
                }
                VerificationOutcome::CandidateIneligible(status) => {
                    self.audit
                        .record(
                            auction_id,
                            AuditKind::VerificationFailed,
                            json!({
                                "candidate": winner,
                                "reason": "candidate_ineligible",
                                "status": status.map(|s| format!("{s:?}").to_lowercase()),
                            }),
                        )
                        .await;
                    self.reject_award(&session, &winner).await?
                }
            };

            match committed {
                Some(next) => return Ok(next),
                None => session = self.reload(auction_id).await?,
            }
        }
        Err(EngineError::Contended(auction_id))
    }

    async fn close_award(
        &self,
        session: &AuctionSession,
        winner: &CandidateId,
    ) -> Result<Option<AuctionSession>, EngineError> {
        let auction_id = session.auction_id;
        self.audit
            .record(
                auction_id,
                AuditKind::VerificationPassed,
                json!({ "candidate": winner, "round": session.round }),
            )
            .await;

        let requirement = self
            .store
            .get_requirement(session.requirement_id)
            .await?
            .ok_or(EngineError::RequirementNotFound(session.requirement_id))?;
        let settings = self.config.snapshot().await;
        let record = self
            .ledger
            .record_entitlement(session, &requirement, &settings.commission)
            .await?;
        if let PutOutcome::Inserted(r) = &record {
            self.audit_commission(AuditKind::CommissionRecorded, r).await;
        }

        let closed = session.close(self.clock.now())?;
        let Some(closed) = self.commit(session, closed).await? else {
            return Ok(None);
        };
        // a cancellation that reached the closed session first has already
        // withdrawn the requirement
        let marked = self
            .store
            .transition_requirement_status(
                closed.requirement_id,
                RequirementStatus::Open,
                RequirementStatus::Closed,
            )
            .await?;
        if !marked {
            debug!(auction_id = %auction_id, "Requirement no longer open, status left as is");
        }
        info!(auction_id = %auction_id, winner = %winner, "Auction closed");
        self.audit
            .record(
                auction_id,
                AuditKind::AuctionClosed,
                json!({ "winner": winner, "amount": record.into_inner().amount }),
            )
            .await;
        self.emit_settled(&closed).await;
        Ok(Some(closed))
    }

    async fn cancel_award(
        &self,
        session: &AuctionSession,
        winner: &CandidateId,
    ) -> Result<Option<AuctionSession>, EngineError> {
        let reason = session.pending_cancel.unwrap_or(TerminalReason::Withdrawn);
        self.audit
            .record(
                session.auction_id,
                AuditKind::VerificationFailed,
                json!({ "candidate": winner, "reason": "requirement_withdrawn" }),
            )
            .await;
        let cancelled = session.cancel(reason, self.clock.now())?;
        let Some(cancelled) = self.commit(session, cancelled).await? else {
            return Ok(None);
        };
        // an earlier close attempt may have written the entitlement already
        self.reverse_commission(cancelled.requirement_id, winner).await?;
        self.release_load(winner).await;
        self.finish_cancelled(&cancelled).await?;
        Ok(Some(cancelled))
    }

    async fn reject_award(
        &self,
        session: &AuctionSession,
        winner: &CandidateId,
    ) -> Result<Option<AuctionSession>, EngineError> {
        let mut remaining = Vec::new();
        for candidate_id in session.remaining_candidates() {
            if &candidate_id == winner {
                continue;
            }
            match self.store.get_candidate(&candidate_id).await? {
                Some(c) if c.is_verified() => remaining.push(candidate_id),
                _ => {}
            }
        }

        let next = session.reject_winner(!remaining.is_empty(), self.clock.now())?;
        let Some(next) = self.commit(session, next).await? else {
            return Ok(None);
        };
        // an interrupted close may have written this winner's entitlement
        self.reverse_commission(next.requirement_id, winner).await?;
        self.release_load(winner).await;

        if next.state == AuctionState::Broadcast {
            info!(
                auction_id = %next.auction_id,
                excluded = %winner,
                round = next.round,
                "Winner failed verification, re-broadcasting"
            );
            self.audit
                .record(
                    next.auction_id,
                    AuditKind::Rebroadcast,
                    json!({
                        "round": next.round,
                        "excluded": winner,
                        "candidates": remaining,
                    }),
                )
                .await;
            self.emit_broadcast(&next, remaining).await;
        } else {
            warn!(auction_id = %next.auction_id, "Verification exhausted every candidate");
            self.finish_expired(&next).await?;
        }
        Ok(Some(next))
    }

    // -- Cancellation and admin --------------------------------------------

    /// The client withdrew the requirement.
    pub async fn withdraw_requirement(
        &self,
        requirement_id: Uuid,
    ) -> Result<AuctionSession, EngineError> {
        self.cancel(requirement_id, TerminalReason::Withdrawn).await
    }

    /// Run an administrative command.
    pub async fn execute(&self, command: AdminCommand) -> Result<AuctionSession, EngineError> {
        info!(command = ?command, "Executing admin command");
        match command {
            AdminCommand::CancelAuction { requirement_id } => {
                self.cancel(requirement_id, TerminalReason::AdminCancelled)
                    .await
            }
            AdminCommand::ForceExpire { requirement_id } => self.force_expire(requirement_id).await,
        }
    }

    /// Cancel by requirement id.
    ///
    /// `OPEN`/`BROADCAST` cancel at once. `AWARDED` gets the pending marker
    /// and its close path turns into the cancellation. `CLOSED` keeps its
    /// state and gets a compensating reversal. Terminal states are left alone.
    #[tracing::instrument(skip_all, err, fields(requirement_id = %requirement_id, reason = reason.as_str()))]
    pub async fn cancel(
        &self,
        requirement_id: Uuid,
        reason: TerminalReason,
    ) -> Result<AuctionSession, EngineError> {
        let mut session = self
            .store
            .get_session_by_requirement(requirement_id)
            .await?
            .ok_or(EngineError::RequirementNotFound(requirement_id))?;

        for _ in 0..MAX_TRANSITION_ATTEMPTS {
            match session.state {
                AuctionState::Open | AuctionState::Broadcast => {
                    let cancelled = session.cancel(reason, self.clock.now())?;
                    if let Some(cancelled) = self.commit(&session, cancelled).await? {
                        self.finish_cancelled(&cancelled).await?;
                        return Ok(cancelled);
                    }
                }
                AuctionState::Awarded => {
                    if session.pending_cancel.is_some() {
                        return self.settle_award(session).await;
                    }
                    let marked = session.request_cancel(reason, self.clock.now())?;
                    if let Some(marked) = self.commit(&session, marked).await? {
                        info!(auction_id = %marked.auction_id, "Cancellation pending on awarded auction");
                        self.audit
                            .record(
                                marked.auction_id,
                                AuditKind::CancellationRequested,
                                json!({ "reason": reason.as_str() }),
                            )
                            .await;
                        return self.settle_award(marked).await;
                    }
                }
                AuctionState::Closed => {
                    self.cancel_closed(&session, reason).await?;
                    return Ok(session);
                }
                AuctionState::Expired | AuctionState::Cancelled => {
                    debug!(state = %session.state, "Auction already finished, nothing to cancel");
                    return Ok(session);
                }
            }
            session = self.reload(session.auction_id).await?;
        }
        Err(EngineError::Contended(session.auction_id))
    }

    async fn cancel_closed(
        &self,
        session: &AuctionSession,
        reason: TerminalReason,
    ) -> Result<(), EngineError> {
        let Some(winner) = &session.winner else {
            return Err(StoreError::Corruption(format!(
                "auction {} is closed without a winner",
                session.auction_id
            ))
            .into());
        };
        self.store
            .update_requirement_status(session.requirement_id, RequirementStatus::Withdrawn)
            .await?;
        let Some(PutOutcome::Inserted(reversal)) = self
            .ledger
            .record_reversal(session.requirement_id, winner)
            .await?
        else {
            debug!(auction_id = %session.auction_id, "Closed auction already reversed");
            return Ok(());
        };
        self.audit_commission(AuditKind::CommissionReversed, &reversal)
            .await;
        self.release_load(winner).await;
        info!(auction_id = %session.auction_id, "Closed auction cancelled, commission reversed");
        self.audit
            .record(
                session.auction_id,
                AuditKind::AuctionCancelled,
                json!({ "reason": reason.as_str(), "after_close": true }),
            )
            .await;
        self.send_settled(AuctionSettled {
            auction_id: session.auction_id,
            requirement_id: session.requirement_id,
            outcome: reason.outcome(),
        })
        .await;
        Ok(())
    }

    /// Expire an auction that has not been awarded. An award always wins
    /// over a forced expiry, so `AWARDED` and later states are left alone.
    #[tracing::instrument(skip_all, err, fields(requirement_id = %requirement_id))]
    pub async fn force_expire(&self, requirement_id: Uuid) -> Result<AuctionSession, EngineError> {
        let mut session = self
            .store
            .get_session_by_requirement(requirement_id)
            .await?
            .ok_or(EngineError::RequirementNotFound(requirement_id))?;

        for _ in 0..MAX_TRANSITION_ATTEMPTS {
            if !session.accepts_claims() {
                info!(state = %session.state, "Force expire ignored");
                return Ok(session);
            }
            let expired = session.expire(TerminalReason::AdminExpired, self.clock.now())?;
            if let Some(expired) = self.commit(&session, expired).await? {
                self.finish_expired(&expired).await?;
                return Ok(expired);
            }
            session = self.reload(session.auction_id).await?;
        }
        Err(EngineError::Contended(session.auction_id))
    }

    // -- Sweeper entry points ----------------------------------------------

    /// Expire every `OPEN`/`BROADCAST` session past its deadline.
    ///
    /// Returns how many were expired. Sessions that changed concurrently are
    /// skipped; a session that is still overdue is retried on the next sweep.
    pub async fn expire_overdue(&self, now: time::PrimitiveDateTime) -> Result<usize, EngineError> {
        let overdue = self.store.list_overdue_sessions(now).await?;
        let mut expired_count = 0;
        for session in overdue {
            let expired = match session.expire(TerminalReason::SlaTimeout, now) {
                Ok(expired) => expired,
                Err(_) => continue,
            };
            match self.commit(&session, expired).await {
                Ok(Some(expired)) => {
                    info!(auction_id = %expired.auction_id, "Auction expired: SLA elapsed");
                    if let Err(e) = self.finish_expired(&expired).await {
                        error!(auction_id = %expired.auction_id, error = %e, "Failed to finish expiry");
                    }
                    expired_count += 1;
                }
                Ok(None) => {
                    debug!(auction_id = %session.auction_id, "Session changed during sweep");
                }
                Err(e) => {
                    error!(auction_id = %session.auction_id, error = %e, "Failed to expire session");
                }
            }
        }
        Ok(expired_count)
    }

    /// Re-drive verification for sessions left in `AWARDED` longer than the
    /// configured grace period, first restoring a winning claim whose write
    /// was lost.
    pub async fn recover_stalled_awards(
        &self,
        now: time::PrimitiveDateTime,
    ) -> Result<usize, EngineError> {
        let grace = self.config.snapshot().await.auction.award_grace;
        let cutoff = now - time::Duration::try_from(grace).unwrap_or(time::Duration::ZERO);
        let stalled = self.store.list_stalled_awards(cutoff).await?;
        let mut recovered = 0;
        for session in stalled {
            let auction_id = session.auction_id;
            warn!(auction_id = %auction_id, "Re-driving stalled award");
            if let Err(e) = self.arbiter.backfill_winning_claim(&session).await {
                error!(auction_id = %auction_id, error = %e, "Failed to backfill winning claim");
                continue;
            }
            match self.settle_award(session).await {
                Ok(_) => recovered += 1,
                Err(e) => error!(auction_id = %auction_id, error = %e, "Failed to settle stalled award"),
            }
        }
        Ok(recovered)
    }

    // -- Reads -------------------------------------------------------------

    pub async fn session(&self, auction_id: Uuid) -> Result<Option<AuctionSession>, EngineError> {
        Ok(self.store.get_session(auction_id).await?)
    }

    pub async fn session_for_requirement(
        &self,
        requirement_id: Uuid,
    ) -> Result<Option<AuctionSession>, EngineError> {
        Ok(self.store.get_session_by_requirement(requirement_id).await?)
    }

    pub async fn requirement(&self, requirement_id: Uuid) -> Result<Option<Requirement>, EngineError> {
        Ok(self.store.get_requirement(requirement_id).await?)
    }

    pub async fn claims(&self, auction_id: Uuid) -> Result<Vec<Claim>, EngineError> {
        Ok(self.store.list_claims(auction_id).await?)
    }

    pub async fn audit_trail(&self, auction_id: Uuid) -> Result<Vec<AuditEvent>, EngineError> {
        Ok(self.audit.history(auction_id).await?)
    }

    pub async fn commissions(
        &self,
        requirement_id: Uuid,
    ) -> Result<Vec<CommissionRecord>, EngineError> {
        Ok(self.ledger.records(requirement_id).await?)
    }

    /// Summarize the last `window` closed deals in `location`.
    pub async fn market_report(
        &self,
        location: &str,
        window: u32,
    ) -> Result<MarketReport, EngineError> {
        let deals = self.store.list_closed_deals(location, window).await?;
        let directory = self.directory.snapshot().await?;
        Ok(MarketReport::summarize(location, &deals, &directory))
    }

    // -- Helpers -----------------------------------------------------------

    /// Compare-and-set `next` over `current`. `None` means another writer got
    /// there first.
    async fn commit(
        &self,
        current: &AuctionSession,
        next: AuctionSession,
    ) -> Result<Option<AuctionSession>, StoreError> {
        match self
            .store
            .conditional_update_session(current.version, next.clone())
            .await
        {
            Ok(()) => Ok(Some(next)),
            Err(StoreError::VersionConflict { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn reload(&self, auction_id: Uuid) -> Result<AuctionSession, EngineError> {
        self.store
            .get_session(auction_id)
            .await?
            .ok_or(EngineError::AuctionNotFound(auction_id))
    }

    async fn finish_expired(&self, session: &AuctionSession) -> Result<(), EngineError> {
        self.store
            .update_requirement_status(session.requirement_id, RequirementStatus::Expired)
            .await?;
        self.audit
            .record(
                session.auction_id,
                AuditKind::AuctionExpired,
                json!({ "reason": session.terminal_reason.map(TerminalReason::as_str) }),
            )
            .await;
        self.emit_settled(session).await;
        Ok(())
    }

    async fn finish_cancelled(&self, session: &AuctionSession) -> Result<(), EngineError> {
        self.store
            .update_requirement_status(session.requirement_id, RequirementStatus::Withdrawn)
            .await?;
        info!(auction_id = %session.auction_id, "Auction cancelled");
        self.audit
            .record(
                session.auction_id,
                AuditKind::AuctionCancelled,
                json!({ "reason": session.terminal_reason.map(TerminalReason::as_str) }),
            )
            .await;
        self.emit_settled(session).await;
        Ok(())
    }

    async fn reverse_commission(
        &self,
        requirement_id: Uuid,
        candidate_id: &CandidateId,
    ) -> Result<(), EngineError> {
        if let Some(PutOutcome::Inserted(reversal)) = self
            .ledger
            .record_reversal(requirement_id, candidate_id)
            .await?
        {
            self.audit_commission(AuditKind::CommissionReversed, &reversal)
                .await;
        }
        Ok(())
    }

    async fn audit_commission(&self, kind: AuditKind, record: &CommissionRecord) {
        self.audit
            .record(
                record.auction_id,
                kind,
                json!({
                    "candidate": record.candidate_id,
                    "category": record.category,
                    "basis": record.basis,
                    "rate": record.rate,
                    "amount": record.amount,
                }),
            )
            .await;
    }

    async fn release_load(&self, candidate_id: &CandidateId) {
        if let Err(e) = self.store.update_candidate_load(candidate_id, -1).await {
            error!(candidate = %candidate_id, error = %e, "Failed to release candidate load");
        }
    }

    async fn emit_broadcast(&self, session: &AuctionSession, candidates: Vec<CandidateId>) {
        let event = BroadcastRequested {
            auction_id: session.auction_id,
            round: session.round,
            candidates,
        };
        if self.events.broadcast_requested.send(event).await.is_err() {
            warn!(auction_id = %session.auction_id, "Fanout is not running, invitations not sent");
        }
    }

    async fn emit_settled(&self, session: &AuctionSession) {
        let Some(outcome) = session.outcome() else {
            return;
        };
        self.send_settled(AuctionSettled {
            auction_id: session.auction_id,
            requirement_id: session.requirement_id,
            outcome,
        })
        .await;
    }

    async fn send_settled(&self, event: AuctionSettled) {
        let auction_id = event.auction_id;
        if let AuctionOutcome::Awarded { winner } = &event.outcome {
            debug!(auction_id = %auction_id, winner = %winner, "Reporting award");
        }
        if self.events.auction_settled.send(event).await.is_err() {
            warn!(auction_id = %auction_id, "Outcome reporter is not running, outcome not reported");
        }
    }
}
