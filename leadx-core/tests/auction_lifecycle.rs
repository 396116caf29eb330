//! End-to-end auction lifecycle against the in-memory store.

use async_trait::async_trait;
use leadx_core::config::{ConfigStore, EngineConfig};
use leadx_core::entities::CandidateId;
use leadx_core::entities::audit_event::{AuditEvent, AuditKind, NewAuditEvent};
use leadx_core::entities::auction_session::{AuctionSession, AuctionState, TerminalReason};
use leadx_core::entities::candidate::{Candidate, VerificationStatus};
use leadx_core::entities::claim::{Claim, ClaimDecision, NewClaim, RejectionReason};
use leadx_core::entities::commission::{CommissionKind, CommissionRecord};
use leadx_core::entities::market::ClosedDeal;
use leadx_core::entities::requirement::{Requirement, RequirementStatus};
use leadx_core::events::{EventReceivers, engine_channels};
use leadx_core::processors::{
    AuctionCoordinator, AuditTrail, CommissionLedger, ExpirySweeper, NotificationFanout,
    ResponseArbiter,
};
use leadx_core::store::{AuctionStore, MemoryStore, PutOutcome, StoreError};
use leadx_core::transport::{Transport, TransportError};
use leadx_core::utils::{Clock, ManualClock};
use leadx_sdk::objects::{
    AdminCommand, AuctionInvitation, AuctionOutcome, CancelReason, ExpiryReason,
    RegisterCandidate, RequirementIntake, VerificationStatus as SdkVerificationStatus,
};
use proptest::prelude::*;
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use time::{Date, Month, PrimitiveDateTime, Time};
use uuid::Uuid;

struct Harness {
    store: Arc<dyn AuctionStore>,
    clock: Arc<ManualClock>,
    config: ConfigStore<EngineConfig>,
    coordinator: Arc<AuctionCoordinator>,
    receivers: EventReceivers,
}

impl Harness {
    fn new() -> Self {
        Self::with_store(Arc::new(MemoryStore::new()))
    }

    fn with_store(store: Arc<dyn AuctionStore>) -> Self {
        let start = PrimitiveDateTime::new(
            Date::from_calendar_date(2025, Month::June, 2).unwrap(),
            Time::from_hms(9, 0, 0).unwrap(),
        );
        let clock = Arc::new(ManualClock::new(start));
        let config = ConfigStore::new(EngineConfig::default());
        let (senders, receivers) = engine_channels();
        let coordinator = Arc::new(AuctionCoordinator::new(
            Arc::clone(&store),
            clock.clone(),
            config.clone(),
            senders,
        ));
        Self {
            store,
            clock,
            config,
            coordinator,
            receivers,
        }
    }

    async fn register(&self, id: &str, status: SdkVerificationStatus) {
        self.coordinator
            .directory()
            .register(RegisterCandidate {
                candidate_id: id.into(),
                name: id.to_uppercase(),
                service_areas: vec!["Marina".into()],
                categories: vec![],
                status: Some(status),
            })
            .await
            .unwrap();
        // keep registration order distinct for the seniority tie-break
        self.clock.advance(Duration::from_secs(1));
    }

    async fn open(&self, intake: RequirementIntake) -> AuctionSession {
        self.coordinator.open_auction(intake).await.unwrap()
    }

    fn arbiter(&self) -> ResponseArbiter {
        ResponseArbiter::new(
            Arc::clone(&self.store),
            self.clock.clone(),
            AuditTrail::new(Arc::clone(&self.store), self.clock.clone()),
        )
    }

    async fn audit_kinds(&self, auction_id: Uuid) -> Vec<AuditKind> {
        self.coordinator
            .audit_trail(auction_id)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.kind)
            .collect()
    }

    fn settled_outcomes(&mut self) -> Vec<AuctionOutcome> {
        let mut outcomes = Vec::new();
        while let Ok(event) = self.receivers.auction_settled.try_recv() {
            outcomes.push(event.outcome);
        }
        outcomes
    }
}

fn apartment(budget: i64) -> RequirementIntake {
    RequirementIntake {
        requirement_id: Some(Uuid::now_v7()),
        location: "Marina".into(),
        category: "apartment".into(),
        budget_min: None,
        budget_max: Some(Decimal::from(budget)),
        bedrooms: Some(2),
        client_ref: None,
    }
}

fn rejected(reason: RejectionReason) -> ClaimDecision {
    ClaimDecision::Rejected(reason)
}

#[tokio::test]
async fn test_first_commit_wins_and_closes() {
    let mut h = Harness::new();
    for id in ["a", "b", "c"] {
        h.register(id, SdkVerificationStatus::Verified).await;
    }
    let session = h.open(apartment(500_000)).await;
    assert_eq!(session.state, AuctionState::Broadcast);
    assert_eq!(
        session.invited,
        vec![CandidateId::from("a"), CandidateId::from("b"), CandidateId::from("c")]
    );

    let broadcast = h.receivers.broadcast_requested.try_recv().unwrap();
    assert_eq!(broadcast.round, 1);
    assert_eq!(broadcast.candidates.len(), 3);

    let first = h.coordinator.submit_claim(session.auction_id, "a".into()).await.unwrap();
    h.clock.advance(Duration::from_millis(30));
    let second = h.coordinator.submit_claim(session.auction_id, "b".into()).await.unwrap();

    assert_eq!(first.decision, ClaimDecision::Winning);
    assert_eq!(second.decision, rejected(RejectionReason::AlreadyAwarded));

    let closed = first.session.unwrap();
    assert_eq!(closed.state, AuctionState::Closed);
    assert_eq!(closed.winner, Some("a".into()));

    let commissions = h.coordinator.commissions(session.requirement_id).await.unwrap();
    assert_eq!(commissions.len(), 1);
    let record = &commissions[0];
    assert_eq!(record.kind, CommissionKind::Entitlement);
    assert_eq!(record.candidate_id, "a".into());
    assert_eq!(record.basis, Decimal::from(500_000));
    assert_eq!(record.amount, Decimal::from(15_000));

    let requirement = h.coordinator.requirement(session.requirement_id).await.unwrap().unwrap();
    assert_eq!(requirement.status, RequirementStatus::Closed);
    let winner = h.coordinator.directory().get(&"a".into()).await.unwrap().unwrap();
    assert_eq!(winner.active_leads, 1);

    assert_eq!(
        h.settled_outcomes(),
        vec![AuctionOutcome::Awarded { winner: "a".into() }]
    );
    assert_eq!(
        h.audit_kinds(session.auction_id).await,
        vec![
            AuditKind::AuctionOpened,
            AuditKind::BroadcastStarted,
            AuditKind::ClaimAccepted,
            AuditKind::VerificationPassed,
            AuditKind::CommissionRecorded,
            AuditKind::AuctionClosed,
            AuditKind::ClaimRejected,
        ]
    );
}

#[tokio::test]
async fn test_uninvited_and_duplicate_claims_are_rejected() {
    let h = Harness::new();
    h.register("a", SdkVerificationStatus::Verified).await;
    h.register("pending", SdkVerificationStatus::Pending).await;
    let session = h.open(apartment(500_000)).await;

    let outsider = h
        .coordinator
        .submit_claim(session.auction_id, "pending".into())
        .await
        .unwrap();
    assert_eq!(outsider.decision, rejected(RejectionReason::NotInvited));

    let unknown = h.coordinator.submit_claim(Uuid::now_v7(), "a".into()).await.unwrap();
    assert_eq!(unknown.decision, rejected(RejectionReason::AuctionNotFound));
    assert!(unknown.claim.is_none());

    let won = h.coordinator.submit_claim(session.auction_id, "a".into()).await.unwrap();
    assert!(won.decision.is_winning());
    let again = h.coordinator.submit_claim(session.auction_id, "a".into()).await.unwrap();
    assert_eq!(again.decision, rejected(RejectionReason::Duplicate));

    let claims = h.coordinator.claims(session.auction_id).await.unwrap();
    assert_eq!(claims.len(), 3);
    assert_eq!(claims.iter().filter(|c| c.decision.is_winning()).count(), 1);
}

#[tokio::test]
async fn test_no_eligible_candidate_expires_without_broadcast() {
    let mut h = Harness::new();
    h.register("suspended", SdkVerificationStatus::Suspended).await;
    let session = h.open(apartment(500_000)).await;

    assert_eq!(session.state, AuctionState::Expired);
    assert_eq!(session.terminal_reason, Some(TerminalReason::NoEligibleCandidate));
    assert!(h.receivers.broadcast_requested.try_recv().is_err());
    assert!(!h.audit_kinds(session.auction_id).await.contains(&AuditKind::BroadcastStarted));
    assert_eq!(
        h.settled_outcomes(),
        vec![AuctionOutcome::Expired {
            reason: ExpiryReason::NoEligibleCandidate
        }]
    );
    let requirement = h.coordinator.requirement(session.requirement_id).await.unwrap().unwrap();
    assert_eq!(requirement.status, RequirementStatus::Expired);
}

#[tokio::test]
async fn test_open_is_idempotent_per_requirement() {
    let h = Harness::new();
    h.register("a", SdkVerificationStatus::Verified).await;
    let intake = apartment(500_000);
    let first = h.open(intake.clone()).await;
    let second = h.open(intake).await;
    assert_eq!(first.auction_id, second.auction_id);
}

#[tokio::test]
async fn test_invalid_intake_is_refused() {
    let h = Harness::new();
    let mut intake = apartment(500_000);
    intake.location = "  ".into();
    assert!(h.coordinator.open_auction(intake).await.is_err());
}

#[tokio::test]
async fn test_sla_timeout_expires_and_late_claims_are_rejected() {
    let mut h = Harness::new();
    h.register("a", SdkVerificationStatus::Verified).await;
    let session = h.open(apartment(500_000)).await;
    let sweeper = ExpirySweeper::new(h.coordinator.clone(), h.clock.clone());

    assert_eq!(sweeper.sweep().await.expired, 0);
    h.clock.advance(h.config.snapshot().await.auction.sla + Duration::from_secs(1));
    assert_eq!(sweeper.sweep().await.expired, 1);
    // a second sweep finds nothing left to do
    assert_eq!(sweeper.sweep().await.expired, 0);

    let expired = h.coordinator.session(session.auction_id).await.unwrap().unwrap();
    assert_eq!(expired.state, AuctionState::Expired);
    assert_eq!(expired.terminal_reason, Some(TerminalReason::SlaTimeout));

    let late = h.coordinator.submit_claim(session.auction_id, "a".into()).await.unwrap();
    assert_eq!(late.decision, rejected(RejectionReason::AuctionClosed));
    assert!(h.coordinator.commissions(session.requirement_id).await.unwrap().is_empty());
    assert_eq!(
        h.settled_outcomes(),
        vec![AuctionOutcome::Expired {
            reason: ExpiryReason::SlaTimeout
        }]
    );
}

#[tokio::test]
async fn test_award_beats_expiry_sweep() {
    let h = Harness::new();
    h.register("a", SdkVerificationStatus::Verified).await;
    let session = h.open(apartment(500_000)).await;
    h.coordinator.submit_claim(session.auction_id, "a".into()).await.unwrap();

    h.clock.advance(Duration::from_secs(2 * 60 * 60));
    let expired = h.coordinator.expire_overdue(h.clock.now()).await.unwrap();
    assert_eq!(expired, 0);
    let closed = h.coordinator.session(session.auction_id).await.unwrap().unwrap();
    assert_eq!(closed.state, AuctionState::Closed);
}

#[tokio::test]
async fn test_suspended_winner_triggers_rebroadcast() {
    let mut h = Harness::new();
    for id in ["a", "b", "c"] {
        h.register(id, SdkVerificationStatus::Verified).await;
    }
    let session = h.open(apartment(500_000)).await;
    h.receivers.broadcast_requested.try_recv().unwrap();

    // award without the inline verification, then flip the winner's status
    let verdict = h.arbiter().arbitrate(session.auction_id, &"a".into(), 8).await.unwrap();
    let awarded = verdict.session.unwrap();
    assert_eq!(awarded.state, AuctionState::Awarded);
    h.coordinator
        .directory()
        .set_status(&"a".into(), VerificationStatus::Suspended)
        .await
        .unwrap();

    let rebroadcast = h.coordinator.settle_award(awarded).await.unwrap();
    assert_eq!(rebroadcast.state, AuctionState::Broadcast);
    assert_eq!(rebroadcast.round, 2);
    assert_eq!(rebroadcast.winner, None);
    assert_eq!(rebroadcast.excluded, vec![CandidateId::from("a")]);

    let event = h.receivers.broadcast_requested.try_recv().unwrap();
    assert_eq!(event.round, 2);
    assert_eq!(event.candidates, vec![CandidateId::from("b"), CandidateId::from("c")]);
    let released = h.coordinator.directory().get(&"a".into()).await.unwrap().unwrap();
    assert_eq!(released.active_leads, 0);

    let excluded = h.coordinator.submit_claim(session.auction_id, "a".into()).await.unwrap();
    assert_eq!(excluded.decision, rejected(RejectionReason::NotInvited));

    let won = h.coordinator.submit_claim(session.auction_id, "c".into()).await.unwrap();
    assert!(won.decision.is_winning());
    assert_eq!(won.session.unwrap().state, AuctionState::Closed);
    assert_eq!(
        h.settled_outcomes(),
        vec![AuctionOutcome::Awarded { winner: "c".into() }]
    );
    let kinds = h.audit_kinds(session.auction_id).await;
    assert!(kinds.contains(&AuditKind::VerificationFailed));
    assert!(kinds.contains(&AuditKind::Rebroadcast));
}

#[tokio::test]
async fn test_verification_exhaustion_expires() {
    let mut h = Harness::new();
    h.register("a", SdkVerificationStatus::Verified).await;
    let session = h.open(apartment(500_000)).await;

    let awarded = h
        .arbiter()
        .arbitrate(session.auction_id, &"a".into(), 8)
        .await
        .unwrap()
        .session
        .unwrap();
    h.coordinator
        .directory()
        .set_status(&"a".into(), VerificationStatus::Suspended)
        .await
        .unwrap();

    let expired = h.coordinator.settle_award(awarded).await.unwrap();
    assert_eq!(expired.state, AuctionState::Expired);
    assert_eq!(expired.terminal_reason, Some(TerminalReason::VerificationExhausted));
    assert_eq!(
        h.settled_outcomes(),
        vec![AuctionOutcome::Expired {
            reason: ExpiryReason::VerificationExhausted
        }]
    );
}

#[tokio::test]
async fn test_stalled_award_is_recovered_by_sweeper() {
    let h = Harness::new();
    h.register("a", SdkVerificationStatus::Verified).await;
    let session = h.open(apartment(500_000)).await;
    h.arbiter().arbitrate(session.auction_id, &"a".into(), 8).await.unwrap();

    let sweeper = ExpirySweeper::new(h.coordinator.clone(), h.clock.clone());
    assert_eq!(sweeper.sweep().await.recovered, 0);
    h.clock.advance(Duration::from_secs(120));
    assert_eq!(sweeper.sweep().await.recovered, 1);

    let closed = h.coordinator.session(session.auction_id).await.unwrap().unwrap();
    assert_eq!(closed.state, AuctionState::Closed);
    assert_eq!(h.coordinator.commissions(session.requirement_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_withdrawal_cancels_broadcast() {
    let mut h = Harness::new();
    h.register("a", SdkVerificationStatus::Verified).await;
    let session = h.open(apartment(500_000)).await;

    let cancelled = h
        .coordinator
        .withdraw_requirement(session.requirement_id)
        .await
        .unwrap();
    assert_eq!(cancelled.state, AuctionState::Cancelled);
    assert_eq!(cancelled.terminal_reason, Some(TerminalReason::Withdrawn));

    let late = h.coordinator.submit_claim(session.auction_id, "a".into()).await.unwrap();
    assert_eq!(late.decision, rejected(RejectionReason::AuctionClosed));
    assert_eq!(
        h.settled_outcomes(),
        vec![AuctionOutcome::Cancelled {
            reason: CancelReason::Withdrawn
        }]
    );

    // already finished: nothing changes
    let again = h.coordinator.withdraw_requirement(session.requirement_id).await.unwrap();
    assert_eq!(again.version, cancelled.version);
}

#[tokio::test]
async fn test_admin_cancel_of_pending_award_skips_commission() {
    let mut h = Harness::new();
    h.register("a", SdkVerificationStatus::Verified).await;
    let session = h.open(apartment(500_000)).await;
    h.arbiter().arbitrate(session.auction_id, &"a".into(), 8).await.unwrap();

    let cancelled = h
        .coordinator
        .execute(AdminCommand::CancelAuction {
            requirement_id: session.requirement_id,
        })
        .await
        .unwrap();
    assert_eq!(cancelled.state, AuctionState::Cancelled);
    assert_eq!(cancelled.terminal_reason, Some(TerminalReason::AdminCancelled));
    assert!(h.coordinator.commissions(session.requirement_id).await.unwrap().is_empty());

    let candidate = h.coordinator.directory().get(&"a".into()).await.unwrap().unwrap();
    assert_eq!(candidate.active_leads, 0);
    assert_eq!(
        h.settled_outcomes(),
        vec![AuctionOutcome::Cancelled {
            reason: CancelReason::Admin
        }]
    );
    assert!(
        h.audit_kinds(session.auction_id)
            .await
            .contains(&AuditKind::CancellationRequested)
    );
}

#[tokio::test]
async fn test_cancel_after_close_reverses_commission_once() {
    let mut h = Harness::new();
    h.register("a", SdkVerificationStatus::Verified).await;
    let session = h.open(apartment(500_000)).await;
    h.coordinator.submit_claim(session.auction_id, "a".into()).await.unwrap();
    h.settled_outcomes();

    for _ in 0..2 {
        let after = h
            .coordinator
            .withdraw_requirement(session.requirement_id)
            .await
            .unwrap();
        assert_eq!(after.state, AuctionState::Closed);
    }

    let records = h.coordinator.commissions(session.requirement_id).await.unwrap();
    assert_eq!(records.len(), 2);
    let total: Decimal = records.iter().map(|r| r.amount).sum();
    assert_eq!(total, Decimal::ZERO);

    let candidate = h.coordinator.directory().get(&"a".into()).await.unwrap().unwrap();
    assert_eq!(candidate.active_leads, 0);
    let requirement = h.coordinator.requirement(session.requirement_id).await.unwrap().unwrap();
    assert_eq!(requirement.status, RequirementStatus::Withdrawn);
    assert_eq!(
        h.settled_outcomes(),
        vec![AuctionOutcome::Cancelled {
            reason: CancelReason::Withdrawn
        }]
    );
}

#[tokio::test]
async fn test_force_expire_leaves_awarded_alone() {
    let h = Harness::new();
    h.register("a", SdkVerificationStatus::Verified).await;
    h.register("b", SdkVerificationStatus::Verified).await;

    let open = h.open(apartment(500_000)).await;
    let expired = h
        .coordinator
        .execute(AdminCommand::ForceExpire {
            requirement_id: open.requirement_id,
        })
        .await
        .unwrap();
    assert_eq!(expired.state, AuctionState::Expired);
    assert_eq!(expired.terminal_reason, Some(TerminalReason::AdminExpired));

    let awarded = h.open(apartment(500_000)).await;
    h.arbiter().arbitrate(awarded.auction_id, &"b".into(), 8).await.unwrap();
    let untouched = h.coordinator.force_expire(awarded.requirement_id).await.unwrap();
    assert_eq!(untouched.state, AuctionState::Awarded);
}

/// Transport that fails every delivery to the listed candidates.
struct ScriptedTransport {
    failing: HashSet<String>,
    delivered: Mutex<Vec<String>>,
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send_invitation(&self, invitation: &AuctionInvitation) -> Result<(), TransportError> {
        let id = invitation.candidate_id.to_string();
        if self.failing.contains(&id) {
            return Err(TransportError::Rejected {
                status: 503,
                body: "adapter down".into(),
            });
        }
        self.delivered.lock().unwrap().push(id);
        Ok(())
    }
}

#[tokio::test]
async fn test_fanout_failure_does_not_block_others() {
    let mut h = Harness::new();
    for id in ["a", "b", "c"] {
        h.register(id, SdkVerificationStatus::Verified).await;
    }
    let mut config = h.config.snapshot().await;
    config.fanout.max_attempts = 2;
    config.fanout.base_delay = Duration::from_millis(1);
    config.fanout.max_delay = Duration::from_millis(2);
    h.config.update(config).await;

    let session = h.open(apartment(500_000)).await;
    let event = h.receivers.broadcast_requested.try_recv().unwrap();

    let transport = Arc::new(ScriptedTransport {
        failing: HashSet::from(["b".to_string()]),
        delivered: Mutex::new(Vec::new()),
    });
    let fanout = NotificationFanout::new(
        Arc::clone(&h.store),
        transport.clone(),
        h.coordinator.audit().clone(),
        h.config.clone(),
    );
    let reports = fanout.deliver(event.clone()).await.unwrap();
    assert_eq!(reports.len(), 3);
    assert_eq!(reports.iter().filter(|r| r.is_delivered()).count(), 2);
    let failed = reports.iter().find(|r| !r.is_delivered()).unwrap();
    assert_eq!(failed.candidate_id, "b".into());
    assert_eq!(failed.attempts, 2);

    let mut delivered = transport.delivered.lock().unwrap().clone();
    delivered.sort();
    assert_eq!(delivered, vec!["a", "c"]);

    let kinds = h.audit_kinds(session.auction_id).await;
    assert_eq!(kinds.iter().filter(|k| **k == AuditKind::InvitationDelivered).count(), 2);
    assert_eq!(kinds.iter().filter(|k| **k == AuditKind::DeliveryFailed).count(), 1);

    // a closed auction skips stale broadcast events
    h.coordinator.submit_claim(session.auction_id, "a".into()).await.unwrap();
    assert!(fanout.deliver(event).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_dropped_winner_entitlement_is_reversed_before_rebroadcast() {
    let mut h = Harness::new();
    h.register("a", SdkVerificationStatus::Verified).await;
    h.register("b", SdkVerificationStatus::Verified).await;
    let session = h.open(apartment(500_000)).await;

    // award "a" and write its entitlement, then stop before the close commits
    let awarded = h
        .arbiter()
        .arbitrate(session.auction_id, &"a".into(), 8)
        .await
        .unwrap()
        .session
        .unwrap();
    let requirement = h.coordinator.requirement(session.requirement_id).await.unwrap().unwrap();
    let settings = h.config.snapshot().await;
    CommissionLedger::new(Arc::clone(&h.store), h.clock.clone())
        .record_entitlement(&awarded, &requirement, &settings.commission)
        .await
        .unwrap();

    h.coordinator
        .directory()
        .set_status(&"a".into(), VerificationStatus::Suspended)
        .await
        .unwrap();
    h.clock.advance(Duration::from_secs(120));
    let sweeper = ExpirySweeper::new(h.coordinator.clone(), h.clock.clone());
    assert_eq!(sweeper.sweep().await.recovered, 1);
    let rebroadcast = h.coordinator.session(session.auction_id).await.unwrap().unwrap();
    assert_eq!(rebroadcast.state, AuctionState::Broadcast);

    let won = h.coordinator.submit_claim(session.auction_id, "b".into()).await.unwrap();
    let closed = won.session.unwrap();
    assert_eq!(closed.state, AuctionState::Closed);
    assert_eq!(closed.winner, Some("b".into()));

    let records = h.coordinator.commissions(session.requirement_id).await.unwrap();
    let owed_to = |candidate: &str| -> Decimal {
        records
            .iter()
            .filter(|r| r.candidate_id == candidate.into())
            .map(|r| r.amount)
            .sum()
    };
    assert_eq!(owed_to("a"), Decimal::ZERO);
    assert_eq!(owed_to("b"), Decimal::from(15_000));
    assert!(
        records
            .iter()
            .any(|r| r.kind == CommissionKind::Entitlement && r.candidate_id == "b".into())
    );
    assert_eq!(
        h.settled_outcomes(),
        vec![AuctionOutcome::Awarded { winner: "b".into() }]
    );
}

#[tokio::test]
async fn test_floor_only_budget_is_the_commission_basis() {
    let h = Harness::new();
    h.register("a", SdkVerificationStatus::Verified).await;
    let mut intake = apartment(0);
    intake.budget_max = None;
    intake.budget_min = Some(Decimal::from(400_000));
    let session = h.open(intake).await;

    h.coordinator.submit_claim(session.auction_id, "a".into()).await.unwrap();
    let records = h.coordinator.commissions(session.requirement_id).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].basis, Decimal::from(400_000));
    assert_eq!(records[0].amount, Decimal::from(12_000));
}

#[tokio::test]
async fn test_winner_response_time_is_reported_and_summarized() {
    let h = Harness::new();
    h.register("a", SdkVerificationStatus::Verified).await;
    h.register("b", SdkVerificationStatus::Verified).await;

    let first = h.open(apartment(400_000)).await;
    h.clock.advance(Duration::from_secs(30));
    let won = h.coordinator.submit_claim(first.auction_id, "a".into()).await.unwrap();
    assert_eq!(won.response_time, Some(time::Duration::seconds(30)));
    assert_eq!(won.to_response().response_time_secs, Some(30.0));

    let second = h.open(apartment(600_000)).await;
    h.clock.advance(Duration::from_secs(90));
    h.coordinator.submit_claim(second.auction_id, "b".into()).await.unwrap();

    // cancelled after close: no longer a deal
    let third = h.open(apartment(900_000)).await;
    h.coordinator.submit_claim(third.auction_id, "a".into()).await.unwrap();
    h.coordinator.withdraw_requirement(third.requirement_id).await.unwrap();

    let report = h.coordinator.market_report("marina", 10).await.unwrap();
    assert_eq!(report.recent_deals, 2);
    assert_eq!(report.verified_candidates, 2);
    assert_eq!(report.avg_response_time, Some(time::Duration::seconds(60)));
    assert_eq!(report.fastest_response_time, Some(time::Duration::seconds(30)));
    assert_eq!(report.average_budget, Some(Decimal::from(500_000)));

    let latest = h.coordinator.market_report("Marina", 1).await.unwrap();
    assert_eq!(latest.recent_deals, 1);
    assert_eq!(latest.avg_response_time, Some(time::Duration::seconds(90)));
    assert_eq!(h.coordinator.market_report("Downtown", 10).await.unwrap().recent_deals, 0);
}

/// Memory store with injected faults.
#[derive(Default)]
struct FaultyStore {
    inner: MemoryStore,
    /// Winning-claim writes still to fail.
    failing_winning_claims: AtomicU32,
    /// Withdraw the requirement as soon as its session commits `CLOSED`.
    withdraw_on_close: AtomicBool,
}

#[async_trait]
impl AuctionStore for FaultyStore {
    async fn put_requirement(&self, requirement: Requirement) -> Result<bool, StoreError> {
        self.inner.put_requirement(requirement).await
    }
    async fn get_requirement(&self, requirement_id: Uuid) -> Result<Option<Requirement>, StoreError> {
        self.inner.get_requirement(requirement_id).await
    }
    async fn update_requirement_status(
        &self,
        requirement_id: Uuid,
        status: RequirementStatus,
    ) -> Result<(), StoreError> {
        self.inner.update_requirement_status(requirement_id, status).await
    }
    async fn transition_requirement_status(
        &self,
        requirement_id: Uuid,
        expected: RequirementStatus,
        status: RequirementStatus,
    ) -> Result<bool, StoreError> {
        self.inner
            .transition_requirement_status(requirement_id, expected, status)
            .await
    }
    async fn upsert_candidate(&self, candidate: Candidate) -> Result<Candidate, StoreError> {
        self.inner.upsert_candidate(candidate).await
    }
    async fn get_candidate(&self, candidate_id: &CandidateId) -> Result<Option<Candidate>, StoreError> {
        self.inner.get_candidate(candidate_id).await
    }
    async fn list_candidates(&self) -> Result<Vec<Candidate>, StoreError> {
        self.inner.list_candidates().await
    }
    async fn update_candidate_status(
        &self,
        candidate_id: &CandidateId,
        status: VerificationStatus,
    ) -> Result<Candidate, StoreError> {
        self.inner.update_candidate_status(candidate_id, status).await
    }
    async fn update_candidate_load(&self, candidate_id: &CandidateId, delta: i32) -> Result<(), StoreError> {
        self.inner.update_candidate_load(candidate_id, delta).await
    }
    async fn insert_session(&self, session: AuctionSession) -> Result<(), StoreError> {
        self.inner.insert_session(session).await
    }
    async fn get_session(&self, auction_id: Uuid) -> Result<Option<AuctionSession>, StoreError> {
        self.inner.get_session(auction_id).await
    }
    async fn get_session_by_requirement(
        &self,
        requirement_id: Uuid,
    ) -> Result<Option<AuctionSession>, StoreError> {
        self.inner.get_session_by_requirement(requirement_id).await
    }
    async fn conditional_update_session(
        &self,
        expected_version: i64,
        next: AuctionSession,
    ) -> Result<(), StoreError> {
        let closed = (next.state == AuctionState::Closed).then_some(next.requirement_id);
        self.inner.conditional_update_session(expected_version, next).await?;
        if let Some(requirement_id) = closed {
            if self.withdraw_on_close.load(Ordering::SeqCst) {
                self.inner
                    .update_requirement_status(requirement_id, RequirementStatus::Withdrawn)
                    .await?;
            }
        }
        Ok(())
    }
    async fn list_overdue_sessions(&self, now: PrimitiveDateTime) -> Result<Vec<AuctionSession>, StoreError> {
        self.inner.list_overdue_sessions(now).await
    }
    async fn list_stalled_awards(
        &self,
        awarded_before: PrimitiveDateTime,
    ) -> Result<Vec<AuctionSession>, StoreError> {
        self.inner.list_stalled_awards(awarded_before).await
    }
    async fn record_claim(&self, claim: NewClaim) -> Result<Claim, StoreError> {
        if claim.decision.is_winning()
            && self
                .failing_winning_claims
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
        {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        self.inner.record_claim(claim).await
    }
    async fn list_claims(&self, auction_id: Uuid) -> Result<Vec<Claim>, StoreError> {
        self.inner.list_claims(auction_id).await
    }
    async fn append_audit_event(&self, event: NewAuditEvent) -> Result<AuditEvent, StoreError> {
        self.inner.append_audit_event(event).await
    }
    async fn list_audit_events(&self, auction_id: Uuid) -> Result<Vec<AuditEvent>, StoreError> {
        self.inner.list_audit_events(auction_id).await
    }
    async fn put_commission_record(
        &self,
        record: CommissionRecord,
    ) -> Result<PutOutcome<CommissionRecord>, StoreError> {
        self.inner.put_commission_record(record).await
    }
    async fn get_commission_record(
        &self,
        requirement_id: Uuid,
        candidate_id: &CandidateId,
        kind: CommissionKind,
    ) -> Result<Option<CommissionRecord>, StoreError> {
        self.inner
            .get_commission_record(requirement_id, candidate_id, kind)
            .await
    }
    async fn list_commission_records(
        &self,
        requirement_id: Uuid,
    ) -> Result<Vec<CommissionRecord>, StoreError> {
        self.inner.list_commission_records(requirement_id).await
    }
    async fn list_closed_deals(&self, location: &str, limit: u32) -> Result<Vec<ClosedDeal>, StoreError> {
        self.inner.list_closed_deals(location, limit).await
    }
}

fn faulty_harness() -> (Harness, Arc<FaultyStore>) {
    let store = Arc::new(FaultyStore::default());
    (Harness::with_store(store.clone()), store)
}

#[tokio::test]
async fn test_winning_claim_write_is_retried() {
    let (h, store) = faulty_harness();
    h.register("a", SdkVerificationStatus::Verified).await;
    let session = h.open(apartment(500_000)).await;

    store.failing_winning_claims.store(2, Ordering::SeqCst);
    let won = h.coordinator.submit_claim(session.auction_id, "a".into()).await.unwrap();
    assert!(won.decision.is_winning());
    assert!(won.claim.is_some());
    assert_eq!(won.session.unwrap().state, AuctionState::Closed);

    let claims = h.coordinator.claims(session.auction_id).await.unwrap();
    assert_eq!(claims.len(), 1);
    assert!(claims[0].decision.is_winning());
}

#[tokio::test]
async fn test_lost_winning_claim_is_backfilled_by_sweeper() {
    let (h, store) = faulty_harness();
    h.register("a", SdkVerificationStatus::Verified).await;
    let session = h.open(apartment(500_000)).await;

    store.failing_winning_claims.store(u32::MAX, Ordering::SeqCst);
    let failed = h.coordinator.submit_claim(session.auction_id, "a".into()).await;
    assert!(matches!(failed, Err(leadx_core::processors::EngineError::Store(_))));
    let awarded = h.coordinator.session(session.auction_id).await.unwrap().unwrap();
    assert_eq!(awarded.state, AuctionState::Awarded);
    assert!(h.coordinator.claims(session.auction_id).await.unwrap().is_empty());

    store.failing_winning_claims.store(0, Ordering::SeqCst);
    h.clock.advance(Duration::from_secs(120));
    let sweeper = ExpirySweeper::new(h.coordinator.clone(), h.clock.clone());
    assert_eq!(sweeper.sweep().await.recovered, 1);

    let claims = h.coordinator.claims(session.auction_id).await.unwrap();
    assert_eq!(claims.len(), 1);
    assert!(claims[0].decision.is_winning());
    assert_eq!(claims[0].candidate_id, "a".into());
    let closed = h.coordinator.session(session.auction_id).await.unwrap().unwrap();
    assert_eq!(closed.state, AuctionState::Closed);

    let trail = h.coordinator.audit_trail(session.auction_id).await.unwrap();
    let accepted = trail.iter().find(|e| e.kind == AuditKind::ClaimAccepted).unwrap();
    assert_eq!(accepted.detail["backfilled"], true);
}

#[tokio::test]
async fn test_close_keeps_requirement_withdrawn_by_racing_cancel() {
    let (h, store) = faulty_harness();
    h.register("a", SdkVerificationStatus::Verified).await;
    let session = h.open(apartment(500_000)).await;

    store.withdraw_on_close.store(true, Ordering::SeqCst);
    let won = h.coordinator.submit_claim(session.auction_id, "a".into()).await.unwrap();
    assert_eq!(won.session.unwrap().state, AuctionState::Closed);

    let requirement = h.coordinator.requirement(session.requirement_id).await.unwrap().unwrap();
    assert_eq!(requirement.status, RequirementStatus::Withdrawn);
}

async fn race_claims(candidates: usize) -> Vec<ClaimDecision> {
    let h = Harness::new();
    let ids: Vec<String> = (0..candidates).map(|i| format!("c{i:02}")).collect();
    for id in &ids {
        h.register(id, SdkVerificationStatus::Verified).await;
    }
    let session = h.open(apartment(500_000)).await;

    let mut tasks = tokio::task::JoinSet::new();
    for id in ids {
        let coordinator = Arc::clone(&h.coordinator);
        let auction_id = session.auction_id;
        tasks.spawn(async move {
            coordinator
                .submit_claim(auction_id, id.as_str().into())
                .await
                .unwrap()
                .decision
        });
    }
    let mut decisions = Vec::new();
    while let Some(decision) = tasks.join_next().await {
        decisions.push(decision.unwrap());
    }

    let claims = h.coordinator.claims(session.auction_id).await.unwrap();
    assert_eq!(claims.iter().filter(|c| c.decision.is_winning()).count(), 1);
    let commissions = h.coordinator.commissions(session.requirement_id).await.unwrap();
    assert_eq!(commissions.len(), 1);
    decisions
}

fn assert_single_winner(decisions: &[ClaimDecision]) {
    let winners = decisions.iter().filter(|d| d.is_winning()).count();
    let already_awarded = decisions
        .iter()
        .filter(|d| **d == ClaimDecision::Rejected(RejectionReason::AlreadyAwarded))
        .count();
    assert_eq!(winners, 1);
    assert_eq!(already_awarded, decisions.len() - 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_claims_have_exactly_one_winner() {
    let decisions = race_claims(10).await;
    assert_eq!(decisions.len(), 10);
    assert_single_winner(&decisions);
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 16, .. ProptestConfig::default() })]

    #[test]
    fn prop_any_number_of_racing_claims_has_one_winner(candidates in 1usize..=10) {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(4)
            .enable_all()
            .build()
            .unwrap();
        let decisions = runtime.block_on(race_claims(candidates));
        prop_assert_eq!(decisions.len(), candidates);
        assert_single_winner(&decisions);
    }
}
