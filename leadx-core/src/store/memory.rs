use super::{AuctionStore, PutOutcome, StoreError};
use crate::entities::CandidateId;
use crate::entities::audit_event::{AuditEvent, NewAuditEvent};
use crate::entities::auction_session::{AuctionSession, AuctionState};
use crate::entities::candidate::{Candidate, VerificationStatus};
use crate::entities::claim::{Claim, NewClaim};
use crate::entities::commission::{CommissionKind, CommissionRecord};
use crate::entities::market::ClosedDeal;
use crate::entities::requirement::{Requirement, RequirementStatus};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use time::PrimitiveDateTime;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Default)]
struct State {
    requirements: HashMap<Uuid, Requirement>,
    candidates: BTreeMap<CandidateId, Candidate>,
    sessions: HashMap<Uuid, AuctionSession>,
    session_by_requirement: HashMap<Uuid, Uuid>,
    claims: Vec<Claim>,
    audit: Vec<AuditEvent>,
    commissions: Vec<CommissionRecord>,
}

/// In-process store. All operations serialize on one async mutex, which
/// gives the same linearizable compare-and-set the database provides.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuctionStore for MemoryStore {
    async fn put_requirement(&self, requirement: Requirement) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        if state.requirements.contains_key(&requirement.requirement_id) {
            return Ok(false);
        }
        state
            .requirements
            .insert(requirement.requirement_id, requirement);
        Ok(true)
    }

    async fn get_requirement(
        &self,
        requirement_id: Uuid,
    ) -> Result<Option<Requirement>, StoreError> {
        Ok(self
            .state
            .lock()
            .await
            .requirements
            .get(&requirement_id)
            .cloned())
    }

    async fn update_requirement_status(
        &self,
        requirement_id: Uuid,
        status: RequirementStatus,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let requirement = state
            .requirements
            .get_mut(&requirement_id)
            .ok_or_else(|| StoreError::NotFound(format!("requirement {requirement_id}")))?;
        requirement.status = status;
        Ok(())
    }

    async fn transition_requirement_status(
        &self,
        requirement_id: Uuid,
        expected: RequirementStatus,
        status: RequirementStatus,
    ) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        let requirement = state
            .requirements
            .get_mut(&requirement_id)
            .ok_or_else(|| StoreError::NotFound(format!("requirement {requirement_id}")))?;
        if requirement.status != expected {
            return Ok(false);
        }
        requirement.status = status;
        Ok(true)
    }

    async fn upsert_candidate(&self, candidate: Candidate) -> Result<Candidate, StoreError> {
        let mut state = self.state.lock().await;
        let stored = match state.candidates.get(&candidate.candidate_id) {
            Some(existing) => Candidate {
                active_leads: existing.active_leads,
                registered_at: existing.registered_at,
                ..candidate
            },
            None => Candidate {
                active_leads: 0,
                ..candidate
            },
        };
        state
            .candidates
            .insert(stored.candidate_id.clone(), stored.clone());
        Ok(stored)
    }

    async fn get_candidate(
        &self,
        candidate_id: &CandidateId,
    ) -> Result<Option<Candidate>, StoreError> {
        Ok(self
            .state
            .lock()
            .await
            .candidates
            .get(candidate_id)
            .cloned())
    }

    async fn list_candidates(&self) -> Result<Vec<Candidate>, StoreError> {
        Ok(self
            .state
            .lock()
            .await
            .candidates
            .values()
            .cloned()
            .collect())
    }

    async fn update_candidate_status(
        &self,
        candidate_id: &CandidateId,
        status: VerificationStatus,
    ) -> Result<Candidate, StoreError> {
        let mut state = self.state.lock().await;
        let candidate = state
            .candidates
            .get_mut(candidate_id)
            .ok_or_else(|| StoreError::NotFound(format!("candidate {candidate_id}")))?;
        candidate.status = status;
        Ok(candidate.clone())
    }

    async fn update_candidate_load(
        &self,
        candidate_id: &CandidateId,
        delta: i32,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let candidate = state
            .candidates
            .get_mut(candidate_id)
            .ok_or_else(|| StoreError::NotFound(format!("candidate {candidate_id}")))?;
        candidate.active_leads = candidate.active_leads.saturating_add(delta).max(0);
        Ok(())
    }

    async fn insert_session(&self, session: AuctionSession) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if state
            .session_by_requirement
            .contains_key(&session.requirement_id)
            || state.sessions.contains_key(&session.auction_id)
        {
            return Err(StoreError::Duplicate(format!(
                "auction for requirement {}",
                session.requirement_id
            )));
        }
        state
            .session_by_requirement
            .insert(session.requirement_id, session.auction_id);
        state.sessions.insert(session.auction_id, session);
        Ok(())
    }

    async fn get_session(&self, auction_id: Uuid) -> Result<Option<AuctionSession>, StoreError> {
        Ok(self.state.lock().await.sessions.get(&auction_id).cloned())
    }

    async fn get_session_by_requirement(
        &self,
        requirement_id: Uuid,
    ) -> Result<Option<AuctionSession>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .session_by_requirement
            .get(&requirement_id)
            .and_then(|id| state.sessions.get(id))
            .cloned())
    }

    async fn conditional_update_session(
        &self,
        expected_version: i64,
        next: AuctionSession,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let current = state
            .sessions
            .get_mut(&next.auction_id)
            .ok_or_else(|| StoreError::NotFound(format!("auction {}", next.auction_id)))?;
        if current.version != expected_version {
            return Err(StoreError::VersionConflict {
                auction_id: next.auction_id,
                expected: expected_version,
            });
        }
        *current = next;
        Ok(())
    }

    async fn list_overdue_sessions(
        &self,
        now: PrimitiveDateTime,
    ) -> Result<Vec<AuctionSession>, StoreError> {
        let state = self.state.lock().await;
        let mut overdue: Vec<_> = state
            .sessions
            .values()
            .filter(|s| s.accepts_claims() && s.deadline <= now)
            .cloned()
            .collect();
        overdue.sort_by_key(|s| s.deadline);
        Ok(overdue)
    }

    async fn list_stalled_awards(
        &self,
        awarded_before: PrimitiveDateTime,
    ) -> Result<Vec<AuctionSession>, StoreError> {
        let state = self.state.lock().await;
        let mut stalled: Vec<_> = state
            .sessions
            .values()
            .filter(|s| {
                s.state == AuctionState::Awarded
                    && s.awarded_at.is_some_and(|at| at <= awarded_before)
            })
            .cloned()
            .collect();
        stalled.sort_by_key(|s| s.awarded_at);
        Ok(stalled)
    }

    async fn record_claim(&self, claim: NewClaim) -> Result<Claim, StoreError> {
        let mut state = self.state.lock().await;
        if claim.decision.is_winning()
            && state.claims.iter().any(|c| {
                c.auction_id == claim.auction_id && c.round == claim.round && c.decision.is_winning()
            })
        {
            return Err(StoreError::Duplicate(format!(
                "winning claim for auction {} round {}",
                claim.auction_id, claim.round
            )));
        }
        let claim = claim.into_claim(state.claims.len() as i64 + 1);
        state.claims.push(claim.clone());
        Ok(claim)
    }

    async fn list_claims(&self, auction_id: Uuid) -> Result<Vec<Claim>, StoreError> {
        Ok(self
            .state
            .lock()
            .await
            .claims
            .iter()
            .filter(|c| c.auction_id == auction_id)
            .cloned()
            .collect())
    }

    async fn append_audit_event(&self, event: NewAuditEvent) -> Result<AuditEvent, StoreError> {
        let mut state = self.state.lock().await;
        let event = event.into_event(state.audit.len() as i64 + 1);
        state.audit.push(event.clone());
        Ok(event)
    }

    async fn list_audit_events(&self, auction_id: Uuid) -> Result<Vec<AuditEvent>, StoreError> {
        Ok(self
            .state
            .lock()
            .await
            .audit
            .iter()
            .filter(|e| e.auction_id == auction_id)
            .cloned()
            .collect())
    }

    async fn put_commission_record(
        &self,
        record: CommissionRecord,
    ) -> Result<PutOutcome<CommissionRecord>, StoreError> {
        let mut state = self.state.lock().await;
        if let Some(existing) = state
            .commissions
            .iter()
            .find(|r| {
                r.requirement_id == record.requirement_id
                    && r.candidate_id == record.candidate_id
                    && r.kind == record.kind
            })
        {
            return Ok(PutOutcome::Existing(existing.clone()));
        }
        state.commissions.push(record.clone());
        Ok(PutOutcome::Inserted(record))
    }

    async fn get_commission_record(
        &self,
        requirement_id: Uuid,
        candidate_id: &CandidateId,
        kind: CommissionKind,
    ) -> Result<Option<CommissionRecord>, StoreError> {
        Ok(self
            .state
            .lock()
            .await
            .commissions
            .iter()
            .find(|r| {
                r.requirement_id == requirement_id && &r.candidate_id == candidate_id && r.kind == kind
            })
            .cloned())
    }

    async fn list_commission_records(
        &self,
        requirement_id: Uuid,
    ) -> Result<Vec<CommissionRecord>, StoreError> {
        Ok(self
            .state
            .lock()
            .await
            .commissions
            .iter()
            .filter(|r| r.requirement_id == requirement_id)
            .cloned()
            .collect())
    }

    async fn list_closed_deals(
        &self,
        location: &str,
        limit: u32,
    ) -> Result<Vec<ClosedDeal>, StoreError> {
        let state = self.state.lock().await;
        let location = location.trim();
        let mut deals: Vec<ClosedDeal> = state
            .sessions
            .values()
            .filter(|s| s.state == AuctionState::Closed)
            .filter_map(|s| {
                let requirement = state.requirements.get(&s.requirement_id)?;
                if requirement.status != RequirementStatus::Closed
                    || !requirement.location.eq_ignore_ascii_case(location)
                {
                    return None;
                }
                let claim = state.claims.iter().find(|c| {
                    c.auction_id == s.auction_id && c.round == s.round && c.decision.is_winning()
                })?;
                Some(ClosedDeal {
                    auction_id: s.auction_id,
                    category: requirement.category.clone(),
                    basis: requirement.commission_basis(),
                    winner: s.winner.clone()?,
                    opened_at: s.opened_at,
                    claimed_at: claim.received_at,
                    closed_at: s.updated_at,
                })
            })
            .collect();
        deals.sort_by(|a, b| b.closed_at.cmp(&a.closed_at));
        deals.truncate(limit as usize);
        Ok(deals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::{Clock, SystemClock};

    fn session() -> AuctionSession {
        let now = SystemClock.now();
        AuctionSession::open(Uuid::now_v7(), now, time::Duration::minutes(30))
            .begin_broadcast(vec!["a".into(), "b".into()], now)
            .unwrap()
    }

    #[tokio::test]
    async fn test_conditional_update_rejects_stale_version() {
        let store = MemoryStore::new();
        let opened = session();
        store.insert_session(opened.clone()).await.unwrap();

        let now = SystemClock.now();
        let first = opened.award("a".into(), now).unwrap();
        let second = opened.award("b".into(), now).unwrap();
        store
            .conditional_update_session(opened.version, first)
            .await
            .unwrap();
        let err = store
            .conditional_update_session(opened.version, second)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::VersionConflict { .. }));

        let stored = store.get_session(opened.auction_id).await.unwrap().unwrap();
        assert_eq!(stored.winner, Some("a".into()));
    }

    #[tokio::test]
    async fn test_one_session_per_requirement() {
        let store = MemoryStore::new();
        let first = session();
        store.insert_session(first.clone()).await.unwrap();
        let mut again = session();
        again.requirement_id = first.requirement_id;
        assert!(matches!(
            store.insert_session(again).await,
            Err(StoreError::Duplicate(_))
        ));
    }

    #[tokio::test]
    async fn test_one_winning_claim_per_round() {
        use crate::entities::claim::{ClaimDecision, RejectionReason};
        let store = MemoryStore::new();
        let auction_id = Uuid::now_v7();
        let claim = |candidate: &str, round: i32, decision: ClaimDecision| NewClaim {
            auction_id,
            candidate_id: candidate.into(),
            round,
            decision,
            received_at: SystemClock.now(),
        };
        store.record_claim(claim("a", 1, ClaimDecision::Winning)).await.unwrap();
        store
            .record_claim(claim("b", 1, ClaimDecision::Rejected(RejectionReason::AlreadyAwarded)))
            .await
            .unwrap();
        assert!(matches!(
            store.record_claim(claim("b", 1, ClaimDecision::Winning)).await,
            Err(StoreError::Duplicate(_))
        ));
        // a re-broadcast round gets its own winner
        store.record_claim(claim("b", 2, ClaimDecision::Winning)).await.unwrap();
    }

    #[tokio::test]
    async fn test_requirement_status_transition_checks_current_status() {
        let store = MemoryStore::new();
        let requirement = Requirement {
            requirement_id: Uuid::now_v7(),
            location: "Marina".into(),
            category: "rental".into(),
            budget_min: None,
            budget_max: Some(rust_decimal::Decimal::from(100_000)),
            bedrooms: None,
            client_ref: None,
            status: RequirementStatus::Open,
            created_at: SystemClock.now(),
        };
        let id = requirement.requirement_id;
        store.put_requirement(requirement).await.unwrap();
        store
            .update_requirement_status(id, RequirementStatus::Withdrawn)
            .await
            .unwrap();
        let changed = store
            .transition_requirement_status(id, RequirementStatus::Open, RequirementStatus::Closed)
            .await
            .unwrap();
        assert!(!changed);
        let stored = store.get_requirement(id).await.unwrap().unwrap();
        assert_eq!(stored.status, RequirementStatus::Withdrawn);
    }

    #[tokio::test]
    async fn test_load_never_goes_negative() {
        let store = MemoryStore::new();
        let candidate = Candidate {
            candidate_id: "a".into(),
            name: "A".into(),
            service_areas: vec!["Marina".into()],
            categories: vec![],
            status: VerificationStatus::Verified,
            active_leads: 0,
            registered_at: SystemClock.now(),
        };
        store.upsert_candidate(candidate).await.unwrap();
        let id = CandidateId::from("a");
        store.update_candidate_load(&id, -1).await.unwrap();
        store.update_candidate_load(&id, 2).await.unwrap();
        store.update_candidate_load(&id, -1).await.unwrap();
        let c = store.get_candidate(&id).await.unwrap().unwrap();
        assert_eq!(c.active_leads, 1);
    }
}
