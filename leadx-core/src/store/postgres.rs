use super::{AuctionStore, PutOutcome, StoreError};
use crate::entities::CandidateId;
use crate::entities::audit_event::{AppendAuditEvent, AuditEvent, ListAuditEvents, NewAuditEvent};
use crate::entities::auction_session::{
    AuctionSession, ConditionalUpdateSession, GetAuctionSessionById,
    GetAuctionSessionByRequirement, InsertAuctionSession, ListOverdueSessions, ListStalledAwards,
};
use crate::entities::candidate::{
    AdjustCandidateLoad, Candidate, GetCandidateById, ListCandidates, UpdateCandidateStatus,
    UpsertCandidate, VerificationStatus,
};
use crate::entities::claim::{Claim, InsertClaim, ListClaimsByAuction, NewClaim};
use crate::entities::commission::{
    CommissionKind, CommissionRecord, GetCommissionRecord, InsertCommissionRecord,
    ListCommissionRecords,
};
use crate::entities::market::{ClosedDeal, ListClosedDeals};
use crate::entities::requirement::{
    GetRequirementById, InsertRequirement, Requirement, RequirementStatus,
    TransitionRequirementStatus, UpdateRequirementStatus,
};
use crate::framework::DatabaseProcessor;
use async_trait::async_trait;
use kanau::processor::Processor;
use time::PrimitiveDateTime;
use uuid::Uuid;

/// PostgreSQL-backed store. Each method is one query struct run through
/// [`DatabaseProcessor`].
#[derive(Clone)]
pub struct PgStore {
    db: DatabaseProcessor,
}

impl PgStore {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self {
            db: DatabaseProcessor::new(pool),
        }
    }
}

#[async_trait]
impl AuctionStore for PgStore {
    async fn put_requirement(&self, requirement: Requirement) -> Result<bool, StoreError> {
        Ok(self.db.process(InsertRequirement { requirement }).await?)
    }

    async fn get_requirement(
        &self,
        requirement_id: Uuid,
    ) -> Result<Option<Requirement>, StoreError> {
        Ok(self.db.process(GetRequirementById { requirement_id }).await?)
    }

    async fn update_requirement_status(
        &self,
        requirement_id: Uuid,
        status: RequirementStatus,
    ) -> Result<(), StoreError> {
        self.db
            .process(UpdateRequirementStatus {
                requirement_id,
                status,
            })
            .await?;
        Ok(())
    }

    async fn transition_requirement_status(
        &self,
        requirement_id: Uuid,
        expected: RequirementStatus,
        status: RequirementStatus,
    ) -> Result<bool, StoreError> {
        Ok(self
            .db
            .process(TransitionRequirementStatus {
                requirement_id,
                expected,
                status,
            })
            .await?)
    }

    async fn upsert_candidate(&self, candidate: Candidate) -> Result<Candidate, StoreError> {
        Ok(self.db.process(UpsertCandidate { candidate }).await?)
    }

    async fn get_candidate(
        &self,
        candidate_id: &CandidateId,
    ) -> Result<Option<Candidate>, StoreError> {
        Ok(self
            .db
            .process(GetCandidateById {
                candidate_id: candidate_id.clone(),
            })
            .await?)
    }

    async fn list_candidates(&self) -> Result<Vec<Candidate>, StoreError> {
        Ok(self.db.process(ListCandidates).await?)
    }

    async fn update_candidate_status(
        &self,
        candidate_id: &CandidateId,
        status: VerificationStatus,
    ) -> Result<Candidate, StoreError> {
        self.db
            .process(UpdateCandidateStatus {
                candidate_id: candidate_id.clone(),
                status,
            })
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("candidate {candidate_id}")))
    }

    async fn update_candidate_load(
        &self,
        candidate_id: &CandidateId,
        delta: i32,
    ) -> Result<(), StoreError> {
        self.db
            .process(AdjustCandidateLoad {
                candidate_id: candidate_id.clone(),
                delta,
            })
            .await?;
        Ok(())
    }

    async fn insert_session(&self, session: AuctionSession) -> Result<(), StoreError> {
        let requirement_id = session.requirement_id;
        if self.db.process(InsertAuctionSession { session }).await? {
            Ok(())
        } else {
            Err(StoreError::Duplicate(format!(
                "auction for requirement {requirement_id}"
            )))
        }
    }

    async fn get_session(&self, auction_id: Uuid) -> Result<Option<AuctionSession>, StoreError> {
        Ok(self.db.process(GetAuctionSessionById { auction_id }).await?)
    }

    async fn get_session_by_requirement(
        &self,
        requirement_id: Uuid,
    ) -> Result<Option<AuctionSession>, StoreError> {
        Ok(self
            .db
            .process(GetAuctionSessionByRequirement { requirement_id })
            .await?)
    }

    async fn conditional_update_session(
        &self,
        expected_version: i64,
        next: AuctionSession,
    ) -> Result<(), StoreError> {
        let auction_id = next.auction_id;
        let updated = self
            .db
            .process(ConditionalUpdateSession {
                expected_version,
                next,
            })
            .await?;
        if updated {
            return Ok(());
        }
        match self.db.process(GetAuctionSessionById { auction_id }).await? {
            Some(_) => Err(StoreError::VersionConflict {
                auction_id,
                expected: expected_version,
            }),
            None => Err(StoreError::NotFound(format!("auction {auction_id}"))),
        }
    }

    async fn list_overdue_sessions(
        &self,
        now: PrimitiveDateTime,
    ) -> Result<Vec<AuctionSession>, StoreError> {
        Ok(self.db.process(ListOverdueSessions { now }).await?)
    }

    async fn list_stalled_awards(
        &self,
        awarded_before: PrimitiveDateTime,
    ) -> Result<Vec<AuctionSession>, StoreError> {
        Ok(self.db.process(ListStalledAwards { awarded_before }).await?)
    }

    async fn record_claim(&self, claim: NewClaim) -> Result<Claim, StoreError> {
        Ok(self.db.process(InsertClaim { claim }).await?)
    }

    async fn list_claims(&self, auction_id: Uuid) -> Result<Vec<Claim>, StoreError> {
        Ok(self.db.process(ListClaimsByAuction { auction_id }).await?)
    }

    async fn append_audit_event(&self, event: NewAuditEvent) -> Result<AuditEvent, StoreError> {
        Ok(self.db.process(AppendAuditEvent { event }).await?)
    }

    async fn list_audit_events(&self, auction_id: Uuid) -> Result<Vec<AuditEvent>, StoreError> {
        Ok(self.db.process(ListAuditEvents { auction_id }).await?)
    }

    async fn put_commission_record(
        &self,
        record: CommissionRecord,
    ) -> Result<PutOutcome<CommissionRecord>, StoreError> {
        let requirement_id = record.requirement_id;
        let candidate_id = record.candidate_id.clone();
        let kind = record.kind;
        if self
            .db
            .process(InsertCommissionRecord {
                record: record.clone(),
            })
            .await?
        {
            return Ok(PutOutcome::Inserted(record));
        }
        let existing = self
            .db
            .process(GetCommissionRecord {
                requirement_id,
                candidate_id,
                kind,
            })
            .await?
            .ok_or_else(|| {
                StoreError::Corruption(format!(
                    "{} for requirement {requirement_id} conflicted but cannot be read",
                    kind.as_str()
                ))
            })?;
        Ok(PutOutcome::Existing(existing))
    }

    async fn get_commission_record(
        &self,
        requirement_id: Uuid,
        candidate_id: &CandidateId,
        kind: CommissionKind,
    ) -> Result<Option<CommissionRecord>, StoreError> {
        Ok(self
            .db
            .process(GetCommissionRecord {
                requirement_id,
                candidate_id: candidate_id.clone(),
                kind,
            })
            .await?)
    }

    async fn list_commission_records(
        &self,
        requirement_id: Uuid,
    ) -> Result<Vec<CommissionRecord>, StoreError> {
        Ok(self
            .db
            .process(ListCommissionRecords { requirement_id })
            .await?)
    }

    async fn list_closed_deals(
        &self,
        location: &str,
        limit: u32,
    ) -> Result<Vec<ClosedDeal>, StoreError> {
        Ok(self
            .db
            .process(ListClosedDeals {
                location: location.to_owned(),
                limit,
            })
            .await?)
    }
}
