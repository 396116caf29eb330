//! Persistence seam for the engine.
//!
//! Everything the engine remembers goes through [`AuctionStore`]. Session
//! writes are compare-and-set on `version`; commission writes are
//! idempotent per `(requirement_id, candidate_id, kind)`. Two backends are provided:
//! [`MemoryStore`] for tests and single-process runs, and [`PgStore`].

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use crate::entities::CandidateId;
use crate::entities::audit_event::{AuditEvent, NewAuditEvent};
use crate::entities::auction_session::AuctionSession;
use crate::entities::candidate::{Candidate, VerificationStatus};
use crate::entities::claim::{Claim, NewClaim};
use crate::entities::commission::{CommissionKind, CommissionRecord};
use crate::entities::market::ClosedDeal;
use crate::entities::requirement::{Requirement, RequirementStatus};
use async_trait::async_trait;
use thiserror::Error;
use time::PrimitiveDateTime;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The stored session version no longer matches the expected one.
    #[error("version conflict on auction {auction_id} (expected {expected})")]
    VersionConflict { auction_id: Uuid, expected: i64 },
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0} already exists")]
    Duplicate(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("corrupt record: {0}")]
    Corruption(String),
}

/// Result of an idempotent insert.
#[derive(Debug, Clone, PartialEq)]
pub enum PutOutcome<T> {
    /// This call wrote the record.
    Inserted(T),
    /// A record with the same key was already there; it is returned as stored.
    Existing(T),
}

impl<T> PutOutcome<T> {
    pub fn into_inner(self) -> T {
        match self {
            PutOutcome::Inserted(v) | PutOutcome::Existing(v) => v,
        }
    }

    pub fn is_inserted(&self) -> bool {
        matches!(self, PutOutcome::Inserted(_))
    }
}

#[async_trait]
pub trait AuctionStore: Send + Sync {
    // requirements

    /// Returns `false` if a requirement with the same id already exists.
    async fn put_requirement(&self, requirement: Requirement) -> Result<bool, StoreError>;
    async fn get_requirement(&self, requirement_id: Uuid)
    -> Result<Option<Requirement>, StoreError>;
    async fn update_requirement_status(
        &self,
        requirement_id: Uuid,
        status: RequirementStatus,
    ) -> Result<(), StoreError>;
    /// Set `status` only if the requirement is currently `expected`.
    /// Returns whether it changed.
    async fn transition_requirement_status(
        &self,
        requirement_id: Uuid,
        expected: RequirementStatus,
        status: RequirementStatus,
    ) -> Result<bool, StoreError>;

    // candidates

    async fn upsert_candidate(&self, candidate: Candidate) -> Result<Candidate, StoreError>;
    async fn get_candidate(&self, candidate_id: &CandidateId)
    -> Result<Option<Candidate>, StoreError>;
    async fn list_candidates(&self) -> Result<Vec<Candidate>, StoreError>;
    async fn update_candidate_status(
        &self,
        candidate_id: &CandidateId,
        status: VerificationStatus,
    ) -> Result<Candidate, StoreError>;
    /// Atomically apply `delta` to the active-lead counter, clamped at zero.
    async fn update_candidate_load(
        &self,
        candidate_id: &CandidateId,
        delta: i32,
    ) -> Result<(), StoreError>;

    // sessions

    /// Fails with [`StoreError::Duplicate`] if the requirement already has a session.
    async fn insert_session(&self, session: AuctionSession) -> Result<(), StoreError>;
    async fn get_session(&self, auction_id: Uuid) -> Result<Option<AuctionSession>, StoreError>;
    async fn get_session_by_requirement(
        &self,
        requirement_id: Uuid,
    ) -> Result<Option<AuctionSession>, StoreError>;
    /// Replace the session only if its stored version is `expected_version`.
    async fn conditional_update_session(
        &self,
        expected_version: i64,
        next: AuctionSession,
    ) -> Result<(), StoreError>;
    async fn list_overdue_sessions(
        &self,
        now: PrimitiveDateTime,
    ) -> Result<Vec<AuctionSession>, StoreError>;
    async fn list_stalled_awards(
        &self,
        awarded_before: PrimitiveDateTime,
    ) -> Result<Vec<AuctionSession>, StoreError>;

    // claims

    /// Fails if the claim is winning and its round already has a winning claim.
    async fn record_claim(&self, claim: NewClaim) -> Result<Claim, StoreError>;
    async fn list_claims(&self, auction_id: Uuid) -> Result<Vec<Claim>, StoreError>;

    // audit

    async fn append_audit_event(&self, event: NewAuditEvent) -> Result<AuditEvent, StoreError>;
    async fn list_audit_events(&self, auction_id: Uuid) -> Result<Vec<AuditEvent>, StoreError>;

    // commission

    async fn put_commission_record(
        &self,
        record: CommissionRecord,
    ) -> Result<PutOutcome<CommissionRecord>, StoreError>;
    async fn get_commission_record(
        &self,
        requirement_id: Uuid,
        candidate_id: &CandidateId,
        kind: CommissionKind,
    ) -> Result<Option<CommissionRecord>, StoreError>;
    async fn list_commission_records(
        &self,
        requirement_id: Uuid,
    ) -> Result<Vec<CommissionRecord>, StoreError>;

    // reports

    async fn list_closed_deals(
        &self,
        location: &str,
        limit: u32,
    ) -> Result<Vec<ClosedDeal>, StoreError>;
}
