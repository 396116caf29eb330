//! Candidate directory: registration, status changes and lookups.

use crate::entities::CandidateId;
use crate::entities::candidate::{Candidate, VerificationStatus};
use crate::store::{AuctionStore, StoreError};
use crate::utils::Clock;
use leadx_sdk::objects::RegisterCandidate;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct CandidateDirectory {
    store: Arc<dyn AuctionStore>,
    clock: Arc<dyn Clock>,
}

impl CandidateDirectory {
    pub fn new(store: Arc<dyn AuctionStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Register a candidate, or replace the profile of an existing one.
    pub async fn register(&self, request: RegisterCandidate) -> Result<Candidate, StoreError> {
        let candidate = Candidate::from_registration(request, self.clock.now());
        let stored = self.store.upsert_candidate(candidate).await?;
        info!(
            candidate = %stored.candidate_id,
            status = ?stored.status,
            areas = ?stored.service_areas,
            "Candidate registered"
        );
        Ok(stored)
    }

    /// Change verification status. Takes effect for the next selection and
    /// for any award not yet verified.
    pub async fn set_status(
        &self,
        candidate_id: &CandidateId,
        status: VerificationStatus,
    ) -> Result<Candidate, StoreError> {
        let updated = self.store.update_candidate_status(candidate_id, status).await?;
        info!(candidate = %candidate_id, status = ?status, "Candidate status changed");
        Ok(updated)
    }

    pub async fn get(&self, candidate_id: &CandidateId) -> Result<Option<Candidate>, StoreError> {
        self.store.get_candidate(candidate_id).await
    }

    /// Directory snapshot for selection.
    pub async fn snapshot(&self) -> Result<Vec<Candidate>, StoreError> {
        self.store.list_candidates().await
    }
}
