//! Event type definitions.
//!
//! Events carry identifiers; processors re-read the session from the store
//! and drop events that no longer match its state.

use crate::entities::CandidateId;
use leadx_sdk::objects::AuctionOutcome;
use uuid::Uuid;

/// Emitted when a session enters `BROADCAST` (first round or re-broadcast).
///
/// Consumed by the notification fanout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastRequested {
    pub auction_id: Uuid,
    /// Round the invitations belong to. Stale rounds are skipped.
    pub round: i32,
    /// Candidates to invite in this round, in rank order.
    pub candidates: Vec<CandidateId>,
}

/// Emitted once per auction when it reaches a terminal outcome, and again
/// when a closed auction is cancelled afterwards.
///
/// Consumed by the outcome reporter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuctionSettled {
    pub auction_id: Uuid,
    pub requirement_id: Uuid,
    pub outcome: AuctionOutcome,
}
