use crate::objects::auction::AuctionState;
use crate::signature::Signature;
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A candidate's attempt to win an auction, relayed by the transport adapter.
///
/// Carries no client timestamp: ordering is decided by the engine's store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimSubmission {
    pub auction_id: Uuid,
    pub candidate_id: CompactString,
}

impl Signature for ClaimSubmission {}

/// Why a claim did not win.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    /// Another claim committed first.
    AlreadyAwarded,
    /// The candidate was never invited, or was excluded after failing verification.
    NotInvited,
    /// The same candidate already claimed in this broadcast round.
    Duplicate,
    /// The auction expired or was cancelled.
    AuctionClosed,
    AuctionNotFound,
}

impl std::fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectionReason::AlreadyAwarded => write!(f, "already_awarded"),
            RejectionReason::NotInvited => write!(f, "not_invited"),
            RejectionReason::Duplicate => write!(f, "duplicate"),
            RejectionReason::AuctionClosed => write!(f, "auction_closed"),
            RejectionReason::AuctionNotFound => write!(f, "auction_not_found"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum ClaimDecision {
    Winning,
    Rejected { reason: RejectionReason },
}

/// Response to a claim submission.
///
/// `auction_state` is the state observed after the engine finished handling
/// the claim; for the winner this is normally `closed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimResponse {
    pub claim_id: Option<i64>,
    pub auction_id: Uuid,
    pub candidate_id: CompactString,
    pub decision: ClaimDecision,
    pub auction_state: Option<AuctionState>,
    /// Seconds from the auction opening to the winning claim. Winners only.
    #[serde(default)]
    pub response_time_secs: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimRecordResponse {
    pub claim_id: i64,
    pub auction_id: Uuid,
    pub candidate_id: CompactString,
    pub round: i32,
    pub decision: ClaimDecision,
    pub received_at: i64,
}
