use crate::signature::Signature;
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Auction session state for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuctionState {
    Open,
    Broadcast,
    Awarded,
    Closed,
    Expired,
    Cancelled,
}

impl std::fmt::Display for AuctionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuctionState::Open => write!(f, "open"),
            AuctionState::Broadcast => write!(f, "broadcast"),
            AuctionState::Awarded => write!(f, "awarded"),
            AuctionState::Closed => write!(f, "closed"),
            AuctionState::Expired => write!(f, "expired"),
            AuctionState::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryReason {
    NoEligibleCandidate,
    SlaTimeout,
    VerificationExhausted,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
    Withdrawn,
    Admin,
}

/// Terminal result of an auction, surfaced to the intake collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AuctionOutcome {
    Awarded { winner: CompactString },
    Expired { reason: ExpiryReason },
    Cancelled { reason: CancelReason },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuctionResponse {
    pub auction_id: Uuid,
    pub requirement_id: Uuid,
    pub state: AuctionState,
    pub round: i32,
    pub invited: Vec<CompactString>,
    pub excluded: Vec<CompactString>,
    pub winner: Option<CompactString>,
    pub outcome: Option<AuctionOutcome>,
    pub opened_at: i64,
    pub deadline: i64,
}

/// Webhook payload sent when an auction reaches a terminal state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionOutcomePayload {
    pub event_type: String,
    pub auction_id: Uuid,
    pub requirement_id: Uuid,
    pub outcome: AuctionOutcome,
    pub timestamp: i64,
}

impl Signature for AuctionOutcomePayload {}
