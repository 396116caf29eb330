//! Invitation pushed to the transport adapter for one candidate.

use crate::signature::Signature;
use compact_str::CompactString;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The adapter renders this into a message for the candidate. Client contact
/// details are never part of an invitation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionInvitation {
    pub event_type: String,
    pub auction_id: Uuid,
    pub candidate_id: CompactString,
    pub round: i32,
    pub location: String,
    pub category: String,
    pub budget_min: Option<Decimal>,
    pub budget_max: Option<Decimal>,
    pub bedrooms: Option<i16>,
    /// Unix timestamp after which claims are no longer accepted.
    pub deadline: i64,
}

impl Signature for AuctionInvitation {}
