//! JSON wire types exchanged with the leadx server.
//!
//! These are the API/DTO versions of the engine's records. Timestamps are
//! unix seconds. For the storage-side types see `leadx-core::entities`.

pub mod admin;
pub mod auction;
pub mod candidate;
pub mod claim;
pub mod invitation;
pub mod requirement;

pub use admin::{
    AdminCommand, AuditEventResponse, CommissionResponse, MarketReportQuery, MarketReportResponse,
    clamp_market_window,
};
pub use auction::{
    AuctionOutcome, AuctionOutcomePayload, AuctionResponse, AuctionState, CancelReason, ExpiryReason,
};
pub use candidate::{
    CandidateResponse, RegisterCandidate, UpdateCandidateStatus, VerificationStatus,
};
pub use claim::{
    ClaimDecision, ClaimRecordResponse, ClaimResponse, ClaimSubmission, RejectionReason,
};
pub use invitation::AuctionInvitation;
pub use requirement::{
    RequirementIntake, RequirementResponse, RequirementStatus, WithdrawRequirement,
};
