//! Engine processors.
//!
//! - `AuctionCoordinator`: owns every session transition. Emits
//!   `BroadcastRequested` and `AuctionSettled`
//! - `ResponseArbiter`: decides claims, called inline by the coordinator
//! - `VerificationGate`: re-checks the winner before close
//! - `CommissionLedger`: entitlements and reversals
//! - `MarketReport`: per-location summary of recently closed deals
//! - `NotificationFanout`: receives `BroadcastRequested`, delivers invitations
//! - `OutcomeReporter`: receives `AuctionSettled`, delivers outcome webhooks
//! - `ExpirySweeper`: expires overdue sessions, re-drives stalled awards

pub mod arbiter;
pub mod audit;
pub mod coordinator;
pub mod directory;
pub mod fanout;
pub mod ledger;
pub mod market;
pub mod outcome_reporter;
pub mod selector;
pub mod sweeper;
pub mod verification;

pub use arbiter::{ClaimVerdict, ResponseArbiter, evaluate_claim};
pub use audit::AuditTrail;
pub use coordinator::{AuctionCoordinator, ClaimOutcome, EngineError};
pub use directory::CandidateDirectory;
pub use fanout::{DeliveryReport, NotificationFanout};
pub use ledger::{CommissionLedger, Entitlement, compute_entitlement};
pub use market::MarketReport;
pub use outcome_reporter::{OutcomeReporter, ReportError};
pub use selector::select_candidates;
pub use sweeper::{ExpirySweeper, SweepReport};
pub use verification::{VerificationGate, VerificationOutcome};
