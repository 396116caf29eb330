pub mod audit_event;
pub mod auction_session;
pub mod candidate;
pub mod claim;
pub mod commission;
pub mod market;
pub mod requirement;

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

/// Identifier of a registered intermediary.
///
/// Assigned by the registration flow, typically the intermediary's phone
/// number. Opaque to the engine.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct CandidateId(pub CompactString);

impl CandidateId {
    pub fn new(id: impl Into<CompactString>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl std::fmt::Display for CandidateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for CandidateId {
    fn from(value: &str) -> Self {
        Self(value.into())
    }
}

impl From<String> for CandidateId {
    fn from(value: String) -> Self {
        Self(value.into())
    }
}

impl From<CompactString> for CandidateId {
    fn from(value: CompactString) -> Self {
        Self(value)
    }
}

impl From<CandidateId> for CompactString {
    fn from(value: CandidateId) -> Self {
        value.0
    }
}
