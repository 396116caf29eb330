use compact_str::CompactString;
use serde::{Deserialize, Serialize};

/// Candidate verification status for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationStatus {
    Pending,
    Verified,
    Suspended,
}

impl std::fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VerificationStatus::Pending => write!(f, "pending"),
            VerificationStatus::Verified => write!(f, "verified"),
            VerificationStatus::Suspended => write!(f, "suspended"),
        }
    }
}

/// Admin request registering (or re-registering) an intermediary.
///
/// New registrations start as `pending` unless `status` says otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterCandidate {
    pub candidate_id: CompactString,
    pub name: String,
    pub service_areas: Vec<String>,
    /// Categories served. Empty means every category.
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub status: Option<VerificationStatus>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateCandidateStatus {
    pub status: VerificationStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateResponse {
    pub candidate_id: CompactString,
    pub name: String,
    pub service_areas: Vec<String>,
    pub categories: Vec<String>,
    pub status: VerificationStatus,
    pub active_leads: i32,
    pub registered_at: i64,
}
