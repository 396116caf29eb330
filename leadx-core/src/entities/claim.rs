use super::CandidateId;
use crate::framework::DatabaseProcessor;
use compact_str::CompactString;
use kanau::processor::Processor;
use leadx_sdk::objects::{
    ClaimDecision as SdkClaimDecision, ClaimRecordResponse, RejectionReason as SdkRejectionReason,
};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "snake_case", type_name = "rejection_reason")]
pub enum RejectionReason {
    AlreadyAwarded,
    NotInvited,
    Duplicate,
    AuctionClosed,
    AuctionNotFound,
}

impl From<RejectionReason> for SdkRejectionReason {
    fn from(value: RejectionReason) -> Self {
        match value {
            RejectionReason::AlreadyAwarded => SdkRejectionReason::AlreadyAwarded,
            RejectionReason::NotInvited => SdkRejectionReason::NotInvited,
            RejectionReason::Duplicate => SdkRejectionReason::Duplicate,
            RejectionReason::AuctionClosed => SdkRejectionReason::AuctionClosed,
            RejectionReason::AuctionNotFound => SdkRejectionReason::AuctionNotFound,
        }
    }
}

impl std::fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", SdkRejectionReason::from(*self))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClaimDecision {
    Winning,
    Rejected(RejectionReason),
}

impl ClaimDecision {
    pub fn is_winning(self) -> bool {
        matches!(self, ClaimDecision::Winning)
    }

    fn into_columns(self) -> (DecisionKind, Option<RejectionReason>) {
        match self {
            ClaimDecision::Winning => (DecisionKind::Winning, None),
            ClaimDecision::Rejected(reason) => (DecisionKind::Rejected, Some(reason)),
        }
    }
}

impl From<ClaimDecision> for SdkClaimDecision {
    fn from(value: ClaimDecision) -> Self {
        match value {
            ClaimDecision::Winning => SdkClaimDecision::Winning,
            ClaimDecision::Rejected(reason) => SdkClaimDecision::Rejected {
                reason: reason.into(),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(rename_all = "lowercase", type_name = "claim_decision")]
enum DecisionKind {
    Winning,
    Rejected,
}

/// A recorded claim. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claim {
    /// Store-assigned, strictly increasing.
    pub claim_id: i64,
    pub auction_id: Uuid,
    pub candidate_id: CandidateId,
    pub round: i32,
    pub decision: ClaimDecision,
    pub received_at: time::PrimitiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewClaim {
    pub auction_id: Uuid,
    pub candidate_id: CandidateId,
    pub round: i32,
    pub decision: ClaimDecision,
    pub received_at: time::PrimitiveDateTime,
}

impl NewClaim {
    pub fn into_claim(self, claim_id: i64) -> Claim {
        Claim {
            claim_id,
            auction_id: self.auction_id,
            candidate_id: self.candidate_id,
            round: self.round,
            decision: self.decision,
            received_at: self.received_at,
        }
    }
}

impl Claim {
    pub fn to_response(&self) -> ClaimRecordResponse {
        ClaimRecordResponse {
            claim_id: self.claim_id,
            auction_id: self.auction_id,
            candidate_id: self.candidate_id.0.clone(),
            round: self.round,
            decision: self.decision.into(),
            received_at: self.received_at.assume_utc().unix_timestamp(),
        }
    }
}

// ---------------------------------------------------------------------------
// SQL
// ---------------------------------------------------------------------------

#[derive(sqlx::FromRow)]
struct ClaimRow {
    claim_id: i64,
    auction_id: Uuid,
    candidate_id: String,
    round: i32,
    decision: DecisionKind,
    rejection_reason: Option<RejectionReason>,
    received_at: time::PrimitiveDateTime,
}

impl TryFrom<ClaimRow> for Claim {
    type Error = sqlx::Error;

    fn try_from(row: ClaimRow) -> Result<Self, Self::Error> {
        let decision = match (row.decision, row.rejection_reason) {
            (DecisionKind::Winning, None) => ClaimDecision::Winning,
            (DecisionKind::Rejected, Some(reason)) => ClaimDecision::Rejected(reason),
            _ => {
                return Err(sqlx::Error::Decode(
                    format!("claim {} has inconsistent decision columns", row.claim_id).into(),
                ));
            }
        };
        Ok(Claim {
            claim_id: row.claim_id,
            auction_id: row.auction_id,
            candidate_id: CandidateId(CompactString::from(row.candidate_id)),
            round: row.round,
            decision,
            received_at: row.received_at,
        })
    }
}

#[derive(Debug, Clone)]
pub struct InsertClaim {
    pub claim: NewClaim,
}

impl Processor<InsertClaim> for DatabaseProcessor {
    type Output = Claim;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:InsertClaim")]
    async fn process(&self, insert: InsertClaim) -> Result<Claim, sqlx::Error> {
        let (decision, reason) = insert.claim.decision.into_columns();
        let claim_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO claims (auction_id, candidate_id, round, decision, rejection_reason, received_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING claim_id
            "#,
        )
        .bind(insert.claim.auction_id)
        .bind(insert.claim.candidate_id.as_str())
        .bind(insert.claim.round)
        .bind(decision)
        .bind(reason)
        .bind(insert.claim.received_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(insert.claim.into_claim(claim_id))
    }
}

#[derive(Debug, Clone)]
pub struct ListClaimsByAuction {
    pub auction_id: Uuid,
}

impl Processor<ListClaimsByAuction> for DatabaseProcessor {
    type Output = Vec<Claim>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListClaimsByAuction")]
    async fn process(&self, query: ListClaimsByAuction) -> Result<Vec<Claim>, sqlx::Error> {
        let rows = sqlx::query_as::<_, ClaimRow>(
            r#"
            SELECT claim_id, auction_id, candidate_id, round, decision, rejection_reason, received_at
            FROM claims
            WHERE auction_id = $1
            ORDER BY claim_id
            "#,
        )
        .bind(query.auction_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Claim::try_from).collect()
    }
}
