//! The versioned auction record.
//!
//! Every transition is a pure method returning the next session with
//! `version + 1`. Callers persist it with
//! [`AuctionStore::conditional_update_session`](crate::store::AuctionStore::conditional_update_session)
//! against the version they read, so two racing writers can never both
//! succeed.

use super::CandidateId;
use crate::framework::DatabaseProcessor;
use compact_str::CompactString;
use kanau::processor::Processor;
use leadx_sdk::objects::{
    AuctionOutcome, AuctionResponse, AuctionState as SdkAuctionState, CancelReason, ExpiryReason,
};
use sqlx::types::Json;
use thiserror::Error;
use time::PrimitiveDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "lowercase", type_name = "auction_state")]
pub enum AuctionState {
    Open,
    Broadcast,
    Awarded,
    Closed,
    Expired,
    Cancelled,
}

impl AuctionState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            AuctionState::Closed | AuctionState::Expired | AuctionState::Cancelled
        )
    }
}

impl From<AuctionState> for SdkAuctionState {
    fn from(value: AuctionState) -> Self {
        match value {
            AuctionState::Open => SdkAuctionState::Open,
            AuctionState::Broadcast => SdkAuctionState::Broadcast,
            AuctionState::Awarded => SdkAuctionState::Awarded,
            AuctionState::Closed => SdkAuctionState::Closed,
            AuctionState::Expired => SdkAuctionState::Expired,
            AuctionState::Cancelled => SdkAuctionState::Cancelled,
        }
    }
}

impl std::fmt::Display for AuctionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", SdkAuctionState::from(*self))
    }
}

/// Why a session reached `EXPIRED` or `CANCELLED`.
///
/// Also used for the pending-cancellation marker, where only `Withdrawn`
/// and `AdminCancelled` occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "snake_case", type_name = "terminal_reason")]
pub enum TerminalReason {
    NoEligibleCandidate,
    SlaTimeout,
    VerificationExhausted,
    AdminExpired,
    Withdrawn,
    AdminCancelled,
}

impl TerminalReason {
    pub fn outcome(self) -> AuctionOutcome {
        match self {
            TerminalReason::NoEligibleCandidate => AuctionOutcome::Expired {
                reason: ExpiryReason::NoEligibleCandidate,
            },
            TerminalReason::SlaTimeout => AuctionOutcome::Expired {
                reason: ExpiryReason::SlaTimeout,
            },
            TerminalReason::VerificationExhausted => AuctionOutcome::Expired {
                reason: ExpiryReason::VerificationExhausted,
            },
            TerminalReason::AdminExpired => AuctionOutcome::Expired {
                reason: ExpiryReason::Admin,
            },
            TerminalReason::Withdrawn => AuctionOutcome::Cancelled {
                reason: CancelReason::Withdrawn,
            },
            TerminalReason::AdminCancelled => AuctionOutcome::Cancelled {
                reason: CancelReason::Admin,
            },
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TerminalReason::NoEligibleCandidate => "no_eligible_candidate",
            TerminalReason::SlaTimeout => "sla_timeout",
            TerminalReason::VerificationExhausted => "verification_exhausted",
            TerminalReason::AdminExpired => "admin",
            TerminalReason::Withdrawn => "withdrawn",
            TerminalReason::AdminCancelled => "admin",
        }
    }

    fn is_cancellation(self) -> bool {
        matches!(
            self,
            TerminalReason::Withdrawn | TerminalReason::AdminCancelled
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid auction transition: {from} -> {to}")]
pub struct TransitionError {
    pub from: AuctionState,
    pub to: AuctionState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuctionSession {
    pub auction_id: Uuid,
    pub requirement_id: Uuid,
    pub state: AuctionState,
    /// Broadcast round, starting at 1 on the first broadcast. Bumped by
    /// every re-broadcast after a failed verification.
    pub round: i32,
    /// Invited candidates in rank order.
    pub invited: Vec<CandidateId>,
    /// Candidates that won and then failed verification.
    pub excluded: Vec<CandidateId>,
    /// Candidates holding an accepted claim in the current round.
    pub claimants: Vec<CandidateId>,
    pub winner: Option<CandidateId>,
    pub terminal_reason: Option<TerminalReason>,
    pub pending_cancel: Option<TerminalReason>,
    pub opened_at: PrimitiveDateTime,
    pub deadline: PrimitiveDateTime,
    pub awarded_at: Option<PrimitiveDateTime>,
    pub updated_at: PrimitiveDateTime,
    pub version: i64,
}

impl AuctionSession {
    pub fn open(requirement_id: Uuid, opened_at: PrimitiveDateTime, sla: time::Duration) -> Self {
        Self {
            auction_id: Uuid::now_v7(),
            requirement_id,
            state: AuctionState::Open,
            round: 0,
            invited: Vec::new(),
            excluded: Vec::new(),
            claimants: Vec::new(),
            winner: None,
            terminal_reason: None,
            pending_cancel: None,
            opened_at,
            deadline: opened_at + sla,
            awarded_at: None,
            updated_at: opened_at,
            version: 0,
        }
    }

    pub fn accepts_claims(&self) -> bool {
        matches!(self.state, AuctionState::Open | AuctionState::Broadcast)
    }

    pub fn is_invited(&self, candidate: &CandidateId) -> bool {
        self.invited.contains(candidate) && !self.excluded.contains(candidate)
    }

    /// Invited candidates that have not been excluded, in rank order.
    pub fn remaining_candidates(&self) -> Vec<CandidateId> {
        self.invited
            .iter()
            .filter(|c| !self.excluded.contains(c))
            .cloned()
            .collect()
    }

    /// Terminal outcome, if the session has one.
    pub fn outcome(&self) -> Option<AuctionOutcome> {
        match self.state {
            AuctionState::Closed => self.winner.as_ref().map(|w| AuctionOutcome::Awarded {
                winner: w.0.clone(),
            }),
            AuctionState::Expired | AuctionState::Cancelled => {
                self.terminal_reason.map(TerminalReason::outcome)
            }
            _ => None,
        }
    }

    fn next(&self, now: PrimitiveDateTime) -> Self {
        let mut next = self.clone();
        next.version = self.version + 1;
        next.updated_at = now;
        next
    }

    fn reject(&self, to: AuctionState) -> TransitionError {
        TransitionError {
            from: self.state,
            to,
        }
    }

    /// `OPEN -> BROADCAST` with the ranked candidate set.
    pub fn begin_broadcast(
        &self,
        invited: Vec<CandidateId>,
        now: PrimitiveDateTime,
    ) -> Result<Self, TransitionError> {
        if self.state != AuctionState::Open {
            return Err(self.reject(AuctionState::Broadcast));
        }
        let mut next = self.next(now);
        next.state = AuctionState::Broadcast;
        next.round = 1;
        next.invited = invited;
        Ok(next)
    }

    /// `BROADCAST -> AWARDED`. Only valid while no winner is set.
    pub fn award(
        &self,
        candidate: CandidateId,
        now: PrimitiveDateTime,
    ) -> Result<Self, TransitionError> {
        if self.state != AuctionState::Broadcast || self.winner.is_some() {
            return Err(self.reject(AuctionState::Awarded));
        }
        let mut next = self.next(now);
        next.state = AuctionState::Awarded;
        next.claimants.push(candidate.clone());
        next.winner = Some(candidate);
        next.awarded_at = Some(now);
        Ok(next)
    }

    /// `AWARDED -> CLOSED`.
    pub fn close(&self, now: PrimitiveDateTime) -> Result<Self, TransitionError> {
        if self.state != AuctionState::Awarded || self.winner.is_none() {
            return Err(self.reject(AuctionState::Closed));
        }
        let mut next = self.next(now);
        next.state = AuctionState::Closed;
        Ok(next)
    }

    /// The winner failed verification: exclude it and reopen the round, or
    /// expire when nobody is left to invite.
    ///
    /// `rebroadcast` says whether any eligible candidate remains.
    pub fn reject_winner(
        &self,
        rebroadcast: bool,
        now: PrimitiveDateTime,
    ) -> Result<Self, TransitionError> {
        let to = if rebroadcast {
            AuctionState::Broadcast
        } else {
            AuctionState::Expired
        };
        let Some(winner) = self.winner.clone() else {
            return Err(self.reject(to));
        };
        if self.state != AuctionState::Awarded {
            return Err(self.reject(to));
        }
        let mut next = self.next(now);
        if !next.excluded.contains(&winner) {
            next.excluded.push(winner);
        }
        next.winner = None;
        next.awarded_at = None;
        next.claimants.clear();
        next.state = to;
        if rebroadcast {
            next.round = self.round + 1;
        } else {
            next.terminal_reason = Some(TerminalReason::VerificationExhausted);
        }
        Ok(next)
    }

    /// `OPEN | BROADCAST -> EXPIRED`. An awarded session never expires.
    pub fn expire(
        &self,
        reason: TerminalReason,
        now: PrimitiveDateTime,
    ) -> Result<Self, TransitionError> {
        if !self.accepts_claims() || reason.is_cancellation() {
            return Err(self.reject(AuctionState::Expired));
        }
        let mut next = self.next(now);
        next.state = AuctionState::Expired;
        next.terminal_reason = Some(reason);
        Ok(next)
    }

    /// `OPEN | BROADCAST | AWARDED -> CANCELLED`.
    ///
    /// From `AWARDED` this is the close path honouring a pending
    /// cancellation; the winner field is kept for the record.
    pub fn cancel(
        &self,
        reason: TerminalReason,
        now: PrimitiveDateTime,
    ) -> Result<Self, TransitionError> {
        let allowed = matches!(
            self.state,
            AuctionState::Open | AuctionState::Broadcast | AuctionState::Awarded
        );
        if !allowed || !reason.is_cancellation() {
            return Err(self.reject(AuctionState::Cancelled));
        }
        let mut next = self.next(now);
        next.state = AuctionState::Cancelled;
        next.terminal_reason = Some(reason);
        next.pending_cancel = None;
        Ok(next)
    }

    /// Mark an `AWARDED` session so its close path turns into a cancellation.
    pub fn request_cancel(
        &self,
        reason: TerminalReason,
        now: PrimitiveDateTime,
    ) -> Result<Self, TransitionError> {
        if self.state != AuctionState::Awarded || !reason.is_cancellation() {
            return Err(self.reject(AuctionState::Cancelled));
        }
        let mut next = self.next(now);
        next.pending_cancel = Some(reason);
        Ok(next)
    }

    pub fn to_response(&self) -> AuctionResponse {
        AuctionResponse {
            auction_id: self.auction_id,
            requirement_id: self.requirement_id,
            state: self.state.into(),
            round: self.round,
            invited: self.invited.iter().map(|c| c.0.clone()).collect(),
            excluded: self.excluded.iter().map(|c| c.0.clone()).collect(),
            winner: self.winner.as_ref().map(|c| c.0.clone()),
            outcome: self.outcome(),
            opened_at: self.opened_at.assume_utc().unix_timestamp(),
            deadline: self.deadline.assume_utc().unix_timestamp(),
        }
    }
}

// ---------------------------------------------------------------------------
// SQL
// ---------------------------------------------------------------------------

#[derive(sqlx::FromRow)]
struct AuctionSessionRow {
    auction_id: Uuid,
    requirement_id: Uuid,
    state: AuctionState,
    round: i32,
    invited: Json<Vec<CandidateId>>,
    excluded: Json<Vec<CandidateId>>,
    claimants: Json<Vec<CandidateId>>,
    winner: Option<String>,
    terminal_reason: Option<TerminalReason>,
    pending_cancel: Option<TerminalReason>,
    opened_at: PrimitiveDateTime,
    deadline: PrimitiveDateTime,
    awarded_at: Option<PrimitiveDateTime>,
    updated_at: PrimitiveDateTime,
    version: i64,
}

impl From<AuctionSessionRow> for AuctionSession {
    fn from(row: AuctionSessionRow) -> Self {
        Self {
            auction_id: row.auction_id,
            requirement_id: row.requirement_id,
            state: row.state,
            round: row.round,
            invited: row.invited.0,
            excluded: row.excluded.0,
            claimants: row.claimants.0,
            winner: row.winner.map(|w| CandidateId(CompactString::from(w))),
            terminal_reason: row.terminal_reason,
            pending_cancel: row.pending_cancel,
            opened_at: row.opened_at,
            deadline: row.deadline,
            awarded_at: row.awarded_at,
            updated_at: row.updated_at,
            version: row.version,
        }
    }
}

const SESSION_COLUMNS: &str = "auction_id, requirement_id, state, round, invited, excluded, \
     claimants, winner, terminal_reason, pending_cancel, opened_at, deadline, awarded_at, \
     updated_at, version";

/// Insert a new session. Returns `false` if the requirement already has one.
#[derive(Debug, Clone)]
pub struct InsertAuctionSession {
    pub session: AuctionSession,
}

impl Processor<InsertAuctionSession> for DatabaseProcessor {
    type Output = bool;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:InsertAuctionSession")]
    async fn process(&self, insert: InsertAuctionSession) -> Result<bool, sqlx::Error> {
        let s = insert.session;
        let sql = format!(
            r#"
            INSERT INTO auction_sessions ({SESSION_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            ON CONFLICT DO NOTHING
            "#
        );
        let result = sqlx::query(&sql)
            .bind(s.auction_id)
            .bind(s.requirement_id)
            .bind(s.state)
            .bind(s.round)
            .bind(Json(s.invited))
            .bind(Json(s.excluded))
            .bind(Json(s.claimants))
            .bind(s.winner.map(|w| w.0.to_string()))
            .bind(s.terminal_reason)
            .bind(s.pending_cancel)
            .bind(s.opened_at)
            .bind(s.deadline)
            .bind(s.awarded_at)
            .bind(s.updated_at)
            .bind(s.version)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }
}

#[derive(Debug, Clone)]
pub struct GetAuctionSessionById {
    pub auction_id: Uuid,
}

impl Processor<GetAuctionSessionById> for DatabaseProcessor {
    type Output = Option<AuctionSession>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetAuctionSessionById")]
    async fn process(
        &self,
        query: GetAuctionSessionById,
    ) -> Result<Option<AuctionSession>, sqlx::Error> {
        let sql = format!("SELECT {SESSION_COLUMNS} FROM auction_sessions WHERE auction_id = $1");
        let row = sqlx::query_as::<_, AuctionSessionRow>(&sql)
            .bind(query.auction_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(AuctionSession::from))
    }
}

#[derive(Debug, Clone)]
pub struct GetAuctionSessionByRequirement {
    pub requirement_id: Uuid,
}

impl Processor<GetAuctionSessionByRequirement> for DatabaseProcessor {
    type Output = Option<AuctionSession>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetAuctionSessionByRequirement")]
    async fn process(
        &self,
        query: GetAuctionSessionByRequirement,
    ) -> Result<Option<AuctionSession>, sqlx::Error> {
        let sql =
            format!("SELECT {SESSION_COLUMNS} FROM auction_sessions WHERE requirement_id = $1");
        let row = sqlx::query_as::<_, AuctionSessionRow>(&sql)
            .bind(query.requirement_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(AuctionSession::from))
    }
}

/// Compare-and-set write of a session.
///
/// Succeeds only if the stored version still equals `expected_version`.
/// Returns whether a row was updated.
#[derive(Debug, Clone)]
pub struct ConditionalUpdateSession {
    pub expected_version: i64,
    pub next: AuctionSession,
}

impl Processor<ConditionalUpdateSession> for DatabaseProcessor {
    type Output = bool;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ConditionalUpdateSession")]
    async fn process(&self, update: ConditionalUpdateSession) -> Result<bool, sqlx::Error> {
        let s = update.next;
        let result = sqlx::query(
            r#"
            UPDATE auction_sessions
            SET state = $3,
                round = $4,
                invited = $5,
                excluded = $6,
                claimants = $7,
                winner = $8,
                terminal_reason = $9,
                pending_cancel = $10,
                awarded_at = $11,
                updated_at = $12,
                version = $13
            WHERE auction_id = $1 AND version = $2
            "#,
        )
        .bind(s.auction_id)
        .bind(update.expected_version)
        .bind(s.state)
        .bind(s.round)
        .bind(Json(s.invited))
        .bind(Json(s.excluded))
        .bind(Json(s.claimants))
        .bind(s.winner.map(|w| w.0.to_string()))
        .bind(s.terminal_reason)
        .bind(s.pending_cancel)
        .bind(s.awarded_at)
        .bind(s.updated_at)
        .bind(s.version)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

/// Sessions still accepting claims whose SLA deadline has passed.
#[derive(Debug, Clone, Copy)]
pub struct ListOverdueSessions {
    pub now: PrimitiveDateTime,
}

impl Processor<ListOverdueSessions> for DatabaseProcessor {
    type Output = Vec<AuctionSession>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListOverdueSessions")]
    async fn process(&self, query: ListOverdueSessions) -> Result<Vec<AuctionSession>, sqlx::Error> {
        let sql = format!(
            r#"
            SELECT {SESSION_COLUMNS} FROM auction_sessions
            WHERE state IN ('open', 'broadcast') AND deadline <= $1
            ORDER BY deadline
            "#
        );
        let rows = sqlx::query_as::<_, AuctionSessionRow>(&sql)
            .bind(query.now)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(AuctionSession::from).collect())
    }
}

/// Sessions stuck in `AWARDED` since before `awarded_before`.
#[derive(Debug, Clone, Copy)]
pub struct ListStalledAwards {
    pub awarded_before: PrimitiveDateTime,
}

impl Processor<ListStalledAwards> for DatabaseProcessor {
    type Output = Vec<AuctionSession>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListStalledAwards")]
    async fn process(&self, query: ListStalledAwards) -> Result<Vec<AuctionSession>, sqlx::Error> {
        let sql = format!(
            r#"
            SELECT {SESSION_COLUMNS} FROM auction_sessions
            WHERE state = 'awarded' AND awarded_at <= $1
            ORDER BY awarded_at
            "#
        );
        let rows = sqlx::query_as::<_, AuctionSessionRow>(&sql)
            .bind(query.awarded_before)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(AuctionSession::from).collect())
    }
}
