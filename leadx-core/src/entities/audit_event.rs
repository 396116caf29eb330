use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use leadx_sdk::objects::AuditEventResponse;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE", type_name = "audit_kind")]
pub enum AuditKind {
    AuctionOpened,
    BroadcastStarted,
    InvitationDelivered,
    DeliveryFailed,
    ClaimAccepted,
    ClaimRejected,
    VerificationPassed,
    VerificationFailed,
    Rebroadcast,
    CommissionRecorded,
    CommissionReversed,
    AuctionClosed,
    AuctionExpired,
    CancellationRequested,
    AuctionCancelled,
}

impl AuditKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditKind::AuctionOpened => "AUCTION_OPENED",
            AuditKind::BroadcastStarted => "BROADCAST_STARTED",
            AuditKind::InvitationDelivered => "INVITATION_DELIVERED",
            AuditKind::DeliveryFailed => "DELIVERY_FAILED",
            AuditKind::ClaimAccepted => "CLAIM_ACCEPTED",
            AuditKind::ClaimRejected => "CLAIM_REJECTED",
            AuditKind::VerificationPassed => "VERIFICATION_PASSED",
            AuditKind::VerificationFailed => "VERIFICATION_FAILED",
            AuditKind::Rebroadcast => "REBROADCAST",
            AuditKind::CommissionRecorded => "COMMISSION_RECORDED",
            AuditKind::CommissionReversed => "COMMISSION_REVERSED",
            AuditKind::AuctionClosed => "AUCTION_CLOSED",
            AuditKind::AuctionExpired => "AUCTION_EXPIRED",
            AuditKind::CancellationRequested => "CANCELLATION_REQUESTED",
            AuditKind::AuctionCancelled => "AUCTION_CANCELLED",
        }
    }
}

impl std::fmt::Display for AuditKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuditEvent {
    pub sequence: i64,
    pub auction_id: Uuid,
    pub kind: AuditKind,
    pub detail: serde_json::Value,
    pub recorded_at: time::PrimitiveDateTime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewAuditEvent {
    pub auction_id: Uuid,
    pub kind: AuditKind,
    pub detail: serde_json::Value,
    pub recorded_at: time::PrimitiveDateTime,
}

impl NewAuditEvent {
    pub fn into_event(self, sequence: i64) -> AuditEvent {
        AuditEvent {
            sequence,
            auction_id: self.auction_id,
            kind: self.kind,
            detail: self.detail,
            recorded_at: self.recorded_at,
        }
    }
}

impl AuditEvent {
    pub fn to_response(&self) -> AuditEventResponse {
        AuditEventResponse {
            sequence: self.sequence,
            auction_id: self.auction_id,
            kind: self.kind.as_str().to_owned(),
            detail: self.detail.clone(),
            recorded_at: self.recorded_at.assume_utc().unix_timestamp(),
        }
    }
}

// ---------------------------------------------------------------------------
// SQL
// ---------------------------------------------------------------------------

#[derive(sqlx::FromRow)]
struct AuditEventRow {
    sequence: i64,
    auction_id: Uuid,
    kind: AuditKind,
    detail: serde_json::Value,
    recorded_at: time::PrimitiveDateTime,
}

#[derive(Debug, Clone)]
pub struct AppendAuditEvent {
    pub event: NewAuditEvent,
}

impl Processor<AppendAuditEvent> for DatabaseProcessor {
    type Output = AuditEvent;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:AppendAuditEvent")]
    async fn process(&self, append: AppendAuditEvent) -> Result<AuditEvent, sqlx::Error> {
        let sequence: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO audit_events (auction_id, kind, detail, recorded_at)
            VALUES ($1, $2, $3, $4)
            RETURNING sequence
            "#,
        )
        .bind(append.event.auction_id)
        .bind(append.event.kind)
        .bind(&append.event.detail)
        .bind(append.event.recorded_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(append.event.into_event(sequence))
    }
}

#[derive(Debug, Clone)]
pub struct ListAuditEvents {
    pub auction_id: Uuid,
}

impl Processor<ListAuditEvents> for DatabaseProcessor {
    type Output = Vec<AuditEvent>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListAuditEvents")]
    async fn process(&self, query: ListAuditEvents) -> Result<Vec<AuditEvent>, sqlx::Error> {
        let rows = sqlx::query_as::<_, AuditEventRow>(
            r#"
            SELECT sequence, auction_id, kind, detail, recorded_at
            FROM audit_events
            WHERE auction_id = $1
            ORDER BY sequence
            "#,
        )
        .bind(query.auction_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|row| AuditEvent {
                sequence: row.sequence,
                auction_id: row.auction_id,
                kind: row.kind,
                detail: row.detail,
                recorded_at: row.recorded_at,
            })
            .collect())
    }
}
