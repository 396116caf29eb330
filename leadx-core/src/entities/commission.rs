use super::CandidateId;
use crate::framework::DatabaseProcessor;
use compact_str::CompactString;
use kanau::processor::Processor;
use leadx_sdk::objects::CommissionResponse;
use rust_decimal::Decimal;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "lowercase", type_name = "commission_kind")]
pub enum CommissionKind {
    Entitlement,
    Reversal,
}

impl CommissionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CommissionKind::Entitlement => "entitlement",
            CommissionKind::Reversal => "reversal",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "lowercase", type_name = "settlement_status")]
pub enum SettlementStatus {
    Pending,
    Settled,
}

impl SettlementStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SettlementStatus::Pending => "pending",
            SettlementStatus::Settled => "settled",
        }
    }
}

/// Commission owed for a closed auction, or the reversal of one.
///
/// At most one record per `(requirement_id, candidate_id, kind)`. Records are
/// never updated; a cancelled deal, or a winner dropped after its entitlement
/// was written, gets a `Reversal` alongside the `Entitlement`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommissionRecord {
    pub requirement_id: Uuid,
    pub auction_id: Uuid,
    pub candidate_id: CandidateId,
    pub kind: CommissionKind,
    pub category: String,
    pub basis: Decimal,
    pub rate: Decimal,
    pub amount: Decimal,
    pub candidate_share: Decimal,
    pub platform_share: Decimal,
    pub settlement_status: SettlementStatus,
    pub created_at: time::PrimitiveDateTime,
}

impl CommissionRecord {
    /// The reversal offsetting this entitlement.
    pub fn reversal(&self, now: time::PrimitiveDateTime) -> Self {
        Self {
            kind: CommissionKind::Reversal,
            amount: -self.amount,
            candidate_share: -self.candidate_share,
            platform_share: -self.platform_share,
            settlement_status: SettlementStatus::Pending,
            created_at: now,
            ..self.clone()
        }
    }

    pub fn to_response(&self) -> CommissionResponse {
        CommissionResponse {
            requirement_id: self.requirement_id,
            auction_id: self.auction_id,
            candidate_id: self.candidate_id.0.clone(),
            kind: self.kind.as_str().to_owned(),
            category: self.category.clone(),
            basis: self.basis,
            rate: self.rate,
            amount: self.amount,
            candidate_share: self.candidate_share,
            platform_share: self.platform_share,
            settlement_status: self.settlement_status.as_str().to_owned(),
            created_at: self.created_at.assume_utc().unix_timestamp(),
        }
    }
}

// ---------------------------------------------------------------------------
// SQL
// ---------------------------------------------------------------------------

#[derive(sqlx::FromRow)]
struct CommissionRow {
    requirement_id: Uuid,
    auction_id: Uuid,
    candidate_id: String,
    kind: CommissionKind,
    category: String,
    basis: Decimal,
    rate: Decimal,
    amount: Decimal,
    candidate_share: Decimal,
    platform_share: Decimal,
    settlement_status: SettlementStatus,
    created_at: time::PrimitiveDateTime,
}

impl From<CommissionRow> for CommissionRecord {
    fn from(row: CommissionRow) -> Self {
        Self {
            requirement_id: row.requirement_id,
            auction_id: row.auction_id,
            candidate_id: CandidateId(CompactString::from(row.candidate_id)),
            kind: row.kind,
            category: row.category,
            basis: row.basis,
            rate: row.rate,
            amount: row.amount,
            candidate_share: row.candidate_share,
            platform_share: row.platform_share,
            settlement_status: row.settlement_status,
            created_at: row.created_at,
        }
    }
}

const COMMISSION_COLUMNS: &str = "requirement_id, auction_id, candidate_id, kind, category, \
     basis, rate, amount, candidate_share, platform_share, settlement_status, created_at";

/// Insert a record unless one with the same
/// `(requirement_id, candidate_id, kind)` exists.
///
/// Returns `true` when this call wrote the row.
#[derive(Debug, Clone)]
pub struct InsertCommissionRecord {
    pub record: CommissionRecord,
}

impl Processor<InsertCommissionRecord> for DatabaseProcessor {
    type Output = bool;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:InsertCommissionRecord")]
    async fn process(&self, insert: InsertCommissionRecord) -> Result<bool, sqlx::Error> {
        let r = insert.record;
        let sql = format!(
            r#"
            INSERT INTO commission_records ({COMMISSION_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (requirement_id, candidate_id, kind) DO NOTHING
            "#
        );
        let result = sqlx::query(&sql)
            .bind(r.requirement_id)
            .bind(r.auction_id)
            .bind(r.candidate_id.as_str())
            .bind(r.kind)
            .bind(r.category)
            .bind(r.basis)
            .bind(r.rate)
            .bind(r.amount)
            .bind(r.candidate_share)
            .bind(r.platform_share)
            .bind(r.settlement_status)
            .bind(r.created_at)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }
}

#[derive(Debug, Clone)]
pub struct GetCommissionRecord {
    pub requirement_id: Uuid,
    pub candidate_id: CandidateId,
    pub kind: CommissionKind,
}

impl Processor<GetCommissionRecord> for DatabaseProcessor {
    type Output = Option<CommissionRecord>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetCommissionRecord")]
    async fn process(
        &self,
        query: GetCommissionRecord,
    ) -> Result<Option<CommissionRecord>, sqlx::Error> {
        let sql = format!(
            "SELECT {COMMISSION_COLUMNS} FROM commission_records \
             WHERE requirement_id = $1 AND candidate_id = $2 AND kind = $3"
        );
        let row = sqlx::query_as::<_, CommissionRow>(&sql)
            .bind(query.requirement_id)
            .bind(query.candidate_id.as_str())
            .bind(query.kind)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(CommissionRecord::from))
    }
}

#[derive(Debug, Clone)]
pub struct ListCommissionRecords {
    pub requirement_id: Uuid,
}

impl Processor<ListCommissionRecords> for DatabaseProcessor {
    type Output = Vec<CommissionRecord>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListCommissionRecords")]
    async fn process(
        &self,
        query: ListCommissionRecords,
    ) -> Result<Vec<CommissionRecord>, sqlx::Error> {
        let sql = format!(
            "SELECT {COMMISSION_COLUMNS} FROM commission_records WHERE requirement_id = $1 ORDER BY created_at, kind"
        );
        let rows = sqlx::query_as::<_, CommissionRow>(&sql)
            .bind(query.requirement_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(CommissionRecord::from).collect())
    }
}
