use super::CandidateId;
use crate::framework::DatabaseProcessor;
use compact_str::CompactString;
use kanau::processor::Processor;
use rust_decimal::Decimal;
use time::PrimitiveDateTime;
use uuid::Uuid;

/// A closed auction whose deal still stands, with its winning claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosedDeal {
    pub auction_id: Uuid,
    pub category: String,
    /// Commission basis of the requirement.
    pub basis: Decimal,
    pub winner: CandidateId,
    pub opened_at: PrimitiveDateTime,
    pub claimed_at: PrimitiveDateTime,
    pub closed_at: PrimitiveDateTime,
}

impl ClosedDeal {
    /// Time from opening the auction to the winning claim.
    pub fn response_time(&self) -> time::Duration {
        self.claimed_at - self.opened_at
    }
}

#[derive(sqlx::FromRow)]
struct ClosedDealRow {
    auction_id: Uuid,
    category: String,
    basis: Decimal,
    winner: Option<String>,
    opened_at: PrimitiveDateTime,
    claimed_at: PrimitiveDateTime,
    closed_at: PrimitiveDateTime,
}

/// Most recently closed deals in `location` (case-insensitive), newest
/// first. Deals cancelled after close are left out.
#[derive(Debug, Clone)]
pub struct ListClosedDeals {
    pub location: String,
    pub limit: u32,
}

impl Processor<ListClosedDeals> for DatabaseProcessor {
    type Output = Vec<ClosedDeal>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListClosedDeals")]
    async fn process(&self, query: ListClosedDeals) -> Result<Vec<ClosedDeal>, sqlx::Error> {
        let rows = sqlx::query_as::<_, ClosedDealRow>(
            r#"
            SELECT s.auction_id, r.category,
                   COALESCE(r.budget_max, r.budget_min, 0) AS basis,
                   s.winner, s.opened_at, c.received_at AS claimed_at, s.updated_at AS closed_at
            FROM auction_sessions s
            JOIN requirements r ON r.requirement_id = s.requirement_id
            JOIN claims c
              ON c.auction_id = s.auction_id AND c.round = s.round AND c.decision = 'winning'
            WHERE s.state = 'closed'
              AND r.status = 'closed'
              AND lower(r.location) = lower($1)
            ORDER BY s.updated_at DESC
            LIMIT $2
            "#,
        )
        .bind(query.location.trim())
        .bind(i64::from(query.limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| {
                Some(ClosedDeal {
                    auction_id: row.auction_id,
                    category: row.category,
                    basis: row.basis,
                    winner: CandidateId(CompactString::from(row.winner?)),
                    opened_at: row.opened_at,
                    claimed_at: row.claimed_at,
                    closed_at: row.closed_at,
                })
            })
            .collect())
    }
}
