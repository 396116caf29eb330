use sqlx::PgPool;

/// Executes the SQL query structs defined next to each entity.
///
/// Every query is a plain struct implementing
/// `kanau::processor::Processor<Query> for DatabaseProcessor`, so call sites
/// read as `processor.process(GetAuctionSession { auction_id }).await`.
#[derive(Clone)]
pub struct DatabaseProcessor {
    pub pool: PgPool,
}

impl DatabaseProcessor {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}
