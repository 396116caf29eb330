use super::CandidateId;
use crate::framework::DatabaseProcessor;
use compact_str::CompactString;
use kanau::processor::Processor;
use leadx_sdk::objects::{
    CandidateResponse, RegisterCandidate, VerificationStatus as SdkVerificationStatus,
};
use sqlx::types::Json;

/// A registered intermediary that can be invited to auctions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub candidate_id: CandidateId,
    pub name: String,
    pub service_areas: Vec<String>,
    /// Categories served. Empty means every category.
    pub categories: Vec<String>,
    pub status: VerificationStatus,
    /// Auctions currently held by this candidate (awarded or closed and not
    /// yet reversed). Used as the primary ranking key.
    pub active_leads: i32,
    pub registered_at: time::PrimitiveDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "lowercase", type_name = "verification_status")]
pub enum VerificationStatus {
    Pending,
    Verified,
    Suspended,
}

impl From<VerificationStatus> for SdkVerificationStatus {
    fn from(value: VerificationStatus) -> Self {
        match value {
            VerificationStatus::Pending => SdkVerificationStatus::Pending,
            VerificationStatus::Verified => SdkVerificationStatus::Verified,
            VerificationStatus::Suspended => SdkVerificationStatus::Suspended,
        }
    }
}

impl From<SdkVerificationStatus> for VerificationStatus {
    fn from(value: SdkVerificationStatus) -> Self {
        match value {
            SdkVerificationStatus::Pending => VerificationStatus::Pending,
            SdkVerificationStatus::Verified => VerificationStatus::Verified,
            SdkVerificationStatus::Suspended => VerificationStatus::Suspended,
        }
    }
}

impl Candidate {
    pub fn from_registration(request: RegisterCandidate, now: time::PrimitiveDateTime) -> Self {
        Self {
            candidate_id: request.candidate_id.into(),
            name: request.name,
            service_areas: request
                .service_areas
                .into_iter()
                .map(|a| a.trim().to_owned())
                .filter(|a| !a.is_empty())
                .collect(),
            categories: request
                .categories
                .into_iter()
                .map(|c| c.trim().to_lowercase())
                .filter(|c| !c.is_empty())
                .collect(),
            status: request
                .status
                .map(VerificationStatus::from)
                .unwrap_or(VerificationStatus::Pending),
            active_leads: 0,
            registered_at: now,
        }
    }

    pub fn is_verified(&self) -> bool {
        self.status == VerificationStatus::Verified
    }

    /// Case-insensitive match against the candidate's service areas.
    pub fn serves_area(&self, location: &str) -> bool {
        let location = location.trim();
        self.service_areas
            .iter()
            .any(|area| area.eq_ignore_ascii_case(location))
    }

    pub fn serves_category(&self, category: &str) -> bool {
        let category = category.trim();
        self.categories.is_empty()
            || self
                .categories
                .iter()
                .any(|c| c.eq_ignore_ascii_case(category))
    }

    pub fn to_response(&self) -> CandidateResponse {
        CandidateResponse {
            candidate_id: self.candidate_id.0.clone(),
            name: self.name.clone(),
            service_areas: self.service_areas.clone(),
            categories: self.categories.clone(),
            status: self.status.into(),
            active_leads: self.active_leads,
            registered_at: self.registered_at.assume_utc().unix_timestamp(),
        }
    }
}

// ---------------------------------------------------------------------------
// SQL
// ---------------------------------------------------------------------------

#[derive(sqlx::FromRow)]
struct CandidateRow {
    candidate_id: String,
    name: String,
    service_areas: Json<Vec<String>>,
    categories: Json<Vec<String>>,
    status: VerificationStatus,
    active_leads: i32,
    registered_at: time::PrimitiveDateTime,
}

impl From<CandidateRow> for Candidate {
    fn from(row: CandidateRow) -> Self {
        Self {
            candidate_id: CandidateId(CompactString::from(row.candidate_id)),
            name: row.name,
            service_areas: row.service_areas.0,
            categories: row.categories.0,
            status: row.status,
            active_leads: row.active_leads,
            registered_at: row.registered_at,
        }
    }
}

const CANDIDATE_COLUMNS: &str =
    "candidate_id, name, service_areas, categories, status, active_leads, registered_at";

/// Insert or re-register a candidate.
///
/// Re-registration replaces the profile and status but keeps the load
/// counter and the original registration time.
#[derive(Debug, Clone)]
pub struct UpsertCandidate {
    pub candidate: Candidate,
}

impl Processor<UpsertCandidate> for DatabaseProcessor {
    type Output = Candidate;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:UpsertCandidate")]
    async fn process(&self, upsert: UpsertCandidate) -> Result<Candidate, sqlx::Error> {
        let c = upsert.candidate;
        let sql = format!(
            r#"
            INSERT INTO candidates ({CANDIDATE_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, 0, $6)
            ON CONFLICT (candidate_id) DO UPDATE
            SET name = EXCLUDED.name,
                service_areas = EXCLUDED.service_areas,
                categories = EXCLUDED.categories,
                status = EXCLUDED.status
            RETURNING {CANDIDATE_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, CandidateRow>(&sql)
            .bind(c.candidate_id.as_str())
            .bind(c.name)
            .bind(Json(c.service_areas))
            .bind(Json(c.categories))
            .bind(c.status)
            .bind(c.registered_at)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.into())
    }
}

#[derive(Debug, Clone)]
pub struct GetCandidateById {
    pub candidate_id: CandidateId,
}

impl Processor<GetCandidateById> for DatabaseProcessor {
    type Output = Option<Candidate>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetCandidateById")]
    async fn process(&self, query: GetCandidateById) -> Result<Option<Candidate>, sqlx::Error> {
        let sql = format!("SELECT {CANDIDATE_COLUMNS} FROM candidates WHERE candidate_id = $1");
        let row = sqlx::query_as::<_, CandidateRow>(&sql)
            .bind(query.candidate_id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Candidate::from))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ListCandidates;

impl Processor<ListCandidates> for DatabaseProcessor {
    type Output = Vec<Candidate>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListCandidates")]
    async fn process(&self, _: ListCandidates) -> Result<Vec<Candidate>, sqlx::Error> {
        let sql = format!("SELECT {CANDIDATE_COLUMNS} FROM candidates ORDER BY candidate_id");
        let rows = sqlx::query_as::<_, CandidateRow>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Candidate::from).collect())
    }
}

#[derive(Debug, Clone)]
pub struct UpdateCandidateStatus {
    pub candidate_id: CandidateId,
    pub status: VerificationStatus,
}

impl Processor<UpdateCandidateStatus> for DatabaseProcessor {
    type Output = Option<Candidate>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:UpdateCandidateStatus")]
    async fn process(&self, update: UpdateCandidateStatus) -> Result<Option<Candidate>, sqlx::Error> {
        let sql = format!(
            "UPDATE candidates SET status = $2 WHERE candidate_id = $1 RETURNING {CANDIDATE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, CandidateRow>(&sql)
            .bind(update.candidate_id.as_str())
            .bind(update.status)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Candidate::from))
    }
}

/// Adjust a candidate's active lead counter. Never drops below zero.
#[derive(Debug, Clone)]
pub struct AdjustCandidateLoad {
    pub candidate_id: CandidateId,
    pub delta: i32,
}

impl Processor<AdjustCandidateLoad> for DatabaseProcessor {
    type Output = ();
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:AdjustCandidateLoad")]
    async fn process(&self, adjust: AdjustCandidateLoad) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE candidates SET active_leads = GREATEST(active_leads + $2, 0) WHERE candidate_id = $1",
        )
        .bind(adjust.candidate_id.as_str())
        .bind(adjust.delta)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::{Clock, SystemClock};

    fn registration() -> RegisterCandidate {
        RegisterCandidate {
            candidate_id: "971500000001".into(),
            name: "Ahmed".into(),
            service_areas: vec!["Marina".into(), " JLT ".into(), "".into()],
            categories: vec!["Apartment".into()],
            status: None,
        }
    }

    #[test]
    fn test_registration_defaults_to_pending() {
        let c = Candidate::from_registration(registration(), SystemClock.now());
        assert_eq!(c.status, VerificationStatus::Pending);
        assert_eq!(c.active_leads, 0);
        assert_eq!(c.service_areas, vec!["Marina".to_owned(), "JLT".to_owned()]);
        assert_eq!(c.categories, vec!["apartment".to_owned()]);
    }

    #[test]
    fn test_area_and_category_matching_ignores_case() {
        let c = Candidate::from_registration(registration(), SystemClock.now());
        assert!(c.serves_area("marina"));
        assert!(c.serves_area("jlt"));
        assert!(!c.serves_area("Downtown"));
        assert!(c.serves_category("APARTMENT"));
        assert!(!c.serves_category("villa"));
    }

    #[test]
    fn test_empty_categories_serve_everything() {
        let mut request = registration();
        request.categories.clear();
        let c = Candidate::from_registration(request, SystemClock.now());
        assert!(c.serves_category("villa"));
        assert!(c.serves_category("office"));
    }
}
