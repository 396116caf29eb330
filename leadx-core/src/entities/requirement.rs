use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use leadx_sdk::objects::{
    RequirementIntake, RequirementResponse, RequirementStatus as SdkRequirementStatus,
};
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

/// A client's structured property need. Drives exactly one auction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub requirement_id: Uuid,
    /// Service area the property must be in (e.g. "Marina").
    pub location: String,
    /// Property category (e.g. "apartment"). Keys the commission rate table.
    pub category: String,
    /// At least one of the two bounds is set.
    pub budget_min: Option<Decimal>,
    pub budget_max: Option<Decimal>,
    pub bedrooms: Option<i16>,
    pub client_ref: Option<String>,
    pub status: RequirementStatus,
    pub created_at: time::PrimitiveDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "lowercase", type_name = "requirement_status")]
pub enum RequirementStatus {
    Open,
    Closed,
    Withdrawn,
    Expired,
}

impl From<RequirementStatus> for SdkRequirementStatus {
    fn from(value: RequirementStatus) -> Self {
        match value {
            RequirementStatus::Open => SdkRequirementStatus::Open,
            RequirementStatus::Closed => SdkRequirementStatus::Closed,
            RequirementStatus::Withdrawn => SdkRequirementStatus::Withdrawn,
            RequirementStatus::Expired => SdkRequirementStatus::Expired,
        }
    }
}

/// Structural problems with an intake payload.
///
/// Only completeness is checked; the natural-language side is trusted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequirementError {
    #[error("location is missing")]
    MissingLocation,
    #[error("category is missing")]
    MissingCategory,
    #[error("budget_min or budget_max is required")]
    MissingBudget,
    #[error("budget must not be negative")]
    NegativeBudget,
    #[error("budget_min {min} exceeds budget_max {max}")]
    InvertedBudget { min: Decimal, max: Decimal },
    #[error("bedrooms must not be negative")]
    NegativeBedrooms,
}

impl Requirement {
    /// Build an `OPEN` requirement from an intake payload.
    pub fn from_intake(
        intake: RequirementIntake,
        now: time::PrimitiveDateTime,
    ) -> Result<Self, RequirementError> {
        let requirement = Self {
            requirement_id: intake.requirement_id.unwrap_or_else(Uuid::now_v7),
            location: intake.location.trim().to_owned(),
            category: intake.category.trim().to_lowercase(),
            budget_min: intake.budget_min,
            budget_max: intake.budget_max,
            bedrooms: intake.bedrooms,
            client_ref: intake.client_ref,
            status: RequirementStatus::Open,
            created_at: now,
        };
        requirement.validate()?;
        Ok(requirement)
    }

    pub fn validate(&self) -> Result<(), RequirementError> {
        if self.location.trim().is_empty() {
            return Err(RequirementError::MissingLocation);
        }
        if self.category.trim().is_empty() {
            return Err(RequirementError::MissingCategory);
        }
        if self.budget_min.is_none() && self.budget_max.is_none() {
            return Err(RequirementError::MissingBudget);
        }
        if [self.budget_min, self.budget_max]
            .into_iter()
            .flatten()
            .any(|b| b < Decimal::ZERO)
        {
            return Err(RequirementError::NegativeBudget);
        }
        if let (Some(min), Some(max)) = (self.budget_min, self.budget_max) {
            if min > max {
                return Err(RequirementError::InvertedBudget { min, max });
            }
        }
        if self.bedrooms.is_some_and(|b| b < 0) {
            return Err(RequirementError::NegativeBedrooms);
        }
        Ok(())
    }

    /// Amount commission is computed on: the budget ceiling, or the floor
    /// when the client gave no ceiling.
    pub fn commission_basis(&self) -> Decimal {
        self.budget_max
            .or(self.budget_min)
            .unwrap_or(Decimal::ZERO)
    }

    pub fn is_withdrawn(&self) -> bool {
        self.status == RequirementStatus::Withdrawn
    }

    pub fn to_response(&self) -> RequirementResponse {
        RequirementResponse {
            requirement_id: self.requirement_id,
            location: self.location.clone(),
            category: self.category.clone(),
            budget_min: self.budget_min,
            budget_max: self.budget_max,
            bedrooms: self.bedrooms,
            status: self.status.into(),
            created_at: self.created_at.assume_utc().unix_timestamp(),
        }
    }
}

// ---------------------------------------------------------------------------
// SQL
// ---------------------------------------------------------------------------

#[derive(sqlx::FromRow)]
struct RequirementRow {
    requirement_id: Uuid,
    location: String,
    category: String,
    budget_min: Option<Decimal>,
    budget_max: Option<Decimal>,
    bedrooms: Option<i16>,
    client_ref: Option<String>,
    status: RequirementStatus,
    created_at: time::PrimitiveDateTime,
}

impl From<RequirementRow> for Requirement {
    fn from(row: RequirementRow) -> Self {
        Self {
            requirement_id: row.requirement_id,
            location: row.location,
            category: row.category,
            budget_min: row.budget_min,
            budget_max: row.budget_max,
            bedrooms: row.bedrooms,
            client_ref: row.client_ref,
            status: row.status,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone)]
/// Insert a requirement. Returns `false` when the id already exists.
pub struct InsertRequirement {
    pub requirement: Requirement,
}

impl Processor<InsertRequirement> for DatabaseProcessor {
    type Output = bool;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:InsertRequirement")]
    async fn process(&self, insert: InsertRequirement) -> Result<bool, sqlx::Error> {
        let r = insert.requirement;
        let result = sqlx::query(
            r#"
            INSERT INTO requirements
                (requirement_id, location, category, budget_min, budget_max, bedrooms, client_ref, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (requirement_id) DO NOTHING
            "#,
        )
        .bind(r.requirement_id)
        .bind(r.location)
        .bind(r.category)
        .bind(r.budget_min)
        .bind(r.budget_max)
        .bind(r.bedrooms)
        .bind(r.client_ref)
        .bind(r.status)
        .bind(r.created_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

#[derive(Debug, Clone)]
pub struct GetRequirementById {
    pub requirement_id: Uuid,
}

impl Processor<GetRequirementById> for DatabaseProcessor {
    type Output = Option<Requirement>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetRequirementById")]
    async fn process(&self, query: GetRequirementById) -> Result<Option<Requirement>, sqlx::Error> {
        let row = sqlx::query_as::<_, RequirementRow>(
            r#"
            SELECT requirement_id, location, category, budget_min, budget_max,
                   bedrooms, client_ref, status, created_at
            FROM requirements
            WHERE requirement_id = $1
            "#,
        )
        .bind(query.requirement_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Requirement::from))
    }
}

#[derive(Debug, Clone)]
pub struct UpdateRequirementStatus {
    pub requirement_id: Uuid,
    pub status: RequirementStatus,
}

impl Processor<UpdateRequirementStatus> for DatabaseProcessor {
    type Output = ();
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:UpdateRequirementStatus")]
    async fn process(&self, update: UpdateRequirementStatus) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE requirements SET status = $2 WHERE requirement_id = $1")
            .bind(update.requirement_id)
            .bind(update.status)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// Move a requirement from `expected` to `status`. Returns `false` when the
/// requirement was no longer in `expected`.
#[derive(Debug, Clone)]
pub struct TransitionRequirementStatus {
    pub requirement_id: Uuid,
    pub expected: RequirementStatus,
    pub status: RequirementStatus,
}

impl Processor<TransitionRequirementStatus> for DatabaseProcessor {
    type Output = bool;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:TransitionRequirementStatus")]
    async fn process(&self, update: TransitionRequirementStatus) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE requirements SET status = $3 WHERE requirement_id = $1 AND status = $2",
        )
        .bind(update.requirement_id)
        .bind(update.expected)
        .bind(update.status)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::{Clock, SystemClock};

    fn intake() -> RequirementIntake {
        RequirementIntake {
            requirement_id: None,
            location: "  Marina ".into(),
            category: "Apartment".into(),
            budget_min: Some(Decimal::from(400_000)),
            budget_max: Some(Decimal::from(500_000)),
            bedrooms: Some(1),
            client_ref: None,
        }
    }

    #[test]
    fn test_intake_is_normalised() {
        let r = Requirement::from_intake(intake(), SystemClock.now()).unwrap();
        assert_eq!(r.location, "Marina");
        assert_eq!(r.category, "apartment");
        assert_eq!(r.status, RequirementStatus::Open);
    }

    #[test]
    fn test_intake_keeps_supplied_id() {
        let id = Uuid::now_v7();
        let mut payload = intake();
        payload.requirement_id = Some(id);
        let r = Requirement::from_intake(payload, SystemClock.now()).unwrap();
        assert_eq!(r.requirement_id, id);
    }

    #[test]
    fn test_incomplete_intake_is_rejected() {
        let mut payload = intake();
        payload.location = " ".into();
        assert_eq!(
            Requirement::from_intake(payload, SystemClock.now()),
            Err(RequirementError::MissingLocation)
        );

        let mut payload = intake();
        payload.category = String::new();
        assert_eq!(
            Requirement::from_intake(payload, SystemClock.now()),
            Err(RequirementError::MissingCategory)
        );

        let mut payload = intake();
        payload.budget_min = None;
        payload.budget_max = None;
        assert_eq!(
            Requirement::from_intake(payload, SystemClock.now()),
            Err(RequirementError::MissingBudget)
        );

        let mut payload = intake();
        payload.budget_max = Some(Decimal::from(-1));
        payload.budget_min = None;
        assert_eq!(
            Requirement::from_intake(payload, SystemClock.now()),
            Err(RequirementError::NegativeBudget)
        );

        let mut payload = intake();
        payload.budget_min = Some(Decimal::from(600_000));
        assert!(matches!(
            Requirement::from_intake(payload, SystemClock.now()),
            Err(RequirementError::InvertedBudget { .. })
        ));
    }

    #[test]
    fn test_either_budget_bound_is_enough() {
        let mut floor_only = intake();
        floor_only.budget_max = None;
        let r = Requirement::from_intake(floor_only, SystemClock.now()).unwrap();
        assert_eq!(r.commission_basis(), Decimal::from(400_000));

        let mut ceiling_only = intake();
        ceiling_only.budget_min = None;
        let r = Requirement::from_intake(ceiling_only, SystemClock.now()).unwrap();
        assert_eq!(r.commission_basis(), Decimal::from(500_000));

        let mut free = intake();
        free.budget_min = None;
        free.budget_max = Some(Decimal::ZERO);
        assert!(Requirement::from_intake(free, SystemClock.now()).is_ok());
    }

    #[test]
    fn test_floor_only_intake_deserializes() {
        let json = r#"{"location":"Marina","category":"rental","budget_min":"90000"}"#;
        let payload: RequirementIntake = serde_json::from_str(json).unwrap();
        assert_eq!(payload.budget_max, None);
        let r = Requirement::from_intake(payload, SystemClock.now()).unwrap();
        assert_eq!(r.commission_basis(), Decimal::from(90_000));
    }
}
