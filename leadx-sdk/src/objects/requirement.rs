use crate::signature::Signature;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A completed client requirement handed over by the intake collaborator.
///
/// Sent to the service API to open an auction. `requirement_id` lets the
/// intake side retry delivery safely; when absent the server assigns one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementIntake {
    #[serde(default)]
    pub requirement_id: Option<Uuid>,
    pub location: String,
    pub category: String,
    /// At least one budget bound must be present.
    #[serde(default)]
    pub budget_min: Option<Decimal>,
    #[serde(default)]
    pub budget_max: Option<Decimal>,
    #[serde(default)]
    pub bedrooms: Option<i16>,
    #[serde(default)]
    pub client_ref: Option<String>,
}

impl Signature for RequirementIntake {}

/// Request payload withdrawing a requirement (client changed their mind).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawRequirement {
    pub requirement_id: Uuid,
}

impl Signature for WithdrawRequirement {}

/// Requirement status for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequirementStatus {
    Open,
    Closed,
    Withdrawn,
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequirementResponse {
    pub requirement_id: Uuid,
    pub location: String,
    pub category: String,
    pub budget_min: Option<Decimal>,
    pub budget_max: Option<Decimal>,
    pub bedrooms: Option<i16>,
    pub status: RequirementStatus,
    pub created_at: i64,
}
