//! Admin API client (operator tooling -> leadx server).
//!
//! All requests carry the plaintext admin secret in the
//! `Leadx-Admin-Authorization` header.

use compact_str::CompactString;
use reqwest::Client;
use url::Url;
use uuid::Uuid;

use super::{ClientError, parse_response};
use crate::objects::{
    AdminCommand, AuctionResponse, AuditEventResponse, CandidateResponse, ClaimRecordResponse,
    CommissionResponse, MarketReportQuery, MarketReportResponse, RegisterCandidate,
    UpdateCandidateStatus,
};
use crate::signature::ADMIN_AUTH_HEADER;

/// Typed HTTP client for the leadx **Admin API**.
#[derive(Debug, Clone)]
pub struct AdminClient {
    http: Client,
    base_url: Url,
    admin_secret: String,
}

impl AdminClient {
    pub fn new(base_url: Url, admin_secret: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url,
            admin_secret: admin_secret.into(),
        }
    }

    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    /// `POST /api/v1/admin/commands` – run an administrative command.
    pub async fn execute(&self, command: AdminCommand) -> Result<AuctionResponse, ClientError> {
        self.post("/api/v1/admin/commands", &command).await
    }

    /// `POST /api/v1/admin/candidates` – register a candidate.
    pub async fn register_candidate(
        &self,
        request: &RegisterCandidate,
    ) -> Result<CandidateResponse, ClientError> {
        self.post("/api/v1/admin/candidates", request).await
    }

    /// `GET /api/v1/admin/candidates` – list the candidate directory.
    pub async fn list_candidates(&self) -> Result<Vec<CandidateResponse>, ClientError> {
        self.get("/api/v1/admin/candidates").await
    }

    /// `POST /api/v1/admin/candidates/{candidate_id}/status`
    pub async fn update_candidate_status(
        &self,
        candidate_id: &CompactString,
        request: &UpdateCandidateStatus,
    ) -> Result<CandidateResponse, ClientError> {
        let path = format!("/api/v1/admin/candidates/{candidate_id}/status");
        self.post(&path, request).await
    }

    /// `GET /api/v1/admin/auctions/{auction_id}`
    pub async fn get_auction(&self, auction_id: Uuid) -> Result<AuctionResponse, ClientError> {
        self.get(&format!("/api/v1/admin/auctions/{auction_id}"))
            .await
    }

    /// `GET /api/v1/admin/auctions/{auction_id}/claims`
    pub async fn list_claims(
        &self,
        auction_id: Uuid,
    ) -> Result<Vec<ClaimRecordResponse>, ClientError> {
        self.get(&format!("/api/v1/admin/auctions/{auction_id}/claims"))
            .await
    }

    /// `GET /api/v1/admin/auctions/{auction_id}/audit` – full audit trail.
    pub async fn audit_trail(
        &self,
        auction_id: Uuid,
    ) -> Result<Vec<AuditEventResponse>, ClientError> {
        self.get(&format!("/api/v1/admin/auctions/{auction_id}/audit"))
            .await
    }

    /// `GET /api/v1/admin/requirements/{requirement_id}/commissions`
    pub async fn commissions(
        &self,
        requirement_id: Uuid,
    ) -> Result<Vec<CommissionResponse>, ClientError> {
        self.get(&format!(
            "/api/v1/admin/requirements/{requirement_id}/commissions"
        ))
        .await
    }

    /// `GET /api/v1/admin/market` – closed-deal activity for one location.
    pub async fn market_report(
        &self,
        query: &MarketReportQuery,
    ) -> Result<MarketReportResponse, ClientError> {
        let url = self.base_url.join("/api/v1/admin/market")?;
        let resp = self
            .http
            .get(url)
            .query(query)
            .header(ADMIN_AUTH_HEADER, &self.admin_secret)
            .send()
            .await?;
        parse_response(resp).await
    }

    async fn get<R: serde::de::DeserializeOwned>(&self, path: &str) -> Result<R, ClientError> {
        let url = self.base_url.join(path)?;
        let resp = self
            .http
            .get(url)
            .header(ADMIN_AUTH_HEADER, &self.admin_secret)
            .send()
            .await?;
        parse_response(resp).await
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> Result<R, ClientError>
    where
        B: serde::Serialize + ?Sized,
        R: serde::de::DeserializeOwned,
    {
        let url = self.base_url.join(path)?;
        let resp = self
            .http
            .post(url)
            .header(ADMIN_AUTH_HEADER, &self.admin_secret)
            .json(body)
            .send()
            .await?;
        parse_response(resp).await
    }
}
