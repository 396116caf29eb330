//! Service API client (intake and transport adapters -> leadx server).
//!
//! Every request body is signed with
//! `HMAC-SHA256("{timestamp}.{json}", service_secret)`.

use reqwest::Client;
use url::Url;

use super::{ClientError, parse_response};
use crate::objects::{
    AuctionResponse, ClaimResponse, ClaimSubmission, RequirementIntake, WithdrawRequirement,
};
use crate::signature::{SIGNATURE_HEADER, Signature, SignedObject};

/// Typed HTTP client for the leadx **Service API**.
#[derive(Debug, Clone)]
pub struct ServiceClient {
    http: Client,
    base_url: Url,
    secret: Vec<u8>,
}

impl ServiceClient {
    /// * `base_url` – root URL of the leadx server.
    /// * `service_secret` – the shared HMAC secret for body signing.
    pub fn new(base_url: Url, service_secret: impl Into<Vec<u8>>) -> Self {
        Self {
            http: Client::new(),
            base_url,
            secret: service_secret.into(),
        }
    }

    /// Replace the default `reqwest::Client` (timeouts, proxy, ...).
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    /// `POST /api/v1/service/requirements` – open an auction for a requirement.
    ///
    /// Safe to retry when `requirement_id` is set: the server returns the
    /// existing session.
    pub async fn open_auction(
        &self,
        intake: RequirementIntake,
    ) -> Result<AuctionResponse, ClientError> {
        self.post_signed("/api/v1/service/requirements", intake).await
    }

    /// `POST /api/v1/service/requirements/withdraw` – withdraw a requirement.
    pub async fn withdraw_requirement(
        &self,
        request: WithdrawRequirement,
    ) -> Result<AuctionResponse, ClientError> {
        self.post_signed("/api/v1/service/requirements/withdraw", request)
            .await
    }

    /// `POST /api/v1/service/claims` – relay a candidate's claim.
    pub async fn submit_claim(
        &self,
        claim: ClaimSubmission,
    ) -> Result<ClaimResponse, ClientError> {
        self.post_signed("/api/v1/service/claims", claim).await
    }

    async fn post_signed<B, R>(&self, path: &str, body: B) -> Result<R, ClientError>
    where
        B: Signature,
        R: serde::de::DeserializeOwned,
    {
        let signed = SignedObject::new(body, &self.secret)?;
        let url = self.base_url.join(path)?;

        let resp = self
            .http
            .post(url)
            .header(SIGNATURE_HEADER, signed.to_header())
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(signed.json)
            .send()
            .await?;

        parse_response(resp).await
    }
}
