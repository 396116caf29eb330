//! Outbound side of the messaging transport.
//!
//! The engine hands each invitation to a [`Transport`]; rendering and
//! delivering the message to the candidate is the adapter's business.

use crate::config::TransportConfig;
use async_trait::async_trait;
use leadx_sdk::objects::AuctionInvitation;
use leadx_sdk::signature::{SIGNATURE_HEADER, SignedObject};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP request error: {0}")]
    Request(#[from] reqwest::Error),

    /// The adapter answered with a non-success status.
    #[error("transport rejected invitation with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("delivery attempt timed out")]
    Timeout,

    #[error("payload serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl TransportError {
    /// 4xx answers other than 408/429 will not get better on retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Rejected { status, .. } => {
                !(400..500).contains(status) || *status == 408 || *status == 429
            }
            TransportError::Serialization(_) => false,
            TransportError::Request(_) | TransportError::Timeout => true,
        }
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send_invitation(&self, invitation: &AuctionInvitation) -> Result<(), TransportError>;
}

/// POSTs signed invitations to the adapter's endpoint.
pub struct HttpTransport {
    config: TransportConfig,
    http_client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: TransportConfig) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            config,
            http_client,
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send_invitation(&self, invitation: &AuctionInvitation) -> Result<(), TransportError> {
        let signed = SignedObject::new(invitation.clone(), self.config.secret_bytes())?;
        let response = self
            .http_client
            .post(self.config.endpoint.clone())
            .header("Content-Type", "application/json")
            .header(SIGNATURE_HEADER, signed.to_header())
            .body(signed.json)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(TransportError::Rejected {
                status: status.as_u16(),
                body,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors_are_not_retried() {
        let rejected = |status| TransportError::Rejected {
            status,
            body: String::new(),
        };
        assert!(!rejected(400).is_retryable());
        assert!(!rejected(404).is_retryable());
        assert!(rejected(429).is_retryable());
        assert!(rejected(503).is_retryable());
        assert!(TransportError::Timeout.is_retryable());
    }
}
