//! Outbound endpoints: the transport adapter and the outcome webhook.

use std::time::Duration;
use url::Url;

/// Where invitations are pushed.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub endpoint: Url,
    /// HMAC key the adapter uses to verify invitations.
    pub secret: Box<[u8]>,
    pub request_timeout: Duration,
}

impl TransportConfig {
    pub fn secret_bytes(&self) -> &[u8] {
        &self.secret
    }
}

/// Where terminal outcomes are reported. Without a URL outcomes are only logged.
#[derive(Debug, Clone, Default)]
pub struct OutcomeConfig {
    pub webhook_url: Option<Url>,
    pub secret: Box<[u8]>,
    pub max_retries: u32,
}

impl OutcomeConfig {
    pub fn secret_bytes(&self) -> &[u8] {
        &self.secret
    }
}
