//! OutcomeReporter processor.
//!
//! Receives `AuctionSettled` and POSTs a signed `AuctionOutcomePayload` to
//! the configured webhook. Failed deliveries are retried with exponential
//! backoff up to `max_retries`; a report that still fails is logged and
//! dropped, the session itself is already final.

use crate::config::OutcomeConfig;
use crate::events::{AuctionSettled, AuctionSettledReceiver};
use crate::utils::{Clock, backoff_delay};
use leadx_sdk::objects::AuctionOutcomePayload;
use leadx_sdk::signature::{SIGNATURE_HEADER, SignedObject};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

pub const OUTCOME_EVENT_TYPE: &str = "auction_outcome";

const RETRY_BASE_DELAY: Duration = Duration::from_secs(1);
const RETRY_MAX_DELAY: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("HTTP request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("outcome webhook failed with status {status}: {body}")]
    DeliveryFailed { status: u16, body: String },

    #[error("payload serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Clone)]
pub struct OutcomeReporter {
    config: OutcomeConfig,
    clock: Arc<dyn Clock>,
    http_client: reqwest::Client,
    retry_base: Duration,
}

impl OutcomeReporter {
    pub fn new(config: OutcomeConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            http_client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            retry_base: RETRY_BASE_DELAY,
        }
    }

    /// Run until shutdown or until the channel closes. Reports still retrying
    /// at shutdown are abandoned.
    pub async fn run(self, mut settled_rx: AuctionSettledReceiver, mut shutdown_rx: watch::Receiver<bool>) {
        info!(
            webhook = self.config.webhook_url.as_ref().map(|u| u.as_str()).unwrap_or("<none>"),
            "OutcomeReporter started"
        );
        let mut in_flight = JoinSet::new();

        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("OutcomeReporter received shutdown signal");
                        break;
                    }
                }

                Some(event) = settled_rx.recv() => {
                    debug!(auction_id = %event.auction_id, "Received AuctionSettled");
                    let reporter = self.clone();
                    in_flight.spawn(async move { reporter.report(event).await });
                }

                Some(_) = in_flight.join_next(), if !in_flight.is_empty() => {}

                else => {
                    info!("AuctionSettled channel closed");
                    break;
                }
            }
        }

        if !in_flight.is_empty() {
            warn!(pending = in_flight.len(), "Abandoning outcome reports still in flight");
        }
        in_flight.shutdown().await;
        info!("OutcomeReporter shutdown complete");
    }

    pub fn build_payload(&self, event: &AuctionSettled) -> AuctionOutcomePayload {
        AuctionOutcomePayload {
            event_type: OUTCOME_EVENT_TYPE.to_string(),
            auction_id: event.auction_id,
            requirement_id: event.requirement_id,
            outcome: event.outcome.clone(),
            timestamp: self.clock.now().assume_utc().unix_timestamp(),
        }
    }

    /// Report one outcome, retrying until delivered or out of retries.
    pub async fn report(&self, event: AuctionSettled) {
        let payload = self.build_payload(&event);
        let Some(url) = self.config.webhook_url.clone() else {
            info!(auction_id = %event.auction_id, outcome = ?payload.outcome, "Auction settled");
            return;
        };

        let mut retries = 0;
        loop {
            match self.send(&url, payload.clone()).await {
                Ok(()) => {
                    info!(auction_id = %event.auction_id, retries, "Outcome webhook delivered");
                    return;
                }
                Err(e) if retries < self.config.max_retries => {
                    let delay = backoff_delay(retries, self.retry_base, RETRY_MAX_DELAY);
                    warn!(
                        auction_id = %event.auction_id,
                        error = %e,
                        retries,
                        retry_in_ms = delay.as_millis() as u64,
                        "Outcome webhook failed, retrying"
                    );
                    retries += 1;
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    error!(auction_id = %event.auction_id, error = %e, retries, "Outcome webhook gave up");
                    return;
                }
            }
        }
    }

    async fn send(&self, url: &url::Url, payload: AuctionOutcomePayload) -> Result<(), ReportError> {
        let signed = SignedObject::new(payload, self.config.secret_bytes())?;
        let response = self
            .http_client
            .post(url.clone())
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
            Err(ReportError::DeliveryFailed {
                status: status.as_u16(),
                body,
            })
        }
    }
}
