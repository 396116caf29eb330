//! TOML file configuration structures.
//!
//! These structs directly map to the `leadx-config.toml` file format.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use url::Url;

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    pub server: ServerConfig,
    pub admin: AdminConfig,
    pub service: ServiceConfig,
    pub transport: TransportConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<OutcomeConfig>,
    #[serde(default)]
    pub auction: AuctionConfig,
    #[serde(default)]
    pub fanout: FanoutConfig,
    #[serde(default)]
    pub commission: CommissionConfig,
}

/// Server configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The address and port to listen on (e.g., "0.0.0.0:8080").
    #[serde(default = "default_listen_addr")]
    pub listen: SocketAddr,
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

/// Admin configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    /// The admin secret. If this is plaintext (doesn't start with `$argon2`),
    /// it will be hashed and the config file will be rewritten.
    pub secret: String,
}

/// Shared HMAC secret of the intake and transport adapters calling the
/// Service API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub secret: String,
}

/// Outbound invitation endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    pub endpoint: Url,
    /// Secret the adapter uses to verify invitation signatures.
    pub secret: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

/// Outcome webhook. Without this section outcomes are only logged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutcomeConfig {
    pub webhook_url: Url,
    pub secret: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_max_retries() -> u32 {
    8
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuctionConfig {
    pub sla_secs: u64,
    pub max_invited: usize,
    pub sweep_interval_secs: u64,
    pub award_grace_secs: u64,
    pub max_claim_attempts: u32,
}

impl Default for AuctionConfig {
    fn default() -> Self {
        Self {
            sla_secs: 30 * 60,
            max_invited: 10,
            sweep_interval_secs: 15,
            award_grace_secs: 60,
            max_claim_attempts: 8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FanoutConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub attempt_timeout_ms: u64,
}

impl Default for FanoutConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay_ms: 500,
            max_delay_ms: 10_000,
            attempt_timeout_ms: 5_000,
        }
    }
}

/// Commission rate table. Rates are fractions (`0.05` is 5%).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommissionConfig {
    #[serde(default = "default_candidate_share")]
    pub candidate_share: Decimal,
    #[serde(default = "default_rate")]
    pub default_rate: Decimal,
    #[serde(default)]
    pub default_minimum: Decimal,
    #[serde(default = "default_category_rates")]
    pub rates: Vec<CategoryRate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryRate {
    pub category: String,
    pub rate: Decimal,
    #[serde(default)]
    pub minimum: Decimal,
}

fn default_candidate_share() -> Decimal {
    Decimal::new(60, 2)
}

fn default_rate() -> Decimal {
    Decimal::new(3, 2)
}

fn default_category_rates() -> Vec<CategoryRate> {
    let rate = |category: &str, rate: i64, minimum: i64| CategoryRate {
        category: category.to_string(),
        rate: Decimal::new(rate, 2),
        minimum: Decimal::from(minimum),
    };
    vec![
        rate("rental", 5, 1_000),
        rate("sale", 2, 4_000),
        rate("developer", 3, 10_000),
    ]
}

impl Default for CommissionConfig {
    fn default() -> Self {
        Self {
            candidate_share: default_candidate_share(),
            default_rate: default_rate(),
            default_minimum: Decimal::ZERO,
            rates: default_category_rates(),
        }
    }
}

impl FileConfig {
    /// Check if the admin secret is already hashed (argon2 format).
    pub fn is_admin_secret_hashed(&self) -> bool {
        self.admin.secret.starts_with("$argon2")
    }
}
