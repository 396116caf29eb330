//! Configuration module for leadx-server.
//!
//! Handles loading configuration from TOML files, CLI arguments,
//! and environment variables. Also handles admin secret hashing.

pub mod file;
pub mod runtime;

use crate::config::file::FileConfig;
use crate::config::runtime::{AdminConfig, ServerConfig, ServiceConfig, SharedConfig};
use leadx_core::config::{
    AuctionSettings, CommissionRate, CommissionSettings, EngineConfig, FanoutSettings,
    OutcomeConfig, TransportConfig,
};
use rust_decimal::Decimal;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("password hashing error: {0}")]
    HashError(String),

    #[error("DATABASE_URL environment variable not set")]
    MissingDatabaseUrl,
}

/// Loaded configuration result containing all parts.
pub struct LoadedConfig {
    pub server: ServerConfig,
    pub admin: AdminConfig,
    pub service: ServiceConfig,
    pub transport: TransportConfig,
    pub outcome: OutcomeConfig,
    pub engine: EngineConfig,
}

impl LoadedConfig {
    /// Split off the HTTP-layer sections into a SharedConfig.
    pub fn shared(&self) -> SharedConfig {
        SharedConfig {
            server: Arc::new(RwLock::new(self.server.clone())),
            admin: Arc::new(RwLock::new(self.admin.clone())),
            service: Arc::new(RwLock::new(self.service.clone())),
        }
    }
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    config_path: std::path::PathBuf,
    listen_override: Option<SocketAddr>,
}

impl ConfigLoader {
    pub fn new(config_path: impl AsRef<Path>, listen_override: Option<SocketAddr>) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            listen_override,
        }
    }

    /// Load and process the configuration.
    ///
    /// This will:
    /// 1. Read the TOML file
    /// 2. Apply CLI overrides
    /// 3. Validate the configuration
    /// 4. Hash the admin secret if it's plaintext (and rewrite the file)
    /// 5. Build the loaded configuration
    pub fn load(&self) -> Result<LoadedConfig, ConfigError> {
        let config_content = std::fs::read_to_string(&self.config_path)?;
        let mut file_config: FileConfig = toml::from_str(&config_content)?;

        if let Some(listen) = self.listen_override {
            file_config.server.listen = listen;
        }

        validate(&file_config)?;

        let secret_hash = if file_config.is_admin_secret_hashed() {
            file_config.admin.secret.clone()
        } else {
            let hash = hash_secret(&file_config.admin.secret)?;
            file_config.admin.secret = hash.clone();
            self.rewrite_config(&file_config)?;
            tracing::info!("Admin secret hashed and config file updated");
            hash
        };

        Ok(build_loaded_config(file_config, secret_hash))
    }

    /// Reload the configuration (used during SIGHUP).
    pub fn reload(&self) -> Result<LoadedConfig, ConfigError> {
        self.load()
    }

    fn rewrite_config(&self, config: &FileConfig) -> Result<(), ConfigError> {
        let toml_string = toml::to_string_pretty(config)?;

        // Write atomically: write to temp file, then rename
        let temp_path = self.config_path.with_extension("toml.tmp");
        std::fs::write(&temp_path, toml_string)?;
        std::fs::rename(&temp_path, &self.config_path)?;

        Ok(())
    }
}

fn validate(config: &FileConfig) -> Result<(), ConfigError> {
    let invalid = |msg: &str| Err(ConfigError::ValidationError(msg.to_string()));

    if config.admin.secret.is_empty() {
        return invalid("admin secret must not be empty");
    }
    if config.service.secret.is_empty() {
        return invalid("service secret must not be empty");
    }
    if config.auction.sla_secs == 0 {
        return invalid("auction.sla_secs must be positive");
    }
    if config.auction.max_invited == 0 {
        return invalid("auction.max_invited must be at least 1");
    }
    if config.auction.sweep_interval_secs == 0 {
        return invalid("auction.sweep_interval_secs must be positive");
    }
    if config.fanout.max_attempts == 0 {
        return invalid("fanout.max_attempts must be at least 1");
    }
    if config.fanout.base_delay_ms > config.fanout.max_delay_ms {
        return invalid("fanout.base_delay_ms must not exceed fanout.max_delay_ms");
    }

    let commission = &config.commission;
    if commission.candidate_share < Decimal::ZERO || commission.candidate_share > Decimal::ONE {
        return invalid("commission.candidate_share must be between 0 and 1");
    }
    let rates = std::iter::once((commission.default_rate, commission.default_minimum))
        .chain(commission.rates.iter().map(|r| (r.rate, r.minimum)));
    for (rate, minimum) in rates {
        if rate < Decimal::ZERO || rate > Decimal::ONE || minimum < Decimal::ZERO {
            return invalid("commission rates must be within 0..=1 with non-negative minimums");
        }
    }
    for rate in &commission.rates {
        if rate.category.trim().is_empty() {
            return invalid("commission rate category must not be empty");
        }
    }
    Ok(())
}

pub(crate) fn hash_secret(plaintext: &str) -> Result<String, ConfigError> {
    use argon2::{
        Argon2, PasswordHasher,
        password_hash::{SaltString, rand_core::OsRng},
    };

    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(plaintext.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ConfigError::HashError(e.to_string()))
}

fn build_loaded_config(file_config: FileConfig, secret_hash: String) -> LoadedConfig {
    let auction = &file_config.auction;
    let fanout = &file_config.fanout;
    let commission = &file_config.commission;

    let rate_table = commission.rates.iter().fold(
        CommissionSettings::new(
            CommissionRate {
                rate: commission.default_rate,
                minimum: commission.default_minimum,
            },
            commission.candidate_share,
        ),
        |settings, r| {
            settings.with_rate(
                &r.category,
                CommissionRate {
                    rate: r.rate,
                    minimum: r.minimum,
                },
            )
        },
    );

    let engine = EngineConfig {
        auction: AuctionSettings {
            sla: Duration::from_secs(auction.sla_secs),
            max_invited: auction.max_invited,
            sweep_interval: Duration::from_secs(auction.sweep_interval_secs),
            award_grace: Duration::from_secs(auction.award_grace_secs),
            max_claim_attempts: auction.max_claim_attempts,
        },
        fanout: FanoutSettings {
            max_attempts: fanout.max_attempts,
            base_delay: Duration::from_millis(fanout.base_delay_ms),
            max_delay: Duration::from_millis(fanout.max_delay_ms),
            attempt_timeout: Duration::from_millis(fanout.attempt_timeout_ms),
        },
        commission: rate_table,
    };

    let outcome = match file_config.outcome {
        Some(o) => OutcomeConfig {
            webhook_url: Some(o.webhook_url),
            secret: o.secret.into_bytes().into_boxed_slice(),
            max_retries: o.max_retries,
        },
        None => OutcomeConfig::default(),
    };

    LoadedConfig {
        server: ServerConfig {
            listen: file_config.server.listen,
        },
        admin: AdminConfig::new(secret_hash),
        service: ServiceConfig::new(file_config.service.secret.into_bytes().into_boxed_slice()),
        transport: TransportConfig {
            endpoint: file_config.transport.endpoint,
            secret: file_config.transport.secret.into_bytes().into_boxed_slice(),
            request_timeout: Duration::from_millis(file_config.transport.request_timeout_ms),
        },
        outcome,
        engine,
    }
}

/// Get the database URL from the environment.
pub fn get_database_url() -> Result<String, ConfigError> {
    std::env::var("DATABASE_URL").map_err(|_| ConfigError::MissingDatabaseUrl)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
[server]
listen = "127.0.0.1:3000"

[admin]
secret = "let-me-in"

[service]
secret = "service-secret"

[transport]
endpoint = "http://127.0.0.1:9000/invitations"
secret = "transport-secret"

[commission]
default_rate = "0.02"

[[commission.rates]]
category = "Rental"
rate = "0.05"
minimum = "1000"
"#;

    fn write_config(contents: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("leadx-config.toml");
        std::fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn test_plaintext_admin_secret_is_hashed_and_rewritten() {
        let (_dir, path) = write_config(CONFIG);
        let loaded = ConfigLoader::new(&path, None).load().unwrap();
        assert!(loaded.admin.verify("let-me-in"));
        assert!(!loaded.admin.verify("wrong"));

        let rewritten: FileConfig =
            toml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert!(rewritten.is_admin_secret_hashed());

        // a second load keeps the existing hash
        let reloaded = ConfigLoader::new(&path, None).reload().unwrap();
        assert!(reloaded.admin.verify("let-me-in"));
        let again: FileConfig = toml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(again.admin.secret, rewritten.admin.secret);
    }

    #[test]
    fn test_engine_settings_are_built_from_file() {
        let (_dir, path) = write_config(CONFIG);
        let listen: SocketAddr = "127.0.0.1:4000".parse().unwrap();
        let loaded = ConfigLoader::new(&path, Some(listen)).load().unwrap();
        assert_eq!(loaded.server.listen, listen);
        assert_eq!(loaded.engine.auction.sla, Duration::from_secs(1800));
        assert_eq!(
            loaded.engine.commission.rate_for("rental").rate,
            Decimal::new(5, 2)
        );
        assert_eq!(
            loaded.engine.commission.rate_for("sale").rate,
            Decimal::new(2, 2)
        );
        assert!(loaded.outcome.webhook_url.is_none());
    }

    #[test]
    fn test_validation_rejects_bad_settings() {
        let (_dir, path) = write_config(&format!("{CONFIG}\n[auction]\nsla_secs = 0\n"));
        assert!(matches!(
            ConfigLoader::new(&path, None).load(),
            Err(ConfigError::ValidationError(_))
        ));
    }
}
