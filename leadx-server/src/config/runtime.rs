//! Validated runtime configuration held by the server.
//!
//! Engine settings live in `leadx_core::config`; these are the parts only the
//! HTTP layer needs.

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen: SocketAddr,
}

/// Admin authentication: an argon2 hash of the admin secret.
#[derive(Debug, Clone)]
pub struct AdminConfig {
    secret_hash: String,
}

impl AdminConfig {
    pub fn new(secret_hash: String) -> Self {
        Self { secret_hash }
    }

    /// Check a plaintext secret against the stored hash.
    pub fn verify(&self, plaintext: &str) -> bool {
        let Ok(hash) = PasswordHash::new(&self.secret_hash) else {
            tracing::error!("Stored admin secret hash is malformed");
            return false;
        };
        Argon2::default()
            .verify_password(plaintext.as_bytes(), &hash)
            .is_ok()
    }
}

/// HMAC key shared with the intake and transport adapters.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    secret: Box<[u8]>,
}

impl ServiceConfig {
    pub fn new(secret: Box<[u8]>) -> Self {
        Self { secret }
    }

    pub fn secret_bytes(&self) -> &[u8] {
        &self.secret
    }
}

/// Shared configuration state with separate locks for each section.
#[derive(Clone)]
pub struct SharedConfig {
    pub server: Arc<RwLock<ServerConfig>>,
    pub admin: Arc<RwLock<AdminConfig>>,
    pub service: Arc<RwLock<ServiceConfig>>,
}
