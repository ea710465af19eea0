//! Server configuration, loaded from the environment at startup.
//!
//! Environment variables:
//! - `DATABASE_URL`: path to the SQLite database file (default `leads.db`)
//! - `BIND_ADDR`: listen address (default `127.0.0.1:8080`)
//! - `AUTH_TOKEN_SECRET`: HMAC secret for bearer-token verification (required)
//! - `PAYMENT_WEBHOOK_SECRET`: HMAC secret for webhook signatures (required)

use anyhow::{Context, Result};
use secrecy::SecretString;

#[derive(Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub database_url: String,
    pub auth_token_secret: SecretString,
    pub webhook_secret: SecretString,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let bind_addr =
            std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
        let database_url = std::env::var("DATABASE_URL").unwrap_or_else(|_| "leads.db".to_string());

        let auth_token_secret = require_secret("AUTH_TOKEN_SECRET")?;
        let webhook_secret = require_secret("PAYMENT_WEBHOOK_SECRET")?;

        Ok(Self {
            bind_addr,
            database_url,
            auth_token_secret,
            webhook_secret,
        })
    }
}

fn require_secret(var: &str) -> Result<SecretString> {
    let value = std::env::var(var).with_context(|| format!("{var} must be set"))?;
    if value.trim().is_empty() {
        anyhow::bail!("{var} must not be empty");
    }
    Ok(SecretString::new(value))
}
