//! Startup configuration for the state APIs.
//!
//! Read once from the process environment and threaded into the backend
//! constructors; request code never consults the environment itself.

use std::env;
use std::time::Duration;
use thiserror::Error;

pub const ATLAS_TOKEN_ENV: &str = "ATLAS_TOKEN";
pub const ATLAS_ADDRESS_ENV: &str = "ATLAS_ADDRESS";
pub const ATLAS_HTTP_TIMEOUT_SECS_ENV: &str = "ATLAS_HTTP_TIMEOUT_SECS";

const DEFAULT_ATLAS_ADDRESS: &str = "https://atlas.hashicorp.com";
// Nothing retries, so the deadline has to leave room for large state
// downloads while still bounding a hung remote.
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
const MIN_HTTP_TIMEOUT_SECS: u64 = 1;
const MAX_HTTP_TIMEOUT_SECS: u64 = 600;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("must set $ATLAS_TOKEN")]
    MissingToken,
    #[error("invalid {name}={value:?} (expected integer seconds)")]
    InvalidTimeout { name: &'static str, value: String },
}

/// Everything the backends need: the credential, the service base URL, and
/// the per-request deadline.
#[derive(Debug, Clone)]
pub struct Config {
    pub token: String,
    pub address: String,
    pub timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let token = require_token(&env::var(ATLAS_TOKEN_ENV).unwrap_or_default())?;
        let address = normalize_address(&env::var(ATLAS_ADDRESS_ENV).unwrap_or_default());
        let timeout_secs = env_timeout_secs(ATLAS_HTTP_TIMEOUT_SECS_ENV)?;

        Ok(Self {
            token,
            address,
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

fn require_token(raw: &str) -> Result<String, ConfigError> {
    let token = raw.trim();
    if token.is_empty() {
        return Err(ConfigError::MissingToken);
    }
    Ok(token.to_string())
}

fn normalize_address(value: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        return DEFAULT_ATLAS_ADDRESS.to_string();
    }
    value.trim_end_matches('/').to_string()
}

fn env_timeout_secs(name: &'static str) -> Result<u64, ConfigError> {
    match env::var(name) {
        Ok(value) => parse_timeout_secs(name, &value),
        Err(env::VarError::NotPresent) => Ok(DEFAULT_HTTP_TIMEOUT_SECS),
        Err(env::VarError::NotUnicode(_)) => Err(ConfigError::InvalidTimeout {
            name,
            value: "<non-unicode>".to_string(),
        }),
    }
}

fn parse_timeout_secs(name: &'static str, value: &str) -> Result<u64, ConfigError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(DEFAULT_HTTP_TIMEOUT_SECS);
    }
    let parsed = value
        .parse::<u64>()
        .map_err(|_| ConfigError::InvalidTimeout {
            name,
            value: value.to_string(),
        })?;
    Ok(parsed.clamp(MIN_HTTP_TIMEOUT_SECS, MAX_HTTP_TIMEOUT_SECS))
}
