//! Operations Controller configuration.
//!
//! Configuration is loaded from environment variables. The provisioning key
//! is injected here — it is never a literal in the codebase — and all
//! sensitive fields are redacted in Debug output.

use common::secret::SecretString;
use std::collections::HashMap;
use std::env;
use std::fmt;
use thiserror::Error;

/// Default WebSocket/HTTP bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default bcrypt cost for admin password hashing.
pub const DEFAULT_BCRYPT_COST: u32 = 12;

/// Channels created for every new operation.
pub const DEFAULT_CHANNELS: [&str; 2] = ["CHANNEL 1", "LOGISTICS"];

/// Per-connection outbound event buffer. A slow client that falls this far
/// behind starts losing broadcasts (fire-and-forget delivery, no queueing).
pub const DEFAULT_OUTBOUND_BUFFER: usize = 256;

/// Operations Controller configuration.
///
/// Loaded from environment variables with sensible defaults. Sensitive
/// fields are redacted in Debug output.
#[derive(Clone)]
pub struct Config {
    /// Bind address for the WebSocket and health endpoints (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// Shared secret gating tenant provisioning.
    /// Protected by `SecretString` to prevent accidental logging.
    pub provisioning_key: SecretString,

    /// Postgres connection URL for the tenant store. When unset the server
    /// runs on the in-memory store (single-process deployments, tests).
    /// Protected by `SecretString`: the URL embeds credentials.
    pub database_url: Option<SecretString>,

    /// bcrypt cost for admin password hashing (default: 12).
    pub bcrypt_cost: u32,

    /// Channels created for every new operation.
    pub default_channels: Vec<String>,

    /// Per-connection outbound event buffer size.
    pub outbound_buffer: usize,
}

/// Custom Debug implementation that redacts sensitive fields.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field("provisioning_key", &"[REDACTED]")
            .field(
                "database_url",
                &self.database_url.as_ref().map(|_| "[REDACTED]"),
            )
            .field("bcrypt_cost", &self.bcrypt_cost)
            .field("default_channels", &self.default_channels)
            .field("outbound_buffer", &self.outbound_buffer)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let provisioning_key = SecretString::from(
            vars.get("OC_PROVISIONING_KEY")
                .ok_or_else(|| ConfigError::MissingEnvVar("OC_PROVISIONING_KEY".to_string()))?
                .clone(),
        );

        let bind_address = vars
            .get("OC_BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let database_url = vars.get("DATABASE_URL").cloned().map(SecretString::from);

        let bcrypt_cost = match vars.get("OC_BCRYPT_COST") {
            Some(raw) => raw.parse().map_err(|_| {
                ConfigError::InvalidValue(format!("OC_BCRYPT_COST must be an integer, got {raw:?}"))
            })?,
            None => DEFAULT_BCRYPT_COST,
        };

        let default_channels = match vars.get("OC_DEFAULT_CHANNELS") {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(ToString::to_string)
                .collect(),
            None => DEFAULT_CHANNELS.iter().map(ToString::to_string).collect(),
        };

        let outbound_buffer = vars
            .get("OC_OUTBOUND_BUFFER")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_OUTBOUND_BUFFER);

        Ok(Config {
            bind_address,
            provisioning_key,
            database_url,
            bcrypt_cost,
            default_channels,
            outbound_buffer,
        })
    }
}
