use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::time::Duration;

use crate::oauth::DEFAULT_STATE_EXPIRY_SECONDS;

/// Complete account service configuration
///
/// Provider credentials (client id/secret) are not part of this file; each
/// connector loads its own from the environment.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccountConfig {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Outbound HTTP client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Per-request timeout (seconds)
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("account-oauth/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout_seconds(),
            user_agent: default_user_agent(),
        }
    }
}

impl HttpConfig {
    /// Build the HTTP client shared by token and API requests.
    pub fn build_client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .user_agent(&self.user_agent)
            .timeout(Duration::from_secs(self.timeout_seconds))
            .build()
            .context("Failed to build HTTP client")
    }
}

/// Interactive authorization session configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// How long an issued CSRF state stays valid (seconds)
    #[serde(default = "default_state_expiry")]
    pub state_expiry_seconds: i64,
    /// How often expired sessions are purged (seconds)
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_seconds: u64,
}

fn default_state_expiry() -> i64 {
    DEFAULT_STATE_EXPIRY_SECONDS
}

fn default_cleanup_interval() -> u64 {
    60
}

impl SessionConfig {
    /// Reject values the session store and cleanup task cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.state_expiry_seconds <= 0
            || chrono::Duration::try_seconds(self.state_expiry_seconds).is_none()
        {
            bail!(
                "session.state_expiry_seconds must be a positive number of seconds, got {}",
                self.state_expiry_seconds
            );
        }
        if self.cleanup_interval_seconds == 0 {
            bail!("session.cleanup_interval_seconds must be greater than zero");
        }
        Ok(())
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            state_expiry_seconds: default_state_expiry(),
            cleanup_interval_seconds: default_cleanup_interval(),
        }
    }
}

/// HTTP surface configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Externally visible base URL, used to derive default redirect URIs
    #[serde(default = "default_public_url")]
    pub public_url: String,
}

fn default_bind_address() -> String {
    "127.0.0.1:3001".to_string()
}

fn default_public_url() -> String {
    "http://localhost:3001".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            public_url: default_public_url(),
        }
    }
}

/// Load configuration from TOML file
pub fn load_config(path: &str) -> Result<AccountConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path))?;
    let config: AccountConfig =
        toml::from_str(&contents).with_context(|| format!("Failed to parse config file {}", path))?;
    config
        .session
        .validate()
        .with_context(|| format!("Invalid config file {}", path))?;
    Ok(config)
}
