use account_oauth::oauth::{ExpiryFormat, OAuthProviderConfig};
use anyhow::{anyhow, Context, Result};

pub const BASE_URL: &str = "https://coinbase.com/api/v1";
pub const AUTH_URL: &str = "https://www.coinbase.com/oauth/authorize";
pub const TOKEN_URL: &str = "https://www.coinbase.com/oauth/token";
pub const SCOPES: &[&str] = &["balance"];

/// Coinbase OAuth configuration.
///
/// Loads the client registration from environment variables:
/// - `COINBASE_CLIENT_ID`
/// - `COINBASE_CLIENT_SECRET`
/// - `COINBASE_REDIRECT_URI` (optional when a default is supplied)
/// - `COINBASE_SCOPES` (optional, space separated, default `balance`)
/// - `COINBASE_EXPIRY_FORMAT` (optional, `absolute` or `duration`, default `absolute`)
#[derive(Debug, Clone)]
pub struct CoinbaseConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub expiry_format: ExpiryFormat,
    pub auth_url: String,
    pub token_url: String,
    pub api_base_url: String,
}

impl CoinbaseConfig {
    /// Config against the production Coinbase endpoints.
    pub fn new(client_id: &str, client_secret: &str, redirect_uri: &str) -> Self {
        Self {
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            redirect_uri: redirect_uri.to_string(),
            scopes: SCOPES.iter().map(|s| s.to_string()).collect(),
            expiry_format: ExpiryFormat::Absolute,
            auth_url: AUTH_URL.to_string(),
            token_url: TOKEN_URL.to_string(),
            api_base_url: BASE_URL.to_string(),
        }
    }

    /// Point every endpoint at `base_url` (for testing with a mock server).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.auth_url = format!("{}/oauth/authorize", base_url);
        self.token_url = format!("{}/oauth/token", base_url);
        self.api_base_url = base_url.to_string();
        self
    }

    /// Load config from environment variables.
    ///
    /// `default_redirect_uri` is used when `COINBASE_REDIRECT_URI` is unset.
    pub fn from_env(default_redirect_uri: Option<&str>) -> Result<Self> {
        let client_id =
            std::env::var("COINBASE_CLIENT_ID").context("COINBASE_CLIENT_ID not set")?;
        let client_secret =
            std::env::var("COINBASE_CLIENT_SECRET").context("COINBASE_CLIENT_SECRET not set")?;
        let redirect_uri = match std::env::var("COINBASE_REDIRECT_URI") {
            Ok(uri) => uri,
            Err(_) => default_redirect_uri
                .map(str::to_string)
                .context("COINBASE_REDIRECT_URI not set")?,
        };

        let mut config = Self::new(&client_id, &client_secret, &redirect_uri);

        if let Ok(scopes) = std::env::var("COINBASE_SCOPES") {
            config.scopes = scopes.split_whitespace().map(str::to_string).collect();
        }
        if let Ok(format) = std::env::var("COINBASE_EXPIRY_FORMAT") {
            config.expiry_format = format
                .parse()
                .map_err(|e: String| anyhow!("COINBASE_EXPIRY_FORMAT is invalid: {}", e))?;
        }

        Ok(config)
    }

    /// Returns the OAuth provider config for Coinbase.
    pub fn oauth_config(&self) -> OAuthProviderConfig {
        OAuthProviderConfig {
            auth_url: self.auth_url.clone(),
            token_url: self.token_url.clone(),
            scopes: self.scopes.clone(),
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            redirect_uri: self.redirect_uri.clone(),
            expiry_format: self.expiry_format,
        }
    }
}
