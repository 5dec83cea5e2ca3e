//! OAuth 2.0 client for account connectors.
//!
//! Implements the three provider-facing steps of the authorization code flow:
//! 1. Build the authorization URL (with a fresh CSRF state token)
//! 2. Exchange the returned code for a token pair
//! 3. Refresh the access token with the refresh token
//!
//! Where the state token lives between steps 1 and 2 is the caller's
//! business; see [`OAuthSession`].

mod error;
mod exchange;
mod provider;
mod session;

pub use error::{OAuthError, OAuthResult};
pub use exchange::{normalize_expiry, ExpiryFormat};
pub use provider::{generate_state, OAuthProviderConfig};
pub use session::{
    run_session_cleanup, OAuthSession, SessionStore, StateError, DEFAULT_STATE_EXPIRY_SECONDS,
};

use chrono::{DateTime, Utc};
use exchange::{request_token, Grant};
use serde::{Deserialize, Serialize};

/// Token pair issued by the provider, with an absolute expiry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

/// OAuth client bound to one provider registration.
#[derive(Clone, Debug)]
pub struct OAuthClient {
    config: OAuthProviderConfig,
    http_client: reqwest::Client,
}

impl OAuthClient {
    pub fn new(config: OAuthProviderConfig) -> Self {
        Self::with_http_client(config, reqwest::Client::new())
    }

    /// Create a client sharing an existing HTTP client (timeouts, user agent).
    pub fn with_http_client(config: OAuthProviderConfig, http_client: reqwest::Client) -> Self {
        Self { config, http_client }
    }

    pub fn config(&self) -> &OAuthProviderConfig {
        &self.config
    }

    /// Build the authorization URL together with the state token it carries.
    pub fn build_authorization_url(&self) -> (String, String) {
        let state = generate_state();
        let url = self.config.build_auth_url(&state);
        (url, state)
    }

    /// Exchange an authorization code for a token pair.
    ///
    /// Codes are single-use at the provider; presenting one twice fails with
    /// the provider's rejection.
    pub async fn exchange_code(&self, code: &str) -> OAuthResult<Token> {
        if code.is_empty() {
            return Err(OAuthError::AuthorizationDenied(
                "empty authorization code".to_string(),
            ));
        }

        let response =
            request_token(&self.http_client, &self.config, Grant::AuthorizationCode(code)).await?;
        let expires_at = response.expires_at(self.config.expiry_format, Utc::now())?;
        let refresh_token = response
            .refresh_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| OAuthError::malformed("authorization grant returned no refresh_token"))?;

        Ok(Token {
            access_token: response.access_token,
            refresh_token,
            expires_at,
        })
    }

    /// Refresh the access token.
    ///
    /// A provider that does not rotate refresh tokens leaves the presented
    /// one in place.
    pub async fn refresh(&self, refresh_token: &str) -> OAuthResult<Token> {
        if refresh_token.is_empty() {
            return Err(OAuthError::MissingRefreshToken);
        }

        let response =
            request_token(&self.http_client, &self.config, Grant::RefreshToken(refresh_token))
                .await?;
        let expires_at = response.expires_at(self.config.expiry_format, Utc::now())?;
        let rotated = response
            .refresh_token
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| refresh_token.to_string());

        Ok(Token {
            access_token: response.access_token,
            refresh_token: rotated,
            expires_at,
        })
    }
}
