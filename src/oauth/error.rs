//! OAuth error types

use thiserror::Error;

/// Errors raised while talking to an OAuth provider.
///
/// Every variant means the provider (or the path to it) refused to hand out a
/// usable token. None of them are retried internally.
#[derive(Error, Debug)]
pub enum OAuthError {
    /// The user declined, or the provider aborted, the authorization step
    #[error("Authorization denied: {0}")]
    AuthorizationDenied(String),

    /// Token endpoint answered with a non-2xx status
    #[error("Token request rejected with status {status}: {body}")]
    TokenRejected { status: u16, body: String },

    /// Token endpoint answered 2xx with a body we cannot use
    #[error("Malformed token response: {0}")]
    MalformedResponse(String),

    /// Expiry could not be turned into a future instant
    #[error("Invalid token expiry: {0}")]
    InvalidExpiry(String),

    /// A refresh was requested without a refresh token
    #[error("No refresh token available")]
    MissingRefreshToken,

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl OAuthError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedResponse(msg.into())
    }

    pub fn invalid_expiry(msg: impl Into<String>) -> Self {
        Self::InvalidExpiry(msg.into())
    }

    /// Whether the provider itself rejected the grant (as opposed to a
    /// transport failure or a response we could not parse).
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::TokenRejected { .. } | Self::AuthorizationDenied(_))
    }
}

/// Result type alias for OAuth operations
pub type OAuthResult<T> = Result<T, OAuthError>;
