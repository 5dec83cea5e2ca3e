use account_oauth::oauth::{OAuthError, StateError};
use std::fmt;
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Step of a balance fetch that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStage {
    /// Refresh-token grant
    Refresh,
    /// Handing refreshed credentials to the host
    Persist,
    /// Balance endpoint call or its response
    Balance,
}

impl fmt::Display for FetchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self {
            FetchStage::Refresh => "token refresh",
            FetchStage::Persist => "credential update",
            FetchStage::Balance => "balance query",
        };
        f.write_str(stage)
    }
}

/// Errors surfaced by account connectors to the host framework.
///
/// None of these are retried by the connector. Retry and backoff after a
/// [`ConnectorError::Fetch`] are the host's decision; a `Csrf` or `Auth`
/// failure during setup means the user starts the authorization over.
#[derive(Error, Debug)]
pub enum ConnectorError {
    /// Callback state did not match the state issued for this session
    #[error("CSRF check failed: {0}")]
    Csrf(#[from] StateError),

    /// Provider refused the authorization or the code exchange
    #[error("Authorization failed: {0}")]
    Auth(#[from] OAuthError),

    /// Integration error on the host side (e.g. no update callback registered)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Balance retrieval failed
    #[error("Balance fetch failed during {stage}: {message}")]
    Fetch {
        stage: FetchStage,
        message: String,
        #[source]
        source: BoxError,
    },

    /// Operation this connector does not support
    #[error("Not implemented: {0}")]
    NotImplemented(&'static str),
}

impl ConnectorError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Fetch failure caused by another error.
    pub fn fetch(stage: FetchStage, source: impl Into<BoxError>) -> Self {
        let source = source.into();
        Self::Fetch {
            stage,
            message: source.to_string(),
            source,
        }
    }

    /// Fetch failure with no underlying error (e.g. an unusable response).
    pub fn fetch_stage(&self) -> Option<FetchStage> {
        match self {
            Self::Fetch { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}
