//! Account credentials and the channel back to the host's storage.
//!
//! The host framework owns credential storage. Connectors read the
//! [`Credentials`] they are handed and propose replacements through a
//! [`CredentialSink`]; they never write storage themselves.
//!
//! # Field representation
//!
//! Hosts store credentials as a flat map of field name to string:
//!
//! ```text
//! api_code              authorization code from the interactive setup
//! access_token          bearer token for API calls
//! refresh_token         token used to obtain the next access token
//! access_token_expires  absolute expiry, unix seconds (UTC)
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use account_oauth::credentials::{CredentialSink, Credentials};
//!
//! # fn main() -> anyhow::Result<()> {
//! # let fields = std::collections::HashMap::new();
//! let credentials = Credentials::from_fields(&fields)?;
//!
//! let sink = |updated: &Credentials| -> anyhow::Result<()> {
//!     println!("persist {:?}", updated.to_fields().keys());
//!     Ok(())
//! };
//! sink.update(&credentials)?;
//! # Ok(())
//! # }
//! ```

use crate::oauth::Token;
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const FIELD_API_CODE: &str = "api_code";
pub const FIELD_ACCESS_TOKEN: &str = "access_token";
pub const FIELD_REFRESH_TOKEN: &str = "refresh_token";
pub const FIELD_ACCESS_TOKEN_EXPIRES: &str = "access_token_expires";

/// Credentials for an authorized account.
///
/// `access_token_expires` is always an absolute instant, never a lifetime.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Credentials {
    /// Authorization code the account was set up with
    pub api_code: String,

    /// OAuth access token (used for API requests)
    pub access_token: String,

    /// OAuth refresh token (used to obtain new access tokens)
    pub refresh_token: String,

    /// When the access token expires (UTC)
    #[serde(with = "chrono::serde::ts_seconds")]
    pub access_token_expires: DateTime<Utc>,
}

impl Credentials {
    /// Credentials for a freshly authorized account.
    pub fn from_token(api_code: impl Into<String>, token: Token) -> Self {
        Self {
            api_code: api_code.into(),
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            access_token_expires: token.expires_at,
        }
    }

    /// Copy of these credentials carrying a refreshed token.
    pub fn with_token(&self, token: Token) -> Self {
        Self::from_token(self.api_code.clone(), token)
    }

    /// Flatten into the host's field map.
    pub fn to_fields(&self) -> HashMap<String, String> {
        HashMap::from([
            (FIELD_API_CODE.to_string(), self.api_code.clone()),
            (FIELD_ACCESS_TOKEN.to_string(), self.access_token.clone()),
            (FIELD_REFRESH_TOKEN.to_string(), self.refresh_token.clone()),
            (
                FIELD_ACCESS_TOKEN_EXPIRES.to_string(),
                self.access_token_expires.timestamp().to_string(),
            ),
        ])
    }

    /// Rebuild from the host's field map.
    pub fn from_fields(fields: &HashMap<String, String>) -> Result<Self> {
        let get = |name: &str| -> Result<String> {
            fields
                .get(name)
                .cloned()
                .ok_or_else(|| anyhow!("missing credential field '{}'", name))
        };

        let expires_raw = get(FIELD_ACCESS_TOKEN_EXPIRES)?;
        let expires_secs: i64 = expires_raw
            .trim()
            .parse()
            .with_context(|| format!("'{}' is not a unix timestamp", FIELD_ACCESS_TOKEN_EXPIRES))?;
        let access_token_expires = DateTime::<Utc>::from_timestamp(expires_secs, 0)
            .ok_or_else(|| anyhow!("'{}' out of range", FIELD_ACCESS_TOKEN_EXPIRES))?;

        Ok(Self {
            api_code: get(FIELD_API_CODE)?,
            access_token: get(FIELD_ACCESS_TOKEN)?,
            refresh_token: get(FIELD_REFRESH_TOKEN)?,
            access_token_expires,
        })
    }
}

/// Receives credentials the host should persist.
///
/// Called synchronously; an error means the host could not store them.
pub trait CredentialSink: Send + Sync {
    fn update(&self, credentials: &Credentials) -> Result<()>;
}

impl<F> CredentialSink for F
where
    F: Fn(&Credentials) -> Result<()> + Send + Sync,
{
    fn update(&self, credentials: &Credentials) -> Result<()> {
        self(credentials)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::Mutex;

    fn sample() -> Credentials {
        Credentials {
            api_code: "code-123".to_string(),
            access_token: "access-abc".to_string(),
            refresh_token: "refresh-xyz".to_string(),
            access_token_expires: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_fields_round_trip() {
        let creds = sample();
        let fields = creds.to_fields();

        assert_eq!(fields.len(), 4);
        assert_eq!(fields[FIELD_ACCESS_TOKEN_EXPIRES], "1772366400");
        assert_eq!(Credentials::from_fields(&fields).unwrap(), creds);
    }

    #[test]
    fn test_from_fields_missing_field() {
        let mut fields = sample().to_fields();
        fields.remove(FIELD_REFRESH_TOKEN);

        let err = Credentials::from_fields(&fields).unwrap_err();
        assert!(err.to_string().contains("refresh_token"));
    }

    #[test]
    fn test_from_fields_rejects_non_numeric_expiry() {
        let mut fields = sample().to_fields();
        fields.insert(FIELD_ACCESS_TOKEN_EXPIRES.to_string(), "tomorrow".to_string());

        assert!(Credentials::from_fields(&fields).is_err());
    }

    #[test]
    fn test_serde_uses_unix_seconds() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["access_token_expires"], 1772366400);

        let back: Credentials = serde_json::from_value(json).unwrap();
        assert_eq!(back, sample());
    }

    #[test]
    fn test_with_token_keeps_api_code() {
        let expires = Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap();
        let updated = sample().with_token(Token {
            access_token: "new-access".to_string(),
            refresh_token: "new-refresh".to_string(),
            expires_at: expires,
        });

        assert_eq!(updated.api_code, "code-123");
        assert_eq!(updated.access_token, "new-access");
        assert_eq!(updated.refresh_token, "new-refresh");
        assert_eq!(updated.access_token_expires, expires);
    }

    #[test]
    fn test_closure_sink() {
        let seen = Mutex::new(Vec::new());
        let sink = |c: &Credentials| -> Result<()> {
            seen.lock().unwrap().push(c.access_token.clone());
            Ok(())
        };

        sink.update(&sample()).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["access-abc".to_string()]);
    }
}
