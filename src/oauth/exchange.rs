//! OAuth token endpoint requests.
//!
//! Handles the authorization-code and refresh-token grants and turns the
//! provider's expiry field into an absolute instant.

use super::error::{OAuthError, OAuthResult};
use super::provider::OAuthProviderConfig;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Longest provider error body kept in an error message.
const MAX_ERROR_BODY: usize = 512;

/// How a token endpoint reports when the access token expires.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpiryFormat {
    /// Unix timestamp (seconds) at which the token expires
    #[default]
    Absolute,
    /// Seconds remaining until the token expires (RFC 6749 `expires_in`)
    Duration,
}

impl FromStr for ExpiryFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "absolute" => Ok(Self::Absolute),
            "duration" => Ok(Self::Duration),
            other => Err(format!(
                "unknown expiry format '{}' (expected 'absolute' or 'duration')",
                other
            )),
        }
    }
}

/// Grant presented to the token endpoint
#[derive(Debug, Clone, Copy)]
pub(crate) enum Grant<'a> {
    AuthorizationCode(&'a str),
    RefreshToken(&'a str),
}

impl Grant<'_> {
    fn grant_type(&self) -> &'static str {
        match self {
            Grant::AuthorizationCode(_) => "authorization_code",
            Grant::RefreshToken(_) => "refresh_token",
        }
    }
}

/// Token endpoint response
#[derive(Deserialize, Debug)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default, alias = "expire_time")]
    pub expires_at: Option<i64>,
    #[serde(default)]
    pub token_type: Option<String>,
}

impl TokenResponse {
    /// Absolute expiry of the access token under the given format.
    ///
    /// An explicit `expires_at`/`expire_time` always wins for absolute
    /// providers; duration providers only ever report `expires_in`.
    pub fn expires_at(
        &self,
        format: ExpiryFormat,
        now: DateTime<Utc>,
    ) -> OAuthResult<DateTime<Utc>> {
        let raw = match format {
            ExpiryFormat::Absolute => self.expires_at.or(self.expires_in),
            ExpiryFormat::Duration => self.expires_in,
        };
        let raw =
            raw.ok_or_else(|| OAuthError::invalid_expiry("token response carries no expiry"))?;
        normalize_expiry(raw, format, now)
    }
}

/// Convert a raw expiry value into an absolute instant strictly after `now`.
pub fn normalize_expiry(
    raw: i64,
    format: ExpiryFormat,
    now: DateTime<Utc>,
) -> OAuthResult<DateTime<Utc>> {
    let expires_at = match format {
        ExpiryFormat::Duration => {
            if raw <= 0 {
                return Err(OAuthError::invalid_expiry(format!(
                    "non-positive lifetime of {} seconds",
                    raw
                )));
            }
            Duration::try_seconds(raw)
                .and_then(|lifetime| now.checked_add_signed(lifetime))
                .ok_or_else(|| {
                    OAuthError::invalid_expiry(format!("lifetime of {} seconds out of range", raw))
                })?
        }
        ExpiryFormat::Absolute => DateTime::<Utc>::from_timestamp(raw, 0)
            .ok_or_else(|| OAuthError::invalid_expiry(format!("timestamp {} out of range", raw)))?,
    };

    if expires_at <= now {
        return Err(OAuthError::invalid_expiry(format!(
            "expiry {} is not in the future",
            expires_at.to_rfc3339()
        )));
    }

    Ok(expires_at)
}

/// POST a grant to the provider's token endpoint.
pub(crate) async fn request_token(
    client: &reqwest::Client,
    config: &OAuthProviderConfig,
    grant: Grant<'_>,
) -> OAuthResult<TokenResponse> {
    let mut form_data: Vec<(&str, &str)> = vec![
        ("grant_type", grant.grant_type()),
        ("client_id", config.client_id.as_str()),
        ("client_secret", config.client_secret.as_str()),
    ];
    match grant {
        Grant::AuthorizationCode(code) => {
            form_data.push(("code", code));
            form_data.push(("redirect_uri", config.redirect_uri.as_str()));
        }
        Grant::RefreshToken(refresh_token) => {
            form_data.push(("refresh_token", refresh_token));
        }
    }

    tracing::debug!(
        grant_type = grant.grant_type(),
        token_url = %config.token_url,
        "Requesting token"
    );

    let response = client
        .post(&config.token_url)
        .header("Accept", "application/json")
        .form(&form_data)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let mut body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        truncate_body(&mut body);
        tracing::warn!(
            grant_type = grant.grant_type(),
            status = status.as_u16(),
            "Token endpoint rejected grant"
        );
        return Err(OAuthError::TokenRejected {
            status: status.as_u16(),
            body,
        });
    }

    let body = response.text().await?;
    let token_response: TokenResponse = serde_json::from_str(&body)
        .map_err(|e| OAuthError::malformed(format!("failed to parse token response: {}", e)))?;

    if token_response.access_token.is_empty() {
        return Err(OAuthError::malformed("empty access_token"));
    }

    tracing::debug!(
        grant_type = grant.grant_type(),
        has_refresh_token = token_response.refresh_token.is_some(),
        token_type = ?token_response.token_type,
        "Token request successful"
    );

    Ok(token_response)
}

fn truncate_body(body: &mut String) {
    if body.len() > MAX_ERROR_BODY {
        let mut end = MAX_ERROR_BODY;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        body.truncate(end);
        body.push_str("...");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_token_response_deserialization() {
        let json = r#"{
            "access_token": "cb_access",
            "refresh_token": "cb_refresh",
            "expires_in": 7200,
            "token_type": "bearer",
            "scope": "balance"
        }"#;

        let response: TokenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.access_token, "cb_access");
        assert_eq!(response.refresh_token, Some("cb_refresh".to_string()));
        assert_eq!(response.expires_in, Some(7200));
        assert_eq!(response.expires_at, None);
        assert_eq!(response.token_type, Some("bearer".to_string()));
    }

    #[test]
    fn test_token_response_expire_time_alias() {
        let json = r#"{"access_token": "a", "expire_time": 1767232800}"#;
        let response: TokenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.expires_at, Some(1767232800));
        assert_eq!(response.refresh_token, None);
    }

    #[test]
    fn test_absolute_expiry_is_taken_verbatim() {
        let raw = now().timestamp() + 7200;
        let expires = normalize_expiry(raw, ExpiryFormat::Absolute, now()).unwrap();
        assert_eq!(expires.timestamp(), raw);
    }

    #[test]
    fn test_duration_expiry_is_added_to_now() {
        let expires = normalize_expiry(7200, ExpiryFormat::Duration, now()).unwrap();
        assert_eq!(expires, now() + Duration::seconds(7200));
    }

    #[test]
    fn test_absolute_expiry_is_not_read_as_duration() {
        // 7200 as an absolute instant is 1970, long past
        let err = normalize_expiry(7200, ExpiryFormat::Absolute, now()).unwrap_err();
        assert!(matches!(err, OAuthError::InvalidExpiry(_)));
    }

    #[test]
    fn test_non_positive_duration_rejected() {
        assert!(normalize_expiry(0, ExpiryFormat::Duration, now()).is_err());
        assert!(normalize_expiry(-5, ExpiryFormat::Duration, now()).is_err());
    }

    #[test]
    fn test_out_of_range_duration_rejected() {
        let err = normalize_expiry(1_000_000_000_000_000, ExpiryFormat::Duration, now())
            .unwrap_err();
        assert!(matches!(err, OAuthError::InvalidExpiry(_)));
        assert!(normalize_expiry(i64::MAX, ExpiryFormat::Duration, now()).is_err());
    }

    #[test]
    fn test_expires_at_prefers_explicit_instant() {
        let absolute = now().timestamp() + 600;
        let response = TokenResponse {
            access_token: "a".to_string(),
            refresh_token: None,
            expires_in: Some(7200),
            expires_at: Some(absolute),
            token_type: None,
        };

        let expires = response.expires_at(ExpiryFormat::Absolute, now()).unwrap();
        assert_eq!(expires.timestamp(), absolute);

        let expires = response.expires_at(ExpiryFormat::Duration, now()).unwrap();
        assert_eq!(expires, now() + Duration::seconds(7200));
    }

    #[test]
    fn test_missing_expiry_rejected() {
        let response = TokenResponse {
            access_token: "a".to_string(),
            refresh_token: None,
            expires_in: None,
            expires_at: None,
            token_type: None,
        };
        assert!(response.expires_at(ExpiryFormat::Absolute, now()).is_err());
    }

    #[test]
    fn test_expiry_format_from_str() {
        assert_eq!("absolute".parse::<ExpiryFormat>().unwrap(), ExpiryFormat::Absolute);
        assert_eq!(" Duration ".parse::<ExpiryFormat>().unwrap(), ExpiryFormat::Duration);
        assert!("seconds".parse::<ExpiryFormat>().is_err());
    }

    #[test]
    fn test_truncate_body() {
        let mut body = "x".repeat(MAX_ERROR_BODY + 10);
        truncate_body(&mut body);
        assert_eq!(body.len(), MAX_ERROR_BODY + 3);
        assert!(body.ends_with("..."));
    }
}
