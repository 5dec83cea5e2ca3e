use anyhow::{anyhow, Context, Result};
use reqwest::{Client, StatusCode};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::value::RawValue;

use super::config::BASE_URL;

/// Amount as reported by Coinbase: a decimal string, or occasionally a bare
/// JSON number.
///
/// Numbers keep their literal text from the response body so that precision
/// and trailing zeros survive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoinbaseAmount {
    Text(String),
    Number(String),
}

impl CoinbaseAmount {
    pub fn as_decimal_string(&self) -> String {
        match self {
            CoinbaseAmount::Text(s) | CoinbaseAmount::Number(s) => s.clone(),
        }
    }
}

impl<'de> Deserialize<'de> for CoinbaseAmount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Box::<RawValue>::deserialize(deserializer)?;
        let literal = raw.get().trim();

        if literal.starts_with('"') {
            return serde_json::from_str::<String>(literal)
                .map(CoinbaseAmount::Text)
                .map_err(D::Error::custom);
        }

        serde_json::from_str::<serde_json::Number>(literal)
            .map(|_| CoinbaseAmount::Number(literal.to_string()))
            .map_err(|_| D::Error::custom(format!("expected a decimal amount, got {}", literal)))
    }
}

/// Account balance.
#[derive(Debug, Clone, Deserialize)]
pub struct CoinbaseBalance {
    pub amount: CoinbaseAmount,
    pub currency: String,
}

/// HTTP client for the Coinbase account API.
///
/// Authenticates with a Bearer token.
pub struct CoinbaseClient {
    access_token: String,
    http_client: Client,
    base_url: String,
}

impl CoinbaseClient {
    /// Create a client using the default Coinbase API base URL.
    pub fn new(access_token: String, http_client: Client) -> Self {
        Self::with_base_url(access_token, http_client, BASE_URL.to_string())
    }

    /// Create a client with a custom base URL (for testing with a mock server).
    pub fn with_base_url(access_token: String, http_client: Client, base_url: String) -> Self {
        Self {
            access_token,
            http_client,
            base_url,
        }
    }

    /// Fetch the balance of the authenticated user's primary account.
    pub async fn fetch_balance(&self) -> Result<CoinbaseBalance> {
        let url = format!("{}/account/balance", self.base_url);
        let response = self
            .http_client
            .get(&url)
            .bearer_auth(&self.access_token)
            .header("Accept", "application/json")
            .send()
            .await
            .context("Failed to send fetch_balance request")?;

        check_response_status(&response)?;
        response
            .json::<CoinbaseBalance>()
            .await
            .context("Failed to parse balance response")
    }
}

/// Check the response status and map known error codes to descriptive errors.
///
/// - 401 → auth error (token expired or revoked)
/// - 429 → rate limit (logs Retry-After)
/// - Other non-2xx → generic API error
fn check_response_status(response: &reqwest::Response) -> Result<()> {
    match response.status() {
        StatusCode::UNAUTHORIZED => Err(anyhow!("Coinbase auth error: token expired or invalid")),
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("unknown");
            Err(anyhow!(
                "Coinbase rate limit exceeded (Retry-After: {})",
                retry_after
            ))
        }
        s if !s.is_success() => Err(anyhow!("Coinbase API error: {}", s)),
        _ => Ok(()),
    }
}
