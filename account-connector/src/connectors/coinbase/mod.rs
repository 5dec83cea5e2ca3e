pub mod api;
pub mod config;
pub mod transformer;

use crate::connector::{oauth_interaction, refresh_and_persist, AccountConnector};
use crate::error::{ConnectorError, FetchStage};
use crate::types::{AccountField, Balances, Interaction, InteractionRequest};
use account_oauth::credentials::{
    CredentialSink, Credentials, FIELD_ACCESS_TOKEN, FIELD_ACCESS_TOKEN_EXPIRES, FIELD_API_CODE,
    FIELD_REFRESH_TOKEN,
};
use account_oauth::oauth::{OAuthClient, OAuthSession};
use async_trait::async_trait;
use tracing::{error, info};

use self::api::CoinbaseClient;
use self::config::CoinbaseConfig;
use self::transformer::balance_to_balances;

pub const CODE: &str = "coinbase";

/// Coinbase connector - authorizes over OAuth2 and reports the balance of
/// the user's primary account.
pub struct CoinbaseConnector {
    oauth: OAuthClient,
    http_client: reqwest::Client,
    api_base_url: String,
}

impl CoinbaseConnector {
    pub fn new(config: CoinbaseConfig) -> Self {
        Self::with_http_client(config, reqwest::Client::new())
    }

    /// Create a connector sharing an existing HTTP client for token and API calls.
    pub fn with_http_client(config: CoinbaseConfig, http_client: reqwest::Client) -> Self {
        Self {
            oauth: OAuthClient::with_http_client(config.oauth_config(), http_client.clone()),
            http_client,
            api_base_url: config.api_base_url,
        }
    }
}

#[async_trait]
impl AccountConnector for CoinbaseConnector {
    fn code(&self) -> &str {
        CODE
    }

    fn name(&self) -> &str {
        "Coinbase"
    }

    fn url(&self) -> &str {
        "https://www.coinbase.com/"
    }

    fn fields(&self) -> Vec<AccountField> {
        vec![
            AccountField::new(FIELD_API_CODE, "API code", "^.+$", true),
            AccountField::new(FIELD_ACCESS_TOKEN, "Access token", "^[^\\s]+$", false),
            AccountField::new(FIELD_REFRESH_TOKEN, "Refresh token", "^[^\\s]+$", false),
            AccountField::new(
                FIELD_ACCESS_TOKEN_EXPIRES,
                "Access token expires",
                "^[0-9]+$",
                false,
            ),
        ]
    }

    async fn interaction(
        &self,
        session: &mut OAuthSession,
        request: &InteractionRequest,
    ) -> Result<Interaction, ConnectorError> {
        oauth_interaction(CODE, &self.oauth, session, request).await
    }

    async fn fetch_balances(
        &self,
        credentials: &Credentials,
        sink: &dyn CredentialSink,
    ) -> Result<Balances, ConnectorError> {
        let updated = refresh_and_persist(CODE, &self.oauth, credentials, sink).await?;

        let client = CoinbaseClient::with_base_url(
            updated.access_token.clone(),
            self.http_client.clone(),
            self.api_base_url.clone(),
        );
        let balance = client.fetch_balance().await.map_err(|e| {
            error!(connector = CODE, error = %e, "Balance query failed");
            ConnectorError::fetch(FetchStage::Balance, e)
        })?;

        let balances = balance_to_balances(&balance).map_err(|e| {
            error!(connector = CODE, error = %e, "Unusable balance response");
            ConnectorError::fetch(FetchStage::Balance, e)
        })?;

        info!(connector = CODE, currencies = balances.len(), "Balances fetched");
        Ok(balances)
    }
}
