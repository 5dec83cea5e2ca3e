use crate::error::{ConnectorError, FetchStage};
use crate::types::{AccountField, Balances, Interaction, InteractionRequest};
use account_oauth::credentials::{CredentialSink, Credentials};
use account_oauth::oauth::{OAuthClient, OAuthError, OAuthSession};
use async_trait::async_trait;
use tracing::{debug, error, info, warn};

/// Account-type plugin interface.
///
/// The host framework drives two flows through this trait:
/// 1. Setup: `interaction()` is called once without a code (redirect to the
///    provider) and once with the provider's callback (fields to store)
/// 2. Sync: `fetch_balances()` is called per sync cycle with the stored
///    credentials and a sink for refreshed ones
///
/// Connectors hold no mutable state. The CSRF state lives in the
/// [`OAuthSession`] the host passes in; credentials live in host storage.
///
/// # Example
/// ```no_run
/// use account_connector::{AccountConnector, InteractionRequest};
/// use account_oauth::credentials::Credentials;
/// use account_oauth::oauth::OAuthSession;
///
/// # async fn run(connector: &dyn AccountConnector, stored: Credentials) -> anyhow::Result<()> {
/// let mut session = OAuthSession::default();
/// let first = connector
///     .interaction(&mut session, &InteractionRequest::default())
///     .await?;
/// assert!(first.is_pending());
///
/// let persist = |updated: &Credentials| -> anyhow::Result<()> {
///     println!("store {:?}", updated.to_fields().keys());
///     Ok(())
/// };
/// let balances = connector.fetch_balances(&stored, &persist).await?;
/// println!("{:?}", balances);
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait AccountConnector: Send + Sync {
    /// Unique lowercase identifier (e.g. "coinbase").
    fn code(&self) -> &str;

    /// Human-readable provider name.
    fn name(&self) -> &str;

    /// Provider homepage.
    fn url(&self) -> &str;

    /// Credential fields this account type stores.
    fn fields(&self) -> Vec<AccountField>;

    /// Advance the interactive authorization flow by one step.
    ///
    /// # Errors
    /// - `Csrf` when the callback state is missing, mismatched or expired
    /// - `Auth` when the provider declines or the code exchange fails
    async fn interaction(
        &self,
        session: &mut OAuthSession,
        request: &InteractionRequest,
    ) -> Result<Interaction, ConnectorError>;

    /// Refresh the access token, hand the refreshed credentials to `sink`,
    /// then fetch balances.
    ///
    /// `sink` is called exactly once per successful refresh, before the
    /// balance query.
    async fn fetch_balances(
        &self,
        credentials: &Credentials,
        sink: &dyn CredentialSink,
    ) -> Result<Balances, ConnectorError>;

    /// Currencies this account type can report.
    async fn fetch_supported_currencies(&self) -> Result<Vec<String>, ConnectorError> {
        Err(ConnectorError::NotImplemented("supported currency discovery"))
    }
}

/// Authorization-code interaction shared by OAuth connectors.
///
/// Session state: nothing pending → awaiting callback (after a redirect) →
/// nothing pending again (after any callback, accepted or not).
pub async fn oauth_interaction(
    connector: &str,
    client: &OAuthClient,
    session: &mut OAuthSession,
    request: &InteractionRequest,
) -> Result<Interaction, ConnectorError> {
    if let Some(error) = &request.error {
        session.clear();
        let description = request
            .error_description
            .as_deref()
            .unwrap_or("Unknown error");
        warn!(
            connector = %connector,
            error = %error,
            description = %description,
            "OAuth authorization declined"
        );
        return Err(OAuthError::AuthorizationDenied(format!("{} - {}", error, description)).into());
    }

    let code = match request.code.as_deref() {
        None => {
            let (url, state) = client.build_authorization_url();
            session.begin(state);
            info!(connector = %connector, "Redirecting to OAuth provider");
            return Ok(Interaction::Redirect { url });
        }
        Some(code) => code,
    };

    debug!(connector = %connector, "Validating CSRF state");
    session.validate_and_consume(request.state.as_deref()).map_err(|e| {
        warn!(connector = %connector, error = %e, "Rejected OAuth callback");
        ConnectorError::Csrf(e)
    })?;

    debug!(connector = %connector, "Exchanging authorization code for token");
    let token = client.exchange_code(code).await.map_err(|e| {
        error!(connector = %connector, error = %e, "Token exchange failed");
        ConnectorError::Auth(e)
    })?;

    info!(
        connector = %connector,
        expires_at = %token.expires_at,
        "OAuth flow completed successfully"
    );

    Ok(Interaction::Complete(Credentials::from_token(code, token)))
}

/// Unconditionally refresh `credentials` and hand the result to `sink`.
///
/// Refreshing on every fetch avoids depending on the local clock agreeing
/// with the provider's about expiry.
pub async fn refresh_and_persist(
    connector: &str,
    client: &OAuthClient,
    credentials: &Credentials,
    sink: &dyn CredentialSink,
) -> Result<Credentials, ConnectorError> {
    debug!(connector = %connector, "Refreshing access token");
    let token = client.refresh(&credentials.refresh_token).await.map_err(|e| {
        error!(connector = %connector, error = %e, "Token refresh failed");
        ConnectorError::fetch(FetchStage::Refresh, e)
    })?;

    let updated = credentials.with_token(token);
    sink.update(&updated).map_err(|e| {
        error!(connector = %connector, error = %e, "Failed to hand refreshed credentials to host");
        ConnectorError::fetch(FetchStage::Persist, e)
    })?;

    debug!(
        connector = %connector,
        expires_at = %updated.access_token_expires,
        "Refreshed credentials persisted"
    );

    Ok(updated)
}
