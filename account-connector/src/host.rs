//! Adapter for hosts that register an update callback before each fetch.
//!
//! Some wallet frameworks hand the connector a persistence callback through a
//! separate registration call instead of passing it with the fetch. This
//! binding keeps that calling convention while the connector itself always
//! receives the sink as a parameter.

use crate::connector::AccountConnector;
use crate::error::ConnectorError;
use crate::types::{AccountField, Balances, Interaction, InteractionRequest};
use account_oauth::credentials::{CredentialSink, Credentials};
use account_oauth::oauth::OAuthSession;
use std::sync::Arc;
use tracing::error;

pub struct HostBinding {
    connector: Arc<dyn AccountConnector>,
    update_callback: Option<Box<dyn CredentialSink>>,
}

impl HostBinding {
    pub fn new(connector: Arc<dyn AccountConnector>) -> Self {
        Self {
            connector,
            update_callback: None,
        }
    }

    pub fn connector(&self) -> &dyn AccountConnector {
        self.connector.as_ref()
    }

    pub fn get_fields(&self) -> Vec<AccountField> {
        self.connector.fields()
    }

    /// Register the callback that receives refreshed credentials.
    ///
    /// A registration serves exactly one [`HostBinding::fetch_balances`] call.
    pub fn register_account_update_callback(&mut self, callback: impl CredentialSink + 'static) {
        self.update_callback = Some(Box::new(callback));
    }

    pub fn has_update_callback(&self) -> bool {
        self.update_callback.is_some()
    }

    pub async fn interaction(
        &self,
        session: &mut OAuthSession,
        request: &InteractionRequest,
    ) -> Result<Interaction, ConnectorError> {
        self.connector.interaction(session, request).await
    }

    /// Fetch balances, consuming the registered update callback.
    ///
    /// Fails with `Configuration` before any network call when no callback
    /// is registered.
    pub async fn fetch_balances(
        &mut self,
        credentials: &Credentials,
    ) -> Result<Balances, ConnectorError> {
        let callback = self.update_callback.take().ok_or_else(|| {
            error!(
                connector = %self.connector.code(),
                "fetch_balances called without an account update callback"
            );
            ConnectorError::configuration("no account update callback registered")
        })?;

        self.connector
            .fetch_balances(credentials, callback.as_ref())
            .await
    }

    pub async fn fetch_supported_currencies(&self) -> Result<Vec<String>, ConnectorError> {
        self.connector.fetch_supported_currencies().await
    }
}
