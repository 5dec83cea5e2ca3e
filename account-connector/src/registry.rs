//! Connector registry - the account types this crate provides.

use crate::connectors::coinbase::config::CoinbaseConfig;
use crate::connectors::coinbase::{self, CoinbaseConnector};
use crate::AccountConnector;
use anyhow::Result;
use std::sync::Arc;

/// Available connectors, looked up by code.
#[derive(Clone, Default)]
pub struct ConnectorRegistry {
    connectors: Vec<Arc<dyn AccountConnector>>,
}

impl ConnectorRegistry {
    pub fn new(connectors: Vec<Arc<dyn AccountConnector>>) -> Self {
        Self { connectors }
    }

    /// Build every connector from its environment configuration.
    ///
    /// Connectors without an explicit redirect URI are pointed at
    /// `{public_url}/accounts/{code}/interaction`.
    pub fn from_env(http_client: reqwest::Client, public_url: &str) -> Result<Self> {
        let redirect = format!(
            "{}/accounts/{}/interaction",
            public_url.trim_end_matches('/'),
            coinbase::CODE
        );
        let config = CoinbaseConfig::from_env(Some(&redirect))?;
        let coinbase = CoinbaseConnector::with_http_client(config, http_client);
        Ok(Self::new(vec![Arc::new(coinbase)]))
    }

    pub fn get(&self, code: &str) -> Option<Arc<dyn AccountConnector>> {
        self.connectors.iter().find(|c| c.code() == code).cloned()
    }

    pub fn all(&self) -> &[Arc<dyn AccountConnector>] {
        &self.connectors
    }
}
