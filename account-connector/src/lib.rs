//! Account connectors - wallet account types backed by OAuth2 providers.
//!
//! A connector is the plugin a wallet-aggregation host calls to set up an
//! account (interactive OAuth authorization) and to sync it (refresh the
//! token, fetch balances). The host owns storage; connectors only propose
//! credential updates through a [`CredentialSink`].
//!
//! # Architecture
//!
//! ```text
//!        Host framework (storage, scheduling)
//!          │  interaction()        ▲ sink.update()
//!          │  fetch_balances()     │
//!          ▼                       │
//! ┌─────────────────────────────────────────┐
//! │       AccountConnector (Coinbase)        │
//! │  - CSRF-checked authorization            │
//! │  - refresh on every fetch                │
//! │  - balance normalization                 │
//! └─────────────────────────────────────────┘
//!          │
//!          ▼
//! ┌─────────────────────────────────────────┐
//! │       OAuthClient (account-oauth)        │
//! │  - authorization URL + state             │
//! │  - code exchange / refresh grants        │
//! └─────────────────────────────────────────┘
//!          │
//!          ▼
//!       Provider API
//! ```
//!
//! # Core Types
//!
//! - [`AccountConnector`] - Trait every account type implements
//! - [`HostBinding`] - Register-then-fetch adapter for hosts
//! - [`ConnectorError`] - CSRF / auth / configuration / fetch failures
//! - [`Balances`] - Lowercase currency code → confirmed amount

mod connector;
mod error;
mod types;
pub mod api;
pub mod connectors;
pub mod host;
pub mod registry;

pub use connector::{oauth_interaction, refresh_and_persist, AccountConnector};
pub use error::{ConnectorError, FetchStage};
pub use host::HostBinding;
pub use registry::ConnectorRegistry;
pub use types::{AccountField, BalanceEntry, Balances, Interaction, InteractionRequest};

// Re-export credential types for convenience
pub use account_oauth::credentials::{CredentialSink, Credentials};
