//! OAuth 2.0 token lifecycle for wallet account connectors.
//!
//! - [`oauth`] - authorization URL, code exchange, refresh, CSRF session context
//! - [`credentials`] - stored credential fields and the sink back to the host
//! - [`config`] - HTTP, session and server settings

// Account credentials and persistence callback
pub mod credentials;

// OAuth client and session state
pub mod oauth;

// Configuration loading
pub mod config;
