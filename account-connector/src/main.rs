use account_connector::api::{create_router, ApiState};
use account_connector::ConnectorRegistry;
use account_oauth::config::{load_config, AccountConfig};
use account_oauth::oauth::{run_session_cleanup, SessionStore};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "account_connector=info,account_oauth=info".into()),
        )
        .init();

    info!("Account connector starting...");

    let config = match std::env::var("ACCOUNT_CONFIG") {
        Ok(path) => load_config(&path)?,
        Err(_) => AccountConfig::default(),
    };

    info!(
        bind_address = %config.server.bind_address,
        public_url = %config.server.public_url,
        timeout_seconds = config.http.timeout_seconds,
        "Configuration loaded"
    );

    let http_client = config.http.build_client()?;
    let registry = Arc::new(
        ConnectorRegistry::from_env(http_client, &config.server.public_url)
            .context("Failed to configure connectors")?,
    );
    info!(connectors = registry.all().len(), "Connectors registered");

    let sessions = Arc::new(SessionStore::new(config.session.state_expiry_seconds));
    let cleanup_handle = tokio::spawn(run_session_cleanup(
        Arc::clone(&sessions),
        config.session.cleanup_interval_seconds,
    ));

    let router = create_router(ApiState {
        registry,
        sessions,
        session_ttl_seconds: config.session.state_expiry_seconds,
    });
    let listener = tokio::net::TcpListener::bind(&config.server.bind_address)
        .await
        .context("Failed to bind account API address")?;
    info!(address = %config.server.bind_address, "Account API listening");

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            tracing::error!(error = %e, "Account API server error");
        }
    });

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl_c signal")?;
    info!("Shutdown signal received");

    server_handle.abort();
    cleanup_handle.abort();
    info!("Account connector stopped");

    Ok(())
}
