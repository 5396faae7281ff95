//! Attestation API Service
//!
//! REST API serving coffee sourcing attestations to the storefront

use anyhow::{Context, Result};
use attestation_api::{create_router, AppState};
use attestation_client::{AttestationClient, Config};
use std::env;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "attestation_api=debug,attestation_client=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    // Configuration
    let config = Config::from_env().context("Failed to load attestation configuration")?;
    let host = env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port = env::var("API_PORT").unwrap_or_else(|_| "8085".to_string());

    info!("Starting Attestation API Service");
    info!("Mock mode: {}", config.mock_mode);
    info!("Registry: {}", config.registry_address);
    info!("Schema: {}", config.schema_uid);
    info!("Listening on {}:{}", host, port);

    // Initialize attestation client
    let client =
        AttestationClient::from_config(&config).context("Failed to create attestation client")?;

    // Check registry health
    info!("Checking attestation registry...");
    match client.health_check().await {
        Ok(true) => info!("Attestation registry is reachable"),
        Ok(false) => warn!("Attestation registry is on an unexpected chain"),
        Err(e) => warn!("Failed to reach attestation registry: {}", e),
    }

    if client.signer().is_none() {
        info!("No ATTEST_SENDER configured; submissions will be refused");
    }

    // Create application state
    let state = AppState::new(client).with_explorer_url(config.explorer_url.clone());

    // Create router
    let app = create_router(state);

    // Bind and serve
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    info!("Attestation API Service running on http://{}", addr);

    axum::serve(listener, app)
        .await
        .context("Server error")?;

    Ok(())
}
