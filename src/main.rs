use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use hearth::analytics::SystemClock;
use hearth::api;
use hearth::auth::AuthService;
use hearth::config::{AuthMode, Config, WriteMode};
use hearth::storage;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = Arc::new(Config::from_env()?);
    info!("Loaded configuration");

    // Initialize storage
    info!("Initializing database...");
    let storage = storage::connect(&config.database).await?;
    info!("Database initialized successfully");

    let auth_service = Arc::new(AuthService::new(&config.auth));
    match auth_service.mode() {
        AuthMode::None => {
            info!("🔓 Authentication is disabled - analytics reads are open");
        }
        AuthMode::ApiKey => {
            info!(
                "🔐 API key authentication enabled ({} key(s) configured)",
                config.auth.api_keys.len()
            );
        }
    }

    let analytics = &config.analytics;
    info!(
        dedup_window_mins = analytics.dedup_window_mins,
        history_limit = analytics.history_limit,
        daily_window_days = analytics.daily_window_days,
        "Interaction analytics configured"
    );
    if analytics.write_mode == WriteMode::LastWriteWins {
        info!(
            "Analytics saves use last-write-wins; concurrent tracking for one agent may drop \
             increments"
        );
    } else {
        info!(
            "Analytics saves use compare-and-swap with up to {} retries",
            analytics.cas_max_retries
        );
    }

    let router = api::create_api_router(
        storage,
        auth_service,
        Arc::clone(&config),
        Arc::new(SystemClock),
    );

    let api_addr = format!("{}:{}", config.api_server.host, config.api_server.port);
    let listener = tokio::net::TcpListener::bind(&api_addr).await?;
    info!("🚀 API server listening on http://{}", api_addr);
    info!("   - Track interactions at POST http://{}/api/agents/{{id}}/track", api_addr);

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    info!("Shutdown signal received, stopping server");
}
