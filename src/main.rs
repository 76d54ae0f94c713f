use std::sync::Arc;

use anyhow::Result;
use dotenvy::dotenv;
use tracing::info;

use minibank::api::{RateLimitConfig, create_router_with_rate_limit};
use minibank::app::{AppState, TokenDurations};
use minibank::config::Config;
use minibank::infra::{JwtMaker, PostgresStore, init_metrics_handle, init_tracing};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    let config = Config::from_env()?;
    init_tracing(&config.environment);

    let metrics_handle = init_metrics_handle();

    // Connect to the ledger store and bring the schema up to date
    let store = PostgresStore::with_defaults(&config.database_url).await?;
    store.run_migrations().await?;

    let token_maker = JwtMaker::new(&config.token_symmetric_key)?;

    let durations = TokenDurations {
        access: config.access_token_duration,
        refresh: config.refresh_token_duration,
    };

    let mut state = AppState::new(Arc::new(store), Arc::new(token_maker), durations);
    if let Some(handle) = metrics_handle {
        state = state.with_metrics(handle);
    }

    let router = create_router_with_rate_limit(Arc::new(state), RateLimitConfig::from_env());

    let listener = tokio::net::TcpListener::bind(&config.http_server_address).await?;
    info!("server listening on http://{}", config.http_server_address);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown signal received");
    }
}
